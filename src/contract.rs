//! Assume/Guarantee contracts (§4.8): named port maps bound to a shared `(A, G)` formula
//! pair, with construction, copy, composition and the four verification entry points.

use std::cell::RefCell;
use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::Formula;
use crate::error::{ContractError, ContractResult};
use crate::port::Port;
use crate::printer::{self, PrintOptions};
use crate::registry::{AttributeRegistry, ContextId};
use crate::symbols::BaseSymbolSet;
use crate::types::Type;
use crate::verify::{self, Verdict, VerificationBackend};

/// A formula supplied either as surface-grammar text (parsed under the contract's own
/// context) or as an already-built AST (adopted verbatim).
pub enum FormulaSource {
    Text(String),
    Ast(Formula),
}

/// A declared port: a bare boolean name, a bounded-integer triple, or an already-built
/// port the caller wants adopted as-is.
pub enum PortSpec {
    Bool(String),
    BoundedInt(String, i64, i64),
    Existing(Port),
}

impl PortSpec {
    fn base_name(&self) -> String {
        match self {
            PortSpec::Bool(name) => name.clone(),
            PortSpec::BoundedInt(name, _, _) => name.clone(),
            PortSpec::Existing(port) => port.base_name().to_string(),
        }
    }

    fn ltype(&self) -> Type {
        match self {
            PortSpec::Bool(_) => Type::bool(),
            PortSpec::BoundedInt(_, lower, upper) => Type::bounded_int(*lower, *upper),
            PortSpec::Existing(port) => port.ltype(),
        }
    }
}

/// `(name, inputs, outputs, A, G, symbol_set, context, origin)` (§3).
pub struct Contract {
    name: String,
    context: ContextId,
    inputs: RefCell<IndexMap<String, Port>>,
    outputs: RefCell<IndexMap<String, Port>>,
    assumption: RefCell<Formula>,
    guarantee: RefCell<Formula>,
    origin: RefCell<IndexMap<String, String>>,
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Contract {
    /// Builds a contract following §4.8's seven construction steps.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &AttributeRegistry,
        context: ContextId,
        name: impl Into<String>,
        inputs: Vec<PortSpec>,
        outputs: Vec<PortSpec>,
        assumption: FormulaSource,
        guarantee: FormulaSource,
        saturated: bool,
        infer_ports: bool,
    ) -> ContractResult<Contract> {
        let name = name.into();
        registry.allocate(context, &name);

        let assumption_parsed = matches!(assumption, FormulaSource::Text(_));
        let guarantee_parsed = matches!(guarantee, FormulaSource::Text(_));
        let mut assumption = match assumption {
            FormulaSource::Text(text) => crate::parser::Parser::new(registry, context).parse(&text)?,
            FormulaSource::Ast(formula) => formula,
        };
        let mut guarantee = match guarantee {
            FormulaSource::Text(text) => crate::parser::Parser::new(registry, context).parse(&text)?,
            FormulaSource::Ast(formula) => formula,
        };
        if assumption_parsed && guarantee_parsed {
            assumption.equalize(&guarantee);
        }

        if !saturated {
            guarantee = Formula::binary(
                crate::ast::BinaryKind::Or,
                Formula::not(assumption.clone()),
                guarantee,
                false,
            );
        }

        let input_names: HashSet<String> = inputs.iter().map(PortSpec::base_name).collect();
        let output_names: HashSet<String> = outputs.iter().map(PortSpec::base_name).collect();
        let overlap: Vec<String> = input_names.intersection(&output_names).cloned().collect();
        if !overlap.is_empty() {
            return Err(ContractError::port_declaration(
                "a port cannot be both an input and an output",
                overlap,
            ));
        }

        let formula_literals = {
            let mut map = assumption.literals();
            map.extend(guarantee.literals());
            map
        };

        let bind = |spec: PortSpec| -> Port {
            match spec {
                PortSpec::Existing(port) => port,
                spec => {
                    let base = spec.base_name();
                    let ltype = spec.ltype();
                    let literal = formula_literals.get(&base).cloned();
                    Port::new(registry, context, &base, ltype, literal, Some(name.clone()))
                }
            }
        };

        let input_ports: IndexMap<String, Port> = inputs
            .into_iter()
            .map(|spec| {
                let base = spec.base_name();
                (base, bind(spec))
            })
            .collect();
        let output_ports: IndexMap<String, Port> = outputs
            .into_iter()
            .map(|spec| {
                let base = spec.base_name();
                (base, bind(spec))
            })
            .collect();

        if infer_ports {
            let declared: HashSet<String> = input_ports
                .keys()
                .chain(output_ports.keys())
                .cloned()
                .collect();
            for (base, literal) in formula_literals.iter() {
                if declared.contains(base) {
                    continue;
                }
                let target = input_ports
                    .get(base)
                    .or_else(|| output_ports.get(base));
                match target {
                    Some(port) => {
                        port.literal().merge(literal);
                    }
                    None => return Err(ContractError::port_mapping(vec![base.clone()])),
                }
            }
        }

        Ok(Contract {
            name,
            context,
            inputs: RefCell::new(input_ports),
            outputs: RefCell::new(output_ports),
            assumption: RefCell::new(assumption),
            guarantee: RefCell::new(guarantee),
            origin: RefCell::new(IndexMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn assumption(&self) -> Formula {
        self.assumption.borrow().clone()
    }

    pub fn guarantee(&self) -> Formula {
        self.guarantee.borrow().clone()
    }

    pub fn port_names(&self) -> Vec<String> {
        self.inputs
            .borrow()
            .keys()
            .chain(self.outputs.borrow().keys())
            .cloned()
            .collect()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.borrow().keys().cloned().collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.borrow().keys().cloned().collect()
    }

    /// Looks up a port by `base_name` across both input and output maps (attribute access
    /// by name, §4.8).
    pub fn port(&self, base_name: &str) -> Option<std::cell::Ref<'_, Port>> {
        if self.inputs.borrow().contains_key(base_name) {
            return Some(std::cell::Ref::map(self.inputs.borrow(), |m| {
                &m[base_name]
            }));
        }
        if self.outputs.borrow().contains_key(base_name) {
            return Some(std::cell::Ref::map(self.outputs.borrow(), |m| {
                &m[base_name]
            }));
        }
        None
    }

    /// `unique_name -> {base_name}` reverse view over every port (a unique name may map to
    /// several ports whose literals have merged).
    pub fn ports_reverse_dict(&self) -> IndexMap<String, Vec<String>> {
        let mut reverse: IndexMap<String, Vec<String>> = IndexMap::new();
        for (base, port) in self.inputs.borrow().iter().chain(self.outputs.borrow().iter()) {
            reverse.entry(port.unique_name()).or_default().push(base.clone());
        }
        reverse
    }

    /// `unique_name -> {base_name}` reverse view over every literal reachable from `A`/`G`.
    pub fn formulae_reverse_dict(&self) -> IndexMap<String, Vec<String>> {
        let mut reverse: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut literals = self.assumption.borrow().literals();
        literals.extend(self.guarantee.borrow().literals());
        for (base, literal) in literals.iter() {
            reverse
                .entry(literal.unique_name())
                .or_default()
                .push(base.clone());
        }
        reverse
    }

    fn print_pair(&self) -> (String, String) {
        let options = PrintOptions {
            ignore_precedence: false,
            with_base_names: false,
        };
        (
            printer::print(&self.assumption.borrow(), &BaseSymbolSet, options),
            printer::print(&self.guarantee.borrow(), &BaseSymbolSet, options),
        )
    }

    /// Pretty-prints `A`/`G`, reparses them in a fresh context to allocate fresh literal
    /// ordinals, equalises the reparsed pair, then rebuilds port maps bound to the fresh
    /// literals with preserved types — the specification's reparse-based deep copy (§9).
    pub fn copy(&self, registry: &AttributeRegistry, new_name: impl Into<String>) -> ContractResult<Contract> {
        let (a_text, g_text) = self.print_pair();
        let context = registry.new_context();
        let mut a = crate::parser::Parser::new(registry, context).parse(&a_text)?;
        let mut g = crate::parser::Parser::new(registry, context).parse(&g_text)?;
        a.equalize(&g);

        let fresh_literals = {
            let mut map = a.literals();
            map.extend(g.literals());
            map
        };

        let rebuild = |ports: &IndexMap<String, Port>| -> IndexMap<String, Port> {
            ports
                .iter()
                .map(|(base, port)| {
                    let literal = fresh_literals
                        .get(base)
                        .cloned()
                        .unwrap_or_else(|| port.literal());
                    (
                        base.clone(),
                        Port::new(registry, context, base, port.ltype(), Some(literal), None),
                    )
                })
                .collect()
        };

        Ok(Contract {
            name: new_name.into(),
            context,
            inputs: RefCell::new(rebuild(&self.inputs.borrow())),
            outputs: RefCell::new(rebuild(&self.outputs.borrow())),
            assumption: RefCell::new(a),
            guarantee: RefCell::new(g),
            origin: RefCell::new(self.origin.borrow().clone()),
        })
    }

    /// `connect_to_port(p, q)`: `p` must belong to this contract. Two outputs may be
    /// connected directly (unlike composition, which forbids it).
    pub fn connect_to_port(&self, p_base: &str, q: &Port) -> ContractResult<()> {
        let p = self.port(p_base).ok_or_else(|| {
            ContractError::port_mapping(vec![p_base.to_string()])
        })?;
        p.merge(q)
    }

    pub fn is_compatible(&self, backend: &dyn VerificationBackend) -> bool {
        matches!(
            verify::check_compatibility(backend, &self.assumption.borrow()),
            Ok(Verdict::Holds)
        )
    }

    pub fn is_consistent(&self, backend: &dyn VerificationBackend) -> bool {
        let conjunction = Formula::binary(
            crate::ast::BinaryKind::And,
            self.assumption.borrow().clone(),
            self.guarantee.borrow().clone(),
            false,
        );
        matches!(
            verify::check_non_empty(backend, &conjunction),
            Ok(Verdict::Holds)
        )
    }

    pub fn is_refinement(&self, other: &Contract, backend: &dyn VerificationBackend) -> bool {
        matches!(
            verify::check_refinement(backend, self, other),
            Ok(Verdict::Holds)
        )
    }

    pub fn is_approximation(&self, other: &Contract, backend: &dyn VerificationBackend) -> bool {
        matches!(
            verify::check_approximation(backend, self, other),
            Ok(Verdict::Holds)
        )
    }

    pub(crate) fn set_origin(&self, unique_name: String, contract_name: String) {
        self.origin.borrow_mut().insert(unique_name, contract_name);
    }

    pub(crate) fn take_input(&self, base: &str) -> Option<Port> {
        self.inputs.borrow_mut().shift_remove(base)
    }

    pub(crate) fn take_output(&self, base: &str) -> Option<Port> {
        self.outputs.borrow_mut().shift_remove(base)
    }

    pub(crate) fn insert_input(&self, base: String, port: Port) {
        self.inputs.borrow_mut().insert(base, port);
    }

    pub(crate) fn insert_output(&self, base: String, port: Port) {
        self.outputs.borrow_mut().insert(base, port);
    }

    /// Composes `constituents` per §4.8: resolves port names via `mapping` (may raise
    /// `PortMapping`/`PortConnection`), conjoins every assumption and guarantee without
    /// merging literals (the port mapping already did that), then saturates.
    pub fn compose(
        registry: &AttributeRegistry,
        context: ContextId,
        name: impl Into<String>,
        mapping: &mut crate::mapping::CompositionMapping,
        constituents: &[&Contract],
    ) -> ContractResult<Contract> {
        let (inputs, outputs) = mapping.define_composed_contract_ports(constituents)?;

        let combined_assumption = constituents
            .iter()
            .map(|c| c.assumption())
            .reduce(|acc, next| Formula::binary(crate::ast::BinaryKind::And, acc, next, false))
            .unwrap_or(Formula::True);

        let combined_guarantee = constituents
            .iter()
            .map(|c| c.guarantee())
            .reduce(|acc, next| Formula::binary(crate::ast::BinaryKind::And, acc, next, false))
            .unwrap_or(Formula::True);

        let guarantee = Formula::binary(
            crate::ast::BinaryKind::Or,
            Formula::not(combined_assumption.clone()),
            combined_guarantee.clone(),
            false,
        );
        let assumption = Formula::binary(
            crate::ast::BinaryKind::Or,
            combined_assumption,
            Formula::not(combined_guarantee),
            false,
        );

        let name = name.into();
        let mut origin = IndexMap::new();
        for contract in constituents {
            for port_base in contract.port_names() {
                if let Some(port) = contract.port(&port_base) {
                    origin.insert(port.unique_name(), contract.name().to_string());
                }
            }
        }

        for port in inputs.values().chain(outputs.values()) {
            port.reinitialize(registry, context, Some(name.clone()));
        }

        Ok(Contract {
            name,
            context,
            inputs: RefCell::new(inputs),
            outputs: RefCell::new(outputs),
            assumption: RefCell::new(assumption),
            guarantee: RefCell::new(guarantee),
            origin: RefCell::new(origin),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        registry: &AttributeRegistry,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        a: &str,
        g: &str,
    ) -> Contract {
        let context = registry.new_context();
        Contract::new(
            registry,
            context,
            name,
            inputs.iter().map(|n| PortSpec::Bool(n.to_string())).collect(),
            outputs.iter().map(|n| PortSpec::Bool(n.to_string())).collect(),
            FormulaSource::Text(a.to_string()),
            FormulaSource::Text(g.to_string()),
            false,
            true,
        )
        .expect("construction should succeed")
    }

    #[test]
    fn scenario_1_construction_and_queries() {
        let registry = AttributeRegistry::new();
        let c = build(
            &registry,
            "c",
            &["a", "b"],
            &["c", "d"],
            "G a | F b",
            "G F X (c | d)",
        );
        assert_eq!(c.input_names().len(), 2);
        assert_eq!(c.output_names().len(), 2);
    }

    #[test]
    fn scenario_3_overlap_is_a_port_declaration_error() {
        let registry = AttributeRegistry::new();
        let context = registry.new_context();
        let err = Contract::new(
            &registry,
            context,
            "c",
            vec![PortSpec::Bool("b".to_string())],
            vec![PortSpec::Bool("b".to_string())],
            FormulaSource::Text("a".to_string()),
            FormulaSource::Text("b".to_string()),
            true,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::PortDeclaration { .. }));
    }

    #[test]
    fn scenario_4_unbound_literal_is_a_port_mapping_error() {
        let registry = AttributeRegistry::new();
        let context = registry.new_context();
        let err = Contract::new(
            &registry,
            context,
            "c",
            vec![PortSpec::Bool("a".to_string())],
            vec![],
            FormulaSource::Text("a".to_string()),
            FormulaSource::Text("b".to_string()),
            true,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::PortMapping { .. }));
    }

    #[test]
    fn copy_produces_structurally_equal_formulas_with_fresh_identities() {
        let registry = AttributeRegistry::new();
        let c = build(&registry, "c", &["a"], &["b"], "a", "X b");
        let copy = c.copy(&registry, "c2").unwrap();
        assert!(c.assumption().structurally_equal(&copy.assumption()));
        assert!(c.guarantee().structurally_equal(&copy.guarantee()));
        assert_ne!(
            c.port("a").unwrap().unique_name(),
            copy.port("a").unwrap().unique_name()
        );
    }
}
