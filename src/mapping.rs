//! Composition and refinement port mappings (§4.9): the plumbing `Contract::compose`,
//! `is_refinement`, and `is_approximation` use to relate ports across contracts before
//! building a combined or translated formula pair.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::contract::Contract;
use crate::error::{ContractError, ContractResult};
use crate::port::Port;
use crate::registry::AttributeRegistry;

/// `new_name -> {base_name}` plus the reverse map, scoped to a fixed set of participating
/// contracts. Ports are referenced by `(contract_name, base_name)` since `Port` itself
/// isn't identity-comparable across clones.
pub struct CompositionMapping {
    constituents: Vec<String>,
    buckets: IndexMap<String, Vec<(String, String)>>,
    reverse: HashMap<(String, String), String>,
}

impl CompositionMapping {
    pub fn new(constituents: Vec<String>) -> Self {
        CompositionMapping {
            constituents,
            buckets: IndexMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn validate_member(&self, contract_name: &str) -> ContractResult<()> {
        if self.constituents.iter().any(|c| c == contract_name) {
            Ok(())
        } else {
            Err(ContractError::port_mapping(vec![contract_name.to_string()]))
        }
    }

    /// Attaches `(contract_name, base_name)` to the `new_name` bucket.
    pub fn add(&mut self, contract_name: &str, base_name: &str, new_name: &str) -> ContractResult<()> {
        self.validate_member(contract_name)?;
        let key = (contract_name.to_string(), base_name.to_string());
        self.reverse.insert(key.clone(), new_name.to_string());
        self.buckets
            .entry(new_name.to_string())
            .or_default()
            .push(key);
        Ok(())
    }

    /// `connect(p, q, new_name?)`: adds both ports under a shared bucket, defaulting the
    /// bucket name to `p`'s base name.
    pub fn connect(
        &mut self,
        p: (&str, &str),
        q: (&str, &str),
        new_name: Option<&str>,
    ) -> ContractResult<()> {
        let new_name = new_name.unwrap_or(p.1).to_string();
        self.add(p.0, p.1, &new_name)?;
        self.add(q.0, q.1, &new_name)
    }

    /// Every `base_name` that appears in more than one constituent, with groups already
    /// fully covered by an explicit mapping removed; a group with exactly one unmapped
    /// port left is fixed implicitly onto the already-mapped bucket.
    fn find_conflicts(&mut self, contracts: &[&Contract]) -> Vec<String> {
        let mut by_base: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for contract in contracts {
            for base in contract.port_names() {
                by_base
                    .entry(base.clone())
                    .or_default()
                    .push((contract.name().to_string(), base));
            }
        }

        let mut unresolved = Vec::new();
        for (base, occurrences) in by_base {
            if occurrences.len() < 2 {
                continue;
            }
            let mapped: Vec<_> = occurrences
                .iter()
                .filter(|key| self.reverse.contains_key(key))
                .cloned()
                .collect();
            let unmapped: Vec<_> = occurrences
                .iter()
                .filter(|key| !self.reverse.contains_key(key))
                .cloned()
                .collect();

            if unmapped.is_empty() {
                continue;
            }
            if unmapped.len() == 1 && mapped.len() == occurrences.len() - 1 && !mapped.is_empty() {
                let bucket = self.reverse[&mapped[0]].clone();
                let _ = self.add(&unmapped[0].0, &unmapped[0].1, &bucket);
                continue;
            }
            unresolved.push(base);
        }
        unresolved
    }

    /// Resolves every port name across `contracts` into the combined input/output port
    /// maps a composed contract should expose, implementing §4.9's `define_composed_contract_ports`.
    pub fn define_composed_contract_ports(
        &mut self,
        contracts: &[&Contract],
    ) -> ContractResult<(IndexMap<String, Port>, IndexMap<String, Port>)> {
        let unresolved = self.find_conflicts(contracts);
        if !unresolved.is_empty() {
            return Err(ContractError::port_mapping(unresolved));
        }

        let mut inputs = IndexMap::new();
        let mut outputs = IndexMap::new();
        let mapped_keys: HashSet<(String, String)> = self.reverse.keys().cloned().collect();

        for (new_name, members) in self.buckets.iter() {
            let mut is_output_group = false;
            let mut all_inputs = true;
            let mut representative: Option<Port> = None;
            for (contract_name, base) in members {
                let contract = contracts
                    .iter()
                    .find(|c| c.name() == contract_name)
                    .expect("bucket member must reference a participating contract");
                let is_output = contract.output_names().iter().any(|n| n == base);
                if is_output {
                    if is_output_group {
                        return Err(ContractError::port_connection(new_name.clone()));
                    }
                    is_output_group = true;
                    all_inputs = false;
                }
                let port = contract
                    .take_input(base)
                    .or_else(|| contract.take_output(base))
                    .expect("bucket member must exist on its contract");
                match representative.take() {
                    Some(existing) => {
                        existing.merge(&port)?;
                        representative = Some(existing);
                    }
                    None => representative = Some(port),
                }
            }
            let port = representative.expect("every bucket has at least one member");
            if all_inputs {
                inputs.insert(new_name.clone(), port);
            } else {
                outputs.insert(new_name.clone(), port);
            }
        }

        for contract in contracts {
            for base in contract.input_names() {
                let key = (contract.name().to_string(), base.clone());
                if mapped_keys.contains(&key) {
                    continue;
                }
                if let Some(port) = contract.take_input(&base) {
                    let is_feedback = outputs.values().any(|out| out.is_connected_to(&port));
                    if is_feedback {
                        continue;
                    }
                    inputs.insert(base, port);
                }
            }
            for base in contract.output_names() {
                let key = (contract.name().to_string(), base.clone());
                if mapped_keys.contains(&key) {
                    continue;
                }
                if let Some(port) = contract.take_output(&base) {
                    outputs.insert(base, port);
                }
            }
        }

        Ok((inputs, outputs))
    }
}

/// A pair of ports, one from each of two contracts, identified by base name.
#[derive(Debug, Clone)]
pub struct PortPair {
    pub left: String,
    pub right: String,
}

/// Stores `(port_a, port_b)` pairs across two contracts for a refinement/approximation
/// query. `get_mapping_copies` is the only safe way to run the query, since the check
/// mutates literal identities (§4.9).
#[derive(Debug, Clone, Default)]
pub struct RefinementMapping {
    pairs: Vec<PortPair>,
}

impl RefinementMapping {
    pub fn new() -> Self {
        RefinementMapping { pairs: Vec::new() }
    }

    pub fn pair(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.pairs.push(PortPair {
            left: left.into(),
            right: right.into(),
        });
        self
    }

    /// Deep-copies both contracts and merges each mapped pair's literals on the copies,
    /// returning the two copies ready for a refinement/approximation check.
    ///
    /// The original source sometimes auto-connects ports sharing a `base_name` when no
    /// explicit mapping is given; whether that is safe under type-width differences is
    /// undocumented (§9). This crate always requires an explicit pair for every shared
    /// `base_name` and raises a port-mapping error otherwise, rather than guessing.
    pub fn get_mapping_copies(
        &self,
        registry: &AttributeRegistry,
        left: &Contract,
        right: &Contract,
    ) -> ContractResult<(Contract, Contract)> {
        let left_copy = left.copy(registry, format!("{}_copy", left.name()))?;
        let right_copy = right.copy(registry, format!("{}_copy", right.name()))?;

        let left_names: HashSet<String> = left_copy.port_names().into_iter().collect();
        let right_names: HashSet<String> = right_copy.port_names().into_iter().collect();
        let shared: HashSet<&String> = left_names.intersection(&right_names).collect();

        let mapped_left: HashSet<&str> = self.pairs.iter().map(|p| p.left.as_str()).collect();
        let unmapped: Vec<String> = shared
            .into_iter()
            .filter(|name| !mapped_left.contains(name.as_str()))
            .cloned()
            .collect();
        if !unmapped.is_empty() {
            return Err(ContractError::port_mapping(unmapped));
        }

        for pair in &self.pairs {
            let left_port = left_copy
                .port(&pair.left)
                .ok_or_else(|| ContractError::port_mapping(vec![pair.left.clone()]))?;
            let right_port = right_copy
                .port(&pair.right)
                .ok_or_else(|| ContractError::port_mapping(vec![pair.right.clone()]))?;
            left_port.merge(&right_port)?;
        }

        Ok((left_copy, right_copy))
    }
}

/// A [`RefinementMapping`] used for approximation queries instead of refinement; the pair
/// semantics are identical, only the caller's interpretation of the result differs.
pub type ApproximationMapping = RefinementMapping;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FormulaSource, PortSpec};

    fn contract(registry: &AttributeRegistry, name: &str, inputs: &[&str], outputs: &[&str]) -> Contract {
        let context = registry.new_context();
        let assumption = inputs.first().copied().unwrap_or("true");
        let guarantee = outputs.first().copied().unwrap_or("true");
        Contract::new(
            registry,
            context,
            name,
            inputs.iter().map(|n| PortSpec::Bool(n.to_string())).collect(),
            outputs.iter().map(|n| PortSpec::Bool(n.to_string())).collect(),
            FormulaSource::Text(assumption.to_string()),
            FormulaSource::Text(guarantee.to_string()),
            true,
            true,
        )
        .unwrap()
    }

    #[test]
    fn unmapped_shared_name_is_a_port_mapping_error() {
        let registry = AttributeRegistry::new();
        let left = contract(&registry, "left", &["a"], &["b"]);
        let right = contract(&registry, "right", &["a"], &["c"]);

        let mapping = RefinementMapping::new();
        let err = mapping.get_mapping_copies(&registry, &left, &right).unwrap_err();
        assert!(matches!(err, ContractError::PortMapping { .. }));
    }

    #[test]
    fn explicit_pair_resolves_the_shared_name() {
        let registry = AttributeRegistry::new();
        let left = contract(&registry, "left", &["a"], &["b"]);
        let right = contract(&registry, "right", &["a"], &["c"]);

        let mapping = RefinementMapping::new().pair("a", "a");
        let (left_copy, right_copy) = mapping.get_mapping_copies(&registry, &left, &right).unwrap();
        assert!(left_copy
            .port("a")
            .unwrap()
            .is_connected_to(&right_copy.port("a").unwrap()));
    }
}
