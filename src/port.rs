//! Named, typed port handles (§4.7): the public connection points a [`crate::contract::Contract`]
//! exposes, each wrapping a literal shared with the contract's `A`/`G` formulas.
//!
//! The specification describes a port as an *observer* of its literal, rebinding its
//! internal pointer via `update` when that literal is merged elsewhere. As in [`crate::ast`],
//! this crate gives [`crate::registry::Attribute`] the only real observer registration and
//! lets every other holder — [`Literal`] and now `Port` — read through
//! [`crate::registry::Attribute::resolve`] instead. A port never needs to "rebind": its
//! `unique_name`/`base_name`/`ltype` queries always resolve to the literal's current
//! canonical attribute, merged or not, so holding the original `Literal` handle is enough.

use std::cell::RefCell;

use crate::ast::Literal;
use crate::error::{ContractError, ContractResult};
use crate::registry::{AttributeRegistry, ContextId};
use crate::types::Type;

/// A `(base_name, type, literal, owning_contract?)` tuple (§3).
pub struct Port {
    base: String,
    literal: RefCell<Literal>,
    contract: RefCell<Option<String>>,
}

impl Port {
    /// Builds a port around `literal`, or allocates a fresh one from `base`/`ltype` if
    /// none is supplied.
    pub fn new(
        registry: &AttributeRegistry,
        context: ContextId,
        base: &str,
        ltype: Type,
        literal: Option<Literal>,
        contract: Option<String>,
    ) -> Self {
        let literal = literal.unwrap_or_else(|| Literal::new(registry, context, base, ltype));
        Port {
            base: base.to_string(),
            literal: RefCell::new(literal),
            contract: RefCell::new(contract),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base
    }

    pub fn unique_name(&self) -> String {
        self.literal.borrow().unique_name()
    }

    pub fn ltype(&self) -> Type {
        self.literal.borrow().ltype()
    }

    pub fn literal(&self) -> Literal {
        self.literal.borrow().clone()
    }

    pub fn contract(&self) -> Option<String> {
        self.contract.borrow().clone()
    }

    /// Binds the owning contract. Raises a port-declaration error if already bound.
    pub fn set_contract(&self, contract: String) -> ContractResult<()> {
        let mut current = self.contract.borrow_mut();
        if current.is_some() {
            return Err(ContractError::port_declaration(
                "port already bound to a contract",
                vec![self.base.clone()],
            ));
        }
        *current = Some(contract);
        Ok(())
    }

    /// Merges `self`'s literal into `other`'s, after checking the two types are
    /// comparable. A no-op (with a warning) if the two ports already share a literal.
    pub fn merge(&self, other: &Port) -> ContractResult<()> {
        let self_type = self.ltype();
        let other_type = other.ltype();
        if !self_type.comparable(&other_type) {
            return Err(ContractError::port_declaration(
                format!("incomparable port types {self_type} and {other_type}"),
                vec![self.base.clone(), other.base.clone()],
            ));
        }

        if self.is_connected_to(other) {
            tracing::warn!(port = self.base, "merge called on already-connected ports");
            return Ok(());
        }

        self.literal.borrow().merge(&other.literal.borrow());
        Ok(())
    }

    /// True iff the unique names of the two ports' literals are equal.
    pub fn is_connected_to(&self, other: &Port) -> bool {
        self.unique_name() == other.unique_name()
    }

    /// Allocates a fresh literal with the same base and type, merges the current literal
    /// into it, and optionally rebinds the owning contract.
    pub fn reinitialize(
        &self,
        registry: &AttributeRegistry,
        context: ContextId,
        contract: Option<String>,
    ) {
        let fresh = Literal::new(registry, context, &self.base, self.ltype());
        self.literal.borrow().merge(&fresh);
        *self.literal.borrow_mut() = fresh;
        if let Some(contract) = contract {
            *self.contract.borrow_mut() = Some(contract);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_a_literal_when_none_supplied() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let port = Port::new(&registry, ctx, "a", Type::bool(), None, None);
        assert_eq!(port.base_name(), "a");
        assert!(port.unique_name().starts_with("a_"));
    }

    #[test]
    fn merge_connects_two_ports() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let p = Port::new(&registry, ctx, "a", Type::bool(), None, None);
        let q = Port::new(&registry, ctx, "b", Type::bool(), None, None);
        assert!(!p.is_connected_to(&q));
        p.merge(&q).unwrap();
        assert!(p.is_connected_to(&q));
    }

    #[test]
    fn merge_rejects_incomparable_types() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let p = Port::new(&registry, ctx, "a", Type::FrozenBool, None, None);
        let q = Port::new(&registry, ctx, "b", Type::bool(), None, None);
        assert!(p.merge(&q).is_err());
    }

    #[test]
    fn set_contract_twice_is_an_error() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let p = Port::new(&registry, ctx, "a", Type::bool(), None, None);
        p.set_contract("c1".to_string()).unwrap();
        assert!(p.set_contract("c2".to_string()).is_err());
    }

    #[test]
    fn reinitialize_preserves_connection_through_the_chain() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let p = Port::new(&registry, ctx, "a", Type::bool(), None, None);
        let q = Port::new(&registry, ctx, "b", Type::bool(), None, None);
        p.merge(&q).unwrap();

        p.reinitialize(&registry, ctx, None);
        assert!(p.is_connected_to(&q));
    }
}
