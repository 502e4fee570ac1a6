//! The LTL formula algebra: literals, the closed set of formula constructors, and the
//! merge-on-construct policy that keeps literals with the same `base_name` sharing one
//! attribute.
//!
//! The original keeps a `base_name -> Literal` table on every formula node and an
//! `Observer::update` that rebinds that table (and the node's own child slot) when a
//! referenced literal is merged elsewhere. Here every [`Literal`] holds a clone of its
//! [`Attribute`], and [`Attribute::resolve`] already forwards through merges; a formula
//! node therefore never goes stale by holding a literal whose attribute was merged away,
//! and recomputing [`Formula::literals`] on demand always reflects the current canonical
//! names. This collapses the three-step construction/observer algorithm of the
//! specification into one pass without changing its observable behaviour (see `DESIGN.md`).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::registry::{Attribute, AttributeRegistry, ContextId};
use crate::symbols::OpKind;
use crate::types::Type;

/// A formula leaf: an [`Attribute`] plus a [`Type`]. Cheaply cloned; clones share the
/// same underlying attribute and type cell.
#[derive(Clone)]
pub struct Literal(Rc<LiteralInner>);

struct LiteralInner {
    attribute: Attribute,
    ltype: std::cell::RefCell<Type>,
}

impl Literal {
    pub fn new(registry: &AttributeRegistry, context: ContextId, base: &str, ltype: Type) -> Self {
        Literal(Rc::new(LiteralInner {
            attribute: registry.allocate(context, base),
            ltype: std::cell::RefCell::new(ltype),
        }))
    }

    /// Wraps an already-allocated attribute (used when rebuilding ports/formulas around a
    /// surviving literal after a merge).
    pub fn from_attribute(attribute: Attribute, ltype: Type) -> Self {
        Literal(Rc::new(LiteralInner {
            attribute,
            ltype: std::cell::RefCell::new(ltype),
        }))
    }

    pub fn attribute(&self) -> &Attribute {
        &self.0.attribute
    }

    pub fn base_name(&self) -> String {
        self.0.attribute.base_name()
    }

    pub fn unique_name(&self) -> String {
        self.0.attribute.unique_name()
    }

    pub fn context(&self) -> ContextId {
        self.0.attribute.context()
    }

    pub fn ltype(&self) -> Type {
        self.0.ltype.borrow().clone()
    }

    pub fn set_ltype(&self, ltype: Type) {
        *self.0.ltype.borrow_mut() = ltype;
    }

    /// Merges `self`'s attribute into `target`'s, narrowing both to the narrower type.
    pub fn merge(&self, target: &Literal) {
        if self.attribute() != target.attribute() {
            self.attribute().merge(target.attribute());
        }
        let narrower = self.ltype().narrower(&target.ltype());
        self.set_ltype(narrower.clone());
        target.set_ltype(narrower);
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        self.attribute() == other.attribute()
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Literal")
            .field("unique_name", &self.unique_name())
            .field("ltype", &self.ltype())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    And,
    Or,
    Implies,
    Iff,
    Until,
    Release,
    WeakUntil,
    Add,
    Sub,
    Mul,
    Div,
    Ge,
    Geq,
    Le,
    Leq,
    Equality,
}

impl BinaryKind {
    pub fn op_kind(self) -> OpKind {
        match self {
            BinaryKind::And => OpKind::And,
            BinaryKind::Or => OpKind::Or,
            BinaryKind::Implies => OpKind::Implication,
            BinaryKind::Iff => OpKind::DoubleImplication,
            BinaryKind::Until => OpKind::Until,
            BinaryKind::Release => OpKind::Release,
            BinaryKind::WeakUntil => OpKind::WeakUntil,
            BinaryKind::Add => OpKind::Add,
            BinaryKind::Sub => OpKind::Sub,
            BinaryKind::Mul => OpKind::Mul,
            BinaryKind::Div => OpKind::Div,
            BinaryKind::Ge => OpKind::Ge,
            BinaryKind::Geq => OpKind::Geq,
            BinaryKind::Le => OpKind::Le,
            BinaryKind::Leq => OpKind::Leq,
            BinaryKind::Equality => OpKind::Equality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKind {
    Not,
    Next,
    Globally,
    Eventually,
}

impl UnaryKind {
    pub fn op_kind(self) -> OpKind {
        match self {
            UnaryKind::Not => OpKind::Not,
            UnaryKind::Next => OpKind::Next,
            UnaryKind::Globally => OpKind::Globally,
            UnaryKind::Eventually => OpKind::Eventually,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
}

/// The closed LTL formula algebra (§3): nullary constants and literals, the four unary
/// temporal operators, and the logical/arithmetic/comparison binary operators.
#[derive(Debug, Clone)]
pub enum Formula {
    True,
    False,
    Constant(Constant),
    Literal(Literal),
    Unary(UnaryKind, Box<Formula>),
    Binary(BinaryKind, Box<Formula>, Box<Formula>),
}

impl Formula {
    pub fn literal(literal: Literal) -> Self {
        Formula::Literal(literal)
    }

    pub fn unary(kind: UnaryKind, operand: Formula) -> Self {
        Formula::Unary(kind, Box::new(operand))
    }

    pub fn not(operand: Formula) -> Self {
        Self::unary(UnaryKind::Not, operand)
    }

    pub fn next(operand: Formula) -> Self {
        Self::unary(UnaryKind::Next, operand)
    }

    pub fn globally(operand: Formula) -> Self {
        Self::unary(UnaryKind::Globally, operand)
    }

    pub fn eventually(operand: Formula) -> Self {
        Self::unary(UnaryKind::Eventually, operand)
    }

    /// Constructs a binary formula, applying the merge-on-construct policy described in
    /// §4.3 when `merge_literals` is set: every pair of literals with equal `base_name`,
    /// one from each operand's literal set, is merged left-wins (the right literal's
    /// attribute is merged into the left's).
    pub fn binary(kind: BinaryKind, left: Formula, right: Formula, merge_literals: bool) -> Self {
        if merge_literals {
            Self::merge_conflicts(&left, &right);
        }
        Formula::Binary(kind, Box::new(left), Box::new(right))
    }

    fn merge_conflicts(left: &Formula, right: &Formula) {
        let left_literals = left.literals();
        let right_literals = right.literals();
        for (base, right_literal) in right_literals.iter() {
            if let Some(left_literal) = left_literals.get(base) {
                right_literal.merge(left_literal);
            }
        }
    }

    /// Merges every pair of literals shared by `self` and `other` (matching `base_name`),
    /// left-wins. Used by contract construction (§4.8 step 2) to equalise an independently
    /// parsed `A`/`G` pair without constructing a combining node.
    pub fn equalize(&self, other: &Formula) {
        Self::merge_conflicts(self, other);
    }

    /// The union of this node's direct literal and every literal reachable in its
    /// subtrees, keyed by each literal's current `base_name`.
    pub fn literals(&self) -> IndexMap<String, Literal> {
        let mut map = IndexMap::new();
        self.collect_literals(&mut map);
        map
    }

    fn collect_literals(&self, map: &mut IndexMap<String, Literal>) {
        match self {
            Formula::Literal(literal) => {
                map.insert(literal.base_name(), literal.clone());
            }
            Formula::Unary(_, operand) => operand.collect_literals(map),
            Formula::Binary(_, left, right) => {
                left.collect_literals(map);
                right.collect_literals(map);
            }
            Formula::True | Formula::False | Formula::Constant(_) => {}
        }
    }

    /// Allocates a fresh literal for every literal in this formula and merges the old
    /// attribute into it, decoupling every port and formula still holding the old literal
    /// from this node's identity (but not from its structure: the old literal continues
    /// to resolve to the fresh one transparently).
    pub fn reinitialize(&self, registry: &AttributeRegistry, context: ContextId) {
        for literal in self.literals().values() {
            let fresh = Literal::new(registry, context, &literal.base_name(), literal.ltype());
            literal.merge(&fresh);
        }
    }

    /// The precedence index of this node's outermost operator, or `None` ("not in the
    /// table", treated by the printer as `+∞`) for nullary nodes and `Iff`, which the
    /// source's precedence table omits.
    pub fn precedence(&self) -> Option<u8> {
        match self {
            Formula::Binary(kind, _, _) => kind.op_kind().precedence(),
            Formula::Unary(kind, _) => kind.op_kind().precedence(),
            Formula::True | Formula::False | Formula::Constant(_) | Formula::Literal(_) => None,
        }
    }

    /// Structural equality up to literal unique-name identity: two literals are equal
    /// here iff their `base_name`s match, regardless of which attribute ordinal they
    /// carry. Used by I3's round-trip property, where a reparse allocates fresh ordinals.
    pub fn structurally_equal(&self, other: &Formula) -> bool {
        match (self, other) {
            (Formula::True, Formula::True) => true,
            (Formula::False, Formula::False) => true,
            (Formula::Constant(a), Formula::Constant(b)) => a == b,
            (Formula::Literal(a), Formula::Literal(b)) => a.base_name() == b.base_name(),
            (Formula::Unary(k1, a), Formula::Unary(k2, b)) => k1 == k2 && a.structurally_equal(b),
            (Formula::Binary(k1, a1, b1), Formula::Binary(k2, a2, b2)) => {
                k1 == k2 && a1.structurally_equal(a2) && b1.structurally_equal(b2)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AttributeRegistry;

    fn lit(registry: &AttributeRegistry, ctx: ContextId, base: &str) -> Literal {
        Literal::new(registry, ctx, base, Type::bool())
    }

    #[test]
    fn binary_merges_matching_base_names_left_wins() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a1 = lit(&registry, ctx, "a");
        let a2 = lit(&registry, ctx, "a");
        let before = a1.unique_name();

        let formula = Formula::binary(
            BinaryKind::And,
            Formula::literal(a1.clone()),
            Formula::literal(a2.clone()),
            true,
        );

        assert_eq!(a2.unique_name(), before);
        assert_eq!(formula.literals().len(), 1);
    }

    #[test]
    fn merge_literals_false_keeps_independent_identities() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a1 = lit(&registry, ctx, "a");
        let a2 = lit(&registry, ctx, "a");

        let _formula = Formula::binary(
            BinaryKind::And,
            Formula::literal(a1.clone()),
            Formula::literal(a2.clone()),
            false,
        );

        assert_ne!(a1.unique_name(), a2.unique_name());
    }

    #[test]
    fn literals_collects_recursively() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let b = lit(&registry, ctx, "b");

        let formula = Formula::globally(Formula::binary(
            BinaryKind::And,
            Formula::literal(a),
            Formula::literal(b),
            true,
        ));

        let literals = formula.literals();
        assert_eq!(literals.len(), 2);
        assert!(literals.contains_key("a"));
        assert!(literals.contains_key("b"));
    }

    #[test]
    fn reinitialize_decouples_without_breaking_old_handles() {
        let registry = AttributeRegistry::new();
        let ctx = registry.new_context();
        let a = lit(&registry, ctx, "a");
        let formula = Formula::literal(a.clone());

        let before = a.unique_name();
        formula.reinitialize(&registry, ctx);

        assert_ne!(a.unique_name(), before);
    }

    #[test]
    fn structural_equality_ignores_ordinal() {
        let registry = AttributeRegistry::new();
        let ctx1 = registry.new_context();
        let ctx2 = registry.new_context();
        let a1 = lit(&registry, ctx1, "a");
        let a2 = lit(&registry, ctx2, "a");

        let f1 = Formula::not(Formula::literal(a1));
        let f2 = Formula::not(Formula::literal(a2));
        assert!(f1.structurally_equal(&f2));
    }
}
