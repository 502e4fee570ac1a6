//! Verification strategy (§4.10): reduces every contract query to propositional LTL
//! tautology/emptiness over a single SMV-like module, checked by an external tool.
//!
//! [`VerificationBackend`] is the seam between the four query reductions below (pure
//! formula algebra, backend-agnostic) and the concrete nuXmv subprocess implementation in
//! [`nuxmv`].

mod nuxmv;

pub use nuxmv::NuxmvBackend;

use crate::ast::{BinaryKind, Formula};
use crate::contract::Contract;
use crate::error::ContractResult;

/// The outcome of a single tautology/emptiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Holds,
    Fails,
}

/// A backend capable of deciding whether `formula` is a propositional LTL tautology. The
/// four contract queries below are expressed purely in terms of this one primitive.
pub trait VerificationBackend {
    fn check_tautology(&self, formula: &Formula) -> ContractResult<Verdict>;
}

fn implies(left: Formula, right: Formula) -> Formula {
    Formula::binary(BinaryKind::Implies, left, right, false)
}

fn and(left: Formula, right: Formula) -> Formula {
    Formula::binary(BinaryKind::And, left, right, false)
}

/// `F` is non-empty iff `¬F` is not a tautology.
pub fn check_non_empty(backend: &dyn VerificationBackend, formula: &Formula) -> ContractResult<Verdict> {
    let negation = Formula::not(formula.clone());
    Ok(match backend.check_tautology(&negation)? {
        Verdict::Holds => Verdict::Fails,
        Verdict::Fails => Verdict::Holds,
    })
}

/// Compatibility of a contract: its assumption is non-empty.
pub fn check_compatibility(backend: &dyn VerificationBackend, assumption: &Formula) -> ContractResult<Verdict> {
    check_non_empty(backend, assumption)
}

/// Refinement `C ⊑ C'`: `(A' → A) ∧ (G → G')` is a tautology.
pub fn check_refinement(
    backend: &dyn VerificationBackend,
    c: &Contract,
    c_prime: &Contract,
) -> ContractResult<Verdict> {
    let assumptions = implies(c_prime.assumption(), c.assumption());
    let guarantees = implies(c.guarantee(), c_prime.guarantee());
    backend.check_tautology(&and(assumptions, guarantees))
}

/// Approximation `C ⪯ C'`: `(A' → A) ∧ (G' → G)` is a tautology (guarantee direction
/// reverses relative to refinement).
pub fn check_approximation(
    backend: &dyn VerificationBackend,
    c: &Contract,
    c_prime: &Contract,
) -> ContractResult<Verdict> {
    let assumptions = implies(c_prime.assumption(), c.assumption());
    let guarantees = implies(c_prime.guarantee(), c.guarantee());
    backend.check_tautology(&and(assumptions, guarantees))
}

pub use nuxmv::{build_module_from_trace, derive_valuation_from_trace, TraceState};
