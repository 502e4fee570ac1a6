//! Assume/Guarantee contracts over Linear Temporal Logic.
//!
//! Modules are layered bottom-up, each depending only on the ones above it in this list:
//! [`error`] and [`config`] (no internal dependencies), [`registry`] (unique attribute
//! naming and the merge/observer protocol), [`types`] (the `Bool ⊑ Int ⊑ Float` lattice),
//! [`symbols`] (operator precedence and dialect tables), [`ast`] (the LTL formula algebra),
//! [`printer`] and [`parser`] (the two directions between [`ast::Formula`] and surface
//! text), [`port`] (named literal handles), [`contract`] (the `(A, G)` pair and its port
//! maps), [`mapping`] (composition and refinement port mappings), and [`verify`] (the
//! external model-checker reduction).

pub mod ast;
pub mod config;
pub mod contract;
pub mod error;
pub mod mapping;
pub mod parser;
pub mod port;
pub mod printer;
pub mod registry;
pub mod symbols;
pub mod types;
pub mod verify;

pub use ast::{BinaryKind, Constant, Formula, Literal, UnaryKind};
pub use config::ToolPaths;
pub use contract::{Contract, FormulaSource, PortSpec};
pub use error::{ContractError, ContractResult};
pub use mapping::{ApproximationMapping, CompositionMapping, RefinementMapping};
pub use port::Port;
pub use printer::PrintOptions;
pub use registry::{AttributeRegistry, ContextId, DEFAULT_REGISTRY};
pub use symbols::{BaseSymbolSet, Ltl3baSymbolSet, NusmvSymbolSet, OpKind, SymbolSet};
pub use types::Type;
pub use verify::{NuxmvBackend, Verdict, VerificationBackend};
