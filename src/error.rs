//! Crate-wide error taxonomy.
//!
//! One enum covers every recoverable failure named in the specification: malformed
//! formula text, port declaration/mapping/connection conflicts, attribute misuse, failed
//! refinement/approximation queries, and external model-checker failures.

use std::path::PathBuf;

use thiserror::Error;

/// The result alias used throughout the crate.
pub type ContractResult<T> = Result<T, ContractError>;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("parse error: unexpected token {token:?}")]
    Parse { token: String },

    #[error("parser production not implemented for {feature}")]
    NotImplemented { feature: &'static str },

    #[error("port declaration error: {message} ({names:?})")]
    PortDeclaration { message: String, names: Vec<String> },

    #[error("port mapping error: unmatched name(s) {names:?}")]
    PortMapping { names: Vec<String> },

    #[error("port connection error: two outputs merged under {new_name:?}")]
    PortConnection { new_name: String },

    #[error("attribute state error: {0}")]
    AttributeState(String),

    #[error("not a refinement: {reason}")]
    NotARefinement { reason: String },

    #[error("not an approximation: {reason}")]
    NotAnApproximation { reason: String },

    #[error("model checker failure (exit {exit_code:?}): {stderr}")]
    ModelCheckerFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("tool not found at {path}")]
    ToolNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unparseable model checker output: {0}")]
    UnparseableOutput(String),
}

impl ContractError {
    pub fn parse(token: impl Into<String>) -> Self {
        ContractError::Parse {
            token: token.into(),
        }
    }

    pub fn port_declaration(message: impl Into<String>, names: Vec<String>) -> Self {
        ContractError::PortDeclaration {
            message: message.into(),
            names,
        }
    }

    pub fn port_mapping(names: Vec<String>) -> Self {
        ContractError::PortMapping { names }
    }

    pub fn port_connection(new_name: impl Into<String>) -> Self {
        ContractError::PortConnection {
            new_name: new_name.into(),
        }
    }

    pub fn attribute_state(message: impl Into<String>) -> Self {
        ContractError::AttributeState(message.into())
    }
}
