//! Bridge Error Handling
//!
//! Every fallible bridge operation returns [`BridgeResult`]. The variants fall
//! into two groups:
//!
//! - Contract errors (`TypeMismatch`, `NotAnInteger`, `StackUnderflow`,
//!   `InvalidIndex`, `ContractViolation`, `UnknownReference`): the caller broke
//!   the stack discipline. They are returned immediately and never coerced.
//! - Recoverable errors (`Script`, `Load`, `Resource`): the scripted layer
//!   failed. The message is the engine's own text and the engine stays usable.
//!
//! # Usage
//!
//! ```ignore
//! match engine.call_function(1, 1) {
//!     Ok(()) => engine.pop_number()?,
//!     Err(e) if e.is_recoverable() => {
//!         // the raised error value is on top of the stack
//!         let raised = engine.pop_value()?;
//!         ...
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use crate::refs::RefKey;
use crate::value::ValueTag;
use std::path::PathBuf;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors produced by the bridge.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// A typed pop found a different kind on the stack top.
    #[error("stack value type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Kind the caller asked for.
        expected: ValueTag,
        /// Kind actually on the stack top.
        actual: ValueTag,
    },

    /// `pop_integer` found a float with no exact integer representation.
    #[error("number {value} has no integer representation")]
    NotAnInteger {
        /// The offending number.
        value: f64,
    },

    /// An operation needed more values than the stack holds.
    #[error("{operation}: needs {requested} stack value(s), found {available}")]
    StackUnderflow {
        /// Operation that was attempted.
        operation: &'static str,
        /// Values the operation needs.
        requested: usize,
        /// Current stack depth.
        available: usize,
    },

    /// A stack index does not address a slot.
    #[error("invalid stack index {index} (depth {depth})")]
    InvalidIndex {
        /// Index passed by the caller.
        index: i32,
        /// Current stack depth.
        depth: usize,
    },

    /// The stack does not have the shape an operation requires.
    #[error("{operation}: {detail}")]
    ContractViolation {
        /// Operation that was attempted.
        operation: &'static str,
        /// What was wrong with the stack.
        detail: String,
    },

    /// A called function raised an error.
    #[error("script error: {message}")]
    Script {
        /// The engine's error text, verbatim.
        message: String,
    },

    /// A script file failed to load or parse.
    #[error("error loading {}: {message}", path.display())]
    Load {
        /// Script path passed to `do_file`.
        path: PathBuf,
        /// The engine's error text, verbatim.
        message: String,
    },

    /// The engine refused to open a resource.
    #[error("cannot open resource {name}: {message}")]
    Resource {
        /// Resource name passed to `open_resource`.
        name: String,
        /// The engine's error text, verbatim.
        message: String,
    },

    /// A reference key is not (or no longer) in the registry.
    #[error("unknown reference {key}")]
    UnknownReference {
        /// The key that was redeemed.
        key: RefKey,
    },

    /// The engine instance could not be constructed.
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other failure reported by the engine.
    #[error(transparent)]
    Engine(#[from] mlua::Error),
}

impl BridgeError {
    /// True when the failure originated in the scripted layer and the bridge
    /// remains usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::Script { .. } | BridgeError::Load { .. } | BridgeError::Resource { .. }
        )
    }

    /// Legacy numeric status: 0 is success, everything else is 1.
    pub fn status_code(&self) -> i32 {
        1
    }
}

/// Extract the engine's own text from an `mlua` error.
///
/// Callback errors are unwrapped to their cause so that a message raised
/// inside a native function reaches the host unchanged.
pub(crate) fn engine_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) | mlua::Error::SyntaxError { message: msg, .. } => {
            msg.clone()
        }
        mlua::Error::CallbackError { cause, .. } => engine_message(cause),
        other => other.to_string(),
    }
}
