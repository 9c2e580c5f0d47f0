//! Call Protocol
//!
//! Calling a scripted function:
//!
//! ```ignore
//! engine.get_global("area")?;       // function
//! engine.push_number(3.0);          // argument 1
//! engine.push_number(4.0);          // argument 2
//! match engine.call_function(2, 1) {
//!     Ok(()) => println!("{}", engine.pop_number()?),
//!     Err(e) => {
//!         // exactly one error value is on the stack top
//!         eprintln!("{}", e);
//!         engine.pop(1)?;
//!     }
//! }
//! ```
//!
//! The function and its arguments are always consumed. On success exactly
//! `nresults` values replace them; on failure the one value the script raised
//! does, unchanged. Errors raised by native functions arrive as their message.

use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult, engine_message};
use crate::value::ValueTag;
use mlua::{Function, MultiValue, Value};
use std::path::Path;
use tracing::{error, warn};

/// How many results a call leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCount {
    /// Exactly this many; missing results are nil, extra ones are dropped.
    Exactly(usize),
    /// Whatever the function returned.
    All,
}

impl From<usize> for ResultCount {
    fn from(n: usize) -> Self {
        ResultCount::Exactly(n)
    }
}

/// Negative counts mean "all results", like the engine's `LUA_MULTRET`.
impl From<i32> for ResultCount {
    fn from(n: i32) -> Self {
        match usize::try_from(n) {
            Ok(n) => ResultCount::Exactly(n),
            Err(_) => ResultCount::All,
        }
    }
}

impl Engine {
    /// Call the function sitting below `nargs` arguments.
    ///
    /// Stack effect on success: -(nargs + 1) + nresults
    /// Stack effect on failure: -(nargs + 1) + 1 (the raised error value)
    pub fn call_function(
        &mut self,
        nargs: usize,
        nresults: impl Into<ResultCount>,
    ) -> BridgeResult<()> {
        let nresults = nresults.into();
        let depth = self.stack.len();
        if depth < nargs + 1 {
            return Err(BridgeError::StackUnderflow {
                operation: "call_function",
                requested: nargs + 1,
                available: depth,
            });
        }

        // The engine dispatches the call itself, so `__call` metamethods
        // apply and the error value comes back untouched.
        let frame = self.stack.split_off(depth - nargs - 1);
        let returned = match self.pcall.call::<MultiValue>(MultiValue::from_vec(frame)) {
            Ok(returned) => returned.into_vec(),
            Err(e) => vec![Value::Boolean(false), Value::Error(Box::new(e))],
        };

        let mut returned = returned.into_iter();
        if let Some(Value::Boolean(true)) = returned.next() {
            self.push_results(returned.collect(), nresults);
            return Ok(());
        }

        let raised = returned.next().unwrap_or(Value::Nil);
        let message = error_text(&raised);
        warn!(%message, nargs, "scripted call failed");
        match raised {
            // Native errors cross as their message
            Value::Error(_) => self.push_string(&message)?,
            raised => self.push_value(raised),
        }
        Err(BridgeError::Script { message })
    }

    /// True if the global `name` holds a function.
    ///
    /// Stack effect: 0
    pub fn does_func_exist(&mut self, name: &str) -> BridgeResult<bool> {
        self.get_global(name)?;
        let exists = self.tag_at(-1) == Some(ValueTag::Function);
        self.pop(1)?;
        Ok(exists)
    }

    /// Load a script file and run it as an anonymous function.
    ///
    /// The file is loaded through the engine's own `loadfile`, so load errors
    /// carry the engine's wording. Whatever the chunk returns is left on the
    /// stack. On failure the error message is left on top instead and an
    /// error is logged with the path.
    ///
    /// Stack effect on success: +(number of values the chunk returns)
    /// Stack effect on failure: +1
    pub fn do_file(&mut self, path: impl AsRef<Path>) -> BridgeResult<()> {
        let path = path.as_ref();
        let chunk = match self.load_file(path) {
            Ok(chunk) => chunk,
            Err(message) => {
                error!(path = %path.display(), error = %message, "error loading script file");
                self.push_string(&message)?;
                return Err(BridgeError::Load {
                    path: path.to_path_buf(),
                    message,
                });
            }
        };

        self.push_value(Value::Function(chunk));
        self.call_function(0, ResultCount::All).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "error running script file");
        })
    }

    fn load_file(&self, path: &Path) -> Result<Function, String> {
        let loadfile: Function = match self.lua.globals().get::<Value>("loadfile") {
            Ok(Value::Function(f)) => f,
            _ => return Err("loadfile is not available in this engine".to_string()),
        };
        let Some(name) = path.to_str() else {
            return Err(format!("cannot open {}: path is not valid UTF-8", path.display()));
        };
        let (chunk, message): (Value, Option<String>) =
            loadfile.call(name).map_err(|e| engine_message(&e))?;
        match chunk {
            Value::Function(f) => Ok(f),
            _ => Err(message.unwrap_or_else(|| format!("cannot load {}", name))),
        }
    }

    fn push_results(&mut self, mut results: Vec<Value>, nresults: ResultCount) {
        if let ResultCount::Exactly(n) = nresults {
            results.resize(n, Value::Nil);
        }
        self.stack.extend(results);
    }
}

/// Text of a raised error value. Only strings, numbers and native errors
/// have text of their own.
fn error_text(raised: &Value) -> String {
    match raised {
        Value::String(s) => s.to_string_lossy(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Error(e) => engine_message(e),
        other => format!("(error object is a {} value)", ValueTag::of(other).name()),
    }
}
