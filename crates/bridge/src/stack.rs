//! Typed Stack Protocol
//!
//! The operand stack is the only channel between host and script. Indices
//! follow the engine convention:
//!
//! - `1` is the bottom slot, `depth()` the top
//! - `-1` is the top slot, `-depth()` the bottom
//! - `0` never addresses a slot
//!
//! Every push adds exactly one value. Every typed pop checks the tag of the
//! top value first and, on mismatch, fails without touching the stack.

use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{Opaque, ValueTag, describe};
use mlua::{LightUserData, Value};
use std::ffi::c_void;
use std::fmt::Write;
use tracing::debug;

/// Largest depth `move_to_top` will grow the stack to, the engine's own
/// stack limit.
pub const MAX_DEPTH: usize = 1_000_000;

impl Engine {
    /// Number of values on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Translate an engine-style index into a vector offset.
    pub(crate) fn slot(&self, index: i32) -> Option<usize> {
        let depth = self.stack.len();
        if index > 0 {
            let i = index as usize;
            (i <= depth).then(|| i - 1)
        } else if index < 0 {
            let back = index.unsigned_abs() as usize;
            (back <= depth).then(|| depth - back)
        } else {
            None
        }
    }

    /// Tag of the value at `index`, or `None` if the index addresses no slot.
    pub fn tag_at(&self, index: i32) -> Option<ValueTag> {
        self.slot(index).map(|i| ValueTag::of(&self.stack[i]))
    }

    /// True if the value at `index` is nil. An invalid index is not nil.
    pub fn is_nil(&self, index: i32) -> bool {
        self.tag_at(index) == Some(ValueTag::Nil)
    }

    /// Borrow the value at `index` without removing it.
    pub fn peek(&self, index: i32) -> Option<&Value> {
        self.slot(index).map(|i| &self.stack[i])
    }

    // Pushes (stack effect: +1 each)

    pub fn push_number(&mut self, n: f64) {
        self.stack.push(Value::Number(n));
    }

    pub fn push_integer(&mut self, n: i64) {
        self.stack.push(Value::Integer(n));
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.stack.push(Value::Boolean(b));
    }

    pub fn push_nil(&mut self) {
        self.stack.push(Value::Nil);
    }

    /// Push a bare pointer. The engine never dereferences or frees it.
    pub fn push_light_pointer(&mut self, ptr: *mut c_void) {
        self.stack.push(Value::LightUserData(LightUserData(ptr)));
    }

    /// Push a string. The engine copies the bytes.
    pub fn push_string(&mut self, s: &str) -> BridgeResult<()> {
        let s = self.lua.create_string(s)?;
        self.stack.push(Value::String(s));
        Ok(())
    }

    /// Push any engine value as-is.
    pub fn push_value(&mut self, value: Value) {
        self.stack.push(value);
    }

    // Pops (stack effect: -1 on success, 0 on error)

    /// Remove and return the top value, whatever its kind.
    pub(crate) fn take_top(&mut self, operation: &'static str) -> BridgeResult<Value> {
        self.stack.pop().ok_or(BridgeError::StackUnderflow {
            operation,
            requested: 1,
            available: 0,
        })
    }

    /// Check the top tag against `expected` without popping.
    fn expect_top(&self, operation: &'static str, expected: ValueTag) -> BridgeResult<&Value> {
        let top = self.stack.last().ok_or(BridgeError::StackUnderflow {
            operation,
            requested: 1,
            available: 0,
        })?;
        let actual = ValueTag::of(top);
        if actual != expected {
            return Err(BridgeError::TypeMismatch { expected, actual });
        }
        Ok(top)
    }

    pub fn pop_value(&mut self) -> BridgeResult<Value> {
        self.take_top("pop_value")
    }

    pub fn pop_integer(&mut self) -> BridgeResult<i64> {
        let n = match self.expect_top("pop_integer", ValueTag::Number)? {
            Value::Integer(i) => *i,
            Value::Number(f) => float_to_integer(*f)?,
            _ => unreachable!("tag checked above"),
        };
        self.stack.pop();
        Ok(n)
    }

    pub fn pop_number(&mut self) -> BridgeResult<f64> {
        let n = match self.expect_top("pop_number", ValueTag::Number)? {
            Value::Integer(i) => *i as f64,
            Value::Number(f) => *f,
            _ => unreachable!("tag checked above"),
        };
        self.stack.pop();
        Ok(n)
    }

    /// Pop a string. Invalid UTF-8 is replaced, never rejected.
    pub fn pop_string(&mut self) -> BridgeResult<String> {
        let s = match self.expect_top("pop_string", ValueTag::String)? {
            Value::String(s) => s.to_string_lossy(),
            _ => unreachable!("tag checked above"),
        };
        self.stack.pop();
        Ok(s)
    }

    pub fn pop_boolean(&mut self) -> BridgeResult<bool> {
        let b = match self.expect_top("pop_boolean", ValueTag::Boolean)? {
            Value::Boolean(b) => *b,
            _ => unreachable!("tag checked above"),
        };
        self.stack.pop();
        Ok(b)
    }

    /// Pop light or full userdata.
    ///
    /// Light userdata is a raw pointer: the caller must know what it points
    /// to before casting it.
    pub fn pop_userdata(&mut self) -> BridgeResult<Opaque> {
        let top = self.stack.last().ok_or(BridgeError::StackUnderflow {
            operation: "pop_userdata",
            requested: 1,
            available: 0,
        })?;
        let opaque = match top {
            Value::LightUserData(ud) => Opaque::Light(*ud),
            Value::UserData(ud) => Opaque::Full(ud.clone()),
            other => {
                return Err(BridgeError::TypeMismatch {
                    expected: ValueTag::UserData,
                    actual: ValueTag::of(other),
                });
            }
        };
        self.stack.pop();
        Ok(opaque)
    }

    /// Discard exactly `n` values from the top.
    ///
    /// Stack effect: -n. Asking for more than the depth removes nothing.
    pub fn pop(&mut self, n: usize) -> BridgeResult<()> {
        let depth = self.stack.len();
        if n > depth {
            return Err(BridgeError::StackUnderflow {
                operation: "pop",
                requested: n,
                available: depth,
            });
        }
        self.stack.truncate(depth - n);
        Ok(())
    }

    /// Make `index` the new top, discarding everything above it.
    ///
    /// This is a truncation, not a copy: the value at `index` stays where it
    /// is and every slot above it is dropped. A positive index above the
    /// current top grows the stack with nils, up to [`MAX_DEPTH`]; `0`
    /// empties it.
    pub fn move_to_top(&mut self, index: i32) -> BridgeResult<()> {
        let depth = self.stack.len();
        if index >= 0 {
            let top = index as usize;
            if top > MAX_DEPTH.max(depth) {
                return Err(BridgeError::InvalidIndex { index, depth });
            }
            self.stack.resize(top, Value::Nil);
            return Ok(());
        }
        match self.slot(index) {
            Some(i) => {
                self.stack.truncate(i + 1);
                Ok(())
            }
            None => Err(BridgeError::InvalidIndex { index, depth }),
        }
    }

    /// Render the stack, top first, and log it at debug level.
    pub fn stack_dump(&self) -> String {
        let depth = self.stack.len();
        let mut out = String::new();
        let _ = writeln!(out, "Number of Elements on Stack: {}", depth);
        for (n, value) in self.stack.iter().rev().enumerate() {
            let _ = writeln!(
                out,
                "Stack[-{}]: {} ({})",
                n + 1,
                describe(value),
                ValueTag::of(value)
            );
        }
        debug!(depth, "stack dump\n{}", out);
        out
    }
}

/// Convert a float to an integer only when the conversion is exact.
fn float_to_integer(f: f64) -> BridgeResult<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(BridgeError::NotAnInteger { value: f })
    }
}
