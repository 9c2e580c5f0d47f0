//! Table Builder
//!
//! Tables are built and queried in place on the stack. While a table is being
//! worked on it must sit at a fixed position relative to the top:
//!
//! - `push_table_value`: table on top, the looked-up value is pushed above it
//! - `set_table`: table, key, value (top); key and value are consumed
//! - `set_field`: table, value (top); the value is consumed
//!
//! A violated arrangement is a calling-convention bug and is reported as
//! `ContractViolation` before anything is touched.

use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{TableKey, ValueTag};
use mlua::{Table, Value};

impl Engine {
    /// Push a new empty table.
    ///
    /// Stack effect: +1
    pub fn create_table(&mut self) -> BridgeResult<()> {
        let table = self.lua.create_table()?;
        self.stack.push(Value::Table(table));
        Ok(())
    }

    /// Look `key` up in the table on top and push the result.
    ///
    /// Lookups go through `__index` like a script's `t[key]` would. The table
    /// stays where it was, one below the pushed value.
    ///
    /// Stack effect: +1
    pub fn push_table_value(&mut self, key: impl Into<TableKey>) -> BridgeResult<()> {
        let table = self.table_at("push_table_value", -1)?;
        let value: Value = match key.into() {
            TableKey::Name(name) => table.get(name)?,
            TableKey::Index(i) => table.get(i)?,
        };
        self.stack.push(value);
        Ok(())
    }

    /// Store `table[key] = value` using the top three slots.
    ///
    /// The caller pushes the key, then the value, with the table already
    /// beneath both. Assignment goes through `__newindex`.
    ///
    /// Stack effect: -2
    pub fn set_table(&mut self) -> BridgeResult<()> {
        let table = self.table_at("set_table", -3)?;
        let value = self.take_top("set_table")?;
        let key = self.take_top("set_table")?;
        table.set(key, value)?;
        Ok(())
    }

    /// Store `table[name] = value` with the value on top and the table below.
    ///
    /// Stack effect: -1
    pub fn set_field(&mut self, name: &str) -> BridgeResult<()> {
        let table = self.table_at("set_field", -2)?;
        let value = self.take_top("set_field")?;
        table.set(name, value)?;
        Ok(())
    }

    /// Raw length of the table on top (`#t` without `__len`).
    ///
    /// Stack effect: 0
    pub fn table_len(&self) -> BridgeResult<usize> {
        Ok(self.table_at("table_len", -1)?.raw_len())
    }

    fn table_at(&self, operation: &'static str, index: i32) -> BridgeResult<Table> {
        match self.peek(index) {
            Some(Value::Table(t)) => Ok(t.clone()),
            Some(other) => Err(BridgeError::ContractViolation {
                operation,
                detail: format!(
                    "expected a table at index {}, found {}",
                    index,
                    ValueTag::of(other)
                ),
            }),
            None => Err(BridgeError::ContractViolation {
                operation,
                detail: format!(
                    "expected a table at index {}, stack depth is {}",
                    index,
                    self.depth()
                ),
            }),
        }
    }
}
