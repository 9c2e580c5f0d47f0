//! Value tags and the small set of host-side value shapes the bridge exchanges.
//!
//! Stack slots hold `mlua::Value` directly. [`ValueTag`] is the runtime
//! classification that typed pops check before converting anything.

use mlua::{AnyUserData, LightUserData, Value};
use std::fmt;

/// Runtime kind of a stack value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    Nil,
    Boolean,
    LightUserData,
    /// Integers and floats share one tag, as in the engine.
    Number,
    String,
    Table,
    Function,
    UserData,
    Thread,
}

impl ValueTag {
    /// Classify a stack value.
    pub fn of(value: &Value) -> ValueTag {
        match value {
            Value::Nil => ValueTag::Nil,
            Value::Boolean(_) => ValueTag::Boolean,
            Value::LightUserData(_) => ValueTag::LightUserData,
            Value::Integer(_) | Value::Number(_) => ValueTag::Number,
            Value::String(_) => ValueTag::String,
            Value::Table(_) => ValueTag::Table,
            Value::Function(_) => ValueTag::Function,
            Value::Thread(_) => ValueTag::Thread,
            // Full userdata, error objects and anything the engine adds later
            _ => ValueTag::UserData,
        }
    }

    /// Name used by the engine's `type()` function.
    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Nil => "nil",
            ValueTag::Boolean => "boolean",
            ValueTag::LightUserData | ValueTag::UserData => "userdata",
            ValueTag::Number => "number",
            ValueTag::String => "string",
            ValueTag::Table => "table",
            ValueTag::Function => "function",
            ValueTag::Thread => "thread",
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTag::LightUserData => write!(f, "light userdata"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Key for table lookups: a field name or an integer index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    Name(String),
    Index(i64),
}

impl From<&str> for TableKey {
    fn from(name: &str) -> Self {
        TableKey::Name(name.to_string())
    }
}

impl From<String> for TableKey {
    fn from(name: String) -> Self {
        TableKey::Name(name)
    }
}

impl From<i64> for TableKey {
    fn from(index: i64) -> Self {
        TableKey::Index(index)
    }
}

impl From<i32> for TableKey {
    fn from(index: i32) -> Self {
        TableKey::Index(i64::from(index))
    }
}

/// Result of `pop_userdata`: either kind of opaque object.
///
/// Light userdata is a bare pointer with no engine-side lifetime; full
/// userdata (files, host objects) is owned by the engine's collector.
#[derive(Debug, Clone)]
pub enum Opaque {
    Light(LightUserData),
    Full(AnyUserData),
}

impl Opaque {
    /// The raw pointer, when this is light userdata.
    pub fn as_ptr(&self) -> Option<*mut std::ffi::c_void> {
        match self {
            Opaque::Light(ud) => Some(ud.0),
            Opaque::Full(_) => None,
        }
    }

    /// The engine object, when this is full userdata.
    pub fn as_full(&self) -> Option<&AnyUserData> {
        match self {
            Opaque::Light(_) => None,
            Opaque::Full(ud) => Some(ud),
        }
    }
}

/// Short human-readable rendering of a value for stack dumps.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("{:?}", s.to_string_lossy()),
        Value::LightUserData(ud) => format!("light userdata: {:p}", ud.0),
        other => format!("{}: {:p}", ValueTag::of(other).name(), other.to_pointer()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    #[test]
    fn test_tags_of_primitive_values() {
        assert_eq!(ValueTag::of(&Value::Nil), ValueTag::Nil);
        assert_eq!(ValueTag::of(&Value::Boolean(true)), ValueTag::Boolean);
        assert_eq!(ValueTag::of(&Value::Integer(3)), ValueTag::Number);
        assert_eq!(ValueTag::of(&Value::Number(3.5)), ValueTag::Number);
    }

    #[test]
    fn test_tags_of_engine_values() {
        let lua = Lua::new();
        let table = Value::Table(lua.create_table().unwrap());
        assert_eq!(ValueTag::of(&table), ValueTag::Table);

        let s = Value::String(lua.create_string("x").unwrap());
        assert_eq!(ValueTag::of(&s), ValueTag::String);

        let f: Value = lua.load("return function() end").eval().unwrap();
        assert_eq!(ValueTag::of(&f), ValueTag::Function);

        let co: Value = lua
            .load("return coroutine.create(function() end)")
            .eval()
            .unwrap();
        assert_eq!(ValueTag::of(&co), ValueTag::Thread);
    }

    #[test]
    fn test_tag_names_match_engine_type_names() {
        let lua = Lua::new();
        let check: mlua::Function = lua.load("return function(v) return type(v) end").eval().unwrap();
        for value in [
            Value::Nil,
            Value::Boolean(false),
            Value::Integer(1),
            Value::Table(lua.create_table().unwrap()),
        ] {
            let engine_name: String = check.call(value.clone()).unwrap();
            assert_eq!(ValueTag::of(&value).name(), engine_name);
        }
    }

    #[test]
    fn test_table_key_conversions() {
        assert_eq!(TableKey::from("name"), TableKey::Name("name".to_string()));
        assert_eq!(TableKey::from(3i64), TableKey::Index(3));
        assert_eq!(TableKey::from(7i32), TableKey::Index(7));
    }

    #[test]
    fn test_describe_renders_scalars() {
        assert_eq!(describe(&Value::Nil), "nil");
        assert_eq!(describe(&Value::Integer(42)), "42");
        assert_eq!(describe(&Value::Boolean(true)), "true");
    }
}
