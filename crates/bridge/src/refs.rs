//! Reference Registry
//!
//! Detaching moves the stack top into the engine registry and hands back an
//! opaque [`RefKey`]; reattaching pushes the stored value again. A detached
//! value stays alive regardless of what happens to the operand stack.
//!
//! Keys are opaque. They are not guaranteed to be sequential and a released
//! key is never handed out again by the same engine.

use crate::config::ReferencePolicy;
use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use mlua::{Lua, RegistryKey, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Opaque handle to a detached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefKey(u64);

impl RefKey {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Engine-side storage behind the reference handles.
pub(crate) struct ReferenceRegistry {
    policy: ReferencePolicy,
    entries: HashMap<RefKey, RegistryKey>,
    next: u64,
}

impl ReferenceRegistry {
    pub(crate) fn new(policy: ReferencePolicy) -> Self {
        ReferenceRegistry {
            policy,
            entries: HashMap::new(),
            next: 1,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, lua: &Lua, value: Value) -> mlua::Result<RefKey> {
        let registry_key = lua.create_registry_value(value)?;
        let key = RefKey(self.next);
        self.next += 1;
        self.entries.insert(key, registry_key);
        Ok(key)
    }

    fn redeem(&mut self, lua: &Lua, key: RefKey) -> BridgeResult<Value> {
        match self.policy {
            ReferencePolicy::SingleUse => {
                let registry_key = self
                    .entries
                    .remove(&key)
                    .ok_or(BridgeError::UnknownReference { key })?;
                let value: Value = lua.registry_value(&registry_key)?;
                lua.remove_registry_value(registry_key)?;
                Ok(value)
            }
            ReferencePolicy::Persistent => {
                let registry_key = self
                    .entries
                    .get(&key)
                    .ok_or(BridgeError::UnknownReference { key })?;
                Ok(lua.registry_value(registry_key)?)
            }
        }
    }

    fn release(&mut self, lua: &Lua, key: RefKey) -> BridgeResult<()> {
        let registry_key = self
            .entries
            .remove(&key)
            .ok_or(BridgeError::UnknownReference { key })?;
        lua.remove_registry_value(registry_key)?;
        Ok(())
    }

    /// Drop every entry. Returns how many were released.
    pub(crate) fn clear(&mut self, lua: &Lua) -> usize {
        let count = self.entries.len();
        for (_, registry_key) in self.entries.drain() {
            // Teardown continues even if one slot is already gone
            let _ = lua.remove_registry_value(registry_key);
        }
        count
    }
}

impl Engine {
    /// Move the stack top into the registry.
    ///
    /// Stack effect: -1
    pub fn detach(&mut self) -> BridgeResult<RefKey> {
        let value = self.take_top("detach")?;
        let key = self.refs.insert(&self.lua, value)?;
        trace!(%key, "detached value");
        Ok(key)
    }

    /// Push the value stored under `key`.
    ///
    /// Under [`ReferencePolicy::SingleUse`] the entry is evicted, so a second
    /// `reattach` with the same key fails with `UnknownReference`. Under
    /// [`ReferencePolicy::Persistent`] the key stays valid until
    /// [`Engine::release`].
    ///
    /// Stack effect: +1 (0 on error)
    pub fn reattach(&mut self, key: RefKey) -> BridgeResult<()> {
        let value = self.refs.redeem(&self.lua, key)?;
        self.stack.push(value);
        trace!(%key, "reattached value");
        Ok(())
    }

    /// Drop the entry stored under `key` without pushing it.
    ///
    /// Stack effect: 0
    pub fn release(&mut self, key: RefKey) -> BridgeResult<()> {
        self.refs.release(&self.lua, key)
    }

    /// Number of keys that can still be redeemed.
    pub fn live_references(&self) -> usize {
        self.refs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    fn engine(policy: ReferencePolicy) -> Engine {
        Engine::open(BridgeConfig::default().with_reference_policy(policy)).unwrap()
    }

    #[test]
    fn test_detach_consumes_top() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.push_integer(1);
        engine.push_string("payload").unwrap();
        engine.detach().unwrap();
        assert_eq!(engine.depth(), 1);
        assert_eq!(engine.live_references(), 1);
    }

    #[test]
    fn test_detach_reattach_round_trip() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.push_string("payload").unwrap();
        let key = engine.detach().unwrap();

        engine.reattach(key).unwrap();
        assert_eq!(engine.pop_string().unwrap(), "payload");
    }

    #[test]
    fn test_single_use_second_reattach_fails() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.push_number(2.5);
        let key = engine.detach().unwrap();

        engine.reattach(key).unwrap();
        let depth = engine.depth();
        let err = engine.reattach(key).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownReference { key: k } if k == key));
        assert_eq!(engine.depth(), depth);
        assert_eq!(engine.live_references(), 0);
    }

    #[test]
    fn test_persistent_reattach_repeats() {
        let mut engine = engine(ReferencePolicy::Persistent);
        engine.push_integer(7);
        let key = engine.detach().unwrap();

        engine.reattach(key).unwrap();
        engine.reattach(key).unwrap();
        assert_eq!(engine.pop_integer().unwrap(), 7);
        assert_eq!(engine.pop_integer().unwrap(), 7);
        assert_eq!(engine.live_references(), 1);

        engine.release(key).unwrap();
        assert!(matches!(
            engine.reattach(key),
            Err(BridgeError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_release_unknown_key() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.push_nil();
        let key = engine.detach().unwrap();
        engine.release(key).unwrap();
        assert!(engine.release(key).is_err());
    }

    #[test]
    fn test_detach_keeps_table_alive_across_stack_changes() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.create_table().unwrap();
        engine.push_string("level").unwrap();
        engine.push_integer(3);
        engine.set_table().unwrap();
        let key = engine.detach().unwrap();

        engine.lua().gc_collect().unwrap();
        engine.push_nil();
        engine.pop(1).unwrap();

        engine.reattach(key).unwrap();
        engine.push_table_value("level").unwrap();
        assert_eq!(engine.pop_integer().unwrap(), 3);
    }

    #[test]
    fn test_detach_empty_stack() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        assert!(matches!(
            engine.detach(),
            Err(BridgeError::StackUnderflow { .. })
        ));
    }

    #[test]
    fn test_keys_are_distinct() {
        let mut engine = engine(ReferencePolicy::SingleUse);
        engine.push_integer(1);
        let a = engine.detach().unwrap();
        engine.push_integer(2);
        let b = engine.detach().unwrap();
        assert_ne!(a, b);

        engine.reattach(b).unwrap();
        engine.reattach(a).unwrap();
        assert_eq!(engine.pop_integer().unwrap(), 1);
        assert_eq!(engine.pop_integer().unwrap(), 2);
    }
}
