//! Engine Handle
//!
//! [`Engine`] owns one embedded Lua runtime together with the operand stack
//! and reference registry that the rest of the bridge operates on.
//!
//! Lifecycle:
//! - `Engine::open` constructs the runtime, loads the configured standard
//!   libraries and installs the host command set, once.
//! - `Engine::close` tears it down. It consumes the handle, so a closed engine
//!   cannot be used or reopened. Dropping the handle without `close` frees
//!   everything too, but skips the final collection and the log line.
//!
//! `Engine` is not `Send`. All access happens on the thread that opened it;
//! callers that need several threads must serialize access themselves.

use crate::commands::{CommandSet, HostCommands};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::refs::ReferenceRegistry;
use mlua::{Function, Lua, LuaOptions, MultiValue, Value};
use tracing::{debug, info};

/// Handle to the embedded engine and its operand stack.
pub struct Engine {
    pub(crate) lua: Lua,
    /// The engine's protected call, captured before any script runs.
    pub(crate) pcall: Function,
    pub(crate) stack: Vec<Value>,
    pub(crate) refs: ReferenceRegistry,
    pub(crate) config: BridgeConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("depth", &self.stack.len())
            .field("live_references", &self.refs.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Open an engine with the default `host` command set.
    pub fn open(config: BridgeConfig) -> BridgeResult<Engine> {
        Self::open_with(config, &HostCommands)
    }

    /// Open an engine and install `commands` into its namespace.
    ///
    /// Any failure here is an [`BridgeError::Initialization`]; there is no
    /// partially constructed engine to retry with.
    pub fn open_with(config: BridgeConfig, commands: &dyn CommandSet) -> BridgeResult<Engine> {
        let libs = config.std_libs()?;
        let lua = Lua::new_with(libs, LuaOptions::default())
            .map_err(|e| BridgeError::Initialization(e.to_string()))?;

        let pcall: Function = lua
            .globals()
            .get("pcall")
            .map_err(|e| BridgeError::Initialization(format!("resolving pcall: {}", e)))?;

        if let Some(limit) = config.memory_limit {
            lua.set_memory_limit(limit)
                .map_err(|e| BridgeError::Initialization(e.to_string()))?;
        }

        commands
            .install(&lua)
            .map_err(|e| BridgeError::Initialization(format!("installing host commands: {}", e)))?;

        info!(
            libraries = ?config.libraries,
            memory_limit = ?config.memory_limit,
            "engine opened"
        );

        let refs = ReferenceRegistry::new(config.reference_policy);
        Ok(Engine {
            lua,
            pcall,
            stack: Vec::new(),
            refs,
            config,
        })
    }

    /// Tear the engine down.
    ///
    /// Empties the operand stack, releases every outstanding reference and
    /// runs a full collection before the runtime is dropped, so `__gc`
    /// finalizers (open files included) get to run.
    pub fn close(mut self) -> BridgeResult<()> {
        let depth = self.stack.len();
        self.stack.clear();
        let released = self.refs.clear(&self.lua);
        self.lua.gc_collect()?;
        info!(depth, released, "engine closed");
        Ok(())
    }

    /// Raw access to the embedded runtime.
    ///
    /// Do not use this to manage anything the bridge manages: the operand
    /// stack and reference registry are not visible through it.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Push the global `name` (nil if unset).
    ///
    /// Stack effect: +1
    pub fn get_global(&mut self, name: &str) -> BridgeResult<()> {
        let value: Value = self.lua.globals().get(name)?;
        self.stack.push(value);
        Ok(())
    }

    /// Pop the top value and store it as the global `name`.
    ///
    /// Stack effect: -1
    pub fn set_global(&mut self, name: &str) -> BridgeResult<()> {
        let value = self.take_top("set_global")?;
        self.lua.globals().set(name, value)?;
        Ok(())
    }

    /// Register a native function as the global `name`.
    ///
    /// The function receives every argument the script passed and returns
    /// any number of results. Errors it returns are raised in the script.
    ///
    /// Stack effect: 0
    pub fn register_func<F>(&mut self, name: &str, func: F) -> BridgeResult<()>
    where
        F: Fn(&Lua, MultiValue) -> mlua::Result<MultiValue> + 'static,
    {
        let function = self.lua.create_function(func)?;
        self.lua.globals().set(name, function)?;
        debug!(name, "registered native function");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::NoCommands;

    #[test]
    fn test_open_installs_host_commands() {
        let mut engine = Engine::open(BridgeConfig::default()).unwrap();
        engine.get_global("host").unwrap();
        assert_eq!(engine.tag_at(-1), Some(crate::ValueTag::Table));
        engine.close().unwrap();
    }

    #[test]
    fn test_open_with_no_commands() {
        let mut engine = Engine::open_with(BridgeConfig::default(), &NoCommands).unwrap();
        engine.get_global("host").unwrap();
        assert!(engine.is_nil(-1));
    }

    #[test]
    fn test_open_rejects_unknown_library() {
        let config = BridgeConfig::default().with_libraries(["nope"]);
        let err = Engine::open(config).unwrap_err();
        assert!(matches!(err, BridgeError::Initialization(_)));
    }

    #[test]
    fn test_failing_command_set_is_initialization_error() {
        struct Broken;
        impl CommandSet for Broken {
            fn install(&self, _lua: &Lua) -> mlua::Result<()> {
                Err(mlua::Error::RuntimeError("no room".to_string()))
            }
        }
        let err = Engine::open_with(BridgeConfig::default(), &Broken).unwrap_err();
        assert!(err.to_string().contains("no room"));
    }

    #[test]
    fn test_libraries_are_limited_by_config() {
        let config = BridgeConfig::default().with_libraries(["string"]);
        let mut engine = Engine::open(config).unwrap();
        engine.get_global("io").unwrap();
        assert!(engine.is_nil(-1));
        engine.get_global("string").unwrap();
        assert_eq!(engine.tag_at(-1), Some(crate::ValueTag::Table));
    }

    #[test]
    fn test_set_and_get_global() {
        let mut engine = Engine::open(BridgeConfig::default()).unwrap();
        engine.push_integer(99);
        engine.set_global("answer").unwrap();
        assert_eq!(engine.depth(), 0);

        engine.get_global("answer").unwrap();
        assert_eq!(engine.pop_integer().unwrap(), 99);

        let from_script: i64 = engine.lua().load("return answer").eval().unwrap();
        assert_eq!(from_script, 99);
    }

    #[test]
    fn test_set_global_on_empty_stack() {
        let mut engine = Engine::open(BridgeConfig::default()).unwrap();
        let err = engine.set_global("x").unwrap_err();
        assert!(matches!(err, BridgeError::StackUnderflow { .. }));
    }

    #[test]
    fn test_register_func_callable_from_script() {
        let mut engine = Engine::open(BridgeConfig::default()).unwrap();
        engine
            .register_func("double", |_, args| {
                let n = match args.front() {
                    Some(Value::Integer(n)) => *n,
                    _ => return Err(mlua::Error::RuntimeError("double: expected integer".into())),
                };
                Ok(MultiValue::from_vec(vec![Value::Integer(n * 2)]))
            })
            .unwrap();

        let result: i64 = engine.lua().load("return double(21)").eval().unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_memory_limit_applied() {
        let config = BridgeConfig::default().with_memory_limit(512 * 1024);
        let engine = Engine::open(config).unwrap();
        let err = engine
            .lua()
            .load("local t = {} for i = 1, 1e7 do t[i] = i end")
            .exec()
            .unwrap_err();
        assert!(matches!(err, mlua::Error::MemoryError(_)));
    }

    #[test]
    fn test_close_releases_references() {
        let mut engine = Engine::open(BridgeConfig::default()).unwrap();
        engine.push_string("kept").unwrap();
        engine.detach().unwrap();
        assert_eq!(engine.live_references(), 1);
        engine.close().unwrap();
    }
}
