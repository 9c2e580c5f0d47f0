//! Native command registration
//!
//! A [`CommandSet`] installs host-provided functions into the engine's
//! namespace. The engine handle runs exactly one command set, once, while it
//! is being constructed and before any script runs.
//!
//! The default set, [`HostCommands`], installs a `host` table:
//!
//! ```lua
//! host.log("info", "loaded level 3")   -- forwarded to tracing
//! print(host.version())                 -- bridge version string
//! ```

use mlua::Lua;
use tracing::{debug, error, info, trace, warn};

/// A table of host functions to install into a fresh engine.
pub trait CommandSet {
    fn install(&self, lua: &Lua) -> mlua::Result<()>;
}

/// Installs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandSet for NoCommands {
    fn install(&self, _lua: &Lua) -> mlua::Result<()> {
        Ok(())
    }
}

/// The default `host` command table.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCommands;

impl CommandSet for HostCommands {
    fn install(&self, lua: &Lua) -> mlua::Result<()> {
        let host = lua.create_table()?;

        host.set(
            "log",
            lua.create_function(|_, (level, message): (String, String)| {
                match level.as_str() {
                    "trace" => trace!(target: "luabridge::script", "{}", message),
                    "debug" => debug!(target: "luabridge::script", "{}", message),
                    "info" => info!(target: "luabridge::script", "{}", message),
                    "warn" => warn!(target: "luabridge::script", "{}", message),
                    "error" => error!(target: "luabridge::script", "{}", message),
                    other => {
                        return Err(mlua::Error::RuntimeError(format!(
                            "host.log: unknown level '{}'",
                            other
                        )));
                    }
                }
                Ok(())
            })?,
        )?;

        host.set(
            "version",
            lua.create_function(|_, ()| Ok(env!("CARGO_PKG_VERSION")))?,
        )?;

        lua.globals().set("host", host)
    }
}
