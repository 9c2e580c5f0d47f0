//! luabridge: a typed stack-discipline bridge to an embedded Lua engine
//!
//! Key design principles:
//! - Engine: owns the runtime, the operand stack and the reference registry
//! - Stack: every exchange with scripts goes through typed pushes and
//!   tag-checked pops; every operation documents its net stack effect
//! - Calls: function and arguments in, exactly `nresults` out, or exactly one
//!   error message out
//!
//! # Modules
//!
//! - `engine`: engine construction, teardown, globals, native functions
//! - `stack`: typed push/pop, indexing, truncation, stack dumps
//! - `table`: building and querying tables at the stack top
//! - `call`: the call protocol, `does_func_exist`, `do_file`
//! - `refs`: detaching values into the registry and reattaching them
//! - `resource`: files opened and closed through the engine's `io` library
//! - `commands`: host command sets installed at construction
//! - `config`: TOML-loadable bridge configuration
//! - `error`: the bridge error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use luabridge::{BridgeConfig, Engine};
//!
//! let mut engine = Engine::open(BridgeConfig::default())?;
//! engine.do_file("scripts/init.lua")?;
//! if engine.does_func_exist("on_start")? {
//!     engine.get_global("on_start")?;
//!     engine.push_integer(1);
//!     engine.call_function(1, 0)?;
//! }
//! engine.close()?;
//! # Ok::<(), luabridge::BridgeError>(())
//! ```

pub mod call;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod refs;
pub mod resource;
pub mod stack;
pub mod table;
pub mod value;

pub use call::ResultCount;
pub use commands::{CommandSet, HostCommands, NoCommands};
pub use config::{BridgeConfig, CloseBehavior, DEFAULT_LIBRARIES, ReferencePolicy};
pub use engine::Engine;
pub use error::{BridgeError, BridgeResult};
pub use refs::RefKey;
pub use resource::{Resource, ResourceMode};
pub use value::{Opaque, TableKey, ValueTag};

// Re-export mlua for callers that register native functions
pub use mlua;
