//! Resource Bridge
//!
//! Files are opened and closed through the engine's `io` library rather than
//! the host OS, so a handle the host opens behaves exactly like one a script
//! opened with `io.open`. Both operations drive the call protocol and leave
//! the stack as they found it.

use crate::config::CloseBehavior;
use crate::engine::Engine;
use crate::error::{BridgeError, BridgeResult};
use crate::value::Opaque;
use mlua::{AnyUserData, Value};
use tracing::debug;

/// Direction of an opened resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMode {
    Input,
    Output,
}

impl ResourceMode {
    /// Classify a conventional open mode. Unsupported modes give `None`.
    pub fn from_open_mode(mode: &str) -> Option<ResourceMode> {
        match mode {
            "r" | "rb" | "r+" => Some(ResourceMode::Input),
            "w" | "wb" | "w+" | "a" | "ab" | "a+" => Some(ResourceMode::Output),
            _ => None,
        }
    }
}

/// An engine file handle paired with the direction it was opened in.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    mode: ResourceMode,
    file: AnyUserData,
}

impl Resource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ResourceMode {
        self.mode
    }

    /// The engine's file object, for passing back into scripts.
    pub fn file(&self) -> &AnyUserData {
        &self.file
    }
}

impl Engine {
    /// Open `name` through `io.open`.
    ///
    /// Returns `Ok(None)` for modes other than r, rb, r+, w, wb, w+, a, ab
    /// and a+. If the engine refuses the open, the error carries its message.
    ///
    /// Stack effect: 0
    pub fn open_resource(&mut self, name: &str, mode: &str) -> BridgeResult<Option<Resource>> {
        let Some(resource_mode) = ResourceMode::from_open_mode(mode) else {
            debug!(name, mode, "unsupported open mode");
            return Ok(None);
        };

        let open = self.io_function("open", name)?;
        self.push_value(open);
        self.push_string(name)?;
        self.push_string(mode)?;
        if let Err(e) = self.call_function(2, 2) {
            self.pop(1)?;
            return Err(resource_error(name, e));
        }

        // io.open returns the file, or nil plus a message
        let message = self.pop_value()?;
        match self.pop_userdata() {
            Ok(Opaque::Full(file)) => {
                debug!(name, mode, ?resource_mode, "opened resource");
                Ok(Some(Resource {
                    name: name.to_string(),
                    mode: resource_mode,
                    file,
                }))
            }
            Ok(Opaque::Light(_)) => Err(BridgeError::Resource {
                name: name.to_string(),
                message: "io.open returned light userdata".to_string(),
            }),
            Err(_) => {
                self.pop(1)?;
                let message = match message {
                    Value::String(s) => s.to_string_lossy(),
                    _ => "io.open failed".to_string(),
                };
                Err(BridgeError::Resource {
                    name: name.to_string(),
                    message,
                })
            }
        }
    }

    /// Close a resource through `io.close`.
    ///
    /// With [`CloseBehavior::Handle`] the given handle is closed. With
    /// [`CloseBehavior::DefaultOutput`] `io.close()` is called with no
    /// argument: the engine's default output is closed and `resource` is
    /// left open.
    ///
    /// Stack effect: 0
    pub fn close_resource(&mut self, resource: &Resource) -> BridgeResult<()> {
        let close = self.io_function("close", &resource.name)?;
        self.push_value(close);
        let nargs = match self.config.close_behavior {
            CloseBehavior::Handle => {
                self.push_value(Value::UserData(resource.file.clone()));
                1
            }
            CloseBehavior::DefaultOutput => 0,
        };
        if let Err(e) = self.call_function(nargs, 0) {
            self.pop(1)?;
            return Err(resource_error(&resource.name, e));
        }
        debug!(
            name = %resource.name,
            behavior = ?self.config.close_behavior,
            "closed resource"
        );
        Ok(())
    }

    fn io_function(&self, field: &str, name: &str) -> BridgeResult<Value> {
        let io = match self.lua.globals().get::<Value>("io")? {
            Value::Table(t) => t,
            _ => {
                return Err(BridgeError::Resource {
                    name: name.to_string(),
                    message: "the io library is not loaded".to_string(),
                });
            }
        };
        Ok(io.get::<Value>(field)?)
    }
}

fn resource_error(name: &str, err: BridgeError) -> BridgeError {
    match err {
        BridgeError::Script { message } => BridgeError::Resource {
            name: name.to_string(),
            message,
        },
        other => other,
    }
}
