//! Bridge configuration
//!
//! Configuration is plain data and can be written in TOML:
//!
//! ```toml
//! libraries = ["string", "table", "math", "io"]
//! memory_limit = 67108864
//! reference_policy = "persistent"
//! close_behavior = "handle"
//! ```
//!
//! Every field is optional; omitted fields take the defaults below.

use crate::error::{BridgeError, BridgeResult};
use mlua::StdLib;
use serde::Deserialize;
use std::path::Path;

/// Redemption policy for reference handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferencePolicy {
    /// `reattach` evicts the entry; the key is dead afterwards.
    #[default]
    SingleUse,
    /// The entry lives until `release` is called.
    Persistent,
}

/// What `close_resource` closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseBehavior {
    /// Close the handle that was passed in.
    #[default]
    Handle,
    /// Legacy: close the engine's default output, ignoring the handle.
    DefaultOutput,
}

/// Engine construction and bridge policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Standard libraries to load, by their engine names.
    pub libraries: Vec<String>,

    /// Upper bound on engine heap size in bytes.
    pub memory_limit: Option<usize>,

    /// How `reattach` treats the key it redeems.
    pub reference_policy: ReferencePolicy,

    /// How `close_resource` picks what to close.
    pub close_behavior: CloseBehavior,
}

/// Every library the engine can load without the unsafe `debug` library.
pub const DEFAULT_LIBRARIES: &[&str] = &[
    "coroutine",
    "table",
    "io",
    "os",
    "string",
    "utf8",
    "math",
    "package",
];

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            libraries: DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
            memory_limit: None,
            reference_policy: ReferencePolicy::default(),
            close_behavior: CloseBehavior::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> BridgeResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| BridgeError::Config(format!("failed to parse bridge config: {}", e)))
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    pub fn with_close_behavior(mut self, behavior: CloseBehavior) -> Self {
        self.close_behavior = behavior;
        self
    }

    pub fn with_libraries<I, S>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries = libraries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Resolve the library names into the engine's flag set.
    ///
    /// The base library is always loaded. Unknown names are an
    /// initialization error rather than silently ignored.
    pub(crate) fn std_libs(&self) -> BridgeResult<StdLib> {
        let mut libs = StdLib::NONE;
        for name in &self.libraries {
            libs |= match name.as_str() {
                "coroutine" => StdLib::COROUTINE,
                "table" => StdLib::TABLE,
                "io" => StdLib::IO,
                "os" => StdLib::OS,
                "string" => StdLib::STRING,
                "utf8" => StdLib::UTF8,
                "math" => StdLib::MATH,
                "package" => StdLib::PACKAGE,
                other => {
                    return Err(BridgeError::Initialization(format!(
                        "unknown standard library '{}'",
                        other
                    )));
                }
            };
        }
        Ok(libs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.reference_policy, ReferencePolicy::SingleUse);
        assert_eq!(config.close_behavior, CloseBehavior::Handle);
        assert!(config.libraries.iter().any(|l| l == "io"));
        assert!(config.memory_limit.is_none());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = BridgeConfig::from_toml(
            r#"
reference_policy = "persistent"
close_behavior = "default-output"
"#,
        )
        .unwrap();
        assert_eq!(config.reference_policy, ReferencePolicy::Persistent);
        assert_eq!(config.close_behavior, CloseBehavior::DefaultOutput);
        // Omitted fields keep their defaults
        assert_eq!(config.libraries, BridgeConfig::default().libraries);
    }

    #[test]
    fn test_from_toml_rejects_unknown_fields() {
        let err = BridgeConfig::from_toml("stack_size = 12").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "libraries = [\"string\"]\nmemory_limit = 1048576\n").unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.libraries, vec!["string".to_string()]);
        assert_eq!(config.memory_limit, Some(1_048_576));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BridgeConfig::load(Path::new("/nonexistent/bridge.toml")).unwrap_err();
        assert!(err.to_string().contains("bridge.toml"));
    }

    #[test]
    fn test_unknown_library_is_initialization_error() {
        let config = BridgeConfig::default().with_libraries(["string", "debug"]);
        let err = config.std_libs().unwrap_err();
        assert!(matches!(err, BridgeError::Initialization(_)));
    }

    #[test]
    fn test_std_libs_union() {
        let libs = BridgeConfig::default()
            .with_libraries(["string", "math"])
            .std_libs()
            .unwrap();
        assert!(libs.contains(StdLib::STRING));
        assert!(libs.contains(StdLib::MATH));
        assert!(!libs.contains(StdLib::IO));
    }
}
