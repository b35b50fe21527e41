//! Configuration system
//!
//! Registry and scene settings, loadable from TOML or RON files.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// What happens when a second manager claims a behaviour type that already
/// has a manager attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Last registration wins; the previous manager keeps the behaviours it
    /// already owns but no longer receives new ones for that type
    #[default]
    Override,
    /// Refuse the registration
    Reject,
    /// Move the previous manager's behaviours into the new manager
    Migrate,
}

/// What a handler does with a behaviour added while no manager is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetachedAddPolicy {
    /// Fail with [`RegistryError::NoManagerAttached`](crate::RegistryError::NoManagerAttached)
    #[default]
    Reject,
    /// Queue on the handler until a manager attaches
    Defer,
}

/// Registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Duplicate registration handling
    pub duplicate_policy: DuplicatePolicy,
    /// Handling of adds through a handler without a manager
    pub detached_add: DetachedAddPolicy,
}

impl RegistryConfig {
    /// Set the duplicate registration policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the detached add policy
    pub fn with_detached_add(mut self, policy: DetachedAddPolicy) -> Self {
        self.detached_add = policy;
        self
    }
}

impl Config for RegistryConfig {}

/// Configuration for a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Registry settings
    pub registry: RegistryConfig,
    /// Instantiate a behaviour's default manager when it is attached and no
    /// manager serves its type
    pub auto_default_managers: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            auto_default_managers: true,
        }
    }
}

impl Config for SceneConfig {}
