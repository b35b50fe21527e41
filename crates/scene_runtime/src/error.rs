//! Registry errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::reflect::TypeKey;

/// Errors raised by the registry, its handlers and the scene
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No manager of the requested concrete type is registered
    #[error("No manager of type {0} is registered")]
    ManagerNotFound(TypeKey),

    /// No handler exists for the behaviour type or any of its bases
    #[error("No handler exists for behaviour type {0}")]
    HandlerNotFound(TypeKey),

    /// A behaviour was added through a handler with no manager attached
    #[error("Handler for {behaviour} has no manager attached")]
    NoManagerAttached {
        /// Behaviour type the handler serves
        behaviour: TypeKey,
    },

    /// The behaviour cannot be viewed as the handler's behaviour type
    #[error("Behaviour of type {actual} cannot be handled as {expected}")]
    BehaviourTypeMismatch {
        /// Behaviour type the handler serves
        expected: TypeKey,
        /// Concrete type of the behaviour
        actual: TypeKey,
    },

    /// A manager claimed a behaviour type that is already served
    #[error("Behaviour type {behaviour} is already managed by {existing}")]
    DuplicateManager {
        /// Contested behaviour type
        behaviour: TypeKey,
        /// Concrete type of the manager already attached
        existing: TypeKey,
    },

    /// A default-manager tag names a manager that does not manage the behaviour
    #[error("Default manager {manager} does not manage behaviour type {behaviour}")]
    InvalidDefaultManager {
        /// Tagged behaviour type
        behaviour: TypeKey,
        /// Manager named by the tag
        manager: TypeKey,
    },

    /// The scene has handed out every entity id
    #[error("Entity ids exhausted")]
    EntityIdsExhausted,

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
