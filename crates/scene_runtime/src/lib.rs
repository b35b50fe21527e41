//! # Scene Runtime
//!
//! Behaviour/manager dispatch for a scene-based game runtime.
//!
//! ## Features
//!
//! - **Behaviours**: per-entity data with no update logic of their own
//! - **Managers**: batch processors declaring the behaviour types they own
//! - **Handlers**: one router per behaviour type, moving behaviours between managers
//! - **Registry**: manager lookup by type, by behaviour type and by capability
//! - **Scene**: buffered attach/detach and the per-frame update loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_runtime::prelude::*;
//!
//! struct Spin {
//!     core: BehaviourCore,
//!     angle: f32,
//! }
//!
//! impl Behaviour for Spin {
//!     fn core(&self) -> &BehaviourCore { &self.core }
//!     fn core_mut(&mut self) -> &mut BehaviourCore { &mut self.core }
//! }
//!
//! #[derive(Default)]
//! struct SpinManager {
//!     spins: BehaviourManager<Spin>,
//! }
//!
//! impl Manager for SpinManager {
//!     fn is_disposed(&self) -> bool { self.spins.is_disposed() }
//!     fn dispose(&mut self) { self.spins.dispose() }
//!     fn describe(descriptor: &mut ManagerDescriptor<Self>) {
//!         descriptor.manages::<Spin>().capability::<dyn Updatable>(|m| m);
//!     }
//! }
//!
//! impl Manages<Spin> for SpinManager {
//!     fn add(&mut self, spin: Shared<Spin>) { self.spins.add(spin) }
//!     fn remove(&mut self, spin: &Shared<Spin>) -> bool { self.spins.remove(spin) }
//!     fn behaviours(&self) -> &[Shared<Spin>] { self.spins.behaviours() }
//! }
//!
//! impl Updatable for SpinManager {
//!     fn update(&mut self, delta_time: f32) {
//!         for spin in self.spins.iter() {
//!             spin.borrow_mut().angle += delta_time;
//!         }
//!     }
//! }
//!
//! fn main() -> Result<(), RegistryError> {
//!     let mut scene = Scene::new();
//!     scene.add_manager(share(SpinManager::default()))?;
//!     scene.attach(&share(Spin { core: BehaviourCore::new(), angle: 0.0 }))?;
//!     scene.update(0.016)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod behaviour;
pub mod config;
pub mod entity;
pub mod error;
pub mod handler;
pub mod logging;
pub mod manager;
pub mod reflect;
pub mod registry;
pub mod scene;

#[cfg(test)]
mod testing;

pub use error::RegistryError;
pub use registry::{ManagerId, ManagerRegistry};
pub use scene::Scene;

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        behaviour::{share, Behaviour, BehaviourCore, BehaviourRef, ManagerBinding, Shared},
        config::{Config, ConfigError, DetachedAddPolicy, DuplicatePolicy, RegistryConfig, SceneConfig},
        entity::Entity,
        handler::{BehaviourHandler, Handler},
        manager::{BehaviourManager, Manager, ManagerDescriptor, Manages},
        reflect::TypeKey,
        registry::{CategoryView, ManagerId, ManagerRegistry},
        scene::{DefaultManager, Drawable, FromServices, Scene, Services, Updatable},
        RegistryError,
    };
}
