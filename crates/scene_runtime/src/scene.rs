//! # Scene
//!
//! Owner of a [`ManagerRegistry`] and driver of the per-frame loop. Behaviour
//! attach and detach requests are buffered and applied at the start of the
//! next update, so managers never see their sequences change mid-iteration.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::behaviour::{Behaviour, BehaviourRef, Shared};
use crate::config::{Config, SceneConfig};
use crate::entity::Entity;
use crate::error::RegistryError;
use crate::manager::Manager;
use crate::reflect::TypeKey;
use crate::registry::{ManagerId, ManagerRegistry};

/// Capability of managers that run once per frame
pub trait Updatable {
    /// Advance by `delta_time` seconds
    fn update(&mut self, delta_time: f32);
}

/// Capability of managers that draw once per frame
pub trait Drawable {
    /// Draw the current state
    fn draw(&mut self);
}

/// Name-keyed store of auxiliary services
#[derive(Default)]
pub struct Services {
    entries: HashMap<String, Rc<dyn Any>>,
}

impl Services {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a service, returning the one previously stored under `name`
    pub fn insert<T: 'static>(&mut self, name: impl Into<String>, service: T) -> Option<Rc<dyn Any>> {
        self.entries.insert(name.into(), Rc::new(service))
    }

    /// Get a service by name, if present with type `T`
    pub fn get<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        Rc::clone(self.entries.get(name)?).downcast::<T>().ok()
    }

    /// Check whether a service is stored under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove a service
    pub fn remove(&mut self, name: &str) -> Option<Rc<dyn Any>> {
        self.entries.remove(name)
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no services are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Managers the host can construct from its services
pub trait FromServices: Sized {
    /// Build the manager, pulling what it needs from `services`
    fn from_services(services: &Services) -> Self;
}

type RegisterFn = fn(&mut ManagerRegistry, &Services, &[TypeKey]) -> Result<ManagerId, RegistryError>;

/// Default-manager tag returned by [`Behaviour::default_manager`]
#[derive(Clone, Copy)]
pub struct DefaultManager {
    manager: TypeKey,
    register: RegisterFn,
}

impl DefaultManager {
    /// Tag naming manager type `M`
    pub fn of<M: Manager + FromServices>() -> Self {
        Self {
            manager: TypeKey::of::<M>(),
            register: register_default::<M>,
        }
    }

    /// Tagged manager type
    pub fn manager_type(&self) -> TypeKey {
        self.manager
    }

    /// Construct and register the manager for a behaviour with `lineage`
    ///
    /// Fails with [`RegistryError::InvalidDefaultManager`] when the manager
    /// manages none of the types in `lineage`.
    pub fn instantiate(
        &self,
        registry: &mut ManagerRegistry,
        services: &Services,
        lineage: &[TypeKey],
    ) -> Result<ManagerId, RegistryError> {
        (self.register)(registry, services, lineage)
    }
}

impl std::fmt::Debug for DefaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DefaultManager").field(&self.manager).finish()
    }
}

fn register_default<M: Manager + FromServices>(
    registry: &mut ManagerRegistry,
    services: &Services,
    lineage: &[TypeKey],
) -> Result<ManagerId, RegistryError> {
    let descriptor = registry.discovery_mut().describe::<M>();
    if !lineage.iter().any(|key| descriptor.manages_type(*key)) {
        return Err(RegistryError::InvalidDefaultManager {
            behaviour: lineage.first().copied().unwrap_or_else(TypeKey::of::<()>),
            manager: TypeKey::of::<M>(),
        });
    }
    registry.add(crate::behaviour::share(M::from_services(services)))
}

enum PendingChange {
    Attach(BehaviourRef),
    Detach(BehaviourRef),
}

/// A scene: registry, services and frame loop
pub struct Scene {
    registry: ManagerRegistry,
    services: Services,
    config: SceneConfig,
    pending: Vec<PendingChange>,
    attached: Vec<BehaviourRef>,
    next_entity_id: u32,
    frame: u64,
}

impl Scene {
    /// Create a scene with default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create a scene with custom configuration
    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            registry: ManagerRegistry::with_config(config.registry.clone()),
            services: Services::new(),
            config,
            pending: Vec::new(),
            attached: Vec::new(),
            next_entity_id: 0,
            frame: 0,
        }
    }

    /// Create a scene from a `.toml` or `.ron` configuration file
    pub fn from_config_file(path: &str) -> Result<Self, RegistryError> {
        let config = SceneConfig::load_from_file(path)?;
        log::info!("Loaded scene configuration from {}", path);
        Ok(Self::with_config(config))
    }

    /// Scene configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Manager registry
    pub fn registry(&self) -> &ManagerRegistry {
        &self.registry
    }

    /// Mutable manager registry
    pub fn registry_mut(&mut self) -> &mut ManagerRegistry {
        &mut self.registry
    }

    /// Services available to managers
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Mutable services
    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Allocate a new entity id
    ///
    /// Fails with [`RegistryError::EntityIdsExhausted`] once the `u32` id
    /// space is used up.
    pub fn create_entity(&mut self) -> Result<Entity, RegistryError> {
        let entity = Entity::new(self.next_entity_id);
        self.next_entity_id = self
            .next_entity_id
            .checked_add(1)
            .ok_or(RegistryError::EntityIdsExhausted)?;
        Ok(entity)
    }

    /// Number of completed updates
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Register a manager
    pub fn add_manager<M: Manager>(&mut self, manager: Shared<M>) -> Result<ManagerId, RegistryError> {
        self.registry.add(manager)
    }

    /// Unregister a manager
    pub fn remove_manager<M: Manager>(&mut self, manager: &Shared<M>) -> bool {
        self.registry.remove(manager)
    }

    /// Instantiate `B`'s default manager if no manager serves `B` or its bases
    pub fn ensure_default_manager<B: Behaviour>(&mut self) -> Result<Option<ManagerId>, RegistryError> {
        let lineage = B::lineage();
        let served = lineage.iter().any(|key| {
            self.registry
                .handler_for(*key)
                .is_some_and(|handler| handler.has_manager())
        });
        if served {
            return Ok(None);
        }
        let Some(tag) = B::default_manager() else {
            return Ok(None);
        };

        let id = tag.instantiate(&mut self.registry, &self.services, &lineage)?;
        log::info!(
            "Instantiated default manager {} for {}",
            tag.manager_type(),
            TypeKey::of::<B>()
        );
        Ok(Some(id))
    }

    /// Queue `behaviour` to be attached at the next update
    pub fn attach<B: Behaviour>(&mut self, behaviour: &Shared<B>) -> Result<(), RegistryError> {
        if self.config.auto_default_managers {
            self.ensure_default_manager::<B>()?;
        }
        self.pending.push(PendingChange::Attach(BehaviourRef::new(behaviour)));
        Ok(())
    }

    /// Queue `behaviour` to be detached at the next update
    pub fn detach(&mut self, behaviour: impl Into<BehaviourRef>) {
        self.pending.push(PendingChange::Detach(behaviour.into()));
    }

    /// Number of queued attach/detach requests
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Apply queued attach and detach requests in order
    ///
    /// Every request is attempted; the first failure is returned.
    pub fn flush(&mut self) -> Result<(), RegistryError> {
        let mut first_error = None;
        for change in std::mem::take(&mut self.pending) {
            let result = match change {
                PendingChange::Attach(behaviour) => {
                    let result = self.apply_attach(&behaviour);
                    if result.is_ok() && !self.attached.iter().any(|other| other.ptr_eq(&behaviour)) {
                        self.attached.push(behaviour);
                    }
                    result
                }
                PendingChange::Detach(behaviour) => {
                    Self::apply_detach(&behaviour);
                    self.attached.retain(|other| !other.ptr_eq(&behaviour));
                    Ok(())
                }
            };
            if let Err(error) = result {
                log::warn!("Failed to apply behaviour change: {}", error);
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn apply_attach(&self, behaviour: &BehaviourRef) -> Result<(), RegistryError> {
        let handler = self
            .registry
            .find_for_ref(behaviour, None)
            .ok_or_else(|| RegistryError::HandlerNotFound(behaviour.type_key()))?;
        handler.add(behaviour)?;
        behaviour.initialise();
        log::trace!("Attached {:?} as {}", behaviour, handler.behaviour_type());
        Ok(())
    }

    fn apply_detach(behaviour: &BehaviourRef) {
        if let Some(handler) = behaviour.binding().and_then(|binding| binding.handler()) {
            handler.remove(behaviour);
        }
        behaviour.set_binding(None);
        behaviour.shutdown();
        log::trace!("Detached {:?}", behaviour);
    }

    /// Apply queued changes, then update every [`Updatable`] manager
    ///
    /// The frame runs even when a queued change fails; the first failure is
    /// returned afterwards.
    pub fn update(&mut self, delta_time: f32) -> Result<(), RegistryError> {
        let flushed = self.flush();
        for manager in self.registry.find_by_type::<dyn Updatable>().snapshot() {
            manager.borrow_mut().update(delta_time);
        }
        self.frame += 1;
        flushed
    }

    /// Draw every [`Drawable`] manager
    pub fn draw(&mut self) {
        for manager in self.registry.find_by_type::<dyn Drawable>().snapshot() {
            manager.borrow_mut().draw();
        }
    }

    /// Apply queued changes, detach every behaviour attached through the
    /// scene, then dispose every manager, newest first
    pub fn shutdown(&mut self) {
        if let Err(error) = self.flush() {
            log::warn!("Behaviour changes failed during shutdown: {}", error);
        }
        for behaviour in std::mem::take(&mut self.attached) {
            if behaviour.is_bound() {
                self.pending.push(PendingChange::Detach(behaviour));
            }
        }
        if let Err(error) = self.flush() {
            log::warn!("Behaviour detach failed during shutdown: {}", error);
        }

        let managers: Vec<_> = self.registry.managers().collect();
        for (id, manager) in managers.into_iter().rev() {
            manager.borrow_mut().dispose();
            log::debug!("Disposed {:?}", id);
        }
        log::info!("Scene shut down after {} frame(s)", self.frame);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
