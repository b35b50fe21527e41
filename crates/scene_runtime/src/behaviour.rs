//! Behaviours: units of per-entity functionality
//!
//! A behaviour carries no update logic of its own. It is stored in exactly one
//! manager at a time, and records which handler put it there in its
//! [`ManagerBinding`]. The binding is a weak lookup relation; the manager's
//! sequence is what owns the behaviour.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::de::DeserializeOwned;

use crate::config::ConfigError;
use crate::entity::Entity;
use crate::handler::BehaviourHandler;
use crate::reflect::TypeKey;
use crate::scene::DefaultManager;

/// Shared, single-owner-per-frame handle to a behaviour or manager
pub type Shared<T> = Rc<RefCell<T>>;

/// Wrap a value in a [`Shared`] handle
pub fn share<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Record of the handler a behaviour is currently bound through
#[derive(Clone)]
pub struct ManagerBinding {
    handler: Weak<dyn BehaviourHandler>,
    bound_as: TypeKey,
}

impl ManagerBinding {
    pub(crate) fn new(handler: Weak<dyn BehaviourHandler>, bound_as: TypeKey) -> Self {
        Self { handler, bound_as }
    }

    /// Handler the behaviour is bound through, if it is still alive
    pub fn handler(&self) -> Option<Rc<dyn BehaviourHandler>> {
        self.handler.upgrade()
    }

    /// Behaviour type the behaviour was bound as
    pub fn bound_as(&self) -> TypeKey {
        self.bound_as
    }

    /// Check whether this binding points at `handler`
    pub fn points_to(&self, handler: &Weak<dyn BehaviourHandler>) -> bool {
        std::ptr::addr_eq(self.handler.as_ptr(), handler.as_ptr())
    }
}

impl fmt::Debug for ManagerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerBinding")
            .field("bound_as", &self.bound_as)
            .field("live", &(self.handler.strong_count() > 0))
            .finish()
    }
}

/// State every behaviour carries
#[derive(Debug, Default)]
pub struct BehaviourCore {
    name: Option<String>,
    owner: Option<Entity>,
    settings: Option<ron::Value>,
    ready: bool,
    binding: Option<ManagerBinding>,
}

impl BehaviourCore {
    /// Create a detached, unnamed core
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the display name
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Owning entity
    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    /// Set the owning entity
    pub fn set_owner(&mut self, owner: Option<Entity>) {
        self.owner = owner;
    }

    /// Raw settings blob
    pub fn settings(&self) -> Option<&ron::Value> {
        self.settings.as_ref()
    }

    /// Replace the settings blob
    pub fn set_settings(&mut self, settings: Option<ron::Value>) {
        self.settings = settings;
    }

    /// Parse the settings blob from RON text
    pub fn load_settings(&mut self, source: &str) -> Result<(), ConfigError> {
        let value: ron::Value =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        self.settings = Some(value);
        Ok(())
    }

    /// Deserialize the settings blob into a typed settings struct
    pub fn settings_as<S: DeserializeOwned>(&self) -> Result<Option<S>, ConfigError> {
        self.settings
            .clone()
            .map(|value| value.into_rust::<S>())
            .transpose()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Whether `initialise` has run since the last `shutdown`
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Current manager binding
    pub fn binding(&self) -> Option<&ManagerBinding> {
        self.binding.as_ref()
    }

    /// Whether the behaviour is bound through a handler
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub(crate) fn set_binding(&mut self, binding: Option<ManagerBinding>) {
        self.binding = binding;
    }
}

/// A unit of functionality owned by one entity at a time
///
/// Base behaviour types are modelled as traits extending `Behaviour`; a
/// concrete type lists them in [`lineage`](Behaviour::lineage) and provides
/// the coercions in [`upcast`](Behaviour::upcast).
pub trait Behaviour: Any {
    /// Shared behaviour state
    fn core(&self) -> &BehaviourCore;

    /// Mutable shared behaviour state
    fn core_mut(&mut self) -> &mut BehaviourCore;

    /// Prepare for use. Runs again each time a recycled instance is attached.
    fn initialise(&mut self) {}

    /// Release per-attachment state. Runs after the behaviour is detached,
    /// whether or not `initialise` ran before it.
    fn shutdown(&mut self) {}

    /// This type followed by its base behaviour types, nearest first
    fn lineage() -> Vec<TypeKey>
    where
        Self: Sized,
    {
        vec![TypeKey::of::<Self>()]
    }

    /// View `this` as the base behaviour type `target`, boxed as a
    /// `Shared<target>`
    fn upcast(this: Shared<Self>, target: TypeId) -> Option<Box<dyn Any>>
    where
        Self: Sized,
    {
        let _ = (this, target);
        None
    }

    /// Manager the host instantiates when none serves this type
    fn default_manager() -> Option<DefaultManager>
    where
        Self: Sized,
    {
        None
    }
}

/// Object-safe view over a `RefCell<B>` for any behaviour type `B`
pub(crate) trait ErasedBehaviour {
    fn type_key(&self) -> TypeKey;
    fn lineage(&self) -> Vec<TypeKey>;
    fn name(&self) -> Option<String>;
    fn binding(&self) -> Option<ManagerBinding>;
    fn set_binding(&self, binding: Option<ManagerBinding>);
    fn initialise(&self);
    fn shutdown(&self);
    fn view(self: Rc<Self>, target: TypeId) -> Option<Box<dyn Any>>;
}

impl<B: Behaviour> ErasedBehaviour for RefCell<B> {
    fn type_key(&self) -> TypeKey {
        TypeKey::of::<B>()
    }

    fn lineage(&self) -> Vec<TypeKey> {
        B::lineage()
    }

    fn name(&self) -> Option<String> {
        self.borrow().core().name().map(str::to_owned)
    }

    fn binding(&self) -> Option<ManagerBinding> {
        self.borrow().core().binding().cloned()
    }

    fn set_binding(&self, binding: Option<ManagerBinding>) {
        self.borrow_mut().core_mut().set_binding(binding);
    }

    fn initialise(&self) {
        let mut behaviour = self.borrow_mut();
        behaviour.initialise();
        behaviour.core_mut().set_ready(true);
    }

    fn shutdown(&self) {
        let mut behaviour = self.borrow_mut();
        behaviour.shutdown();
        behaviour.core_mut().set_ready(false);
    }

    fn view(self: Rc<Self>, target: TypeId) -> Option<Box<dyn Any>> {
        if target == TypeId::of::<B>() {
            Some(Box::new(self))
        } else {
            B::upcast(self, target)
        }
    }
}

/// Type-erased handle to a live behaviour
#[derive(Clone)]
pub struct BehaviourRef {
    cell: Rc<dyn ErasedBehaviour>,
}

impl BehaviourRef {
    /// Erase a concrete behaviour handle
    pub fn new<B: Behaviour>(behaviour: &Shared<B>) -> Self {
        let cell: Rc<dyn ErasedBehaviour> = Rc::clone(behaviour) as Rc<RefCell<B>>;
        Self { cell }
    }

    /// Concrete behaviour type
    pub fn type_key(&self) -> TypeKey {
        self.cell.type_key()
    }

    /// Concrete type followed by its base behaviour types
    pub fn lineage(&self) -> Vec<TypeKey> {
        self.cell.lineage()
    }

    /// Display name
    pub fn name(&self) -> Option<String> {
        self.cell.name()
    }

    /// Current manager binding
    pub fn binding(&self) -> Option<ManagerBinding> {
        self.cell.binding()
    }

    /// Whether the behaviour is bound through a handler
    pub fn is_bound(&self) -> bool {
        self.binding().is_some()
    }

    /// View the behaviour as `T`, its own type or one of its bases
    pub fn view<T: ?Sized + 'static>(&self) -> Option<Shared<T>> {
        Rc::clone(&self.cell)
            .view(TypeId::of::<T>())?
            .downcast::<Shared<T>>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Check whether both handles refer to the same behaviour
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.cell), Rc::as_ptr(&other.cell))
    }

    /// Check whether this handle refers to `behaviour`
    pub fn is<T: ?Sized>(&self, behaviour: &Shared<T>) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.cell), Rc::as_ptr(behaviour))
    }

    pub(crate) fn set_binding(&self, binding: Option<ManagerBinding>) {
        self.cell.set_binding(binding);
    }

    pub(crate) fn initialise(&self) {
        self.cell.initialise();
    }

    pub(crate) fn shutdown(&self) {
        self.cell.shutdown();
    }
}

impl<B: Behaviour> From<&Shared<B>> for BehaviourRef {
    fn from(behaviour: &Shared<B>) -> Self {
        Self::new(behaviour)
    }
}

impl fmt::Debug for BehaviourRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviourRef")
            .field("type", &self.type_key())
            .field("name", &self.name())
            .finish()
    }
}
