//! Managers: batch processors for one or more behaviour types
//!
//! A manager implements the non-generic [`Manager`] contract once and the
//! per-type [`Manages<T>`] contract for every behaviour type it processes.
//! [`Manager::describe`] declares those types, plus any capability traits the
//! manager can be viewed as, so the registry can index it without runtime
//! reflection.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::behaviour::{Behaviour, Shared};
use crate::config::DetachedAddPolicy;
use crate::handler::{self, HandlerEntry};
use crate::reflect::TypeKey;
use crate::registry::ManagerId;
use crate::scene::{FromServices, Services};

/// Non-generic manager contract
pub trait Manager: Any {
    /// Whether [`dispose`](Manager::dispose) has run
    fn is_disposed(&self) -> bool;

    /// Release every owned behaviour. Calling twice is a no-op.
    fn dispose(&mut self);

    /// Declare managed behaviour types and capabilities
    fn describe(descriptor: &mut ManagerDescriptor<Self>)
    where
        Self: Sized;
}

/// Per-behaviour-type manager contract
pub trait Manages<T: ?Sized + Behaviour>: Manager {
    /// Append a behaviour to the owned sequence
    fn add(&mut self, behaviour: Shared<T>);

    /// Remove a behaviour, returning whether it was present
    fn remove(&mut self, behaviour: &Shared<T>) -> bool;

    /// Owned behaviours in insertion order
    fn behaviours(&self) -> &[Shared<T>];
}

type CreateHandlerFn = fn(DetachedAddPolicy) -> HandlerEntry;
type AttachFn<M> = fn(&HandlerEntry, &Shared<M>, ManagerId, bool) -> Option<ManagerId>;
type CastFn<M> = Box<dyn Fn(&Shared<M>) -> Box<dyn Any>>;

pub(crate) struct ManagedType<M> {
    pub(crate) key: TypeKey,
    pub(crate) create: CreateHandlerFn,
    pub(crate) attach: AttachFn<M>,
}

struct Capability<M> {
    key: TypeKey,
    cast: CastFn<M>,
}

/// Self-description of a concrete manager type
///
/// Every descriptor starts out with the manager's own type and `dyn Manager`
/// as capabilities.
pub struct ManagerDescriptor<M> {
    managed: Vec<ManagedType<M>>,
    capabilities: Vec<Capability<M>>,
}

impl<M: Manager> ManagerDescriptor<M> {
    pub(crate) fn new() -> Self {
        let mut descriptor = Self {
            managed: Vec::new(),
            capabilities: Vec::new(),
        };
        descriptor.capability::<M>(|manager| manager);
        descriptor.capability::<dyn Manager>(|manager| manager);
        descriptor
    }

    /// Declare that `M` processes behaviours of type `T`
    pub fn manages<T>(&mut self) -> &mut Self
    where
        T: ?Sized + Behaviour,
        M: Manages<T>,
    {
        let key = TypeKey::of::<T>();
        if !self.manages_type(key) {
            self.managed.push(ManagedType {
                key,
                create: handler::create_handler::<T>,
                attach: handler::attach_handler::<M, T>,
            });
        }
        self
    }

    /// Declare that `M` can be viewed as `C`, usually a `dyn Trait`
    pub fn capability<C: ?Sized + 'static>(&mut self, cast: fn(Shared<M>) -> Shared<C>) -> &mut Self {
        let key = TypeKey::of::<C>();
        let erased: CastFn<M> = Box::new(move |manager: &Shared<M>| -> Box<dyn Any> {
            Box::new(cast(Rc::clone(manager)))
        });
        match self.capabilities.iter_mut().find(|c| c.key == key) {
            Some(existing) => existing.cast = erased,
            None => self.capabilities.push(Capability { key, cast: erased }),
        }
        self
    }

    /// Declared behaviour types
    pub fn managed_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.managed.iter().map(|managed| managed.key)
    }

    /// Declared capability types, including `M` and `dyn Manager`
    pub fn capability_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.capabilities.iter().map(|capability| capability.key)
    }

    /// Check whether `M` manages behaviour type `key`
    pub fn manages_type(&self, key: TypeKey) -> bool {
        self.managed.iter().any(|managed| managed.key == key)
    }

    pub(crate) fn managed(&self) -> &[ManagedType<M>] {
        &self.managed
    }

    pub(crate) fn cast(&self, manager: &Shared<M>, capability: TypeId) -> Option<Box<dyn Any>> {
        self.capabilities
            .iter()
            .find(|c| c.key.id() == capability)
            .map(|c| (c.cast)(manager))
    }
}

/// Descriptor operations that do not need the concrete manager type
pub(crate) trait ErasedDescriptor {
    fn managed_types(&self) -> Vec<TypeKey>;
    fn capability_types(&self) -> Vec<TypeKey>;
    fn cast(&self, instance: &Rc<dyn Any>, capability: TypeId) -> Option<Box<dyn Any>>;
}

impl<M: Manager> ErasedDescriptor for ManagerDescriptor<M> {
    fn managed_types(&self) -> Vec<TypeKey> {
        ManagerDescriptor::managed_types(self).collect()
    }

    fn capability_types(&self) -> Vec<TypeKey> {
        ManagerDescriptor::capability_types(self).collect()
    }

    fn cast(&self, instance: &Rc<dyn Any>, capability: TypeId) -> Option<Box<dyn Any>> {
        let manager = Rc::clone(instance).downcast::<RefCell<M>>().ok()?;
        ManagerDescriptor::cast(self, &manager, capability)
    }
}

/// Stock manager holding an ordered sequence of `T` behaviours
///
/// Concrete managers usually wrap one of these per behaviour type and
/// delegate their [`Manages`] implementations to it.
pub struct BehaviourManager<T: ?Sized + Behaviour> {
    behaviours: Vec<Shared<T>>,
    disposed: bool,
}

impl<T: ?Sized + Behaviour> BehaviourManager<T> {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            behaviours: Vec::new(),
            disposed: false,
        }
    }

    /// Number of owned behaviours
    pub fn len(&self) -> usize {
        self.behaviours.len()
    }

    /// Check whether no behaviours are owned
    pub fn is_empty(&self) -> bool {
        self.behaviours.is_empty()
    }

    /// Iterate owned behaviours in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Shared<T>> {
        self.behaviours.iter()
    }

    /// Check whether `behaviour` is owned by this manager
    pub fn contains(&self, behaviour: &Shared<T>) -> bool {
        self.behaviours.iter().any(|b| Rc::ptr_eq(b, behaviour))
    }

    /// Add a behaviour
    pub fn add(&mut self, behaviour: Shared<T>) {
        self.behaviours.push(behaviour);
    }

    /// Remove a behaviour, returning whether it was present
    pub fn remove(&mut self, behaviour: &Shared<T>) -> bool {
        match self.behaviours.iter().position(|b| Rc::ptr_eq(b, behaviour)) {
            Some(index) => {
                self.behaviours.remove(index);
                true
            }
            None => false,
        }
    }

    /// Owned behaviours
    pub fn behaviours(&self) -> &[Shared<T>] {
        &self.behaviours
    }

    /// Whether [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Remove every behaviour, highest index first, clearing its binding
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for index in (0..self.behaviours.len()).rev() {
            let behaviour = self.behaviours.remove(index);
            behaviour.borrow_mut().core_mut().set_binding(None);
        }
        self.disposed = true;
    }
}

impl<T: ?Sized + Behaviour> Default for BehaviourManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Behaviour> Manager for BehaviourManager<T> {
    fn is_disposed(&self) -> bool {
        BehaviourManager::is_disposed(self)
    }

    fn dispose(&mut self) {
        BehaviourManager::dispose(self);
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor.manages::<T>();
    }
}

impl<T: ?Sized + Behaviour> Manages<T> for BehaviourManager<T> {
    fn add(&mut self, behaviour: Shared<T>) {
        BehaviourManager::add(self, behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<T>) -> bool {
        BehaviourManager::remove(self, behaviour)
    }

    fn behaviours(&self) -> &[Shared<T>] {
        BehaviourManager::behaviours(self)
    }
}

impl<T: ?Sized + Behaviour> FromServices for BehaviourManager<T> {
    fn from_services(_services: &Services) -> Self {
        Self::new()
    }
}
