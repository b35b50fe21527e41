//! Type-erased handler adapters
//!
//! The registry keeps one [`Handler<T>`] per behaviour type. It survives
//! manager removal and re-registration, so a behaviour's binding keeps
//! resolving to the same handler while managers come and go.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::behaviour::{Behaviour, BehaviourRef, ManagerBinding, Shared};
use crate::config::DetachedAddPolicy;
use crate::error::RegistryError;
use crate::manager::Manages;
use crate::reflect::TypeKey;
use crate::registry::ManagerId;

/// Non-generic routing of behaviours to the manager attached for one type
pub trait BehaviourHandler {
    /// Behaviour type this handler serves
    fn behaviour_type(&self) -> TypeKey;

    /// Bind `behaviour` here, first removing it through whichever handler
    /// it is currently bound to
    fn add(&self, behaviour: &BehaviourRef) -> Result<(), RegistryError>;

    /// Unbind `behaviour` if it is bound through this handler
    ///
    /// Returns `false` without touching anything when the behaviour is bound
    /// elsewhere or not at all.
    fn remove(&self, behaviour: &BehaviourRef) -> bool;

    /// Registry id of the attached manager
    fn manager_id(&self) -> Option<ManagerId>;

    /// Whether a manager is attached
    fn has_manager(&self) -> bool {
        self.manager_id().is_some()
    }

    /// Behaviours queued while no manager was attached
    fn pending_len(&self) -> usize;
}

/// Registry-side control over a handler
pub(crate) trait HandlerControl {
    fn detach(&self) -> Option<ManagerId>;
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Both views of one handler allocation, as stored by the registry
#[derive(Clone)]
pub(crate) struct HandlerEntry {
    pub(crate) handler: Rc<dyn BehaviourHandler>,
    pub(crate) control: Rc<dyn HandlerControl>,
}

struct Attached<T: ?Sized> {
    id: ManagerId,
    manager: Shared<dyn Manages<T>>,
}

impl<T: ?Sized> Clone for Attached<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            manager: Rc::clone(&self.manager),
        }
    }
}

/// Manager this handler was attached to before, still holding behaviours
/// bound through the handler
struct Retired<T: ?Sized> {
    id: ManagerId,
    manager: Weak<RefCell<dyn Manages<T>>>,
}

/// Handler adapter for behaviour type `T`
pub struct Handler<T: ?Sized + Behaviour> {
    this: Weak<Handler<T>>,
    policy: DetachedAddPolicy,
    attached: RefCell<Option<Attached<T>>>,
    retired: RefCell<Vec<Retired<T>>>,
    pending: RefCell<Vec<BehaviourRef>>,
}

impl<T: ?Sized + Behaviour> Handler<T> {
    pub(crate) fn new(policy: DetachedAddPolicy) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            policy,
            attached: RefCell::new(None),
            retired: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
        })
    }

    /// Currently attached manager
    pub fn manager(&self) -> Option<Shared<dyn Manages<T>>> {
        self.attached
            .borrow()
            .as_ref()
            .map(|attached| Rc::clone(&attached.manager))
    }

    fn current(&self) -> Option<Attached<T>> {
        self.attached.borrow().clone()
    }

    fn weak(&self) -> Weak<dyn BehaviourHandler> {
        let weak: Weak<dyn BehaviourHandler> = self.this.clone();
        weak
    }

    /// Attach `manager`, returning the id of the manager it replaces
    pub(crate) fn attach(
        &self,
        id: ManagerId,
        manager: Shared<dyn Manages<T>>,
        migrate: bool,
    ) -> Option<ManagerId> {
        let previous = self.attached.replace(Some(Attached {
            id,
            manager: Rc::clone(&manager),
        }));
        self.retired.borrow_mut().retain(|entry| entry.id != id);

        if let Some(previous) = previous.as_ref().filter(|previous| previous.id != id) {
            self.retire(previous);
            let owned = previous.manager.borrow().behaviours().to_vec();
            if migrate {
                for behaviour in owned.iter() {
                    previous.manager.borrow_mut().remove(behaviour);
                    manager.borrow_mut().add(Rc::clone(behaviour));
                }
                log::debug!(
                    "Migrated {} {} behaviour(s) from {:?} to {:?}",
                    owned.len(),
                    TypeKey::of::<T>(),
                    previous.id,
                    id
                );
            } else if !owned.is_empty() {
                log::warn!(
                    "{:?} replaced {:?} for {}; {} behaviour(s) stay with the replaced manager until removed",
                    id,
                    previous.id,
                    TypeKey::of::<T>(),
                    owned.len()
                );
            }
        }

        self.flush_pending(&manager);
        previous.map(|previous| previous.id)
    }

    fn retire(&self, previous: &Attached<T>) {
        let mut retired = self.retired.borrow_mut();
        retired.retain(|entry| entry.id != previous.id && entry.manager.strong_count() > 0);
        retired.push(Retired {
            id: previous.id,
            manager: Rc::downgrade(&previous.manager),
        });
    }

    /// Remove `behaviour` from the first replaced manager still holding it
    fn remove_from_retired(&self, behaviour: &Shared<T>) -> bool {
        let retired = self.retired.borrow();
        for entry in retired.iter() {
            let Some(manager) = entry.manager.upgrade() else {
                continue;
            };
            if manager.borrow_mut().remove(behaviour) {
                log::debug!(
                    "Removed {} behaviour from replaced manager {:?}",
                    TypeKey::of::<T>(),
                    entry.id
                );
                return true;
            }
        }
        false
    }

    fn flush_pending(&self, manager: &Shared<dyn Manages<T>>) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if pending.is_empty() {
            return;
        }

        let this = self.weak();
        let mut flushed = 0;
        for behaviour in pending {
            let still_here = behaviour
                .binding()
                .is_some_and(|binding| binding.points_to(&this));
            if let (true, Some(typed)) = (still_here, behaviour.view::<T>()) {
                manager.borrow_mut().add(typed);
                flushed += 1;
            }
        }
        log::debug!(
            "Flushed {} deferred {} behaviour(s)",
            flushed,
            TypeKey::of::<T>()
        );
    }
}

impl<T: ?Sized + Behaviour> BehaviourHandler for Handler<T> {
    fn behaviour_type(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    fn add(&self, behaviour: &BehaviourRef) -> Result<(), RegistryError> {
        let typed = behaviour
            .view::<T>()
            .ok_or_else(|| RegistryError::BehaviourTypeMismatch {
                expected: TypeKey::of::<T>(),
                actual: behaviour.type_key(),
            })?;

        let current = self.current();
        if current.is_none() && self.policy == DetachedAddPolicy::Reject {
            return Err(RegistryError::NoManagerAttached {
                behaviour: TypeKey::of::<T>(),
            });
        }

        // Move: detach from wherever the behaviour lives now
        if let Some(binding) = behaviour.binding() {
            match binding.handler() {
                Some(previous) => {
                    previous.remove(behaviour);
                }
                None => behaviour.set_binding(None),
            }
        }

        behaviour.set_binding(Some(ManagerBinding::new(self.weak(), TypeKey::of::<T>())));
        match current {
            Some(current) => current.manager.borrow_mut().add(typed),
            None => {
                log::trace!(
                    "Deferring {:?} until a manager attaches for {}",
                    behaviour,
                    TypeKey::of::<T>()
                );
                self.pending.borrow_mut().push(behaviour.clone());
            }
        }
        Ok(())
    }

    fn remove(&self, behaviour: &BehaviourRef) -> bool {
        let bound_here = behaviour
            .binding()
            .is_some_and(|binding| binding.points_to(&self.weak()));
        if !bound_here {
            return false;
        }

        behaviour.set_binding(None);
        if let Some(typed) = behaviour.view::<T>() {
            let mut removed = false;
            if let Some(current) = self.current() {
                removed = current.manager.borrow_mut().remove(&typed);
            }
            if !removed {
                self.remove_from_retired(&typed);
            }
        }
        self.pending.borrow_mut().retain(|queued| !queued.ptr_eq(behaviour));
        true
    }

    fn manager_id(&self) -> Option<ManagerId> {
        self.attached.borrow().as_ref().map(|attached| attached.id)
    }

    fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl<T: ?Sized + Behaviour> HandlerControl for Handler<T> {
    fn detach(&self) -> Option<ManagerId> {
        let previous = self.attached.take()?;
        self.retire(&previous);
        Some(previous.id)
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl<T: ?Sized + Behaviour> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("behaviour", &TypeKey::of::<T>())
            .field("manager", &self.manager_id())
            .field("pending", &self.pending_len())
            .finish()
    }
}

pub(crate) fn create_handler<T: ?Sized + Behaviour>(policy: DetachedAddPolicy) -> HandlerEntry {
    let handler = Handler::<T>::new(policy);
    HandlerEntry {
        handler: Rc::clone(&handler) as Rc<dyn BehaviourHandler>,
        control: handler,
    }
}

pub(crate) fn attach_handler<M, T>(
    entry: &HandlerEntry,
    manager: &Shared<M>,
    id: ManagerId,
    migrate: bool,
) -> Option<ManagerId>
where
    T: ?Sized + Behaviour,
    M: Manages<T>,
{
    let Ok(handler) = Rc::clone(&entry.control).as_any_rc().downcast::<Handler<T>>() else {
        log::error!("Handler registered for {} has the wrong type", TypeKey::of::<T>());
        return None;
    };
    let manager: Shared<dyn Manages<T>> = Rc::clone(manager) as Shared<M>;
    handler.attach(id, manager, migrate)
}
