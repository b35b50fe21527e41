//! Manager registry
//!
//! Central index of a scene's managers. It holds:
//!
//! - every registered manager, in registration order and by concrete type
//! - one [`Handler`] per behaviour type that has ever had a manager attached
//! - lazily created capability lists answering "every manager that can be
//!   viewed as `C`", kept current by every later add and remove

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::behaviour::{Behaviour, BehaviourRef, Shared};
use crate::config::{DuplicatePolicy, RegistryConfig};
use crate::error::RegistryError;
use crate::handler::{BehaviourHandler, Handler, HandlerEntry};
use crate::manager::{ErasedDescriptor, Manager};
use crate::reflect::{DiscoveryCache, TypeKey};

new_key_type! {
    /// Stable identity of one registered manager instance
    pub struct ManagerId;
}

struct ManagerEntry {
    key: TypeKey,
    instance: Rc<dyn Any>,
    manager: Shared<dyn Manager>,
    descriptor: Rc<dyn ErasedDescriptor>,
}

type CategoryItems<C> = Rc<RefCell<Vec<(ManagerId, Shared<C>)>>>;

/// Maintenance interface over one capability list
trait CategoryIndex {
    fn insert(&self, id: ManagerId, item: Box<dyn Any>);
    fn remove(&self, id: ManagerId) -> bool;
    fn clear(&self);
    fn as_any(&self) -> &dyn Any;
}

struct Category<C: ?Sized> {
    items: CategoryItems<C>,
}

impl<C: ?Sized + 'static> CategoryIndex for Category<C> {
    fn insert(&self, id: ManagerId, item: Box<dyn Any>) {
        match item.downcast::<Shared<C>>() {
            Ok(item) => self.items.borrow_mut().push((id, *item)),
            Err(_) => log::error!("Capability cast for {} produced the wrong type", TypeKey::of::<C>()),
        }
    }

    fn remove(&self, id: ManagerId) -> bool {
        let mut items = self.items.borrow_mut();
        let before = items.len();
        items.retain(|(item_id, _)| *item_id != id);
        items.len() != before
    }

    fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Read-only, live view of every registered manager viewable as `C`
///
/// The view shares storage with the registry, so it reflects managers added
/// or removed after it was handed out.
pub struct CategoryView<C: ?Sized> {
    items: CategoryItems<C>,
}

impl<C: ?Sized> Clone for CategoryView<C> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
        }
    }
}

impl<C: ?Sized> CategoryView<C> {
    /// Number of managers in the category
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check whether the category is empty
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Check whether the manager with `id` is in the category
    pub fn contains(&self, id: ManagerId) -> bool {
        self.items.borrow().iter().any(|(item_id, _)| *item_id == id)
    }

    /// Ids of the managers in the category, in insertion order
    pub fn ids(&self) -> Vec<ManagerId> {
        self.items.borrow().iter().map(|(id, _)| *id).collect()
    }

    /// Copy of the current members, safe to iterate while the registry changes
    pub fn snapshot(&self) -> Vec<Shared<C>> {
        self.items
            .borrow()
            .iter()
            .map(|(_, item)| Rc::clone(item))
            .collect()
    }

    /// Check whether two views share the same backing list
    pub fn same_list(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

impl<C: ?Sized> fmt::Debug for CategoryView<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// Registry of a scene's managers and behaviour handlers
pub struct ManagerRegistry {
    config: RegistryConfig,
    entries: SlotMap<ManagerId, ManagerEntry>,
    order: Vec<ManagerId>,
    by_type: HashMap<TypeId, ManagerId>,
    handlers: HashMap<TypeId, HandlerEntry>,
    categories: HashMap<TypeId, Box<dyn CategoryIndex>>,
    discovery: DiscoveryCache,
}

impl ManagerRegistry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: SlotMap::with_key(),
            order: Vec::new(),
            by_type: HashMap::new(),
            handlers: HashMap::new(),
            categories: HashMap::new(),
            discovery: DiscoveryCache::new(),
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Manager discovery cache
    pub fn discovery_mut(&mut self) -> &mut DiscoveryCache {
        &mut self.discovery
    }

    /// Register a manager
    ///
    /// Attaches it to the handler of every behaviour type it manages,
    /// creating handlers as needed, and appends it to every capability list
    /// already built for a type it can be viewed as. Registering an instance
    /// that is already present returns its existing id.
    pub fn add<M: Manager>(&mut self, manager: Shared<M>) -> Result<ManagerId, RegistryError> {
        if let Some(id) = self.id_of(&manager) {
            log::debug!("{} is already registered as {:?}", TypeKey::of::<M>(), id);
            return Ok(id);
        }

        let key = TypeKey::of::<M>();
        let descriptor = self.discovery.describe::<M>();

        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            for behaviour in descriptor.managed_types() {
                if let Some(existing) = self.attached_manager_type(behaviour) {
                    return Err(RegistryError::DuplicateManager { behaviour, existing });
                }
            }
        }

        let id = self.entries.insert(ManagerEntry {
            key,
            instance: Rc::clone(&manager) as Shared<M>,
            manager: Rc::clone(&manager) as Shared<M>,
            descriptor: Rc::clone(&descriptor) as Rc<dyn ErasedDescriptor>,
        });
        self.order.push(id);
        if let Some(replaced) = self.by_type.insert(key.id(), id) {
            log::debug!("{:?} shadows {:?} for type lookups of {}", id, replaced, key);
        }

        let policy = self.config.detached_add;
        let migrate = self.config.duplicate_policy == DuplicatePolicy::Migrate;
        for managed in descriptor.managed() {
            let entry = self.handlers.entry(managed.key.id()).or_insert_with(|| {
                log::debug!("Creating handler for {}", managed.key);
                (managed.create)(policy)
            });
            (managed.attach)(entry, &manager, id, migrate);
        }

        for capability in descriptor.capability_types() {
            if let Some(category) = self.categories.get(&capability.id()) {
                if let Some(item) = descriptor.cast(&manager, capability.id()) {
                    category.insert(id, item);
                }
            }
        }

        log::debug!("Registered {} as {:?}", key, id);
        Ok(id)
    }

    /// Unregister a manager instance, returning whether it was present
    pub fn remove<M: Manager>(&mut self, manager: &Shared<M>) -> bool {
        self.id_of(manager).is_some_and(|id| self.remove_by_id(id))
    }

    /// Unregister the manager with `id`, returning whether it was present
    ///
    /// Handlers it was attached to stay in place without a manager; the
    /// behaviours bound through them are left where they are.
    pub fn remove_by_id(&mut self, id: ManagerId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.order.retain(|other| *other != id);

        if self.by_type.get(&entry.key.id()) == Some(&id) {
            let fallback = self
                .order
                .iter()
                .rev()
                .copied()
                .find(|other| self.entries.get(*other).is_some_and(|e| e.key == entry.key));
            match fallback {
                Some(fallback) => self.by_type.insert(entry.key.id(), fallback),
                None => self.by_type.remove(&entry.key.id()),
            };
        }

        for behaviour in entry.descriptor.managed_types() {
            if let Some(handler) = self.handlers.get(&behaviour.id()) {
                if handler.handler.manager_id() == Some(id) {
                    handler.control.detach();
                    log::debug!("Detached handler for {} from {:?}", behaviour, id);
                }
            }
        }

        for capability in entry.descriptor.capability_types() {
            if let Some(category) = self.categories.get(&capability.id()) {
                category.remove(id);
            }
        }

        log::debug!("Removed {} ({:?})", entry.key, id);
        true
    }

    /// Drop every manager and handler
    ///
    /// Capability lists already handed out are emptied in place, so
    /// outstanding views stay valid and report no managers.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.by_type.clear();
        self.handlers.clear();
        for category in self.categories.values() {
            category.clear();
        }
        log::debug!("Cleared manager registry");
    }

    /// Number of registered managers
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check whether no managers are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered managers in registration order
    pub fn managers(&self) -> impl Iterator<Item = (ManagerId, Shared<dyn Manager>)> + '_ {
        self.order.iter().filter_map(move |id| {
            self.entries
                .get(*id)
                .map(|entry| (*id, Rc::clone(&entry.manager)))
        })
    }

    /// Id of a registered manager instance
    pub fn id_of<M: Manager>(&self, manager: &Shared<M>) -> Option<ManagerId> {
        self.order.iter().copied().find(|id| {
            self.entries
                .get(*id)
                .is_some_and(|entry| std::ptr::addr_eq(Rc::as_ptr(&entry.instance), Rc::as_ptr(manager)))
        })
    }

    /// Concrete type of the manager with `id`
    pub fn type_of(&self, id: ManagerId) -> Option<TypeKey> {
        self.entries.get(id).map(|entry| entry.key)
    }

    /// Check whether a manager of concrete type `M` is registered
    pub fn contains<M: Manager>(&self) -> bool {
        self.contains_type(TypeId::of::<M>())
    }

    /// Check whether a manager of the given concrete type is registered
    pub fn contains_type(&self, manager_type: TypeId) -> bool {
        self.by_type.contains_key(&manager_type)
    }

    /// Check whether this exact manager instance is registered
    pub fn contains_instance<M: Manager>(&self, manager: &Shared<M>) -> bool {
        self.id_of(manager).is_some()
    }

    /// Check whether a handler exists for behaviour type `B`
    pub fn contains_for_behaviour<B: ?Sized + Behaviour>(&self) -> bool {
        self.contains_for_behaviour_type(TypeKey::of::<B>())
    }

    /// Check whether a handler exists for the given behaviour type
    pub fn contains_for_behaviour_type(&self, behaviour: TypeKey) -> bool {
        self.handlers.contains_key(&behaviour.id())
    }

    /// Manager of concrete type `M`; the most recently registered one wins
    pub fn get<M: Manager>(&self) -> Result<Shared<M>, RegistryError> {
        self.try_get::<M>()
            .ok_or_else(|| RegistryError::ManagerNotFound(TypeKey::of::<M>()))
    }

    /// Manager of concrete type `M`, if registered
    pub fn try_get<M: Manager>(&self) -> Option<Shared<M>> {
        let id = self.by_type.get(&TypeId::of::<M>())?;
        let entry = self.entries.get(*id)?;
        Rc::clone(&entry.instance).downcast::<RefCell<M>>().ok()
    }

    /// Manager registered under `id`
    pub fn get_by_id(&self, id: ManagerId) -> Option<Shared<dyn Manager>> {
        self.entries.get(id).map(|entry| Rc::clone(&entry.manager))
    }

    /// Handler for exactly behaviour type `B`
    pub fn get_by_behaviour<B: ?Sized + Behaviour>(&self) -> Result<Rc<Handler<B>>, RegistryError> {
        self.try_get_by_behaviour::<B>()
            .ok_or_else(|| RegistryError::HandlerNotFound(TypeKey::of::<B>()))
    }

    /// Handler for exactly behaviour type `B`, if one exists
    pub fn try_get_by_behaviour<B: ?Sized + Behaviour>(&self) -> Option<Rc<Handler<B>>> {
        let entry = self.handlers.get(&TypeId::of::<B>())?;
        Rc::clone(&entry.control).as_any_rc().downcast::<Handler<B>>().ok()
    }

    /// Type-erased handler for exactly the given behaviour type
    pub fn handler_for(&self, behaviour: TypeKey) -> Option<Rc<dyn BehaviourHandler>> {
        self.handlers
            .get(&behaviour.id())
            .map(|entry| Rc::clone(&entry.handler))
    }

    /// Number of handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// First handler along `lineage`, nearest type first
    ///
    /// With a `filter`, a handler only matches while that manager is the one
    /// attached to it; otherwise the search continues with the next base.
    pub fn find(&self, lineage: &[TypeKey], filter: Option<ManagerId>) -> Option<Rc<dyn BehaviourHandler>> {
        lineage.iter().find_map(|behaviour| {
            let entry = self.handlers.get(&behaviour.id())?;
            match filter {
                Some(filter) if entry.handler.manager_id() != Some(filter) => None,
                _ => Some(Rc::clone(&entry.handler)),
            }
        })
    }

    /// [`find`](Self::find) along the lineage of behaviour type `B`
    pub fn find_for<B: Behaviour>(&self, filter: Option<ManagerId>) -> Option<Rc<dyn BehaviourHandler>> {
        self.find(&B::lineage(), filter)
    }

    /// [`find`](Self::find) along the lineage of a live behaviour
    pub fn find_for_ref(&self, behaviour: &BehaviourRef, filter: Option<ManagerId>) -> Option<Rc<dyn BehaviourHandler>> {
        self.find(&behaviour.lineage(), filter)
    }

    /// Every registered manager viewable as `C`
    ///
    /// The first call for a given `C` builds the list from the managers
    /// registered at that point; later calls return the same list.
    pub fn find_by_type<C: ?Sized + 'static>(&mut self) -> CategoryView<C> {
        let key = TypeKey::of::<C>();
        if let Some(existing) = self.categories.get(&key.id()) {
            if let Some(category) = existing.as_any().downcast_ref::<Category<C>>() {
                return CategoryView {
                    items: Rc::clone(&category.items),
                };
            }
        }

        let category = Category::<C> {
            items: Rc::new(RefCell::new(Vec::new())),
        };
        for id in &self.order {
            let Some(entry) = self.entries.get(*id) else {
                continue;
            };
            if let Some(item) = entry.descriptor.cast(&entry.instance, key.id()) {
                category.insert(*id, item);
            }
        }
        log::debug!(
            "Built capability list for {} with {} manager(s)",
            key,
            category.items.borrow().len()
        );

        let view = CategoryView {
            items: Rc::clone(&category.items),
        };
        self.categories.insert(key.id(), Box::new(category));
        view
    }

    fn attached_manager_type(&self, behaviour: TypeKey) -> Option<TypeKey> {
        let id = self.handlers.get(&behaviour.id())?.handler.manager_id()?;
        self.type_of(id)
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
