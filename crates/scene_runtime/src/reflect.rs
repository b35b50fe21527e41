//! Runtime type identity and manager discovery
//!
//! Rust has no interface introspection, so a manager describes itself once
//! through [`Manager::describe`](crate::manager::Manager::describe). The
//! [`DiscoveryCache`] runs that description at most once per concrete manager
//! type and hands out the cached result on every later registration.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::manager::{Manager, ManagerDescriptor};

/// Identity of a Rust type together with its readable name
///
/// Equality and hashing only consider the [`TypeId`]; the name is carried
/// for log output and error messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`, which may be unsized (`dyn Trait`)
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Underlying type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether this key names `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Cache of manager descriptors keyed by concrete manager type
///
/// Owned by a [`ManagerRegistry`](crate::registry::ManagerRegistry), so its
/// lifetime is that of the scene rather than the process.
#[derive(Default)]
pub struct DiscoveryCache {
    descriptors: HashMap<TypeId, Rc<dyn Any>>,
}

impl DiscoveryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the descriptor for `M`, describing the type on first use
    pub fn describe<M: Manager>(&mut self) -> Rc<ManagerDescriptor<M>> {
        let key = TypeKey::of::<M>();

        if let Some(cached) = self.descriptors.get(&key.id()) {
            if let Ok(descriptor) = Rc::clone(cached).downcast::<ManagerDescriptor<M>>() {
                return descriptor;
            }
        }

        let mut descriptor = ManagerDescriptor::new();
        M::describe(&mut descriptor);
        log::trace!(
            "Discovered {} managed behaviour type(s) for {}",
            descriptor.managed_types().count(),
            key
        );

        let descriptor = Rc::new(descriptor);
        self.descriptors
            .insert(key.id(), Rc::clone(&descriptor) as Rc<dyn Any>);
        descriptor
    }

    /// Behaviour types `M` implements the per-type manager contract for
    pub fn managed_types<M: Manager>(&mut self) -> Vec<TypeKey> {
        self.describe::<M>().managed_types().collect()
    }

    /// Check whether `M` has already been described
    pub fn is_cached<M: Manager>(&self) -> bool {
        self.descriptors.contains_key(&TypeId::of::<M>())
    }

    /// Number of described manager types
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check whether nothing has been described yet
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
