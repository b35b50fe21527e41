//! Shared fixtures for unit tests

use std::any::{Any, TypeId};

use crate::behaviour::{Behaviour, BehaviourCore, Shared};
use crate::manager::{BehaviourManager, Manager, ManagerDescriptor, Manages};
use crate::reflect::TypeKey;
use crate::scene::{DefaultManager, Drawable};

pub(crate) use crate::scene::Updatable;

/// Base behaviour type shared by dogs and cats
pub(crate) trait Animal: Behaviour {
    fn sound(&self) -> &'static str;
}

fn upcast_animal<B: Animal>(this: Shared<B>, target: TypeId) -> Option<Box<dyn Any>> {
    if target == TypeId::of::<dyn Animal>() {
        let animal: Shared<dyn Animal> = this;
        Some(Box::new(animal))
    } else {
        None
    }
}

#[derive(Default)]
pub(crate) struct Dog {
    core: BehaviourCore,
    pub(crate) initialised: u32,
    pub(crate) shutdowns: u32,
}

impl Dog {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            core: BehaviourCore::new().with_name(name),
            initialised: 0,
            shutdowns: 0,
        }
    }
}

impl Behaviour for Dog {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }

    fn initialise(&mut self) {
        self.initialised += 1;
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }

    fn lineage() -> Vec<TypeKey> {
        vec![TypeKey::of::<Self>(), TypeKey::of::<dyn Animal>()]
    }

    fn upcast(this: Shared<Self>, target: TypeId) -> Option<Box<dyn Any>> {
        upcast_animal(this, target)
    }
}

impl Animal for Dog {
    fn sound(&self) -> &'static str {
        "woof"
    }
}

#[derive(Default)]
pub(crate) struct Cat {
    core: BehaviourCore,
}

impl Cat {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            core: BehaviourCore::new().with_name(name),
        }
    }
}

impl Behaviour for Cat {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }

    fn lineage() -> Vec<TypeKey> {
        vec![TypeKey::of::<Self>(), TypeKey::of::<dyn Animal>()]
    }

    fn upcast(this: Shared<Self>, target: TypeId) -> Option<Box<dyn Any>> {
        upcast_animal(this, target)
    }
}

impl Animal for Cat {
    fn sound(&self) -> &'static str {
        "meow"
    }
}

/// Behaviour with a valid default manager
pub(crate) struct Bird {
    core: BehaviourCore,
}

impl Bird {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            core: BehaviourCore::new().with_name(name),
        }
    }
}

impl Behaviour for Bird {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }

    fn default_manager() -> Option<DefaultManager> {
        Some(DefaultManager::of::<BehaviourManager<Self>>())
    }
}

/// Behaviour whose default manager manages something else
pub(crate) struct Fish {
    core: BehaviourCore,
}

impl Fish {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            core: BehaviourCore::new().with_name(name),
        }
    }
}

impl Behaviour for Fish {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }

    fn default_manager() -> Option<DefaultManager> {
        Some(DefaultManager::of::<BehaviourManager<Bird>>())
    }
}

#[derive(Default)]
pub(crate) struct DogManager {
    dogs: BehaviourManager<Dog>,
    pub(crate) updates: u32,
}

impl Manager for DogManager {
    fn is_disposed(&self) -> bool {
        self.dogs.is_disposed()
    }

    fn dispose(&mut self) {
        self.dogs.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor
            .manages::<Dog>()
            .capability::<dyn Updatable>(|manager| manager);
    }
}

impl Manages<Dog> for DogManager {
    fn add(&mut self, behaviour: Shared<Dog>) {
        self.dogs.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Dog>) -> bool {
        self.dogs.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Dog>] {
        self.dogs.behaviours()
    }
}

impl Updatable for DogManager {
    fn update(&mut self, _delta_time: f32) {
        self.updates += 1;
    }
}

#[derive(Default)]
pub(crate) struct CatManager {
    cats: BehaviourManager<Cat>,
    pub(crate) updates: u32,
}

impl Manager for CatManager {
    fn is_disposed(&self) -> bool {
        self.cats.is_disposed()
    }

    fn dispose(&mut self) {
        self.cats.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor
            .manages::<Cat>()
            .capability::<dyn Updatable>(|manager| manager);
    }
}

impl Manages<Cat> for CatManager {
    fn add(&mut self, behaviour: Shared<Cat>) {
        self.cats.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Cat>) -> bool {
        self.cats.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Cat>] {
        self.cats.behaviours()
    }
}

impl Updatable for CatManager {
    fn update(&mut self, _delta_time: f32) {
        self.updates += 1;
    }
}

/// Manages both dogs and cats
#[derive(Default)]
pub(crate) struct PetManager {
    dogs: BehaviourManager<Dog>,
    cats: BehaviourManager<Cat>,
    pub(crate) updates: u32,
}

impl Manager for PetManager {
    fn is_disposed(&self) -> bool {
        self.dogs.is_disposed() && self.cats.is_disposed()
    }

    fn dispose(&mut self) {
        self.dogs.dispose();
        self.cats.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor
            .manages::<Dog>()
            .manages::<Cat>()
            .capability::<dyn Updatable>(|manager| manager);
    }
}

impl Manages<Dog> for PetManager {
    fn add(&mut self, behaviour: Shared<Dog>) {
        self.dogs.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Dog>) -> bool {
        self.dogs.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Dog>] {
        self.dogs.behaviours()
    }
}

impl Manages<Cat> for PetManager {
    fn add(&mut self, behaviour: Shared<Cat>) {
        self.cats.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Cat>) -> bool {
        self.cats.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Cat>] {
        self.cats.behaviours()
    }
}

impl Updatable for PetManager {
    fn update(&mut self, _delta_time: f32) {
        self.updates += 1;
    }
}

/// Draw-only manager with no behaviour types
#[derive(Default)]
pub(crate) struct Painter {
    pub(crate) frames: u32,
    disposed: bool,
}

impl Manager for Painter {
    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor.capability::<dyn Drawable>(|manager| manager);
    }
}

impl Drawable for Painter {
    fn draw(&mut self) {
        self.frames += 1;
    }
}
