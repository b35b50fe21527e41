//! Registry behaviour through the public API

use std::rc::Rc;

use scene_runtime::prelude::*;
use scene_runtime::reflect::DiscoveryCache;

struct Dog {
    core: BehaviourCore,
}

impl Dog {
    fn named(name: &str) -> Self {
        Self {
            core: BehaviourCore::new().with_name(name),
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
}

struct Cat {
    core: BehaviourCore,
}

impl Behaviour for Cat {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }
}

#[derive(Default)]
struct DogManager {
    dogs: BehaviourManager<Dog>,
    ticks: u32,
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
        self.ticks += 1;
    }
}

#[derive(Default)]
struct CatManager {
    cats: BehaviourManager<Cat>,
    ticks: u32,
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
        self.ticks += 1;
    }
}

/// Not updatable; manages dogs and cats
#[derive(Default)]
struct Kennel {
    dogs: BehaviourManager<Dog>,
    cats: BehaviourManager<Cat>,
}

impl Manager for Kennel {
    fn is_disposed(&self) -> bool {
        self.dogs.is_disposed() && self.cats.is_disposed()
    }

    fn dispose(&mut self) {
        self.dogs.dispose();
        self.cats.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor.manages::<Dog>().manages::<Cat>();
    }
}

impl Manages<Dog> for Kennel {
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

impl Manages<Cat> for Kennel {
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

fn sorted(mut ids: Vec<ManagerId>) -> Vec<ManagerId> {
    ids.sort();
    ids
}

#[test]
fn test_discovery_is_stable() {
    let mut cache = DiscoveryCache::new();
    let first = cache.managed_types::<Kennel>();
    let second = cache.managed_types::<Kennel>();

    assert_eq!(first.len(), 2);
    assert!(first.contains(&TypeKey::of::<Dog>()));
    assert!(first.contains(&TypeKey::of::<Cat>()));
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_one_handler_per_behaviour_type() {
    let mut registry = ManagerRegistry::new();
    registry.add(share(DogManager::default())).unwrap();
    let kennel_id = registry.add(share(Kennel::default())).unwrap();

    assert_eq!(registry.handler_count(), 2);
    let dogs = registry.get_by_behaviour::<Dog>().unwrap();
    assert_eq!(dogs.manager_id(), Some(kennel_id));
}

#[test]
fn test_move_between_handlers() {
    let mut left = ManagerRegistry::new();
    let mut right = ManagerRegistry::new();
    let m1 = share(DogManager::default());
    let m2 = share(DogManager::default());
    left.add(Rc::clone(&m1)).unwrap();
    right.add(Rc::clone(&m2)).unwrap();

    let rex = share(Dog::named("rex"));
    let erased = BehaviourRef::new(&rex);
    let h1 = left.get_by_behaviour::<Dog>().unwrap();
    let h2 = right.get_by_behaviour::<Dog>().unwrap();
    h1.add(&erased).unwrap();
    h2.add(&erased).unwrap();

    assert!(m1.borrow().behaviours().is_empty());
    assert_eq!(m2.borrow().behaviours().len(), 1);
    assert!(Rc::ptr_eq(&m2.borrow().behaviours()[0], &rex));
    assert_eq!(erased.binding().unwrap().handler().unwrap().manager_id(), h2.manager_id());

    // removals through the old side are no-ops
    assert!(!m1.borrow_mut().remove(&rex));
    assert!(!h1.remove(&erased));
    assert_eq!(m2.borrow().behaviours().len(), 1);
    assert!(erased.is_bound());
}

#[test]
fn test_detach_and_reattach() {
    let mut registry = ManagerRegistry::new();
    let dogs = share(DogManager::default());
    registry.add(Rc::clone(&dogs)).unwrap();

    assert!(registry.remove(&dogs));
    assert!(registry.contains_for_behaviour::<Dog>());
    assert!(registry.get_by_behaviour::<Dog>().unwrap().manager().is_none());

    let id = registry.add(share(DogManager::default())).unwrap();
    assert_eq!(registry.handler_count(), 1);
    assert_eq!(registry.get_by_behaviour::<Dog>().unwrap().manager_id(), Some(id));
}

#[test]
fn test_category_consistency() {
    let mut registry = ManagerRegistry::new();
    let early = registry.add(share(DogManager::default())).unwrap();
    registry.add(share(Kennel::default())).unwrap();

    let updatable = registry.find_by_type::<dyn Updatable>();
    assert_eq!(updatable.ids(), vec![early]);

    let late = registry.add(share(CatManager::default())).unwrap();
    assert_eq!(sorted(updatable.ids()), sorted(vec![early, late]));

    registry.remove_by_id(early);
    assert_eq!(updatable.ids(), vec![late]);

    let everything = registry.find_by_type::<dyn Manager>();
    assert_eq!(everything.len(), registry.len());
}

#[test]
fn test_lookup_misses() {
    let registry = ManagerRegistry::new();
    assert!(registry.try_get::<DogManager>().is_none());
    assert!(registry.try_get_by_behaviour::<Dog>().is_none());
    assert!(matches!(registry.get::<DogManager>(), Err(RegistryError::ManagerNotFound(_))));
    assert!(matches!(
        registry.get_by_behaviour::<Dog>(),
        Err(RegistryError::HandlerNotFound(_))
    ));
}

#[test]
fn test_end_to_end_orphaning() {
    let mut registry = ManagerRegistry::new();
    let a = share(DogManager::default());
    let b = share(CatManager::default());
    let a_id = registry.add(Rc::clone(&a)).unwrap();
    let b_id = registry.add(Rc::clone(&b)).unwrap();

    let updatable = registry.find_by_type::<dyn Updatable>();
    assert_eq!(sorted(updatable.ids()), sorted(vec![a_id, b_id]));

    let d = share(Dog::named("d"));
    let handler = registry.get_by_behaviour::<Dog>().unwrap();
    handler.add(&BehaviourRef::new(&d)).unwrap();
    assert!(Rc::ptr_eq(&a.borrow().behaviours()[0], &d));

    assert!(registry.remove(&a));
    assert!(handler.manager().is_none());
    assert_eq!(updatable.ids(), vec![b_id]);

    let c = share(DogManager::default());
    let c_id = registry.add(Rc::clone(&c)).unwrap();
    assert_eq!(handler.manager_id(), Some(c_id));

    // d stays bound to the same handler but is not moved into C
    assert!(BehaviourRef::new(&d).binding().unwrap().bound_as().is::<Dog>());
    assert!(c.borrow().behaviours().is_empty());
    assert_eq!(a.borrow().behaviours().len(), 1);
}

#[test]
fn test_scene_frame_loop() {
    let mut scene = Scene::new();
    let dogs = share(DogManager::default());
    let cats = share(CatManager::default());
    scene.add_manager(Rc::clone(&dogs)).unwrap();
    scene.add_manager(Rc::clone(&cats)).unwrap();

    let owner = scene.create_entity().unwrap();
    let rex = share(Dog::named("rex"));
    rex.borrow_mut().core_mut().set_owner(Some(owner));
    scene.attach(&rex).unwrap();
    scene
        .attach(&share(Cat {
            core: BehaviourCore::new(),
        }))
        .unwrap();

    scene.update(0.016).unwrap();
    scene.update(0.016).unwrap();
    assert_eq!(dogs.borrow().ticks, 2);
    assert_eq!(cats.borrow().ticks, 2);
    assert_eq!(dogs.borrow().behaviours().len(), 1);
    assert_eq!(cats.borrow().behaviours().len(), 1);
    assert!(rex.borrow().core().is_ready());

    scene.shutdown();
    assert!(dogs.borrow().is_disposed());
    assert!(!rex.borrow().core().is_bound());
}
