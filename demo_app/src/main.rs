//! Scene runtime walkthrough
//!
//! Registers two updatable managers, hands a behaviour between managers,
//! removes its manager and shows that a replacement manager does not pick up
//! the orphaned behaviour.

use std::rc::Rc;

use scene_runtime::prelude::*;
use serde::Deserialize;

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scene.toml");

#[derive(Debug, Deserialize)]
struct WalkSettings {
    speed: f32,
}

struct Walker {
    core: BehaviourCore,
    speed: f32,
    distance: f32,
}

impl Walker {
    fn new(name: &str, settings: &str) -> Result<Self, ConfigError> {
        let mut core = BehaviourCore::new().with_name(name);
        core.load_settings(settings)?;
        let speed = core
            .settings_as::<WalkSettings>()?
            .map_or(1.0, |settings| settings.speed);
        Ok(Self {
            core,
            speed,
            distance: 0.0,
        })
    }
}

impl Behaviour for Walker {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }

    fn initialise(&mut self) {
        self.distance = 0.0;
    }
}

struct Sleeper {
    core: BehaviourCore,
    naps: u32,
}

impl Behaviour for Sleeper {
    fn core(&self) -> &BehaviourCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BehaviourCore {
        &mut self.core
    }
}

#[derive(Default)]
struct WalkerManager {
    walkers: BehaviourManager<Walker>,
}

impl Manager for WalkerManager {
    fn is_disposed(&self) -> bool {
        self.walkers.is_disposed()
    }

    fn dispose(&mut self) {
        self.walkers.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor
            .manages::<Walker>()
            .capability::<dyn Updatable>(|manager| manager);
    }
}

impl Manages<Walker> for WalkerManager {
    fn add(&mut self, behaviour: Shared<Walker>) {
        self.walkers.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Walker>) -> bool {
        self.walkers.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Walker>] {
        self.walkers.behaviours()
    }
}

impl Updatable for WalkerManager {
    fn update(&mut self, delta_time: f32) {
        for walker in self.walkers.iter() {
            let mut walker = walker.borrow_mut();
            walker.distance += walker.speed * delta_time;
        }
    }
}

#[derive(Default)]
struct SleeperManager {
    sleepers: BehaviourManager<Sleeper>,
}

impl Manager for SleeperManager {
    fn is_disposed(&self) -> bool {
        self.sleepers.is_disposed()
    }

    fn dispose(&mut self) {
        self.sleepers.dispose();
    }

    fn describe(descriptor: &mut ManagerDescriptor<Self>) {
        descriptor
            .manages::<Sleeper>()
            .capability::<dyn Updatable>(|manager| manager);
    }
}

impl Manages<Sleeper> for SleeperManager {
    fn add(&mut self, behaviour: Shared<Sleeper>) {
        self.sleepers.add(behaviour);
    }

    fn remove(&mut self, behaviour: &Shared<Sleeper>) -> bool {
        self.sleepers.remove(behaviour)
    }

    fn behaviours(&self) -> &[Shared<Sleeper>] {
        self.sleepers.behaviours()
    }
}

impl Updatable for SleeperManager {
    fn update(&mut self, _delta_time: f32) {
        for sleeper in self.sleepers.iter() {
            sleeper.borrow_mut().naps += 1;
        }
    }
}

fn load_scene() -> Scene {
    Scene::from_config_file(CONFIG_PATH).unwrap_or_else(|e| {
        log::warn!("Failed to load {}: {}. Using defaults.", CONFIG_PATH, e);
        Scene::new()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    scene_runtime::logging::init_with_level(log::LevelFilter::Debug);

    log::info!("Starting scene runtime demo");
    let mut scene = load_scene();

    let walkers = share(WalkerManager::default());
    let sleepers = share(SleeperManager::default());
    scene.add_manager(Rc::clone(&walkers))?;
    scene.add_manager(Rc::clone(&sleepers))?;

    let updatable = scene.registry_mut().find_by_type::<dyn Updatable>();
    log::info!("Updatable managers: {:?}", updatable.ids());

    let owner = scene.create_entity()?;
    let walker = share(Walker::new("walker", "(speed: 2.0)")?);
    walker.borrow_mut().core_mut().set_owner(Some(owner));
    scene.attach(&walker)?;
    scene.attach(&share(Sleeper {
        core: BehaviourCore::new().with_name("sleeper"),
        naps: 0,
    }))?;

    for _ in 0..3 {
        scene.update(0.5)?;
    }
    log::info!(
        "{} walked {:.1} units over {} frames",
        owner,
        walker.borrow().distance,
        scene.frame_count()
    );
    for sleeper in sleepers.borrow().behaviours() {
        log::info!("Sleeper napped {} times", sleeper.borrow().naps);
    }

    // Remove the walker manager; the handler stays, empty
    scene.remove_manager(&walkers);
    let handler = scene.registry().get_by_behaviour::<Walker>()?;
    log::info!(
        "Walker handler manager after removal: {:?}; updatable managers: {:?}",
        handler.manager_id(),
        updatable.ids()
    );

    let replacement = share(WalkerManager::default());
    let replacement_id = scene.add_manager(Rc::clone(&replacement))?;
    log::info!(
        "Walker handler now attached to {:?} (expected {:?})",
        handler.manager_id(),
        replacement_id
    );
    log::warn!(
        "Orphaned walker: old manager holds {}, replacement holds {}",
        walkers.borrow().behaviours().len(),
        replacement.borrow().behaviours().len()
    );

    // Re-attaching pulls the walker out of the old manager into the replacement
    scene.detach(&walker);
    scene.attach(&walker)?;
    scene.update(0.5)?;
    log::info!(
        "After re-attach: old manager holds {}, replacement holds {}, walked {:.1} units since initialise",
        walkers.borrow().behaviours().len(),
        replacement.borrow().behaviours().len(),
        walker.borrow().distance
    );

    scene.shutdown();
    Ok(())
}
