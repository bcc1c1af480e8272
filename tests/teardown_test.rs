//! Tests for binding teardown: destroy, drop, and destroy from user code.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rstest::{fixture, rstest};

use tagbind::util::testing;
use tagbind::{BindingHandle, Disposer, Manifest, MemoryScene, ResolvedManifest, RootState, SceneNode};

const TAG: &str = "Vehicle";

#[fixture]
fn scene() -> MemoryScene {
    testing::init_test_setup();
    MemoryScene::new()
}

/// Two complete roots tagged `TAG`, each with an `A` child.
fn populated(scene: &MemoryScene) -> Vec<SceneNode> {
    (0..2)
        .map(|_| {
            let car = scene.create("Car");
            scene.insert(&car, "A").unwrap();
            scene.add_tag(&car, TAG).unwrap();
            car
        })
        .collect()
}

fn counting(
    fires: &Rc<Cell<usize>>,
    disposes: &Rc<Cell<usize>>,
) -> impl FnMut(&ResolvedManifest<SceneNode>) -> Option<Disposer> + 'static {
    let fires = Rc::clone(fires);
    let disposes = Rc::clone(disposes);
    move |_: &ResolvedManifest<SceneNode>| {
        fires.set(fires.get() + 1);
        let disposes = Rc::clone(&disposes);
        Some(Disposer::new(move || disposes.set(disposes.get() + 1)))
    }
}

#[rstest]
fn given_bound_roots_when_destroyed_then_releases_everything(scene: MemoryScene) {
    // Arrange
    let cars = populated(&scene);
    let fires = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));
    let handle = scene
        .binder()
        .create(TAG, &Manifest::new().with("a", "A"), counting(&fires, &disposes))
        .unwrap();
    assert_eq!(fires.get(), 2);
    assert!(scene.listener_count() > 0);

    // Act
    handle.destroy();

    // Assert
    assert_eq!(disposes.get(), 2);
    assert_eq!(scene.listener_count(), 0);
    assert!(handle.is_destroyed());
    assert!(handle.is_empty());
    for car in &cars {
        assert_eq!(handle.state(car), RootState::Unbound);
    }
}

#[rstest]
fn given_destroyed_handle_when_destroyed_again_then_noop(scene: MemoryScene) {
    populated(&scene);
    let fires = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));
    let handle = scene
        .binder()
        .create(TAG, &Manifest::new().with("a", "A"), counting(&fires, &disposes))
        .unwrap();

    handle.destroy();
    handle.destroy();

    assert_eq!(disposes.get(), 2);
}

#[rstest]
fn given_destroyed_handle_when_scene_changes_then_never_fires(scene: MemoryScene) {
    // Arrange
    let fires = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));
    let handle = scene
        .binder()
        .create(TAG, &Manifest::new().with("a", "A"), counting(&fires, &disposes))
        .unwrap();
    handle.destroy();

    // Act
    populated(&scene);

    // Assert
    assert_eq!(fires.get(), 0);
    assert_eq!(scene.listener_count(), 0);
}

#[rstest]
fn given_handle_when_dropped_then_tears_down(scene: MemoryScene) {
    populated(&scene);
    let fires = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));

    {
        let _handle = scene
            .binder()
            .create(TAG, &Manifest::new().with("a", "A"), counting(&fires, &disposes))
            .unwrap();
        assert_eq!(fires.get(), 2);
    }

    assert_eq!(disposes.get(), 2);
    assert_eq!(scene.listener_count(), 0);
}

#[rstest]
fn given_callback_destroying_handle_when_fired_then_pending_work_dropped(scene: MemoryScene) {
    // Arrange: two complete roots, the first callback destroys the binding
    populated(&scene);
    let slot: Rc<RefCell<Option<BindingHandle<SceneNode>>>> = Rc::new(RefCell::new(None));
    let fires = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));

    let callback = {
        let slot = Rc::clone(&slot);
        let fires = Rc::clone(&fires);
        let disposes = Rc::clone(&disposes);
        move |_: &ResolvedManifest<SceneNode>| {
            fires.set(fires.get() + 1);
            if let Some(handle) = slot.borrow().as_ref() {
                handle.destroy();
            }
            let disposes = Rc::clone(&disposes);
            Some(Disposer::new(move || disposes.set(disposes.get() + 1)))
        }
    };

    // Act: the handle only exists after create, so destroy on the next fire
    let handle = scene
        .binder()
        .create(TAG, &Manifest::new().with("a", "A"), callback)
        .unwrap();
    *slot.borrow_mut() = Some(handle);
    let late = scene.create("Car");
    scene.insert(&late, "A").unwrap();
    scene.add_tag(&late, TAG).unwrap();

    // Assert: the disposer returned after destroy is released right away
    assert_eq!(fires.get(), 3);
    assert_eq!(disposes.get(), 3);
    assert_eq!(scene.listener_count(), 0);
    let handle = slot.borrow_mut().take().unwrap();
    assert!(handle.is_destroyed());
}

#[rstest]
fn given_disposer_destroying_handle_when_released_then_single_teardown(scene: MemoryScene) {
    // Arrange
    let car = scene.create("Car");
    let a = scene.insert(&car, "A").unwrap();
    scene.add_tag(&car, TAG).unwrap();
    let slot: Rc<RefCell<Option<BindingHandle<SceneNode>>>> = Rc::new(RefCell::new(None));
    let disposes = Rc::new(Cell::new(0));

    let callback = {
        let slot = Rc::clone(&slot);
        let disposes = Rc::clone(&disposes);
        move |_: &ResolvedManifest<SceneNode>| {
            let slot = Rc::clone(&slot);
            let disposes = Rc::clone(&disposes);
            Some(Disposer::new(move || {
                disposes.set(disposes.get() + 1);
                if let Some(handle) = slot.borrow().as_ref() {
                    handle.destroy();
                }
            }))
        }
    };
    let handle = scene
        .binder()
        .create(TAG, &Manifest::new().with("a", "A"), callback)
        .unwrap();
    *slot.borrow_mut() = Some(handle);

    // Act
    scene.destroy(&a).unwrap();

    // Assert
    assert_eq!(disposes.get(), 1);
    assert_eq!(scene.listener_count(), 0);
    let handle = slot.borrow_mut().take().unwrap();
    assert!(handle.is_destroyed());
    assert_eq!(handle.state(&car), RootState::Unbound);
}
