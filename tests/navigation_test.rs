use std::collections::HashSet;

use instant::Duration;
use splat_roam::{
    KeyCode,
    camera::{
        CameraPose, InputAccumulator, InputResponse, InputSnapshot, NavigationConfig,
        NavigationController, NavigationMode, NavigationState, PITCH_LIMIT_DEGREES, apply_look,
        integrate,
    },
    cgmath::{InnerSpace, Point3, Vector3},
};
use winit::event::ElementState;

const EPSILON: f32 = 1e-5;

fn close(actual: Vector3<f32>, expected: [f32; 3]) -> bool {
    (actual - Vector3::from(expected)).magnitude() < EPSILON
}

fn holding(keys: &[KeyCode]) -> InputSnapshot {
    InputSnapshot {
        held_keys: keys.iter().copied().collect::<HashSet<_>>(),
        ..Default::default()
    }
}

fn press(controller: &mut NavigationController, key: KeyCode) -> InputResponse {
    controller.handle_key(key, ElementState::Pressed, false)
}

#[test]
fn default_pose_and_state() {
    let pose = CameraPose::default();
    assert_eq!(pose.position, Point3::new(0.0, 1.6, 5.0));
    assert_eq!(pose.bearing_degrees, 0.0);
    assert_eq!(pose.pitch_degrees, 0.0);

    let state = NavigationState::default();
    assert_eq!(state.mode, NavigationMode::Free);
    assert_eq!(state.vertical_velocity, 0.0);
    assert!(state.grounded);
}

#[test]
fn ground_plane_vectors_follow_the_bearing() {
    let mut pose = CameraPose::default();
    assert!(close(pose.forward(), [0.0, 0.0, -1.0]));
    assert!(close(pose.right(), [1.0, 0.0, 0.0]));

    pose.bearing_degrees = 90.0;
    assert!(close(pose.forward(), [1.0, 0.0, 0.0]));
    assert!(close(pose.right(), [0.0, 0.0, 1.0]));

    pose.pitch_degrees = 45.0;
    let look = pose.look_direction();
    assert!((look.magnitude() - 1.0).abs() < EPSILON);
    assert!(look.y > 0.7 && look.x > 0.7);
}

#[test]
fn opposing_keys_cancel_exactly() {
    let config = NavigationConfig::default();
    let mut pose = CameraPose::default();
    pose.bearing_degrees = 33.3;
    let state = NavigationState::default();

    for keys in [
        [KeyCode::KeyW, KeyCode::KeyS],
        [KeyCode::KeyA, KeyCode::KeyD],
        [KeyCode::Space, KeyCode::ShiftLeft],
    ] {
        let (next, _) = integrate(&pose, &state, &holding(&keys), 0.016, &config);
        assert_eq!(next.position, pose.position, "{:?}", keys);
    }
}

#[test]
fn free_flight_moves_along_the_bearing() {
    let config = NavigationConfig::default();
    let pose = CameraPose::default();
    let state = NavigationState::default();

    let (next, next_state) = integrate(
        &pose,
        &state,
        &holding(&[KeyCode::KeyW, KeyCode::KeyD, KeyCode::Space]),
        0.5,
        &config,
    );
    assert!((next.position.x - 2.5).abs() < EPSILON);
    assert!((next.position.y - 4.1).abs() < EPSILON);
    assert!((next.position.z - 2.5).abs() < EPSILON);
    assert_eq!(next_state, state);
}

#[test]
fn idle_tick_leaves_the_pose_alone() {
    let config = NavigationConfig::default();
    let pose = CameraPose::default();
    let (next, _) = integrate(&pose, &NavigationState::default(), &holding(&[]), 1.0, &config);
    assert_eq!(next, pose);
}

#[test]
fn physics_lands_exactly_on_the_ground() {
    let config = NavigationConfig {
        ground_level: 0.3,
        ..Default::default()
    };
    let mut pose = CameraPose::default();
    pose.position.y = 0.7;
    let state = NavigationState {
        mode: NavigationMode::Physics,
        vertical_velocity: -1000.0,
        grounded: false,
    };

    let (next, next_state) = integrate(&pose, &state, &holding(&[]), 3.7, &config);
    assert_eq!(next.position.y, 0.3);
    assert_eq!(next_state.vertical_velocity, 0.0);
    assert!(next_state.grounded);
}

#[test]
fn physics_jump_only_from_the_ground() {
    let config = NavigationConfig::default();
    let pose = CameraPose::new([0.0, 0.0, 0.0], 0.0, 0.0);
    let grounded = NavigationState::with_mode(NavigationMode::Physics);

    let (up, airborne) = integrate(&pose, &grounded, &holding(&[KeyCode::Space]), 0.1, &config);
    assert!(!airborne.grounded);
    assert_eq!(airborne.vertical_velocity, config.jump_velocity);
    assert!((up.position.y - 0.5).abs() < EPSILON);

    // holding jump in the air does not reset the velocity
    let (_, falling) = integrate(&up, &airborne, &holding(&[KeyCode::Space]), 0.1, &config);
    assert!((falling.vertical_velocity - (5.0 - 0.981)).abs() < EPSILON);
    assert!(!falling.grounded);
}

#[test]
fn physics_ignores_the_descend_key() {
    let config = NavigationConfig::default();
    let pose = CameraPose::new([0.0, 0.0, 0.0], 0.0, 0.0);
    let state = NavigationState::with_mode(NavigationMode::Physics);

    let (next, next_state) = integrate(&pose, &state, &holding(&[KeyCode::ShiftLeft]), 0.1, &config);
    assert_eq!(next.position, pose.position);
    assert!(next_state.grounded);
}

#[test]
fn toggling_always_starts_at_rest() {
    let mut controller = NavigationController::default();
    controller.set_mode(NavigationMode::Physics);
    controller.set_pose(CameraPose::new([0.0, 10.0, 0.0], 0.0, 0.0));
    controller.tick(Duration::from_millis(500));
    assert!(controller.state().vertical_velocity < 0.0);
    assert!(!controller.state().grounded);

    controller.toggle_mode();
    assert_eq!(
        *controller.state(),
        NavigationState::with_mode(NavigationMode::Free)
    );

    controller.toggle_mode();
    assert_eq!(
        *controller.state(),
        NavigationState::with_mode(NavigationMode::Physics)
    );
}

#[test]
fn toggle_key_ignores_repeats() {
    let mut controller = NavigationController::default();
    assert_eq!(press(&mut controller, KeyCode::KeyF), InputResponse::Consumed);
    assert_eq!(controller.mode(), NavigationMode::Physics);

    controller.handle_key(KeyCode::KeyF, ElementState::Pressed, true);
    controller.handle_key(KeyCode::KeyF, ElementState::Pressed, true);
    assert_eq!(controller.mode(), NavigationMode::Physics);

    controller.handle_key(KeyCode::KeyF, ElementState::Released, false);
    press(&mut controller, KeyCode::KeyF);
    assert_eq!(controller.mode(), NavigationMode::Free);
}

#[test]
fn look_needs_the_pointer_lock() {
    let mut controller = NavigationController::default();
    assert!(!controller.look(100.0, 0.0));
    assert_eq!(controller.pose().bearing_degrees, 0.0);

    controller.set_pointer_locked(true);
    assert!(controller.look(100.0, -50.0));
    // applied right away, no tick needed
    assert!((controller.pose().bearing_degrees - 10.0).abs() < EPSILON);
    assert!((controller.pose().pitch_degrees - 5.0).abs() < EPSILON);
}

#[test]
fn pitch_is_clamped() {
    let mut pose = CameraPose::default();
    apply_look(&mut pose, 0.0, -10_000.0, 0.1);
    assert_eq!(pose.pitch_degrees, PITCH_LIMIT_DEGREES);
    apply_look(&mut pose, 0.0, 10_000.0, 0.1);
    assert_eq!(pose.pitch_degrees, -PITCH_LIMIT_DEGREES);

    assert_eq!(CameraPose::new([0.0; 3], 0.0, 120.0).pitch_degrees, 89.0);
}

#[test]
fn releasing_a_key_stops_movement_on_the_next_tick() {
    let mut controller = NavigationController::default();
    let start = controller.pose().position;

    press(&mut controller, KeyCode::KeyW);
    controller.tick(Duration::from_millis(100));
    let moved = controller.pose().position;
    assert!(moved.z < start.z);

    controller.handle_key(KeyCode::KeyW, ElementState::Released, false);
    controller.tick(Duration::from_millis(100));
    assert_eq!(controller.pose().position, moved);
}

#[test]
fn escape_and_focus_loss_release_the_pointer() {
    let mut controller = NavigationController::default();
    controller.set_pointer_locked(true);
    assert_eq!(
        press(&mut controller, KeyCode::Escape),
        InputResponse::ReleasePointer
    );
    assert!(!controller.pointer_locked());

    controller.set_pointer_locked(true);
    press(&mut controller, KeyCode::KeyW);
    assert_eq!(
        controller.handle_window_event(&winit::event::WindowEvent::Focused(false)),
        InputResponse::ReleasePointer
    );
    assert!(!controller.pointer_locked());

    let before = controller.pose().position;
    controller.tick(Duration::from_millis(100));
    assert_eq!(controller.pose().position, before);
}

#[test]
fn accumulator_snapshot_drains_pointer_motion() {
    let mut input = InputAccumulator::default();
    input.key_down(KeyCode::KeyA);
    input.pointer_moved(3.0, -1.0);
    input.pointer_moved(2.0, 4.0);
    input.set_pointer_locked(true);

    let first = input.snapshot();
    assert!(first.is_held(KeyCode::KeyA));
    assert_eq!(first.pointer_delta, (5.0, 3.0));
    assert!(first.pointer_locked);

    let second = input.snapshot();
    assert_eq!(second.pointer_delta, (0.0, 0.0));
    assert!(second.is_held(KeyCode::KeyA));
}

#[test]
fn unbound_keys_are_ignored() {
    let mut controller = NavigationController::default();
    assert_eq!(press(&mut controller, KeyCode::KeyQ), InputResponse::Ignored);
    assert_eq!(press(&mut controller, KeyCode::KeyW), InputResponse::Consumed);
}

#[test]
fn view_matrix_maps_the_eye_to_the_origin() {
    use splat_roam::cgmath::{EuclideanSpace, Transform};

    let pose = CameraPose::new([1.0, 2.0, 3.0], 45.0, -20.0);
    let eye = pose.view_matrix().transform_point(pose.position);
    assert!(eye.to_vec().magnitude() < EPSILON);

    let ahead = pose.position + pose.look_direction() * 2.0;
    let in_view = pose.view_matrix().transform_point(ahead);
    assert!((in_view.z + 2.0).abs() < 1e-4);
}
