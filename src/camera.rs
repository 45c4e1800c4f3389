//! First-person navigation.
//!
//! The controller has two modes: `Free` flies along the ground plane with separate ascend and
//! descend keys, `Physics` walks under gravity and can jump. Raw input is collected in an
//! [`InputAccumulator`] and consumed once per rendered frame by [`integrate`], which is a pure
//! function of `(pose, state, input, dt)`. Mouse look bypasses the tick and is applied on every
//! pointer event while the pointer is locked.

use std::collections::HashSet;

use cgmath::{Matrix4, Point3, Rad, Vector3, Zero};
use instant::Duration;
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Pitch is kept strictly inside (-90°, 90°) so the view never flips.
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;

/// Where the viewer stands and looks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Point3<f32>,
    /// Clockwise rotation around +Y, 0° looks down -Z.
    pub bearing_degrees: f32,
    /// Positive looks up.
    pub pitch_degrees: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 1.6, 5.0),
            bearing_degrees: 0.0,
            pitch_degrees: 0.0,
        }
    }
}

impl CameraPose {
    pub fn new<P: Into<Point3<f32>>>(position: P, bearing_degrees: f32, pitch_degrees: f32) -> Self {
        Self {
            position: position.into(),
            bearing_degrees,
            pitch_degrees: pitch_degrees.clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
        }
    }

    /// Unit vector on the ground plane the viewer faces: `(sin θ, 0, -cos θ)`.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin, cos) = self.bearing_degrees.to_radians().sin_cos();
        Vector3::new(sin, 0.0, -cos)
    }

    /// Unit vector on the ground plane to the viewer's right: `(cos θ, 0, sin θ)`.
    pub fn right(&self) -> Vector3<f32> {
        let (sin, cos) = self.bearing_degrees.to_radians().sin_cos();
        Vector3::new(cos, 0.0, sin)
    }

    /// Unit view direction including pitch.
    pub fn look_direction(&self) -> Vector3<f32> {
        let (sin_pitch, cos_pitch) = self.pitch_degrees.to_radians().sin_cos();
        let forward = self.forward();
        Vector3::new(forward.x * cos_pitch, sin_pitch, forward.z * cos_pitch)
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.look_direction(), Vector3::unit_y())
    }
}

/// Perspective projection for whatever surface draws the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavigationMode {
    #[default]
    Free,
    Physics,
}

impl NavigationMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Free => Self::Physics,
            Self::Physics => Self::Free,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationState {
    pub mode: NavigationMode,
    /// Only integrated in `Physics` mode.
    pub vertical_velocity: f32,
    pub grounded: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::with_mode(NavigationMode::Free)
    }
}

impl NavigationState {
    /// A fresh state in `mode`: at rest and on the ground.
    pub fn with_mode(mode: NavigationMode) -> Self {
        Self {
            mode,
            vertical_velocity: 0.0,
            grounded: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub backward: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    /// Also jumps in `Physics` mode.
    pub ascend: KeyCode,
    pub descend: KeyCode,
    pub toggle_mode: KeyCode,
    pub release_pointer: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            backward: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            ascend: KeyCode::Space,
            descend: KeyCode::ShiftLeft,
            toggle_mode: KeyCode::KeyF,
            release_pointer: KeyCode::Escape,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationConfig {
    /// Units per second on the ground plane.
    pub move_speed: f32,
    /// Units per second for ascend/descend in `Free` mode.
    pub vertical_speed: f32,
    /// Degrees per pointer unit.
    pub sensitivity: f32,
    pub gravity: f32,
    pub jump_velocity: f32,
    pub ground_level: f32,
    pub keys: KeyBindings,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            vertical_speed: 5.0,
            sensitivity: 0.1,
            gravity: -9.81,
            jump_velocity: 5.0,
            ground_level: 0.0,
            keys: KeyBindings::default(),
        }
    }
}

/// Input as seen by one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSnapshot {
    pub held_keys: HashSet<KeyCode>,
    /// Pointer movement since the previous snapshot.
    pub pointer_delta: (f64, f64),
    pub pointer_locked: bool,
}

impl InputSnapshot {
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held_keys.contains(&key)
    }
}

/// Single-threaded mailbox between the event handlers and the tick.
///
/// The snapshot handed to the tick is kept in place and updated by the handlers, so reading it
/// never copies the held keys.
#[derive(Debug, Default)]
pub struct InputAccumulator {
    current: InputSnapshot,
    pending_delta: (f64, f64),
}

impl InputAccumulator {
    pub fn key_down(&mut self, key: KeyCode) {
        self.current.held_keys.insert(key);
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.current.held_keys.remove(&key);
    }

    pub fn pointer_moved(&mut self, dx: f64, dy: f64) {
        self.pending_delta.0 += dx;
        self.pending_delta.1 += dy;
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.current.pointer_locked = locked;
    }

    pub fn pointer_locked(&self) -> bool {
        self.current.pointer_locked
    }

    /// Key-up events are not delivered to an unfocused window, so everything held is released.
    pub fn focus_lost(&mut self) {
        self.current.held_keys.clear();
        self.current.pointer_locked = false;
    }

    /// Reads the current input and resets the accumulated pointer delta.
    pub fn snapshot(&mut self) -> &InputSnapshot {
        self.current.pointer_delta = std::mem::take(&mut self.pending_delta);
        &self.current
    }
}

/// Advances the pose by one tick of `dt` seconds.
pub fn integrate(
    pose: &CameraPose,
    state: &NavigationState,
    input: &InputSnapshot,
    dt: f32,
    config: &NavigationConfig,
) -> (CameraPose, NavigationState) {
    let keys = &config.keys;
    let forward = pose.forward();
    let right = pose.right();
    let step = config.move_speed * dt;

    let mut planar = Vector3::zero();
    if input.is_held(keys.forward) {
        planar += forward * step;
    }
    if input.is_held(keys.backward) {
        planar -= forward * step;
    }
    if input.is_held(keys.right) {
        planar += right * step;
    }
    if input.is_held(keys.left) {
        planar -= right * step;
    }

    let mut next_state = *state;
    let mut landed = false;
    let dy = match state.mode {
        NavigationMode::Free => {
            let mut dy = 0.0;
            if input.is_held(keys.ascend) {
                dy += config.vertical_speed * dt;
            }
            if input.is_held(keys.descend) {
                dy -= config.vertical_speed * dt;
            }
            dy
        }
        NavigationMode::Physics => {
            next_state.vertical_velocity += config.gravity * dt;
            if input.is_held(keys.ascend) && next_state.grounded {
                next_state.vertical_velocity = config.jump_velocity;
                next_state.grounded = false;
            }
            let dy = next_state.vertical_velocity * dt;
            if pose.position.y + dy <= config.ground_level {
                next_state.vertical_velocity = 0.0;
                next_state.grounded = true;
                landed = true;
                config.ground_level - pose.position.y
            } else {
                next_state.grounded = false;
                dy
            }
        }
    };

    let mut next_pose = *pose;
    if planar.x != 0.0 || dy != 0.0 || planar.z != 0.0 {
        next_pose.position.x += planar.x;
        next_pose.position.y += dy;
        next_pose.position.z += planar.z;
        if landed {
            // y + (ground - y) is not always ground in floating point
            next_pose.position.y = config.ground_level;
        }
    }
    (next_pose, next_state)
}

/// Applies one pointer movement to the view angles.
pub fn apply_look(pose: &mut CameraPose, dx: f64, dy: f64, sensitivity: f32) {
    pose.bearing_degrees += dx as f32 * sensitivity;
    pose.pitch_degrees = (pose.pitch_degrees - dy as f32 * sensitivity)
        .clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
}

/// What the host window should do after the controller saw an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputResponse {
    Ignored,
    Consumed,
    /// The pointer lock should be dropped.
    ReleasePointer,
}

#[derive(Debug)]
pub struct NavigationController {
    pose: CameraPose,
    state: NavigationState,
    config: NavigationConfig,
    input: InputAccumulator,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new(CameraPose::default(), NavigationConfig::default())
    }
}

impl NavigationController {
    pub fn new(pose: CameraPose, config: NavigationConfig) -> Self {
        Self {
            pose,
            state: NavigationState::default(),
            config,
            input: InputAccumulator::default(),
        }
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn mode(&self) -> NavigationMode {
        self.state.mode
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn set_pose(&mut self, pose: CameraPose) {
        self.pose = pose;
    }

    pub fn input(&mut self) -> &mut InputAccumulator {
        &mut self.input
    }

    /// Switching always starts at rest on the ground, even when the mode does not change.
    pub fn set_mode(&mut self, mode: NavigationMode) {
        log::debug!("navigation mode {:?} -> {:?}", self.state.mode, mode);
        self.state = NavigationState::with_mode(mode);
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.state.mode.toggled());
    }

    pub fn pointer_locked(&self) -> bool {
        self.input.pointer_locked()
    }

    pub fn set_pointer_locked(&mut self, locked: bool) {
        self.input.set_pointer_locked(locked);
    }

    /// One rendering-loop callback.
    pub fn tick(&mut self, dt: Duration) -> &CameraPose {
        let snapshot = self.input.snapshot();
        let (pose, state) = integrate(
            &self.pose,
            &self.state,
            snapshot,
            dt.as_secs_f32(),
            &self.config,
        );
        self.pose = pose;
        self.state = state;
        &self.pose
    }

    /// Mouse look, applied immediately. Ignored unless the pointer is locked.
    pub fn look(&mut self, dx: f64, dy: f64) -> bool {
        if !self.input.pointer_locked() {
            return false;
        }
        self.input.pointer_moved(dx, dy);
        apply_look(&mut self.pose, dx, dy, self.config.sensitivity);
        true
    }

    pub fn handle_key(&mut self, key: KeyCode, state: ElementState, repeat: bool) -> InputResponse {
        let keys = self.config.keys;
        match state {
            ElementState::Pressed => {
                if key == keys.toggle_mode {
                    if !repeat {
                        self.toggle_mode();
                    }
                    return InputResponse::Consumed;
                }
                if key == keys.release_pointer {
                    self.input.set_pointer_locked(false);
                    return InputResponse::ReleasePointer;
                }
                self.input.key_down(key);
            }
            ElementState::Released => self.input.key_up(key),
        }
        if [
            keys.forward,
            keys.backward,
            keys.left,
            keys.right,
            keys.ascend,
            keys.descend,
        ]
        .contains(&key)
        {
            InputResponse::Consumed
        } else {
            InputResponse::Ignored
        }
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> InputResponse {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => self.handle_key(*key, *state, *repeat),
            WindowEvent::Focused(false) => {
                self.input.focus_lost();
                InputResponse::ReleasePointer
            }
            _ => InputResponse::Ignored,
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) -> InputResponse {
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } if self.look(*dx, *dy) => {
                InputResponse::Consumed
            }
            _ => InputResponse::Ignored,
        }
    }
}
