//! splat-roam
//!
//! Geometry decoding and first-person navigation for a browser or desktop model viewer. glTF
//! meshes are decoded from their accessor/bufferView/buffer graph, PLY point clouds (including
//! Gaussian splats) are reconstructed from loosely named vertex properties, and a two-mode
//! camera controller walks or flies through the result.
//!
//! High-level modules
//! - `camera`: camera pose, navigation controller (free flight and physics walk) and projection
//! - `context`: window context owning the controller and the pointer lock
//! - `data_structures`: plain data models (accessors, attribute tables, decoded meshes)
//! - `error`: the decoding error taxonomy
//! - `flow`: the windowed event loop and the [`flow::SceneSurface`] seam for renderers
//! - `loading`: load orchestration with stale-result protection
//! - `resources`: file loading, glTF/PLY parsing, decoding and point sampling
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod loading;
pub mod resources;

pub use error::DecodeError;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;
pub use winit::keyboard::KeyCode;
