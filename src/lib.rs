//! Gesture Tree
//!
//! A 3D holiday tree of a few thousand particles that a webcam-tracked hand
//! can gather into a tree, scatter into a cloud or pull a photo to the front.
//!
//! The binary wires these modules into a winit event loop:
//! - [`perception`] turns webcam frames into hand landmarks off-thread
//! - [`gesture`] classifies landmarks into an [`gesture::AppMode`]
//! - [`scene`] places and eases every particle for the current mode
//! - [`render`] draws the particles with bloom into the window

pub mod app;
pub mod camera;
pub mod gesture;
pub mod ml;
pub mod perception;
pub mod render;
pub mod scene;
pub mod settings;
pub mod textures;
pub mod ui;

pub use app::{App, AppError};
pub use settings::Settings;
