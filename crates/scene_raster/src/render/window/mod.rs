//! Window and display pumping
//!
//! [`DisplayLoop`] drives any [`DisplaySurface`]; [`GlfwWindow`] is the GLFW
//! implementation used by applications.

mod backend;
mod display_loop;
mod glfw_window;

pub use backend::DisplaySurface;
pub use display_loop::{DisplayIteration, DisplayLoop};
pub use glfw_window::{GlfwWindow, WindowError, WindowResult};
