//! Surface trait the display loop pumps

/// Windowing surface that can be asked to close and pumped for events.
///
/// Implemented by [`super::GlfwWindow`]; tests substitute scripted surfaces.
/// Surfaces are driven from the thread that created them.
pub trait DisplaySurface {
    /// Whether the user or the application requested the surface to close
    fn should_close(&self) -> bool;

    /// Drain pending window system events
    fn poll_events(&mut self);
}

