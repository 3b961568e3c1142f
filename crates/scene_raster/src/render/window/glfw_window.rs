//! Window management using GLFW
//!
//! Cross-platform window creation and event pumping for Vulkan. The window
//! is created without a client API; swapchain and surface lifetime belong to
//! the application.

use ash::vk;
use thiserror::Error;

use super::DisplaySurface;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// `glfwInit` failed
    #[error("GLFW initialization failed: {0}")]
    InitializationFailed(String),

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Vulkan is not usable through GLFW on this system
    #[error("Vulkan unsupported: {0}")]
    VulkanUnsupported(String),

    /// Surface creation returned an error
    #[error("Failed to create Vulkan surface: {0:?}")]
    SurfaceCreation(vk::Result),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window with its event receiver
pub struct GlfwWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
}

impl GlfwWindow {
    /// Create a resizable window with no client API
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|e| WindowError::InitializationFailed(format!("{e:?}")))?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported(
                "no Vulkan loader found".to_string(),
            ));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created {}x{} window '{}'", width, height, title);
        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
        })
    }

    /// Framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (
            u32::try_from(width).unwrap_or(0),
            u32::try_from(height).unwrap_or(0),
        )
    }

    /// Framebuffer size as a Vulkan extent
    pub fn extent(&self) -> vk::Extent2D {
        let (width, height) = self.framebuffer_size();
        vk::Extent2D { width, height }
    }

    /// Ask the window to close at the next display loop advance
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Whether the framebuffer was resized since the last call
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            WindowError::VulkanUnsupported("no surface instance extensions".to_string())
        })
    }

    /// Create a Vulkan surface for this window
    pub fn create_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreation(result))
        }
    }
}

impl DisplaySurface for GlfwWindow {
    fn should_close(&self) -> bool {
        self.window.should_close()
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }
}
