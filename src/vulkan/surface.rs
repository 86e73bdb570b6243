//! Surface provider seam between the renderer and the windowing
//! collaborator. The renderer only ever sees a `vk::SurfaceKHR`, the
//! instance extensions it implies, and a framebuffer extent.

use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::{RendererError, Result};

/// Source of the Vulkan presentation surface.
pub trait SurfaceProvider {
    /// Create the surface against an existing instance.
    ///
    /// # Safety
    /// `entry` and `instance` must be valid, and the surface must be
    /// destroyed before the instance.
    unsafe fn create_surface(&self, entry: &Entry, instance: &Instance)
        -> Result<vk::SurfaceKHR>;

    /// Instance extensions the surface requires.
    fn required_extensions(&self) -> Result<Vec<*const i8>>;

    /// Current framebuffer extent in pixels.
    fn extent(&self) -> vk::Extent2D;
}

/// Surface provider backed by any window handle pair (e.g. a
/// `winit::window::Window`).
pub struct WindowSurfaceProvider<W> {
    window: W,
    width: u32,
    height: u32,
}

impl<W> WindowSurfaceProvider<W> {
    pub fn new(window: W, width: u32, height: u32) -> Self {
        Self {
            window,
            width,
            height,
        }
    }

    /// Update the cached extent after a window resize.
    pub fn set_extent(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

impl<W: HasWindowHandle + HasDisplayHandle> SurfaceProvider for WindowSurfaceProvider<W> {
    unsafe fn create_surface(
        &self,
        entry: &Entry,
        instance: &Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display = self.window.display_handle().map_err(|e| {
            RendererError::DeviceInitFailed(format!("Failed to get display handle: {e}"))
        })?;
        let window = self.window.window_handle().map_err(|e| {
            RendererError::DeviceInitFailed(format!("Failed to get window handle: {e}"))
        })?;

        ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
            .map_err(|e| RendererError::DeviceInitFailed(format!("Failed to create surface: {e:?}")))
    }

    fn required_extensions(&self) -> Result<Vec<*const i8>> {
        let display = self.window.display_handle().map_err(|e| {
            RendererError::DeviceInitFailed(format!("Failed to get display handle: {e}"))
        })?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| {
                RendererError::DeviceInitFailed(format!(
                    "Failed to query surface extensions: {e:?}"
                ))
            })?;

        Ok(extensions.to_vec())
    }

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}
