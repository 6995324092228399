// maplibre-jni/src/strategy/vulkan.rs
//
//! A surface provider for renderers that drive Vulkan themselves.
//!
//! There is no context to create or bind here. The renderer builds its own `VkSurfaceKHR` and
//! swapchain on the backend's native window; this provider reports the instance and device
//! extensions that requires.

use crate::error::Error;
use crate::surface::NativeSurface;
use super::{ContextState, ContextStrategy};

use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;

#[cfg(windows)]
const INSTANCE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_surface", c"VK_KHR_win32_surface"];
#[cfg(macos)]
const INSTANCE_EXTENSIONS: &[&CStr] =
    &[c"VK_KHR_surface", c"VK_EXT_metal_surface", c"VK_KHR_portability_enumeration"];
#[cfg(not(any(windows, macos)))]
const INSTANCE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_surface", c"VK_KHR_xlib_surface"];

const DEVICE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_swapchain"];

pub struct VulkanSurfaceProvider {
    state: ContextState,
}

impl VulkanSurfaceProvider {
    pub fn new() -> VulkanSurfaceProvider {
        VulkanSurfaceProvider { state: ContextState::Uninitialized }
    }
}

impl Default for VulkanSurfaceProvider {
    fn default() -> VulkanSurfaceProvider {
        VulkanSurfaceProvider::new()
    }
}

impl ContextStrategy for VulkanSurfaceProvider {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        debug!("Leaving {:?} to the Vulkan renderer", surface);
        self.state = ContextState::Ready;
        Ok(())
    }

    fn destroy(&mut self) {
        self.state = ContextState::Destroyed;
    }

    fn make_current(&mut self) -> Result<(), Error> {
        self.state.require_context()?;
        self.state = ContextState::Active;
        Ok(())
    }

    fn release_current(&mut self) {
        if self.state == ContextState::Active {
            self.state = ContextState::Inactive;
        }
    }

    // Presentation goes through the renderer's swapchain.
    fn swap_buffers(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn get_proc_address(&self, _: &str) -> *const c_void {
        ptr::null()
    }

    fn instance_extensions(&self) -> &'static [&'static CStr] {
        INSTANCE_EXTENSIONS
    }

    fn device_extensions(&self) -> &'static [&'static CStr] {
        DEVICE_EXTENSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_without_a_context() {
        let surface = NativeSurface::X11 { display: 0x10 as *mut c_void, window: 3 };
        let mut provider = VulkanSurfaceProvider::new();
        provider.create(&surface).unwrap();
        assert_eq!(provider.state(), ContextState::Ready);
        provider.make_current().unwrap();
        assert_eq!(provider.state(), ContextState::Active);
        provider.release_current();
        assert_eq!(provider.state(), ContextState::Inactive);
        provider.destroy();
        provider.destroy();
        assert!(matches!(provider.make_current(), Err(Error::ContextDestroyed)));
    }

    #[test]
    fn surface_extension_is_always_requested() {
        let provider = VulkanSurfaceProvider::new();
        assert_eq!(provider.instance_extensions()[0], c"VK_KHR_surface");
        let expected = if cfg!(target_os = "macos") { 3 } else { 2 };
        assert_eq!(provider.instance_extensions().len(), expected);
        assert_eq!(provider.device_extensions(), &[c"VK_KHR_swapchain"]);
    }
}
