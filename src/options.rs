// maplibre-jni/src/options.rs
//
//! Runtime configuration for a render backend.

use crate::info::ContextAttributes;

/// Whether the backend fences the GPU before presenting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapBehaviour {
    /// Present straight away.
    Normal,
    /// Issue `glFinish` before the platform swap call.
    Flush,
}

/// Which context strategy a backend is built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Whatever this build selected for the target platform.
    Default,
    Egl,
    Glx,
    Wgl,
    Metal,
    Vulkan,
}

/// Options used when a [`RenderBackend`](crate::RenderBackend) and its strategy are created.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub strategy: StrategyKind,
    /// Pixel format and version request. `None` picks the strategy's own default: desktop GL 3.0
    /// compatibility for WGL/GLX, GLES 3 falling back to GLES 2 for EGL.
    pub attributes: Option<ContextAttributes>,
    pub swap_behaviour: SwapBehaviour,
    /// Applied once after context creation. `None` leaves the driver default alone.
    pub swap_interval: Option<i32>,
    pub pixel_ratio: f32,
}

impl Default for BackendOptions {
    fn default() -> BackendOptions {
        BackendOptions {
            strategy: StrategyKind::Default,
            attributes: None,
            swap_behaviour: SwapBehaviour::Normal,
            swap_interval: Some(1),
            pixel_ratio: 1.0,
        }
    }
}

impl BackendOptions {
    #[inline]
    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> BackendOptions {
        self.pixel_ratio = pixel_ratio;
        self
    }

    #[inline]
    pub fn with_strategy(mut self, strategy: StrategyKind) -> BackendOptions {
        self.strategy = strategy;
        self
    }

    #[inline]
    pub fn with_swap_behaviour(mut self, swap_behaviour: SwapBehaviour) -> BackendOptions {
        self.swap_behaviour = swap_behaviour;
        self
    }
}
