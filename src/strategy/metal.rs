// maplibre-jni/src/strategy/metal.rs
//
//! The macOS surface provider.
//!
//! The renderer attaches its own `CAMetalLayer` to the layer host JAWT hands out, which it reads
//! from the backend's native surface. Activation and presentation belong to Metal, so everything
//! here but bookkeeping is a no-op.

use crate::error::Error;
use crate::surface::NativeSurface;
use super::{ContextState, ContextStrategy};

use std::os::raw::c_void;
use std::ptr;

pub struct MetalLayerProvider {
    state: ContextState,
}

impl MetalLayerProvider {
    pub fn new() -> MetalLayerProvider {
        MetalLayerProvider { state: ContextState::Uninitialized }
    }
}

impl ContextStrategy for MetalLayerProvider {
    fn name(&self) -> &'static str {
        "metal"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn create(&mut self, surface: &NativeSurface) -> Result<(), Error> {
        self.state.require_uninitialized()?;
        if !matches!(*surface, NativeSurface::MacLayer { .. }) {
            return Err(Error::IncompatibleNativeSurface);
        }
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

    fn swap_buffers(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn get_proc_address(&self, _: &str) -> *const c_void {
        ptr::null()
    }
}
