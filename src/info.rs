// maplibre-jni/src/info.rs
//
//! OpenGL information.

use bitflags::bitflags;

/// Describes the OpenGL version that is requested when a context is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GLVersion {
    pub major: u8,
    pub minor: u8,
}

impl GLVersion {
    #[inline]
    pub fn new(major: u8, minor: u8) -> GLVersion {
        GLVersion { major, minor }
    }
}

/// The desktop GL profile requested through `*_ARB_create_context_profile`.
///
/// Ignored for OpenGL ES.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GLProfile {
    Core,
    Compatibility,
}

bitflags! {
    /// Optional buffers the pixel format must carry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ContextAttributeFlags: u8 {
        const ALPHA   = 0x01;
        const DEPTH   = 0x02;
        const STENCIL = 0x04;
    }
}

/// What a strategy asks the platform for when it picks a pixel format and creates a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextAttributes {
    pub version: GLVersion,
    pub profile: GLProfile,
    pub flags: ContextAttributeFlags,
}

pub(crate) const RGB_CHANNEL_BIT_DEPTH: i32 = 8;

impl ContextAttributes {
    /// Desktop GL 3.0 with the compatibility profile and an RGBA8888/D24/S8 pixel format.
    pub fn desktop_gl() -> ContextAttributes {
        ContextAttributes {
            version: GLVersion::new(3, 0),
            profile: GLProfile::Compatibility,
            flags: ContextAttributeFlags::all(),
        }
    }

    /// OpenGL ES 3.0 (falling back to 2.0) with an RGBA8888/D24/S8 pixel format.
    pub fn gles() -> ContextAttributes {
        ContextAttributes {
            version: GLVersion::new(3, 0),
            profile: GLProfile::Core,
            flags: ContextAttributeFlags::all(),
        }
    }

    #[inline]
    pub(crate) fn alpha_bits(&self) -> i32 {
        if self.flags.contains(ContextAttributeFlags::ALPHA) { 8 } else { 0 }
    }

    #[inline]
    pub(crate) fn depth_bits(&self) -> i32 {
        if self.flags.contains(ContextAttributeFlags::DEPTH) { 24 } else { 0 }
    }

    #[inline]
    pub(crate) fn stencil_bits(&self) -> i32 {
        if self.flags.contains(ContextAttributeFlags::STENCIL) { 8 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pixel_format_is_rgba8_d24_s8() {
        let attributes = ContextAttributes::desktop_gl();
        assert_eq!(attributes.alpha_bits(), 8);
        assert_eq!(attributes.depth_bits(), 24);
        assert_eq!(attributes.stencil_bits(), 8);
        assert_eq!(attributes.profile, GLProfile::Compatibility);
    }

    #[test]
    fn missing_flags_zero_the_bits() {
        let attributes = ContextAttributes {
            flags: ContextAttributeFlags::DEPTH,
            ..ContextAttributes::gles()
        };
        assert_eq!(attributes.alpha_bits(), 0);
        assert_eq!(attributes.depth_bits(), 24);
        assert_eq!(attributes.stencil_bits(), 0);
    }
}
