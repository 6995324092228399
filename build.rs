// maplibre-jni/build.rs
//
//! The `maplibre-jni` build script.

use cfg_aliases::cfg_aliases;
use gl_generator::{Api, Fallbacks, Profile, Registry, StructGenerator};
use std::env;
use std::fs::File;
use std::path::PathBuf;

fn main() {
    // Setup aliases for #[cfg] checks
    cfg_aliases! {
        // Platforms
        windows: { target_os = "windows" },
        macos: { target_os = "macos" },
        linux: { all(unix, not(any(macos, target_os = "android"))) },

        // Strategies compiled into this build.
        egl: { any(linux, all(windows, feature = "angle")) },
        glx: { linux },
        wgl: { windows },

        // The strategy `default_strategy()` hands out.
        vulkan_default: { feature = "vulkan-default" },
        egl_default: { all(not(vulkan_default), any(all(linux, feature = "egl-default"),
                                                      all(windows, feature = "angle-default"))) },
        glx_default: { all(not(vulkan_default), linux, not(feature = "egl-default")) },
        wgl_default: { all(not(vulkan_default), windows, not(feature = "angle-default")) },
        metal_default: { all(not(vulkan_default), macos) },
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    let target_family = env::var("CARGO_CFG_TARGET_FAMILY").ok();
    let dest = PathBuf::from(&env::var("OUT_DIR").unwrap());

    // Generate EGL bindings.
    if (target_os == "windows" && cfg!(feature = "angle"))
        || (target_family.as_deref() == Some("unix") && target_os != "macos")
    {
        let mut file = File::create(dest.join("egl_bindings.rs")).unwrap();
        let registry = Registry::new(Api::Egl, (1, 5), Profile::Core, Fallbacks::All, []);
        registry.write_bindings(StructGenerator, &mut file).unwrap();
    }

    // Generate GL bindings. Only the handful of calls the backend issues itself are needed, so
    // desktop GL 3.0 covers both the desktop and the GLES paths.
    let mut file = File::create(dest.join("gl_bindings.rs")).unwrap();
    let registry = Registry::new(Api::Gl, (3, 0), Profile::Core, Fallbacks::All, []);
    registry.write_bindings(StructGenerator, &mut file).unwrap();
}
