// maplibre-jni/src/env.rs
//
//! Access to the JNI environment of the calling thread.
//!
//! A thread that isn't known to the VM yet is attached on first use and stays attached; detaching
//! it is the host's business.

use crate::error::Error;

use jni::{JNIEnv, JavaVM};

// Local references created inside one scope; the frame grows past this if needed.
const LOCAL_FRAME_CAPACITY: i32 = 16;

/// Returns the calling thread's environment, attaching the thread if necessary.
pub fn current_env(vm: &JavaVM) -> Result<JNIEnv<'_>, Error> {
    match vm.get_env() {
        Ok(env) => Ok(env),
        Err(_) => {
            debug!("Attaching thread {:?} to the VM", std::thread::current().id());
            Ok(vm.attach_current_thread_permanently()?)
        }
    }
}

/// Runs `f` with the calling thread's environment inside a fresh local reference frame.
///
/// Every local reference `f` creates is released when it returns.
pub fn with_env<T, F>(vm: &JavaVM, f: F) -> Result<T, Error>
                      where F: FnOnce(&mut JNIEnv) -> Result<T, Error> {
    let mut env = current_env(vm)?;
    env.with_local_frame(LOCAL_FRAME_CAPACITY, f)
}

/// Raises `java.lang.RuntimeException` with `message`, unless an exception is already pending.
pub fn throw_runtime_exception(env: &mut JNIEnv, message: &str) {
    if env.exception_check().unwrap_or(false) {
        debug!("Exception already pending; not raising \"{}\"", message);
        return;
    }
    if let Err(err) = env.throw_new("java/lang/RuntimeException", message) {
        error!("Couldn't raise RuntimeException(\"{}\"): {}", message, err);
    }
}
