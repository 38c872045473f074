//! Process-wide V8 platform.
//!
//! The platform must be initialized once before any isolate is created and
//! stay alive for the rest of the process. Initialization is idempotent.

use once_cell::sync::OnceCell;

static PLATFORM: OnceCell<v8::SharedRef<v8::Platform>> = OnceCell::new();

/// Initialize the V8 platform. Subsequent calls are no-ops.
pub fn initialize_platform() -> Result<(), String> {
    PLATFORM
        .get_or_try_init(|| {
            // 0 worker threads = V8's default pool size; no idle tasks.
            let platform = v8::new_default_platform(0, false).make_shared();
            v8::V8::initialize_platform(platform.clone());
            v8::V8::initialize();

            tracing::debug!("V8 platform initialized");
            Ok(platform)
        })
        .map(|_| ())
}

/// Whether [`initialize_platform`] has completed.
pub fn is_platform_initialized() -> bool {
    PLATFORM.get().is_some()
}
