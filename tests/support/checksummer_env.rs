use std::{
    ffi::OsString,
    path::Path,
    sync::{Mutex, OnceLock},
};

use checksummer::app_dirs::CONFIG_HOME_ENV;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points `CHECKSUMMER_CONFIG_HOME` at a test directory until dropped.
pub struct ChecksummerEnvGuard {
    previous: Option<OsString>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl ChecksummerEnvGuard {
    pub fn set_config_home(path: &Path) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = std::env::var_os(CONFIG_HOME_ENV);
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME_ENV, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for ChecksummerEnvGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            Some(value) => unsafe { std::env::set_var(CONFIG_HOME_ENV, value) },
            // SAFETY: as above.
            None => unsafe { std::env::remove_var(CONFIG_HOME_ENV) },
        }
    }
}
