//! Centralized path configuration for usbpass.
//!
//! All data paths go through this module so the daemon and any embedding
//! process agree on locations, whether running as a user or a system service.

use std::path::PathBuf;

/// Get the usbpass data directory.
///
/// Resolution order:
/// 1. `USBPASS_DATA_DIR` environment variable
/// 2. `/var/lib/usbpass` if it exists (system install)
/// 3. `~/.usbpass` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("USBPASS_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/usbpass");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".usbpass")).unwrap_or(system_dir)
}

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    data_dir()
}

/// Get the runtime directory for sockets and PID files.
///
/// Resolution order:
/// 1. `USBPASS_RUNTIME_DIR` environment variable
/// 2. `$XDG_RUNTIME_DIR/usbpass` if XDG_RUNTIME_DIR is set
/// 3. `/run/usbpass` if running as root
/// 4. `/tmp/usbpass-runtime` as fallback
pub fn runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("USBPASS_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(xdg).join("usbpass");
    }

    #[cfg(unix)]
    {
        if unsafe { libc::geteuid() } == 0 {
            return PathBuf::from("/run/usbpass");
        }
    }

    PathBuf::from("/tmp/usbpass-runtime")
}
