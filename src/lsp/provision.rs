//! Log directory provisioning.
//!
//! The server opens its log file unconditionally at startup, so the parent
//! directory has to exist and be writable before the process is launched.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::ProvisionError;

/// Ensures the directory that will hold `log_path` exists and is writable.
///
/// Missing ancestors are created. Calling this again for the same path is a
/// no-op that returns `true`. On failure the cause is logged and `false` is
/// returned; callers must not launch the server in that case.
pub fn ensure_log_directory(log_path: &Path) -> bool {
    match provision_log_directory(log_path) {
        Ok(dir) => {
            debug!(log_dir = %dir.display(), "log directory ready");
            true
        }
        Err(e) => {
            error!(
                log_path = %log_path.display(),
                error = %e,
                "cannot provision log directory"
            );
            false
        }
    }
}

/// Fallible form of [`ensure_log_directory`], returning the directory used.
/// ## Errors
/// `ProvisionError` naming why the directory is unusable.
pub fn provision_log_directory(log_path: &Path) -> Result<PathBuf, ProvisionError> {
    let dir = log_directory(log_path);

    match fs::metadata(&dir) {
        Ok(meta) if !meta.is_dir() => return Err(ProvisionError::NotADirectory(dir)),
        Ok(_) => {}
        Err(_) => {
            fs::create_dir_all(&dir).map_err(|source| ProvisionError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
            debug!(log_dir = %dir.display(), "created log directory");
        }
    }

    check_writable(&dir).map_err(|source| ProvisionError::NotWritable {
        path: dir.clone(),
        source,
    })?;

    Ok(dir)
}

/// Asks the kernel whether the real user may create entries in `dir`.
///
/// Ownership, ACLs and read-only mounts all count, not just the mode bits.
#[cfg(unix)]
fn check_writable(dir: &Path) -> std::io::Result<()> {
    use nix::unistd::{AccessFlags, access};

    access(dir, AccessFlags::W_OK | AccessFlags::X_OK).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn check_writable(dir: &Path) -> std::io::Result<()> {
    if fs::metadata(dir)?.permissions().readonly() {
        return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
    }
    Ok(())
}

/// Parent directory of a log path; a bare file name lives in `.`.
fn log_directory(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
