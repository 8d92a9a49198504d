//! Single instance lock.
//!
//! GPIO lines are exclusively owned: a second monitor process on the same
//! host would fight over the same pins. The lock is a bound Unix socket,
//! so a crashed process leaves nothing a restart cannot reclaim.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "security-monitor.sock";

#[derive(Debug, Error)]
pub enum InstanceLockError {
    #[error("another security-monitor instance is already running")]
    AlreadyRunning,

    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the process; the socket file is removed on
/// drop and reclaimed on restart after a crash.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire() -> Result<Self, InstanceLockError> {
        let path = Self::socket_path();

        // A leftover socket from a SIGKILL'd process refuses connections;
        // a live instance accepts them.
        if path.exists() {
            match UnixStream::connect(&path) {
                Ok(_) => return Err(InstanceLockError::AlreadyRunning),
                Err(_) => {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(InstanceLockError::AlreadyRunning)
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn socket_path() -> PathBuf {
        let base = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        Self::socket_path_in(&base)
    }

    fn socket_path_in(base: &Path) -> PathBuf {
        base.join(SOCKET_NAME)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_appends_socket_name() {
        assert_eq!(
            InstanceLock::socket_path_in(Path::new("/run/user/1000")),
            PathBuf::from("/run/user/1000/security-monitor.sock")
        );
        assert_eq!(
            InstanceLock::socket_path_in(Path::new("/tmp")),
            PathBuf::from("/tmp/security-monitor.sock")
        );
    }
}
