//! Thin filesystem wrapper for permission bits.
//!
//! The rest of privedit calls these helpers instead of reaching for
//! `std::os::unix` directly, so the Unix-only pieces stay in one place.
//! On other platforms the helpers report `Unsupported`.

use std::io;
use std::path::Path;

use crate::common::Mode;

pub use std::fs::*;

#[cfg(unix)]
/// Set POSIX permission bits on Unix.
pub fn set_unix_permissions(path: &Path, mode: Mode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode.bits()))
}

#[cfg(unix)]
/// Read POSIX permission bits on Unix. Symlinks are followed.
pub fn unix_permissions(path: &Path) -> io::Result<Mode> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path)?;
    Ok(Mode::from_bits(meta.permissions().mode()))
}

#[cfg(not(unix))]
pub fn set_unix_permissions(_path: &Path, _mode: Mode) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "POSIX permissions are not available"))
}

#[cfg(not(unix))]
pub fn unix_permissions(_path: &Path) -> io::Result<Mode> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "POSIX permissions are not available"))
}
