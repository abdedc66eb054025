//! On-disk key files for the master key and the session signing key.
//!
//! A key file is exactly 32 random bytes.  It is written with
//! owner-only permissions and loaded once at process start.

use std::fs;
use std::path::Path;

use rand::RngCore;
use zeroize::Zeroizing;

use super::keys::KEY_LEN;
use crate::errors::{KeepError, Result};

/// Generate a new random key file at `path`.
///
/// Refuses to overwrite an existing file unless `force` is set.
/// On Unix the file is restricted to owner read/write.
pub fn generate_keyfile(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(KeepError::KeyfileExists(path.to_path_buf()));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut key[..]);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                KeepError::KeyfileError(format!("cannot create keyfile directory: {e}"))
            })?;
        }
    }

    fs::write(path, &key[..])
        .map_err(|e| KeepError::KeyfileError(format!("failed to write keyfile: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(|e| {
            KeepError::KeyfileError(format!("failed to set keyfile permissions: {e}"))
        })?;
    }

    Ok(())
}

/// Load a key file from disk and validate its length.
pub fn load_keyfile(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    if !path.exists() {
        return Err(KeepError::KeyfileError(format!(
            "keyfile not found at {} (create one with `secretkeep gen-key`)",
            path.display()
        )));
    }

    let data = Zeroizing::new(
        fs::read(path)
            .map_err(|e| KeepError::KeyfileError(format!("failed to read keyfile: {e}")))?,
    );

    if data.len() != KEY_LEN {
        return Err(KeepError::KeyfileError(format!(
            "keyfile {} must be exactly {} bytes, got {}",
            path.display(),
            KEY_LEN,
            data.len()
        )));
    }

    Ok(data)
}
