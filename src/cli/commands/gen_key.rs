//! `secretkeep gen-key`: write a fresh random key file.

use std::path::Path;

use crate::cli::output;
use crate::crypto::keyfile::generate_keyfile;
use crate::errors::Result;

/// Execute the `gen-key` command.
pub fn execute(path: &Path, force: bool) -> Result<()> {
    let existed = path.exists();
    generate_keyfile(path, force)?;

    if existed {
        output::warning(&format!("Overwrote existing key file {}", path.display()));
    }
    output::success(&format!("Key file written to {}", path.display()));
    output::tip("Keep this file private. Losing the master key makes stored secrets unreadable.");
    Ok(())
}
