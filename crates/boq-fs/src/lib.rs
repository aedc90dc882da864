//! Filesystem helpers for the BOQ image pipeline.
//!
//! Stored images are immutable: a key is written once and never replaced. [`write_new`] gives
//! that "create, never replace" guarantee while staying crash safe. Readers never observe a
//! partially written file at the destination.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Write `bytes` to a new file at `dest`.
///
/// Missing parent directories are created. The data is written to a temp file in the destination
/// directory, synced, and then linked into place only if `dest` does not exist yet. An existing
/// file fails the call with [`io::ErrorKind::AlreadyExists`] and is left untouched; on any other
/// error nothing is left behind.
pub fn write_new(dest: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    let dest = dest.as_ref();
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(dest).map_err(|err| err.error)?;

    // Directory sync is best-effort; the file itself is already durable.
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}
