//! Copy and write primitives with the guarantees backups and restores rely on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Highest numbered `.restored-N` sibling tried before giving up
const MAX_CONFLICT_SUFFIX: usize = 999;

/// Write `body` to `path` via a temp file and rename.
///
/// Readers see either the old content or the new content, never a prefix.
pub fn atomic_write(path: &Path, body: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file path for atomic write: {}", path.display()),
            )
        })?;
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::write(&tmp, body)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Copy `src` to `dest` without ever replacing an existing file.
///
/// When `dest` is taken, the content goes to `<stem>.restored.<ext>`, then
/// `<stem>.restored-2.<ext>` and so on. Returns the path actually written.
pub fn copy_no_clobber(src: &Path, dest: &Path) -> io::Result<PathBuf> {
    for candidate in conflict_candidates(dest) {
        let mut output = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        let copied = fs::File::open(src).and_then(|mut input| io::copy(&mut input, &mut output));
        if let Err(e) = copied {
            drop(output);
            let _ = fs::remove_file(&candidate);
            return Err(e);
        }
        return Ok(candidate);
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free restore name left for {}", dest.display()),
    ))
}

/// `dest` first, then the `.restored` siblings in order
fn conflict_candidates(dest: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = dest.extension().map(|e| e.to_string_lossy().to_string());

    std::iter::once(dest.to_path_buf()).chain((1..=MAX_CONFLICT_SUFFIX).map(move |n| {
        let marker = if n == 1 {
            "restored".to_string()
        } else {
            format!("restored-{}", n)
        };
        let name = match &ext {
            Some(ext) => format!("{}.{}.{}", stem, marker, ext),
            None => format!("{}.{}", stem, marker),
        };
        dest.with_file_name(name)
    }))
}

/// Move every entry of `from` into `to`, creating `to` if needed.
pub fn move_dir_contents(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        fs::rename(entry.path(), to.join(entry.file_name()))?;
    }
    Ok(())
}
