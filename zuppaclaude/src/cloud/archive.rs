//! Zip packaging of backup folders for the remote.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::{Result, ZuppaError};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Packs a folder into a single archive and back.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait ArchiveTool: Send + Sync {
    /// Archive `src` so that every entry sits under a top-level folder named
    /// after `src`.
    fn compress_dir(&self, src: &Path, archive: &Path) -> Result<()>;

    /// Unpack `archive` into `dest`, creating it if needed
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Deflate-compressed zip files
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl ArchiveTool for ZipArchiver {
    fn compress_dir(&self, src: &Path, archive: &Path) -> Result<()> {
        let root = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ZuppaError::Archive(format!("cannot archive {}", src.display())))?;
        if !src.is_dir() {
            return Err(ZuppaError::Archive(format!("{} is not a directory", src.display())));
        }

        let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.add_directory(format!("{}/", root), options)?;
        for file in walk_directory(src, WalkOptions::default())? {
            let relative: Vec<String> = file
                .relative_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            zip.start_file(format!("{}/{}", root, relative.join("/")), options)?;
            let mut input = BufReader::new(File::open(&file.path)?);
            io::copy(&mut input, &mut zip)?;
        }

        zip.finish()?.flush()?;
        Ok(())
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
        zip.extract(dest)?;
        Ok(())
    }
}
