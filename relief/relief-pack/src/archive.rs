//! Unpacking a package into a scratch directory and repacking it.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{PackError, PackResult};

/// A 3MF package unpacked into a scratch directory.
///
/// Metadata rewrites happen against the unpacked tree; [`repack`] then
/// replaces the destination atomically (write to a `.tmp` sibling, then
/// rename), so a crash mid-rebuild never leaves a truncated package
/// behind. The scratch directory is removed on drop.
///
/// [`repack`]: PackageArchive::repack
#[derive(Debug)]
pub struct PackageArchive {
    root: TempDir,
}

impl PackageArchive {
    /// Unpack a package into a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the package cannot be opened or is not a
    /// readable ZIP archive.
    pub fn unpack<P: AsRef<Path>>(package: P) -> PackResult<Self> {
        let package = package.as_ref();
        let file = File::open(package).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PackError::PackageNotFound {
                    path: package.to_path_buf(),
                }
            } else {
                PackError::Io(e)
            }
        })?;
        let mut zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| PackError::invalid_archive(format!("invalid ZIP archive: {e}")))?;

        let root = TempDir::new()?;
        zip.extract(root.path())
            .map_err(|e| PackError::invalid_archive(format!("failed to unpack: {e}")))?;

        debug!(
            entries = zip.len(),
            root = %root.path().display(),
            "unpacked package"
        );
        Ok(Self { root })
    }

    /// Root of the unpacked tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Repack the tree over `dest`, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive cannot be written or the final
    /// rename fails.
    pub fn repack<P: AsRef<Path>>(&self, dest: P) -> PackResult<()> {
        let dest = dest.as_ref();
        let staging = staging_path(dest);

        let file = File::create(&staging)?;
        let mut zip = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut files = Vec::new();
        collect_files(self.root.path(), &mut files)?;
        files.sort();

        for path in &files {
            let name = path
                .strip_prefix(self.root.path())
                .map_err(|e| PackError::invalid_content(format!("bad entry path: {e}")))?;
            // ZIP entry names always use forward slashes.
            let name = name
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            zip.start_file(&name, options)
                .map_err(|e| PackError::invalid_archive(format!("failed to start {name}: {e}")))?;
            zip.write_all(&fs::read(path)?)?;
        }

        zip.finish()
            .map_err(|e| PackError::invalid_archive(format!("failed to finalize archive: {e}")))?;
        fs::rename(&staging, dest)?;

        info!(entries = files.len(), dest = %dest.display(), "repacked package");
        Ok(())
    }
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut staging = dest.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> PackResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
