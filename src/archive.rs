//! Archive extraction.
//!
//! Archives are unpacked into `<destination>/<stem>/` before the archive
//! file itself is moved. A failed extraction is reported as an outcome and
//! never stops the archive from being sorted like any other file.

use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Why an archive could not be unpacked
#[derive(Error, Debug)]
pub enum UnpackError {
    /// No unpacker exists for this extension
    #[error("unsupported archive format '{extension}'")]
    Unsupported { extension: String },

    /// Reading the archive or writing its entries failed
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The zip container is malformed
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    /// The tarball holds no entries
    #[error("archive has no entries")]
    Empty,

    /// Something other than a real directory sits at the destination
    #[error("destination {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
}

/// Supported archive container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.gz`, read as a gzip-compressed tarball
    TarGz,
}

impl ArchiveFormat {
    /// Picks the unpacker for a lowercase, dotted extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".zip" => Some(ArchiveFormat::Zip),
            ".gz" | ".tgz" => Some(ArchiveFormat::TarGz),
            _ => None,
        }
    }
}

/// Result of trying to unpack one archive
#[derive(Debug)]
pub enum UnpackOutcome {
    /// Contents were written to `destination`
    Extracted {
        archive: PathBuf,
        destination: PathBuf,
    },

    /// Nothing usable was extracted; the archive is left as it was
    Failed { archive: PathBuf, reason: String },
}

impl UnpackOutcome {
    /// Returns true if this outcome represents a successful extraction
    pub fn is_success(&self) -> bool {
        matches!(self, UnpackOutcome::Extracted { .. })
    }

    /// Returns the archive this outcome is about
    pub fn archive(&self) -> &Path {
        match self {
            UnpackOutcome::Extracted { archive, .. } => archive,
            UnpackOutcome::Failed { archive, .. } => archive,
        }
    }
}

/// Unpacks `file_path` into `destination_dir/<file stem>/`.
///
/// The archive file is only read. If the extraction fails, a destination
/// directory created by this call is removed again.
pub fn unpack(file_path: &Path, destination_dir: &Path) -> UnpackOutcome {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "archive".into());
    let target = destination_dir.join(stem);
    let existed = fs::symlink_metadata(&target).is_ok();

    match unpack_into(file_path, &target) {
        Ok(()) => {
            debug!(
                archive = %file_path.display(),
                destination = %target.display(),
                "Archive unpacked"
            );
            UnpackOutcome::Extracted {
                archive: file_path.to_path_buf(),
                destination: target,
            }
        }
        Err(e) => {
            if !existed && fs::symlink_metadata(&target).is_ok() {
                let _ = fs::remove_dir_all(&target);
            }
            warn!(
                archive = %file_path.display(),
                error = %e,
                "Unable to unpack archive, it may not be a valid archive"
            );
            UnpackOutcome::Failed {
                archive: file_path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

fn unpack_into(file_path: &Path, target: &Path) -> Result<(), UnpackError> {
    let extension = crate::file_category::extension_of(file_path);
    let format = ArchiveFormat::from_extension(&extension)
        .ok_or(UnpackError::Unsupported { extension })?;

    // never write through a symlink or into a file
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => {
            return Err(UnpackError::NotADirectory {
                path: target.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let file = File::open(file_path)?;
    match format {
        ArchiveFormat::Zip => {
            let mut archive = zip::ZipArchive::new(file)?;
            fs::create_dir_all(target)?;
            // only writes entries whose names stay inside `target`
            archive.extract(target)?;
        }
        ArchiveFormat::TarGz => {
            let mut archive = tar::Archive::new(GzDecoder::new(file));
            fs::create_dir_all(target)?;
            let mut unpacked = 0usize;
            for entry in archive.entries()? {
                let mut entry = entry?;
                // entries escaping `target` are skipped, not written
                if entry.unpack_in(target)? {
                    unpacked += 1;
                }
            }
            if unpacked == 0 {
                return Err(UnpackError::Empty);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).expect("Failed to create zip");
        let mut writer = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).expect("Failed to start entry");
            writer
                .write_all(content.as_bytes())
                .expect("Failed to write entry");
        }
        writer.finish().expect("Failed to finish zip");
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).expect("Failed to create tar.gz");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .expect("Failed to append entry");
        }
        builder
            .into_inner()
            .expect("Failed to finish tar")
            .finish()
            .expect("Failed to finish gzip");
    }

    #[test]
    fn test_unpack_zip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("pack.zip");
        write_zip(&archive, &[("a.txt", "alpha"), ("nested/b.txt", "beta")]);
        let dest = temp_dir.path().join("Archives");

        let outcome = unpack(&archive, &dest);

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(
            fs::read_to_string(dest.join("pack").join("a.txt")).unwrap(),
            "alpha"
        );
        assert_eq!(
            fs::read_to_string(dest.join("pack").join("nested").join("b.txt")).unwrap(),
            "beta"
        );
        assert!(archive.exists(), "archive must be left in place");
    }

    #[test]
    fn test_unpack_tar_gz() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("bundle.tar.gz");
        write_tar_gz(&archive, &[("notes.txt", "hello")]);
        let dest = temp_dir.path().join("Archives");

        let outcome = unpack(&archive, &dest);

        assert!(outcome.is_success(), "{:?}", outcome);
        assert_eq!(
            fs::read_to_string(dest.join("bundle.tar").join("notes.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_unpack_corrupted_zip_fails_cleanly() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("broken.zip");
        fs::write(&archive, b"PK\x03\x04 definitely not a zip").unwrap();
        let dest = temp_dir.path().join("Archives");

        let outcome = unpack(&archive, &dest);

        assert!(!outcome.is_success());
        assert_eq!(outcome.archive(), archive.as_path());
        assert!(!dest.join("broken").exists());
        assert!(archive.exists());
    }

    #[test]
    fn test_unpack_unsupported_format() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("odd.tzr");
        fs::write(&archive, b"whatever").unwrap();

        match unpack(&archive, temp_dir.path()) {
            UnpackOutcome::Failed { reason, .. } => {
                assert!(reason.contains("unsupported"), "reason: {}", reason)
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_unpack_keeps_preexisting_destination_on_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("data.gz");
        fs::write(&archive, b"not gzip at all").unwrap();
        let dest = temp_dir.path().join("Archives");
        fs::create_dir_all(dest.join("data")).unwrap();
        fs::write(dest.join("data").join("keep.txt"), "keep").unwrap();

        let outcome = unpack(&archive, &dest);

        assert!(!outcome.is_success());
        assert!(dest.join("data").join("keep.txt").exists());
    }

    #[test]
    fn test_unpack_empty_gzip_stream_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let archive = temp_dir.path().join("log.gz");
        let file = File::create(&archive).expect("Failed to create gz");
        flate2::write::GzEncoder::new(file, flate2::Compression::default())
            .finish()
            .expect("Failed to finish gzip");
        let dest = temp_dir.path().join("Archives");

        match unpack(&archive, &dest) {
            UnpackOutcome::Failed { reason, .. } => {
                assert!(reason.contains("no entries"), "reason: {}", reason)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!dest.join("log").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unpack_refuses_symlinked_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let outside = temp_dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        let dest = temp_dir.path().join("Archives");
        fs::create_dir(&dest).unwrap();
        std::os::unix::fs::symlink(&outside, dest.join("pack")).unwrap();
        let archive = temp_dir.path().join("pack.zip");
        write_zip(&archive, &[("a.txt", "alpha")]);

        let outcome = unpack(&archive, &dest);

        assert!(!outcome.is_success());
        assert!(!outside.join("a.txt").exists());
        assert!(
            fs::symlink_metadata(dest.join("pack")).unwrap().file_type().is_symlink(),
            "a destination it did not create must be left alone"
        );
    }

    #[test]
    fn test_archive_format_from_extension() {
        assert_eq!(ArchiveFormat::from_extension(".zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_extension(".gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_extension(".tzr"), None);
    }
}
