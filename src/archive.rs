//! Reading and writing EDS archives.
//!
//! An EDS file is a zip archive. [`ArchiveAssembler`] creates one from a
//! template directory: every directory becomes an explicit folder entry, every
//! file is copied as-is except the three documents generation rewrites, which
//! are written last from [`GeneratedDocuments`]. [`EdsArchive`] opens an
//! existing archive from a path or from bytes and reads members as text.
//!
//! Entries are written in file-name order with a fixed timestamp, so the same
//! template and run always produce the same archive.
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime, ZipArchive};

use crate::error::{EdsError, Result};
use crate::template::{ANALYSIS_PROTOCOL_MEMBER, EXPERIMENT_MEMBER, GENERATED_FILE_NAMES, PLATE_SETUP_MEMBER};

/// DEFLATE level used for every entry.
pub const COMPRESSION_LEVEL: i64 = 6;

/// The three documents a generation run produces.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GeneratedDocuments {
    pub plate_setup: String,
    pub experiment: String,
    pub analysis_protocol: String,
}

impl GeneratedDocuments {
    fn members(&self) -> [(&'static str, &str); 3] {
        [
            (PLATE_SETUP_MEMBER, &self.plate_setup),
            (EXPERIMENT_MEMBER, &self.experiment),
            (ANALYSIS_PROTOCOL_MEMBER, &self.analysis_protocol),
        ]
    }
}

/// True for template files that generation replaces.
pub fn is_generated_member(path: &str) -> bool {
    GENERATED_FILE_NAMES.iter().any(|name| path.ends_with(name))
}

/// Copies a template tree into a new archive.
#[derive(Clone, Debug)]
pub struct ArchiveAssembler {
    root: PathBuf,
}

impl ArchiveAssembler {
    /// Assembler for the template tree under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Build the archive in memory.
    ///
    /// # Errors
    /// Walk and read failures of the template tree (reads name the file) and
    /// zip writer failures.
    pub fn assemble(&self, documents: &GeneratedDocuments) -> Result<Vec<u8>> {
        let options = FileOptions::<()>::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .last_modified_time(DateTime::default());
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let (mut folders, mut copied, mut skipped) = (0usize, 0usize, 0usize);
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let Some(name) = member_name(&self.root, entry.path()) else { continue };
            if entry.file_type().is_dir() {
                zip.add_directory(name, options)?;
                folders += 1;
            } else if entry.file_type().is_file() {
                if is_generated_member(&name) {
                    trace!(member = %name, "skipping generated member");
                    skipped += 1;
                    continue;
                }
                let bytes = fs::read(entry.path()).map_err(|e| EdsError::file(entry.path(), e))?;
                zip.start_file(name, options)?;
                zip.write_all(&bytes)?;
                copied += 1;
            } else {
                trace!(path = %entry.path().display(), "skipping non-regular template entry");
            }
        }

        for (member, text) in documents.members() {
            zip.start_file(member, options)?;
            zip.write_all(text.as_bytes())?;
        }
        debug!(folders, copied, skipped, root = %self.root.display(), "assembled archive");
        Ok(zip.finish()?.into_inner())
    }
}

/// `/`-separated path of `path` relative to `root`.
fn member_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// An EDS archive opened for reading.
pub struct EdsArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl EdsArchive {
    /// # Errors
    /// [`EdsError::Zip`] when the bytes are not a zip archive.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Ok(Self { zip: ZipArchive::new(Cursor::new(bytes.into()))? })
    }

    /// # Errors
    /// [`EdsError::File`] when the file cannot be read, then as [`EdsArchive::from_bytes`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| EdsError::file(path, e))?;
        Self::from_bytes(bytes)
    }

    /// Member names in archive order; folders end with `/`.
    pub fn member_names(&self) -> Vec<String> {
        self.zip.file_names().map(String::from).collect::<Vec<_>>()
    }

    /// Read a member as UTF-8 text.
    ///
    /// # Errors
    /// [`EdsError::MissingMember`] when the archive has no such file.
    pub fn read_text(&mut self, member: &str) -> Result<String> {
        let mut file = match self.zip.by_name(member) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(EdsError::MissingMember(member.to_string())),
            Err(e) => return Err(e.into()),
        };
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        Ok(text)
    }
}
