#![forbid(unsafe_code)]
//! # edskit
//!
//! Generate and read **EDS** archives, the container a qPCR instrument uses for
//! a 96-well plate run: a zip of XML documents (plate setup, experiment,
//! analysis protocol) plus tab-delimited result and multicomponent tables.
//!
//! ## Generation
//! A [`RunDescription`] (barcode, names, one [`SampleSpec`] per well) is written
//! into working copies of three template documents. The rest of the template
//! directory is copied through unchanged:
//!
//! ```no_run
//! use edskit::{generate, RunDescription, TemplateSet};
//! let templates = TemplateSet::load("template")?;
//! let run = RunDescription::from_json(r#"{
//!     "barcode": "1337",
//!     "name": "Some experiment",
//!     "operator": "Someone",
//!     "wells": { "A1": "a001", "A2": "a002", "C4": "a028", "H12": false, "H11": true }
//! }"#)?;
//! let bytes = generate(&templates, "C:\\somedir", "somefile.eds", &run)?;
//! std::fs::write("out.eds", bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Parsing
//! [`parse_file`] (or [`parse`] on bytes) returns the plate identity, the
//! analysis result rows and the per-well, per-dye fluorescence curves of a
//! completed run:
//!
//! ```no_run
//! let run = edskit::parse_file("test.eds")?;
//! println!("{}: {} result rows", run.metadata.barcode, run.results.len());
//! println!("{:?}", run.wells.get("B9", "VIC", 33));
//! # Ok::<(), edskit::EdsError>(())
//! ```
//!
//! Every stage returns [`Result`]; the first failure stops the pipeline.
//! [`EdsError::kind`] tells bad input, broken templates, I/O and incomplete
//! runs apart.

pub mod archive;
pub mod builder;
pub mod error;
pub mod metadata;
pub mod multicomponent;
pub mod mutate;
pub mod results;
pub mod run;
pub mod template;
pub mod well;
pub mod xml;
mod table;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

pub use archive::{ArchiveAssembler, EdsArchive, GeneratedDocuments};
pub use error::{EdsError, ErrorKind, Result};
pub use metadata::PlateMetadata;
pub use multicomponent::MultiComponentSeries;
pub use results::ResultRow;
pub use run::{RunDescription, SampleSpec, WellMap};
pub use template::TemplateSet;
pub use well::{PlateGeometry, WellIndex};

use builder::{build_analysis_protocol, build_experiment, build_plate_setup};
use template::{ANALYSIS_RESULT_MEMBER, EXPERIMENT_MEMBER, MULTICOMPONENT_MEMBER, PLATE_SETUP_MEMBER};
use xml::XmlDocument;

/// Crate version for CLI banners.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything read back from a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRun {
    pub metadata: PlateMetadata,
    pub results: Vec<ResultRow>,
    pub wells: MultiComponentSeries,
}

/// Build the three run-specific documents without packaging them.
pub fn generate_documents(
    templates: &TemplateSet,
    output_directory: &str,
    output_filename: &str,
    run: &RunDescription,
) -> Result<GeneratedDocuments> {
    let geometry = templates.geometry();
    let plate_setup = build_plate_setup(templates.plate_setup(), geometry, run)?;
    debug!(bytes = plate_setup.len(), "generated plate setup");
    let experiment = build_experiment(templates.experiment(), geometry, output_directory, output_filename, run)?;
    debug!(bytes = experiment.len(), "generated experiment");
    let analysis_protocol = build_analysis_protocol(templates.analysis_protocol(), geometry, run)?;
    debug!(bytes = analysis_protocol.len(), "generated analysis protocol");
    Ok(GeneratedDocuments { plate_setup, experiment, analysis_protocol })
}

/// Generate a complete EDS archive for `run`.
///
/// `output_directory` and `output_filename` only name the file inside the
/// experiment document (as `directory\filename`); nothing is written to disk.
///
/// # Errors
/// The first failure of any builder or of archive assembly.
pub fn generate(templates: &TemplateSet, output_directory: &str, output_filename: &str, run: &RunDescription) -> Result<Vec<u8>> {
    let documents = generate_documents(templates, output_directory, output_filename, run)?;
    let bytes = ArchiveAssembler::new(templates.root()).assemble(&documents)?;
    info!(wells = run.wells().len(), bytes = bytes.len(), "generated archive");
    Ok(bytes)
}

/// Parse an archive held in memory.
pub fn parse(bytes: impl Into<Vec<u8>>) -> Result<ParsedRun> {
    parse_archive(&mut EdsArchive::from_bytes(bytes)?)
}

/// Parse an archive on disk.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedRun> {
    parse_archive(&mut EdsArchive::open(path)?)
}

/// Parse an opened archive of a 96-well plate.
///
/// # Errors
/// Missing members, unreadable XML, the metadata checks of
/// [`metadata::extract`], and well indices beyond the plate.
pub fn parse_archive(archive: &mut EdsArchive) -> Result<ParsedRun> {
    parse_archive_with(archive, PlateGeometry::default())
}

pub fn parse_archive_with(archive: &mut EdsArchive, geometry: PlateGeometry) -> Result<ParsedRun> {
    let plate_setup = XmlDocument::parse(&archive.read_text(PLATE_SETUP_MEMBER)?)?;
    let experiment = XmlDocument::parse(&archive.read_text(EXPERIMENT_MEMBER)?)?;
    let metadata = metadata::extract(&plate_setup, &experiment)?;
    debug!(barcode = %metadata.barcode, "read plate metadata");

    let results = results::parse_results(&archive.read_text(ANALYSIS_RESULT_MEMBER)?)?;
    debug!(rows = results.len(), "read analysis results");

    let wells = multicomponent::parse_multicomponent(&archive.read_text(MULTICOMPONENT_MEMBER)?, geometry)?;
    info!(barcode = %metadata.barcode, results = results.len(), wells = wells.wells.len(), "parsed archive");
    Ok(ParsedRun { metadata, results, wells })
}
