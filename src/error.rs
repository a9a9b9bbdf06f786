//! Error type shared by every generation and parsing stage.
//!
//! Failures are single-shot: the first error aborts the pipeline and is
//! returned as an [`EdsError`]. Callers that need to branch (for example to
//! tell an *incomplete experiment* apart from a *corrupt file*) use
//! [`EdsError::kind`].
use std::path::PathBuf;

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EdsError>;

/// Coarse classification of an [`EdsError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Bad caller input: missing fields, malformed well names, out-of-range coordinates.
    Validation,
    /// A template document does not have the shape the builders expect.
    TemplateIntegrity,
    /// Files, archives and archive members that cannot be read or written.
    Io,
    /// The archive is readable but does not describe a usable, completed run.
    Semantic,
}

#[derive(Debug, Error)]
pub enum EdsError {
    #[error("invalid well row: {0}")]
    InvalidWellRow(String),
    #[error("well row {row} too high for a plate with {limit} columns")]
    RowOutOfRange { row: usize, limit: usize },
    #[error("invalid well name: {0:?}")]
    InvalidWellName(String),
    #[error("invalid column number in well {well:?}: {column:?}")]
    InvalidColumn { well: String, column: String },
    #[error("{field} is required in order to generate plate_setup.xml")]
    MissingRequiredField { field: &'static str },
    #[error("invalid run description: {0}")]
    RunDescription(#[source] serde_json::Error),

    #[error("unable to find {id} FeatureMap in {document} template")]
    RegionNotFound { id: String, document: &'static str },
    #[error("{document} template has no {what} to anchor insertion")]
    AnchorNotFound { document: &'static str, what: &'static str },
    #[error("{document} template is missing required element `{path}`")]
    FieldNotFound { document: &'static str, path: String },
    #[error("can't remove <{0}>: node has no parent")]
    DetachedNode(String),
    #[error("malformed xml: {0}")]
    MalformedXml(String),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] AttrError),

    #[error("{}: {source}", .path.display())]
    File { path: PathBuf, #[source] source: std::io::Error },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("template walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("archive member {0} not found")]
    MissingMember(String),
    #[error("table read error: {0}")]
    Table(#[from] csv::Error),

    #[error("plate barcode not found")]
    MissingBarcode,
    #[error("experiment run state not found")]
    MissingRunState,
    #[error("this .eds file does not contain a completed experiment (run state {0:?})")]
    ExperimentIncomplete(String),
}

impl EdsError {
    /// Classify the error for callers that react differently per failure family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWellRow(_)
            | Self::RowOutOfRange { .. }
            | Self::InvalidWellName(_)
            | Self::InvalidColumn { .. }
            | Self::MissingRequiredField { .. }
            | Self::RunDescription(_) => ErrorKind::Validation,
            Self::RegionNotFound { .. }
            | Self::AnchorNotFound { .. }
            | Self::FieldNotFound { .. }
            | Self::DetachedNode(_)
            | Self::MalformedXml(_)
            | Self::Xml(_)
            | Self::XmlAttr(_) => ErrorKind::TemplateIntegrity,
            Self::File { .. }
            | Self::Io(_)
            | Self::Zip(_)
            | Self::Walk(_)
            | Self::MissingMember(_)
            | Self::Table(_) => ErrorKind::Io,
            Self::MissingBarcode | Self::MissingRunState | Self::ExperimentIncomplete(_) => ErrorKind::Semantic,
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File { path: path.into(), source }
    }
}
