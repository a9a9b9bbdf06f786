//! Plate and experiment identity read back from an archive.
use serde::{Deserialize, Serialize};

use crate::error::{EdsError, Result};
use crate::template::{EXPERIMENT_OPERATOR, EXPERIMENT_RUN_STATE, PLATE_BARCODE, PLATE_DESCRIPTION, PLATE_NAME};
use crate::xml::{NodePath, XmlDocument};

/// Run state of an experiment whose results can be read.
pub const COMPLETE_RUN_STATE: &str = "complete";

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateMetadata {
    pub barcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_name: Option<String>,
}

/// Read identity fields from the plate-setup and experiment documents.
///
/// Fields are trimmed; a blank optional field is left out.
///
/// # Errors
/// * [`EdsError::MissingBarcode`] for a blank or absent barcode.
/// * [`EdsError::MissingRunState`] for a blank or absent run state.
/// * [`EdsError::ExperimentIncomplete`] unless the run state is `complete`
///   (any case).
///
/// # Examples
/// ```
/// use edskit::metadata::extract;
/// use edskit::xml::XmlDocument;
/// let plate = XmlDocument::parse("<Plate><BarCode> 1337 </BarCode><Name>  </Name></Plate>").unwrap();
/// let experiment = XmlDocument::parse("<Experiment><RunState>COMPLETE</RunState></Experiment>").unwrap();
/// let metadata = extract(&plate, &experiment).unwrap();
/// assert_eq!(metadata.barcode, "1337");
/// assert_eq!(metadata.plate_name, None);
/// ```
pub fn extract(plate_setup: &XmlDocument, experiment: &XmlDocument) -> Result<PlateMetadata> {
    let barcode = trimmed(plate_setup, PLATE_BARCODE).ok_or(EdsError::MissingBarcode)?;
    let mut metadata = PlateMetadata {
        barcode,
        plate_name: trimmed(plate_setup, PLATE_NAME),
        plate_description: trimmed(plate_setup, PLATE_DESCRIPTION),
        operator_name: None,
    };

    let state = trimmed(experiment, EXPERIMENT_RUN_STATE).ok_or(EdsError::MissingRunState)?;
    if state.to_lowercase() != COMPLETE_RUN_STATE {
        return Err(EdsError::ExperimentIncomplete(state));
    }
    metadata.operator_name = trimmed(experiment, EXPERIMENT_OPERATOR);
    Ok(metadata)
}

fn trimmed(doc: &XmlDocument, path: &str) -> Option<String> {
    let text = doc.select(&NodePath::parse(path))?.text();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
