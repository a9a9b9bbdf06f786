//! `experiment.xml`: experiment identity, the instrument-side file name and the
//! sample list.
use tracing::debug;

use crate::builder::{place_wells, sample_element, set_field};
use crate::error::{EdsError, Result};
use crate::mutate::{anchor_after_removal, insert_all_before, remove_all};
use crate::run::RunDescription;
use crate::template::{
    ExperimentTemplate, EXPERIMENT_DOC, EXPERIMENT_FILE_NAME, EXPERIMENT_NAME, EXPERIMENT_OPERATOR, EXPERIMENT_SAMPLES,
};
use crate::well::PlateGeometry;
use crate::xml::NodePath;

/// Instrument software expects a Windows path here.
pub fn experiment_file_name(output_directory: &str, output_filename: &str) -> String {
    format!("{output_directory}\\{output_filename}")
}

/// Generate the experiment document for `run`.
///
/// The new `Samples` blocks take the place of the template's, in ascending
/// well-index order.
///
/// # Examples
/// ```
/// use edskit::builder::experiment::experiment_file_name;
/// assert_eq!(experiment_file_name("C:\\somedir", "somefile.eds"), "C:\\somedir\\somefile.eds");
/// ```
pub fn build_experiment(
    template: &ExperimentTemplate,
    geometry: PlateGeometry,
    output_directory: &str,
    output_filename: &str,
    run: &RunDescription,
) -> Result<String> {
    let mut placed = place_wells(geometry, run.wells())?;
    placed.sort_by_key(|&(index, _)| index);

    let mut doc = template.working_copy();
    set_field(&mut doc, EXPERIMENT_DOC, EXPERIMENT_NAME, run.experiment_name())?;
    set_field(&mut doc, EXPERIMENT_DOC, EXPERIMENT_OPERATOR, run.operator_name())?;
    set_field(&mut doc, EXPERIMENT_DOC, EXPERIMENT_FILE_NAME, &experiment_file_name(output_directory, output_filename))?;

    let anchor = anchor_after_removal(&doc.root().positions_of("Samples"))
        .ok_or(EdsError::AnchorNotFound { document: EXPERIMENT_DOC, what: "Samples block" })?;
    let removed = remove_all(&mut doc, &NodePath::parse(EXPERIMENT_SAMPLES))?;

    let samples = placed.iter().map(|&(_, sample)| sample_element(sample, true)).collect::<Result<Vec<_>>>()?;
    let added = insert_all_before(doc.root_mut(), anchor, samples);
    debug!(removed, added, anchor, "rewrote experiment samples");

    doc.to_xml_string()
}
