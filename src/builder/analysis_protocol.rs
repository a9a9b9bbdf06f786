//! `analysis_protocol.xml`: per-well baseline settings for each target.
use tracing::debug;

use crate::builder::place_wells;
use crate::error::{EdsError, Result};
use crate::mutate::{anchor_after_removal, build_element, insert_all_before, remove_children_where, Content};
use crate::run::RunDescription;
use crate::template::{is_target_well_settings, target_settings_positions, AnalysisProtocolTemplate, ANALYSIS_PROTOCOL_DOC, WELL_SETTINGS_TYPE};
use crate::well::{PlateGeometry, WellIndex};
use crate::xml::XmlElement;

/// Targets the generated plate is read with, in output order.
pub const TARGETS: [&str; 2] = ["Target 1", "Target 2"];

fn setting(name: &str, ty: &str, tag: &str, value: &str) -> String {
    format!("<JaxbSettingValue><Name>{name}</Name><JaxbValueItem type=\"{ty}\"><{tag}>{value}</{tag}></JaxbValueItem></JaxbSettingValue>")
}

/// One `JaxbAnalysisSettings` block for `target` in well `index`.
pub fn well_settings(index: WellIndex, target: &str) -> Result<XmlElement> {
    let markup = [
        format!("<Type>{WELL_SETTINGS_TYPE}</Type>"),
        setting("AutoBaseline", "Boolean", "BooleanValue", "false"),
        setting("BaselineStart", "Integer", "IntValue", "3"),
        setting("ObjectName", "String", "StringValue", target),
        setting("BaselineStop", "Integer", "IntValue", "15"),
        setting("WellIndex", "Integer", "IntValue", &index.to_string()),
        setting("UseDetectorDefaults", "Boolean", "BooleanValue", "true"),
    ]
    .concat();
    build_element("JaxbAnalysisSettings", Content::Markup(markup))
}

/// Generate the analysis-protocol document for `run`.
///
/// Every per-target well-settings block in the template is replaced by one
/// block per well for each of [`TARGETS`]: all of Target 1 (in input order),
/// then all of Target 2, inserted where the last template block stood.
pub fn build_analysis_protocol(template: &AnalysisProtocolTemplate, geometry: PlateGeometry, run: &RunDescription) -> Result<String> {
    let placed = place_wells(geometry, run.wells())?;

    let mut doc = template.working_copy();
    let anchor = anchor_after_removal(&target_settings_positions(&doc))
        .ok_or(EdsError::AnchorNotFound { document: ANALYSIS_PROTOCOL_DOC, what: "Target well-settings block" })?;
    let removed = remove_children_where(doc.root_mut(), |e| e.name() == "JaxbAnalysisSettings" && is_target_well_settings(e));

    let blocks = TARGETS
        .iter()
        .flat_map(|target| placed.iter().map(move |&(index, _)| well_settings(index, target)))
        .collect::<Result<Vec<_>>>()?;
    let added = insert_all_before(doc.root_mut(), anchor, blocks);
    debug!(removed, added, anchor, "rewrote analysis well settings");

    doc.to_xml_string()
}
