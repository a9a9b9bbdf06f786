//! `plate_setup.xml`: plate identity plus one feature value per well in the
//! "sample" and "detector-task" feature maps.
use tracing::debug;

use crate::builder::{placed_from_map, sample_element, set_field};
use crate::error::{EdsError, Result};
use crate::mutate::{build_element, insert_all_before, region_mut, remove_children, Content};
use crate::run::RunDescription;
use crate::template::{
    PlateSetupTemplate, DETECTOR_TASK_REGION, FEATURE_MAPS, PLATE_BARCODE, PLATE_DESCRIPTION, PLATE_NAME, PLATE_SETUP_DOC,
    SAMPLE_REGION,
};
use crate::well::{PlateGeometry, WellIndex};
use crate::xml::{XmlDocument, XmlElement};

/// Two detector tasks, one per target, assigned to every well.
const DETECTOR_TASK_LIST: &str = "<DetectorTaskList>\
<DetectorTask><Task>UNKNOWN</Task><Concentration>1.0</Concentration>\
<Detector><Name>Target 1</Name><Reporter>FAM</Reporter><Quencher>None</Quencher><Color>-7619079</Color></Detector></DetectorTask>\
<DetectorTask><Task>UNKNOWN</Task><Concentration>1.0</Concentration>\
<Detector><Name>Target 2</Name><Reporter>VIC</Reporter><Quencher>None</Quencher><Color>-3083422</Color></Detector></DetectorTask>\
</DetectorTaskList>";

/// Generate the plate-setup document for `run`.
///
/// Feature values are written in the order the wells appear in the run
/// description.
///
/// # Errors
/// * [`EdsError::MissingRequiredField`] without a barcode or a well map.
/// * Any well-name error from [`PlateGeometry::well_to_index`].
pub fn build_plate_setup(template: &PlateSetupTemplate, geometry: PlateGeometry, run: &RunDescription) -> Result<String> {
    let (barcode, wells) = run.require_plate_fields()?;
    let placed = placed_from_map(geometry, wells)?;

    let mut doc = template.working_copy();
    set_field(&mut doc, PLATE_SETUP_DOC, PLATE_BARCODE, barcode)?;
    set_field(&mut doc, PLATE_SETUP_DOC, PLATE_NAME, run.plate_name())?;
    set_field(&mut doc, PLATE_SETUP_DOC, PLATE_DESCRIPTION, run.plate_description())?;

    let samples = placed
        .iter()
        .map(|&(index, sample)| feature_value(index, sample_element(sample, false)?))
        .collect::<Result<Vec<_>>>()?;
    let removed = refill_region(&mut doc, template.sample_region(), SAMPLE_REGION, samples)?;
    debug!(removed, added = placed.len(), "rewrote sample feature map");

    let detector_tasks = build_element("FeatureItem", Content::Markup(DETECTOR_TASK_LIST.to_string()))?;
    let tasks = placed
        .iter()
        .map(|&(index, _)| feature_value_with_item(index, detector_tasks.clone()))
        .collect::<Result<Vec<_>>>()?;
    let removed = refill_region(&mut doc, template.detector_task_region(), DETECTOR_TASK_REGION, tasks)?;
    debug!(removed, added = placed.len(), "rewrote detector-task feature map");

    doc.to_xml_string()
}

fn feature_value(index: WellIndex, payload: XmlElement) -> Result<XmlElement> {
    feature_value_with_item(index, build_element("FeatureItem", payload)?)
}

fn feature_value_with_item(index: WellIndex, item: XmlElement) -> Result<XmlElement> {
    let mut fv = XmlElement::new("FeatureValue");
    fv.push(build_element("Index", index)?);
    fv.push(item);
    Ok(fv)
}

/// Drop the region's feature values and append `values`.
fn refill_region(doc: &mut XmlDocument, position: usize, id: &str, values: Vec<XmlElement>) -> Result<usize> {
    let region = region_mut(doc, &FEATURE_MAPS, position)
        .ok_or_else(|| EdsError::RegionNotFound { id: id.to_string(), document: PLATE_SETUP_DOC })?;
    let removed = remove_children(region, "FeatureValue");
    let end = region.children().len();
    insert_all_before(region, end, values);
    Ok(removed)
}

#[cfg(test)]
mod plate_setup_tests {
    use super::*;
    use crate::mutate::find_region_by_id;
    use crate::template::template_tests::bundled;

    fn run() -> RunDescription {
        RunDescription::from_json(r#"{"barcode":"1337","name":"Some experiment","wells":{"A1":"a001","H12":false,"H11":true}}"#).unwrap()
    }

    fn region<'a>(doc: &'a XmlDocument, id: &str) -> &'a XmlElement {
        let pos = find_region_by_id(doc, &FEATURE_MAPS, id).unwrap();
        doc.root().children()[pos].as_element().unwrap()
    }

    #[test]
    fn sample_region_follows_input_order() {
        let templates = bundled();
        let xml = build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &run()).unwrap();
        let doc = XmlDocument::parse(&xml).unwrap();
        let values: Vec<_> = region(&doc, "sample").children_named("FeatureValue").collect();
        assert_eq!(values.len(), 3);
        let indices: Vec<_> = values.iter().map(|v| v.child("Index").unwrap().text()).collect();
        assert_eq!(indices, ["0", "95", "94"]);
        let labels: Vec<_> = values.iter().map(|v| v.find(&"Sample > Name".into()).unwrap().text()).collect();
        assert_eq!(labels, ["a001", "NTC", "POS"]);
    }

    #[test]
    fn identity_fields_are_written_with_defaults() {
        let templates = bundled();
        let mut r = run();
        r.name = None;
        let doc = XmlDocument::parse(&build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &r).unwrap()).unwrap();
        assert_eq!(doc.select(&PLATE_BARCODE.into()).unwrap().text(), "1337");
        assert_eq!(doc.select(&PLATE_NAME.into()).unwrap().text(), "Unnamed plate");
        assert_eq!(doc.select(&PLATE_DESCRIPTION.into()).unwrap().text(), "Generated by edskit");
    }

    #[test]
    fn detector_tasks_cover_both_targets_per_well() {
        let templates = bundled();
        let doc = XmlDocument::parse(&build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &run()).unwrap()).unwrap();
        let values: Vec<_> = region(&doc, "detector-task").children_named("FeatureValue").collect();
        assert_eq!(values.len(), 3);
        let detectors = values[1].descendants("Detector");
        let names: Vec<_> = detectors.iter().map(|d| d.child("Name").unwrap().text()).collect();
        assert_eq!(names, ["Target 1", "Target 2"]);
        assert_eq!(detectors[1].child("Reporter").unwrap().text(), "VIC");
        assert_eq!(values[1].child("Index").unwrap().text(), "95");
    }

    #[test]
    fn building_twice_gives_identical_output() {
        let templates = bundled();
        let first = build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &run()).unwrap();
        let second = build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &run()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn required_fields_are_checked_first() {
        let templates = bundled();
        let err = build_plate_setup(templates.plate_setup(), PlateGeometry::PLATE_96, &RunDescription::default()).unwrap_err();
        assert!(matches!(err, EdsError::MissingRequiredField { field: "barcode" }));
    }
}
