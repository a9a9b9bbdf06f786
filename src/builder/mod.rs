//! Per-document builders.
//!
//! Each builder takes its validated template, the plate geometry and a
//! [`RunDescription`](crate::RunDescription), edits a working copy of the
//! template and returns the serialized document:
//!
//! * [`plate_setup`] writes the plate identity and the two feature maps,
//! * [`experiment`] writes the experiment identity and the sorted sample list,
//! * [`analysis_protocol`] swaps the per-target well settings.
pub mod analysis_protocol;
pub mod experiment;
pub mod plate_setup;

pub use analysis_protocol::build_analysis_protocol;
pub use experiment::build_experiment;
pub use plate_setup::build_plate_setup;

use crate::error::{EdsError, Result};
use crate::mutate::build_element;
use crate::run::{SampleSpec, WellMap};
use crate::well::{PlateGeometry, WellIndex};
use crate::xml::{NodePath, XmlDocument, XmlElement};

/// Resolve every well name to its index, keeping input order.
pub(crate) fn place_wells<'a>(geometry: PlateGeometry, wells: impl IntoIterator<Item = (&'a str, &'a SampleSpec)>) -> Result<Vec<(WellIndex, &'a SampleSpec)>> {
    wells.into_iter().map(|(name, sample)| Ok((geometry.well_to_index(name)?, sample))).collect()
}

pub(crate) fn placed_from_map(geometry: PlateGeometry, wells: &WellMap) -> Result<Vec<(WellIndex, &SampleSpec)>> {
    place_wells(geometry, wells.iter())
}

/// Replace the text of the element at `path`.
pub(crate) fn set_field(doc: &mut XmlDocument, document: &'static str, path: &str, text: &str) -> Result<()> {
    let field = doc
        .select_mut(&NodePath::parse(path))
        .ok_or_else(|| EdsError::FieldNotFound { document, path: path.to_string() })?;
    field.set_text(text);
    Ok(())
}

/// The sample element: `Sample` in the plate setup, `Samples` (with a fixed
/// concentration) in the experiment.
pub(crate) fn sample_element(sample: &SampleSpec, for_experiment: bool) -> Result<XmlElement> {
    let mut el = XmlElement::new(if for_experiment { "Samples" } else { "Sample" });
    el.push(build_element("Name", sample.label())?);
    el.push(build_element("Color", sample.color())?);
    if for_experiment {
        el.push(build_element("Concentration", "100.0")?);
    }
    Ok(el)
}

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn samples_render_per_variant() {
        let plate = sample_element(&SampleSpec::NegativeControl, false).unwrap();
        assert_eq!(plate.name(), "Sample");
        assert_eq!(plate.child("Name").unwrap().text(), "NTC");
        assert_eq!(plate.child("Color").unwrap().text(), "-8076815");
        assert!(plate.child("Concentration").is_none());

        let exp = sample_element(&SampleSpec::from("a001"), true).unwrap();
        assert_eq!(exp.name(), "Samples");
        assert_eq!(exp.child("Color").unwrap().text(), "-2105970");
        assert_eq!(exp.child("Concentration").unwrap().text(), "100.0");
    }

    #[test]
    fn placement_fails_on_the_first_bad_well() {
        let wells: WellMap = [("A1", "x"), ("Q9", "y")].into_iter().collect();
        assert!(matches!(placed_from_map(PlateGeometry::PLATE_96, &wells), Err(EdsError::InvalidWellRow(_))));
    }
}
