//! The run description consumed by generation.
//!
//! A [`RunDescription`] names the plate (barcode, name, operator, description)
//! and assigns a [`SampleSpec`] to each well. It deserializes from the same JSON
//! shape lab systems already emit:
//!
//! ```
//! let run = edskit::RunDescription::from_json(r#"{
//!     "barcode": "1337",
//!     "name": "Some experiment",
//!     "wells": { "A1": "a001", "H12": false, "H11": true }
//! }"#).unwrap();
//! let labels: Vec<_> = run.wells().iter().map(|(_, s)| s.label()).collect();
//! assert_eq!(labels, ["a001", "NTC", "POS"]);
//! ```
use core::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EdsError, Result};

pub const DEFAULT_PLATE_NAME: &str = "Unnamed plate";
pub const DEFAULT_EXPERIMENT_NAME: &str = "Unnamed experiment";
pub const DEFAULT_OPERATOR: &str = "Unknown operator";
pub const DEFAULT_DESCRIPTION: &str = "Generated by edskit";

/// What occupies a well.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SampleSpec {
    /// A free-text sample name.
    Named(String),
    /// No-template control (`false` in JSON).
    NegativeControl,
    /// Positive control (`true` in JSON).
    PositiveControl,
}

impl SampleSpec {
    pub const NTC_LABEL: &'static str = "NTC";
    pub const POS_LABEL: &'static str = "POS";
    pub const NTC_COLOR: &'static str = "-8076815";
    pub const POS_COLOR: &'static str = "-5701666";
    pub const SAMPLE_COLOR: &'static str = "-2105970";

    /// Label written into the sample's `Name` element.
    pub fn label(&self) -> &str {
        match self {
            SampleSpec::Named(name) => name,
            SampleSpec::NegativeControl => Self::NTC_LABEL,
            SampleSpec::PositiveControl => Self::POS_LABEL,
        }
    }

    /// Signed ARGB color code written into the sample's `Color` element.
    pub fn color(&self) -> &'static str {
        match self {
            SampleSpec::Named(_) => Self::SAMPLE_COLOR,
            SampleSpec::NegativeControl => Self::NTC_COLOR,
            SampleSpec::PositiveControl => Self::POS_COLOR,
        }
    }
}

impl From<&str> for SampleSpec {
    fn from(name: &str) -> Self { SampleSpec::Named(name.to_string()) }
}

impl From<bool> for SampleSpec {
    fn from(positive: bool) -> Self {
        if positive { SampleSpec::PositiveControl } else { SampleSpec::NegativeControl }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSampleSpec {
    Name(String),
    Control(bool),
}

impl<'de> Deserialize<'de> for SampleSpec {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Ok(match RawSampleSpec::deserialize(d)? {
            RawSampleSpec::Name(name) => SampleSpec::Named(name),
            RawSampleSpec::Control(positive) => SampleSpec::from(positive),
        })
    }
}

impl Serialize for SampleSpec {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SampleSpec::Named(name) => s.serialize_str(name),
            SampleSpec::NegativeControl => s.serialize_bool(false),
            SampleSpec::PositiveControl => s.serialize_bool(true),
        }
    }
}

/// Insertion-ordered well → sample assignment.
///
/// Order matters: plate-setup feature values and analysis settings are emitted
/// in this order. Re-inserting a well name replaces its sample in place.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WellMap(Vec<(String, SampleSpec)>);

impl WellMap {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, well: impl Into<String>, sample: impl Into<SampleSpec>) {
        let well = well.into();
        let sample = sample.into();
        match self.0.iter_mut().find(|(w, _)| *w == well) {
            Some(slot) => slot.1 = sample,
            None => self.0.push((well, sample)),
        }
    }

    pub fn get(&self, well: &str) -> Option<&SampleSpec> {
        self.0.iter().find(|(w, _)| w == well).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleSpec)> {
        self.0.iter().map(|(w, s)| (w.as_str(), s))
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<W: Into<String>, S: Into<SampleSpec>> FromIterator<(W, S)> for WellMap {
    fn from_iter<I: IntoIterator<Item = (W, S)>>(iter: I) -> Self {
        let mut map = WellMap::new();
        for (w, s) in iter { map.insert(w, s); }
        map
    }
}

struct WellMapVisitor;

impl<'de> Visitor<'de> for WellMapVisitor {
    type Value = WellMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of well names to sample names or control flags")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<WellMap, A::Error> {
        let mut map = WellMap::new();
        while let Some((well, sample)) = access.next_entry::<String, SampleSpec>()? {
            map.insert(well, sample);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for WellMap {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_map(WellMapVisitor)
    }
}

impl Serialize for WellMap {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_map(self.iter())
    }
}

/// Everything generation needs to know about a plate run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunDescription {
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub wells: Option<WellMap>,
}

impl RunDescription {
    pub fn new(barcode: impl Into<String>, wells: WellMap) -> Self {
        Self { barcode: Some(barcode.into()), wells: Some(wells), ..Self::default() }
    }

    /// Parse a JSON run description.
    ///
    /// # Errors
    /// [`EdsError::RunDescription`] when the JSON does not fit the expected shape.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(EdsError::RunDescription)
    }

    /// Barcode and wells, or [`EdsError::MissingRequiredField`].
    pub(crate) fn require_plate_fields(&self) -> Result<(&str, &WellMap)> {
        let barcode = self
            .barcode
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(EdsError::MissingRequiredField { field: "barcode" })?;
        let wells = self.wells.as_ref().ok_or(EdsError::MissingRequiredField { field: "wells" })?;
        Ok((barcode, wells))
    }

    /// Wells in input order; empty when no assignment was given.
    pub fn wells(&self) -> Vec<(&str, &SampleSpec)> {
        self.wells.iter().flat_map(WellMap::iter).collect()
    }

    pub fn plate_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(DEFAULT_PLATE_NAME)
    }

    pub fn experiment_name(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(DEFAULT_EXPERIMENT_NAME)
    }

    pub fn operator_name(&self) -> &str {
        non_empty(self.operator.as_deref()).unwrap_or(DEFAULT_OPERATOR)
    }

    pub fn plate_description(&self) -> &str {
        non_empty(self.description.as_deref()).unwrap_or(DEFAULT_DESCRIPTION)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> { s.filter(|s| !s.is_empty()) }

#[cfg(test)]
mod run_tests {
    use super::*;

    #[test]
    fn controls_render_fixed_labels_and_colors() {
        assert_eq!(SampleSpec::from(false).label(), "NTC");
        assert_eq!(SampleSpec::from(false).color(), "-8076815");
        assert_eq!(SampleSpec::from(true).label(), "POS");
        assert_eq!(SampleSpec::from(true).color(), "-5701666");
        let named = SampleSpec::from("NTC");
        assert_eq!(named.label(), "NTC");
        assert_eq!(named.color(), "-2105970");
    }

    #[test]
    fn json_wells_keep_document_order() {
        let run = RunDescription::from_json(r#"{"barcode":"1","wells":{"H12":false,"A1":"a001","C4":"a028","H11":true}}"#).unwrap();
        let order: Vec<_> = run.wells().iter().map(|(w, _)| w.to_string()).collect();
        assert_eq!(order, ["H12", "A1", "C4", "H11"]);
        assert_eq!(run.wells.as_ref().unwrap().get("C4"), Some(&SampleSpec::Named("a028".into())));
    }

    #[test]
    fn reinserting_a_well_replaces_in_place() {
        let mut wells = WellMap::new();
        wells.insert("A1", "first");
        wells.insert("B1", true);
        wells.insert("A1", "second");
        let v: Vec<_> = wells.iter().map(|(w, s)| (w.to_string(), s.label().to_string())).collect();
        assert_eq!(v, [("A1".to_string(), "second".to_string()), ("B1".to_string(), "POS".to_string())]);
    }

    #[test]
    fn missing_barcode_or_wells_is_reported() {
        let run = RunDescription::from_json(r#"{"wells":{}}"#).unwrap();
        assert!(matches!(run.require_plate_fields(), Err(EdsError::MissingRequiredField { field: "barcode" })));
        let run = RunDescription::from_json(r#"{"barcode":""}"#).unwrap();
        assert!(matches!(run.require_plate_fields(), Err(EdsError::MissingRequiredField { field: "barcode" })));
        let run = RunDescription::from_json(r#"{"barcode":"1337"}"#).unwrap();
        assert!(matches!(run.require_plate_fields(), Err(EdsError::MissingRequiredField { field: "wells" })));
        let run = RunDescription::from_json(r#"{"barcode":"1337","wells":{}}"#).unwrap();
        assert!(run.require_plate_fields().is_ok());
    }

    #[test]
    fn defaults_fill_blank_identity_fields() {
        let run = RunDescription::new("1", WellMap::new());
        assert_eq!(run.plate_name(), DEFAULT_PLATE_NAME);
        assert_eq!(run.experiment_name(), DEFAULT_EXPERIMENT_NAME);
        assert_eq!(run.operator_name(), DEFAULT_OPERATOR);
        assert_eq!(run.plate_description(), DEFAULT_DESCRIPTION);
    }

    #[test]
    fn rejects_non_string_non_bool_samples() {
        let err = RunDescription::from_json(r#"{"barcode":"1","wells":{"A1":3}}"#).unwrap_err();
        assert!(matches!(err, EdsError::RunDescription(_)));
    }
}
