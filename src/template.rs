//! Template documents and the schema map the builders rely on.
//!
//! A template directory mirrors the layout of an EDS archive. Three of its
//! documents are rewritten per run; [`TemplateSet::load`] reads and parses those
//! three, checks that each has the elements the builders will look for, and
//! records where the plate-setup regions sit. A template that would make a build
//! fail is rejected here, before any run description is seen.
//!
//! Builders never edit a template in place: every build starts from
//! [`PlateSetupTemplate::working_copy`] (and its siblings), a deep clone.
//!
//! # Examples
//! ```no_run
//! use edskit::TemplateSet;
//! let templates = TemplateSet::load("template").unwrap();
//! assert!(templates.root().ends_with("template"));
//! ```
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{EdsError, Result};
use crate::mutate::{find_region_by_id, RegionScope};
use crate::well::PlateGeometry;
use crate::xml::{NodePath, XmlDocument, XmlElement};

/// Archive member paths, relative to the template root.
pub const PLATE_SETUP_MEMBER: &str = "apldbio/sds/plate_setup.xml";
pub const EXPERIMENT_MEMBER: &str = "apldbio/sds/experiment.xml";
pub const ANALYSIS_PROTOCOL_MEMBER: &str = "apldbio/sds/analysis_protocol.xml";
pub const ANALYSIS_RESULT_MEMBER: &str = "apldbio/sds/analysis_result.txt";
pub const MULTICOMPONENT_MEMBER: &str = "apldbio/sds/multicomponent_data.txt";

/// File names of the generated documents; template files ending in one of these
/// are not copied into an archive.
pub const GENERATED_FILE_NAMES: [&str; 3] = ["plate_setup.xml", "experiment.xml", "analysis_protocol.xml"];

pub(crate) const PLATE_SETUP_DOC: &str = "plate_setup.xml";
pub(crate) const EXPERIMENT_DOC: &str = "experiment.xml";
pub(crate) const ANALYSIS_PROTOCOL_DOC: &str = "analysis_protocol.xml";

pub(crate) const PLATE_BARCODE: &str = "Plate > BarCode";
pub(crate) const PLATE_NAME: &str = "Plate > Name";
pub(crate) const PLATE_DESCRIPTION: &str = "Plate > Description";

pub(crate) const EXPERIMENT_NAME: &str = "Experiment > Name";
pub(crate) const EXPERIMENT_OPERATOR: &str = "Experiment > Operator";
pub(crate) const EXPERIMENT_FILE_NAME: &str = "Experiment > FileName";
pub(crate) const EXPERIMENT_SAMPLES: &str = "Experiment > Samples";
pub(crate) const EXPERIMENT_RUN_STATE: &str = "Experiment > RunState";

pub(crate) const ANALYSIS_SETTINGS: &str = "JaxbAnalysisProtocol > JaxbAnalysisSettings";
pub(crate) const WELL_SETTINGS_TYPE: &str = "com.apldbio.sds.platform.analysis.IWellSettings";

pub(crate) const SAMPLE_REGION: &str = "sample";
pub(crate) const DETECTOR_TASK_REGION: &str = "detector-task";

pub(crate) const FEATURE_MAPS: RegionScope =
    RegionScope { document: PLATE_SETUP_DOC, regions: "Plate > FeatureMap", key: "Feature > Id" };

static TARGET_OBJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Target\s+\d+").expect("Invalid target object name regex"));

/// Plate-setup template with its two feature-map regions resolved.
#[derive(Clone, Debug)]
pub struct PlateSetupTemplate {
    doc: XmlDocument,
    sample_region: usize,
    detector_task_region: usize,
}

impl PlateSetupTemplate {
    /// # Errors
    /// [`EdsError::FieldNotFound`] for a missing barcode, name or description
    /// element and [`EdsError::RegionNotFound`] for a missing region.
    pub fn new(doc: XmlDocument) -> Result<Self> {
        require_fields(&doc, PLATE_SETUP_DOC, &[PLATE_BARCODE, PLATE_NAME, PLATE_DESCRIPTION])?;
        let sample_region = find_region_by_id(&doc, &FEATURE_MAPS, SAMPLE_REGION)?;
        let detector_task_region = find_region_by_id(&doc, &FEATURE_MAPS, DETECTOR_TASK_REGION)?;
        Ok(Self { doc, sample_region, detector_task_region })
    }

    pub fn parse(text: &str) -> Result<Self> { Self::new(XmlDocument::parse(text)?) }

    pub fn document(&self) -> &XmlDocument { &self.doc }

    pub fn working_copy(&self) -> XmlDocument { self.doc.clone() }

    /// Position of the "sample" region among the root's children.
    pub fn sample_region(&self) -> usize { self.sample_region }

    /// Position of the "detector-task" region among the root's children.
    pub fn detector_task_region(&self) -> usize { self.detector_task_region }
}

/// Experiment template: identity fields and at least one `Samples` block.
#[derive(Clone, Debug)]
pub struct ExperimentTemplate {
    doc: XmlDocument,
}

impl ExperimentTemplate {
    pub fn new(doc: XmlDocument) -> Result<Self> {
        require_fields(&doc, EXPERIMENT_DOC, &[EXPERIMENT_NAME, EXPERIMENT_OPERATOR, EXPERIMENT_FILE_NAME])?;
        if doc.select(&NodePath::parse(EXPERIMENT_SAMPLES)).is_none() {
            return Err(EdsError::AnchorNotFound { document: EXPERIMENT_DOC, what: "Samples block" });
        }
        Ok(Self { doc })
    }

    pub fn parse(text: &str) -> Result<Self> { Self::new(XmlDocument::parse(text)?) }

    pub fn document(&self) -> &XmlDocument { &self.doc }

    pub fn working_copy(&self) -> XmlDocument { self.doc.clone() }
}

/// Analysis-protocol template: at least one per-target well-settings block.
#[derive(Clone, Debug)]
pub struct AnalysisProtocolTemplate {
    doc: XmlDocument,
}

impl AnalysisProtocolTemplate {
    pub fn new(doc: XmlDocument) -> Result<Self> {
        if target_settings_positions(&doc).is_empty() {
            return Err(EdsError::AnchorNotFound { document: ANALYSIS_PROTOCOL_DOC, what: "Target well-settings block" });
        }
        Ok(Self { doc })
    }

    pub fn parse(text: &str) -> Result<Self> { Self::new(XmlDocument::parse(text)?) }

    pub fn document(&self) -> &XmlDocument { &self.doc }

    pub fn working_copy(&self) -> XmlDocument { self.doc.clone() }
}

/// Positions, among the root's children, of the settings blocks that hold
/// per-well settings for a numbered target. Ascending.
pub(crate) fn target_settings_positions(doc: &XmlDocument) -> Vec<usize> {
    let path = NodePath::parse(ANALYSIS_SETTINGS);
    let (Some(leaf), Some(parent)) = (path.leaf(), path.parent()) else { return Vec::new() };
    let Some(parent) = doc.select(&parent) else { return Vec::new() };
    parent
        .positions_of(leaf)
        .into_iter()
        .filter(|&pos| parent.children()[pos].as_element().is_some_and(is_target_well_settings))
        .collect()
}

/// A `JaxbAnalysisSettings` block qualifies when its first `Type` is the well
/// settings type and its `ObjectName` value looks like `Target 1`.
pub(crate) fn is_target_well_settings(block: &XmlElement) -> bool {
    let is_well_settings = block.descendant("Type").is_some_and(|t| t.text().trim() == WELL_SETTINGS_TYPE);
    is_well_settings && object_name(block).is_some_and(|name| TARGET_OBJECT_NAME.is_match(&name))
}

fn object_name(block: &XmlElement) -> Option<String> {
    let value_path = NodePath::parse("JaxbValueItem > StringValue");
    block
        .descendants("JaxbSettingValue")
        .into_iter()
        .filter(|setting| setting.descendant("Name").is_some_and(|n| n.text().trim() == "ObjectName"))
        .find_map(|setting| setting.find(&value_path))
        .map(|value| value.text().trim().to_string())
}

fn require_fields(doc: &XmlDocument, document: &'static str, paths: &[&str]) -> Result<()> {
    for path in paths {
        if doc.select(&NodePath::parse(path)).is_none() {
            return Err(EdsError::FieldNotFound { document, path: (*path).to_string() });
        }
    }
    Ok(())
}

/// The three validated templates plus the directory they came from.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    root: PathBuf,
    geometry: PlateGeometry,
    plate_setup: PlateSetupTemplate,
    experiment: ExperimentTemplate,
    analysis_protocol: AnalysisProtocolTemplate,
}

impl TemplateSet {
    /// Read, parse and validate the templates under `root`.
    ///
    /// # Errors
    /// [`EdsError::File`] naming the document that could not be read, or the
    /// first validation failure.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let read = |member: &str| {
            let path = root.join(member);
            fs::read_to_string(&path).map_err(|e| EdsError::file(path, e))
        };
        let set = Self::from_documents(root, &read(PLATE_SETUP_MEMBER)?, &read(EXPERIMENT_MEMBER)?, &read(ANALYSIS_PROTOCOL_MEMBER)?)?;
        debug!(root = %root.display(), "loaded templates");
        Ok(set)
    }

    /// Build a set from document text already in memory. `root` is the directory
    /// archive assembly copies the remaining template files from.
    pub fn from_documents(root: impl Into<PathBuf>, plate_setup: &str, experiment: &str, analysis_protocol: &str) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            geometry: PlateGeometry::default(),
            plate_setup: PlateSetupTemplate::parse(plate_setup)?,
            experiment: ExperimentTemplate::parse(experiment)?,
            analysis_protocol: AnalysisProtocolTemplate::parse(analysis_protocol)?,
        })
    }

    pub fn with_geometry(mut self, geometry: PlateGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn geometry(&self) -> PlateGeometry { self.geometry }

    pub fn plate_setup(&self) -> &PlateSetupTemplate { &self.plate_setup }

    pub fn experiment(&self) -> &ExperimentTemplate { &self.experiment }

    pub fn analysis_protocol(&self) -> &AnalysisProtocolTemplate { &self.analysis_protocol }
}

#[cfg(test)]
pub(crate) mod template_tests {
    use super::*;

    pub(crate) const PLATE_SETUP_XML: &str = include_str!("../template/apldbio/sds/plate_setup.xml");
    pub(crate) const EXPERIMENT_XML: &str = include_str!("../template/apldbio/sds/experiment.xml");
    pub(crate) const ANALYSIS_PROTOCOL_XML: &str = include_str!("../template/apldbio/sds/analysis_protocol.xml");

    pub(crate) fn bundled() -> TemplateSet {
        TemplateSet::from_documents(concat!(env!("CARGO_MANIFEST_DIR"), "/template"), PLATE_SETUP_XML, EXPERIMENT_XML, ANALYSIS_PROTOCOL_XML)
            .unwrap()
    }

    #[test]
    fn bundled_templates_validate() {
        let set = bundled();
        assert_ne!(set.plate_setup().sample_region(), set.plate_setup().detector_task_region());
        assert_eq!(set.geometry(), PlateGeometry::PLATE_96);
        assert!(!target_settings_positions(set.analysis_protocol().document()).is_empty());
    }

    #[test]
    fn load_reads_from_disk() {
        let set = TemplateSet::load(concat!(env!("CARGO_MANIFEST_DIR"), "/template")).unwrap();
        assert_eq!(set.plate_setup().document(), bundled().plate_setup().document());
    }

    #[test]
    fn load_names_the_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateSet::load(dir.path()).unwrap_err();
        assert!(matches!(&err, EdsError::File { path, .. } if path.ends_with("plate_setup.xml")));
    }

    #[test]
    fn plate_setup_requires_both_regions() {
        let xml = "<Plate><BarCode/><Name/><Description/><FeatureMap><Feature><Id>sample</Id></Feature></FeatureMap></Plate>";
        let err = PlateSetupTemplate::parse(xml).unwrap_err();
        assert!(matches!(&err, EdsError::RegionNotFound { id, .. } if id == "detector-task"));
        let err = PlateSetupTemplate::parse("<Plate><Name/><Description/></Plate>").unwrap_err();
        assert!(matches!(&err, EdsError::FieldNotFound { path, .. } if path == PLATE_BARCODE));
    }

    #[test]
    fn experiment_requires_a_samples_anchor() {
        let err = ExperimentTemplate::parse("<Experiment><Name/><Operator/><FileName/></Experiment>").unwrap_err();
        assert!(matches!(err, EdsError::AnchorNotFound { document: "experiment.xml", .. }));
    }

    #[test]
    fn well_settings_qualify_on_type_and_target_name() {
        let block = |ty: &str, name: &str| {
            XmlElement::parse_fragment(
                "JaxbAnalysisSettings",
                &format!("<Type>{ty}</Type><JaxbSettingValue><Name>ObjectName</Name><JaxbValueItem type=\"String\"><StringValue> {name} </StringValue></JaxbValueItem></JaxbSettingValue>"),
            )
            .unwrap()
        };
        assert!(is_target_well_settings(&block(WELL_SETTINGS_TYPE, "Target 1")));
        assert!(is_target_well_settings(&block(WELL_SETTINGS_TYPE, "My Target  12")));
        assert!(!is_target_well_settings(&block(WELL_SETTINGS_TYPE, "Target A")));
        assert!(!is_target_well_settings(&block("com.apldbio.sds.platform.analysis.IDetectorSettings", "Target 1")));
    }

    #[test]
    fn analysis_protocol_without_target_blocks_is_rejected() {
        let xml = "<JaxbAnalysisProtocol><JaxbAnalysisSettings><Type>other</Type></JaxbAnalysisSettings></JaxbAnalysisProtocol>";
        assert!(matches!(AnalysisProtocolTemplate::parse(xml), Err(EdsError::AnchorNotFound { .. })));
    }

    #[test]
    fn working_copies_are_independent() {
        let set = bundled();
        let mut copy = set.experiment().working_copy();
        copy.select_mut(&NodePath::parse(EXPERIMENT_NAME)).unwrap().set_text("changed");
        assert_ne!(&copy, set.experiment().document());
    }
}
