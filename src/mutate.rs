//! Tree-editing primitives the document builders are made of.
//!
//! Each builder follows the same protocol on its working copy of a template:
//! locate a region or an anchor, drop the nodes a previous run left there, build
//! fresh per-well subtrees and splice them in. The pieces of that protocol live
//! here so that the builders read as a sequence of steps.
use crate::error::{EdsError, Result};
use crate::xml::{NodePath, XmlDocument, XmlElement, XmlNode};

/// Content of a freshly built element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Content {
    /// Character data, escaped on output.
    Text(String),
    /// A number, written in decimal.
    Number(i64),
    /// Markup parsed as the element's content.
    Markup(String),
    /// A pre-built subtree appended as the only child.
    Child(XmlElement),
}

impl From<&str> for Content {
    fn from(s: &str) -> Self { Content::Text(s.to_string()) }
}

impl From<String> for Content {
    fn from(s: String) -> Self { Content::Text(s) }
}

impl From<usize> for Content {
    fn from(n: usize) -> Self { Content::Number(n as i64) }
}

impl From<XmlElement> for Content {
    fn from(e: XmlElement) -> Self { Content::Child(e) }
}

/// Build `<tag>content</tag>`.
///
/// # Errors
/// Only [`Content::Markup`] can fail, when the markup does not parse.
///
/// # Examples
/// ```
/// use edskit::mutate::{build_element, Content};
/// let idx = build_element("Index", 94usize).unwrap();
/// assert_eq!(idx.text(), "94");
/// let item = build_element("FeatureItem", build_element("Sample", "a001").unwrap()).unwrap();
/// assert_eq!(item.child("Sample").unwrap().text(), "a001");
/// let frag = build_element("Task", Content::Markup("<Name>UNKNOWN</Name>".into())).unwrap();
/// assert_eq!(frag.child("Name").unwrap().text(), "UNKNOWN");
/// ```
pub fn build_element(tag: &str, content: impl Into<Content>) -> Result<XmlElement> {
    let mut el = XmlElement::new(tag);
    match content.into() {
        Content::Text(text) => el.set_text(text),
        Content::Number(n) => el.set_text(n.to_string()),
        Content::Markup(markup) => return XmlElement::parse_fragment(tag, &markup),
        Content::Child(child) => el.push(child),
    }
    Ok(el)
}

/// Remove every element the selector matches from their shared parent and return
/// how many went.
///
/// The parent is the first element matching the selector's parent path that has
/// at least one matching child. An absent set removes nothing.
///
/// # Errors
/// [`EdsError::DetachedNode`] when the selector matches the root element, which
/// has no parent to remove it from.
pub fn remove_all(doc: &mut XmlDocument, selector: &NodePath) -> Result<usize> {
    let Some(leaf) = selector.leaf() else { return Ok(0) };
    let Some(parent_path) = selector.parent() else {
        if doc.root().name() == leaf {
            return Err(EdsError::DetachedNode(leaf.to_string()));
        }
        return Ok(0);
    };
    Ok(match doc.select_mut_where(&parent_path, |p| p.child(leaf).is_some()) {
        Some(parent) => remove_children(parent, leaf),
        None => 0,
    })
}

/// Remove the direct child elements named `name`.
pub fn remove_children(parent: &mut XmlElement, name: &str) -> usize {
    remove_children_where(parent, |e| e.name() == name)
}

/// Remove the direct child elements for which `pred` holds.
pub fn remove_children_where(parent: &mut XmlElement, pred: impl Fn(&XmlElement) -> bool) -> usize {
    let children = parent.children_mut();
    let before = children.len();
    children.retain(|n| !n.as_element().is_some_and(&pred));
    before - children.len()
}

/// Insert `nodes`, in order, so that the first of them lands at position
/// `anchor` of `parent`'s children. An anchor at or past the end appends.
pub fn insert_all_before(parent: &mut XmlElement, anchor: usize, nodes: impl IntoIterator<Item = XmlElement>) -> usize {
    let children = parent.children_mut();
    let at = anchor.min(children.len());
    let before = children.len();
    children.splice(at..at, nodes.into_iter().map(XmlNode::Element));
    children.len() - before
}

/// Where the node following the last of `positions` ends up once every node at
/// `positions` has been removed. `positions` must be ascending.
pub fn anchor_after_removal(positions: &[usize]) -> Option<usize> {
    let last = *positions.last()?;
    Some(last + 1 - positions.len())
}

/// How a named region is found: the region elements and, below each, the element
/// whose text is the region id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegionScope {
    /// Template file name, for diagnostics.
    pub document: &'static str,
    /// Root-anchored path of the candidate region elements.
    pub regions: &'static str,
    /// Path below a region element to its id.
    pub key: &'static str,
}

/// Locate the region whose id equals `id` and return its position among its
/// parent's children.
///
/// # Errors
/// [`EdsError::RegionNotFound`] when no region carries the id.
pub fn find_region_by_id(doc: &XmlDocument, scope: &RegionScope, id: &str) -> Result<usize> {
    let not_found = || EdsError::RegionNotFound { id: id.to_string(), document: scope.document };
    let regions = NodePath::parse(scope.regions);
    let leaf = regions.leaf().ok_or_else(not_found)?;
    let parent = regions.parent().and_then(|p| doc.select(&p)).ok_or_else(not_found)?;
    let key = NodePath::parse(scope.key);
    parent
        .positions_of(leaf)
        .into_iter()
        .find(|&pos| {
            parent.children()[pos]
                .as_element()
                .and_then(|region| region_key(region, &key))
                .is_some_and(|text| text.trim() == id)
        })
        .ok_or_else(not_found)
}

/// Mutable access to the region at `position` (see [`find_region_by_id`]).
pub fn region_mut<'a>(doc: &'a mut XmlDocument, scope: &RegionScope, position: usize) -> Option<&'a mut XmlElement> {
    let parent = NodePath::parse(scope.regions).parent()?;
    doc.select_mut(&parent)?.children_mut().get_mut(position)?.as_element_mut()
}

fn region_key(region: &XmlElement, key: &NodePath) -> Option<String> {
    let mut current = region;
    for step in key.segments() {
        current = current.child(step)?;
    }
    Some(current.text())
}

#[cfg(test)]
mod mutate_tests {
    use super::*;

    const PLATE: &str = "<Plate>\n<FeatureMap><Feature><Id>sample</Id></Feature><FeatureValue>1</FeatureValue>\n<FeatureValue>2</FeatureValue></FeatureMap>\n<FeatureMap><Feature><Id> detector-task </Id></Feature></FeatureMap>\n</Plate>";

    const SCOPE: RegionScope = RegionScope { document: "plate_setup.xml", regions: "Plate > FeatureMap", key: "Feature > Id" };

    #[test]
    fn finds_regions_by_id_text() {
        let doc = XmlDocument::parse(PLATE).unwrap();
        let sample = find_region_by_id(&doc, &SCOPE, "sample").unwrap();
        let detector = find_region_by_id(&doc, &SCOPE, "detector-task").unwrap();
        assert!(sample < detector);
        assert_eq!(doc.root().children()[sample].as_element().unwrap().name(), "FeatureMap");
    }

    #[test]
    fn missing_region_names_the_id() {
        let doc = XmlDocument::parse(PLATE).unwrap();
        let err = find_region_by_id(&doc, &SCOPE, "well-task").unwrap_err();
        assert!(matches!(&err, EdsError::RegionNotFound { id, .. } if id == "well-task"));
        assert!(err.to_string().contains("well-task"));
    }

    #[test]
    fn remove_all_counts_and_keeps_other_nodes() {
        let mut doc = XmlDocument::parse(PLATE).unwrap();
        assert_eq!(remove_all(&mut doc, &"Plate > FeatureMap > FeatureValue".into()).unwrap(), 2);
        assert_eq!(remove_all(&mut doc, &"Plate > FeatureMap > FeatureValue".into()).unwrap(), 0);
        assert_eq!(remove_all(&mut doc, &"Experiment > Samples".into()).unwrap(), 0);
        let region = doc.root().child("FeatureMap").unwrap();
        assert!(region.child("Feature").is_some());
        assert!(region.child("FeatureValue").is_none());
    }

    #[test]
    fn removing_the_root_is_detached() {
        let mut doc = XmlDocument::parse(PLATE).unwrap();
        assert!(matches!(remove_all(&mut doc, &"Plate".into()), Err(EdsError::DetachedNode(_))));
    }

    #[test]
    fn insert_all_before_preserves_input_order() {
        let mut parent = XmlElement::parse_fragment("Experiment", "<Name/><Tail/>").unwrap();
        let nodes = ["a", "b", "c"].map(|n| build_element("Samples", n).unwrap());
        assert_eq!(insert_all_before(&mut parent, 1, nodes), 3);
        let names: Vec<_> = parent.elements().map(|e| format!("{}:{}", e.name(), e.text())).collect();
        assert_eq!(names, ["Name:", "Samples:a", "Samples:b", "Samples:c", "Tail:"]);
        insert_all_before(&mut parent, 99, [XmlElement::new("End")]);
        assert_eq!(parent.elements().last().unwrap().name(), "End");
    }

    #[test]
    fn anchor_tracks_the_node_after_the_last_removed() {
        // children: [x, S, y, S, z] -> remove 1 and 3 -> z moves from 4 to 2
        assert_eq!(anchor_after_removal(&[1, 3]), Some(2));
        assert_eq!(anchor_after_removal(&[0]), Some(0));
        assert_eq!(anchor_after_removal(&[]), None);
    }

    #[test]
    fn number_content_is_stringified() {
        assert_eq!(build_element("IntValue", Content::Number(-3)).unwrap().text(), "-3");
    }
}
