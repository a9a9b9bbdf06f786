//! Owned XML tree on top of `quick-xml`.
//!
//! The builders need a document they can edit in place (drop a run of sibling
//! elements, insert new ones before an anchor) and then write back out. This
//! module provides that tree:
//!
//! * [`XmlDocument::parse`] turns markup into an [`XmlElement`] tree, keeping
//!   whitespace text, comments and CDATA so untouched regions survive a
//!   round trip.
//! * [`NodePath`] is a child-combinator selector (`"Plate > FeatureMap"`),
//!   anchored at the root for document lookups and at any descendant for
//!   [`XmlElement::find`].
//! * [`XmlDocument::to_xml_string`] writes the tree back; childless elements
//!   are written self-closing.
//!
//! # Examples
//! ```
//! use edskit::xml::{NodePath, XmlDocument};
//! let doc = XmlDocument::parse("<Plate><BarCode> 42 </BarCode><Name/></Plate>").unwrap();
//! let barcode = doc.select(&NodePath::parse("Plate > BarCode")).unwrap();
//! assert_eq!(barcode.text().trim(), "42");
//! assert_eq!(doc.to_xml_string().unwrap(), "<Plate><BarCode> 42 </BarCode><Name/></Plate>");
//! ```
use core::fmt;
use std::borrow::Cow;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{EdsError, Result};

/// A node inside an element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
    CData(String),
    /// Raw comment body, written back verbatim.
    Comment(String),
    /// Raw processing-instruction body (target and content).
    ProcessingInstruction(String),
    DocType(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self { XmlNode::Element(e) => Some(e), _ => None }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self { XmlNode::Element(e) => Some(e), _ => None }
    }

    fn is_element_named(&self, name: &str) -> bool {
        self.as_element().is_some_and(|e| e.name == name)
    }
}

impl From<XmlElement> for XmlNode {
    fn from(e: XmlElement) -> Self { XmlNode::Element(e) }
}

/// An element with its attributes and ordered children.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// An empty element named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Parse `markup` as the content of a new `tag` element.
    ///
    /// # Errors
    /// Any parse error of the wrapped fragment.
    pub fn parse_fragment(tag: &str, markup: &str) -> Result<Self> {
        Ok(XmlDocument::parse(&format!("<{tag}>{markup}</{tag}>"))?.into_root())
    }

    pub fn name(&self) -> &str { &self.name }

    /// Attributes in document order.
    pub fn attributes(&self) -> &[(String, String)] { &self.attributes }

    /// Value of the attribute `key`, unescaped.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every child node, text and comments included.
    pub fn children(&self) -> &[XmlNode] { &self.children }

    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> { &mut self.children }

    /// Append `node` as the last child.
    pub fn push(&mut self, node: impl Into<XmlNode>) { self.children.push(node.into()); }

    /// Direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Direct child elements named `name`.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a XmlElement> + use<'a, 'n> {
        self.elements().filter(move |e| e.name == name)
    }

    /// First direct child element named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> { self.elements().find(|e| e.name == name) }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut).find(|e| e.name == name)
    }

    /// Positions (in [`XmlElement::children`]) of the direct child elements named `name`.
    pub fn positions_of(&self, name: &str) -> Vec<usize> {
        self.children.iter().enumerate().filter(|(_, n)| n.is_element_named(name)).map(|(i, _)| i).collect()
    }

    /// First descendant (not `self`) named `name`, preorder.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.name == name { return Some(child); }
            if let Some(found) = child.descendant(name) { return Some(found); }
        }
        None
    }

    /// All descendants (not `self`) named `name`, preorder.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.name == name { out.push(child); }
            child.collect_descendants(name, out);
        }
    }

    /// First match of `path` anchored at any descendant: the first segment names a
    /// descendant, the remaining segments are child steps.
    pub fn find(&self, path: &NodePath) -> Option<&XmlElement> {
        let (first, rest) = path.segments().split_first()?;
        self.descendants(first).into_iter().find_map(|start| start.walk(rest).into_iter().next())
    }

    fn walk<'a>(&'a self, steps: &[String]) -> Vec<&'a XmlElement> {
        let mut current = vec![self];
        for step in steps {
            current = current.into_iter().flat_map(|e| e.elements().filter(move |c| c.name == *step)).collect();
        }
        current
    }

    fn walk_mut<'a>(&'a mut self, steps: &[String], accept: &dyn Fn(&XmlElement) -> bool) -> Option<&'a mut XmlElement> {
        let Some((step, tail)) = steps.split_first() else {
            return if accept(self) { Some(self) } else { None };
        };
        for child in self.children.iter_mut().filter_map(XmlNode::as_element_mut) {
            if child.name == *step {
                if let Some(found) = child.walk_mut(tail, accept) { return Some(found); }
            }
        }
        None
    }

    /// Concatenated text and CDATA of the element and its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(e) => e.collect_text(out),
                _ => {}
            }
        }
    }

    /// Replace all children with a single text node (none for empty text).
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() { self.children.push(XmlNode::Text(text)); }
    }
}

/// `<?xml ...?>` declaration fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A parsed document: optional declaration, prolog nodes, one root element.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XmlDocument {
    declaration: Option<XmlDeclaration>,
    prolog: Vec<XmlNode>,
    root: XmlElement,
    epilog: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { declaration: None, prolog: Vec::new(), root, epilog: Vec::new() }
    }

    /// Parse a complete document.
    ///
    /// # Errors
    /// [`EdsError::MalformedXml`] for structural problems (no root, two roots,
    /// unclosed elements), [`EdsError::Xml`] / [`EdsError::XmlAttr`] for lexical ones.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Decl(d) => {
                    declaration = Some(XmlDeclaration {
                        version: lossy(&d.version()?),
                        encoding: d.encoding().transpose()?.map(|v| lossy(&v)),
                        standalone: d.standalone().transpose()?.map(|v| lossy(&v)),
                    });
                    continue;
                }
                Event::Start(e) => {
                    stack.push(element_from_start(&e)?);
                    continue;
                }
                Event::End(_) => {
                    let el = stack.pop().ok_or_else(|| EdsError::MalformedXml("unexpected closing tag".into()))?;
                    XmlNode::Element(el)
                }
                Event::Empty(e) => XmlNode::Element(element_from_start(&e)?),
                Event::Text(t) => XmlNode::Text(t.unescape()?.into_owned()),
                Event::CData(c) => XmlNode::CData(lossy(&c)),
                Event::Comment(c) => XmlNode::Comment(lossy(&c)),
                Event::PI(p) => XmlNode::ProcessingInstruction(lossy(&p)),
                Event::DocType(d) => XmlNode::DocType(lossy(&d)),
                Event::Eof => break,
            };

            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
                continue;
            }
            match node {
                XmlNode::Text(t) if t.trim().is_empty() => {}
                XmlNode::Element(el) => {
                    if root.is_some() {
                        return Err(EdsError::MalformedXml(format!("second root element <{}>", el.name)));
                    }
                    root = Some(el);
                }
                other if root.is_none() => prolog.push(other),
                other => epilog.push(other),
            }
        }

        if let Some(open) = stack.last() {
            return Err(EdsError::MalformedXml(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| EdsError::MalformedXml("document has no root element".into()))?;
        Ok(Self { declaration, prolog, root, epilog })
    }

    pub fn declaration(&self) -> Option<&XmlDeclaration> { self.declaration.as_ref() }

    pub fn root(&self) -> &XmlElement { &self.root }

    pub fn root_mut(&mut self) -> &mut XmlElement { &mut self.root }

    pub fn into_root(self) -> XmlElement { self.root }

    /// All elements matching a root-anchored path, in document order.
    pub fn select_all(&self, path: &NodePath) -> Vec<&XmlElement> {
        match path.segments().split_first() {
            Some((first, rest)) if *first == self.root.name => self.root.walk(rest),
            _ => Vec::new(),
        }
    }

    /// First element matching a root-anchored path.
    pub fn select(&self, path: &NodePath) -> Option<&XmlElement> {
        self.select_all(path).into_iter().next()
    }

    pub fn select_mut(&mut self, path: &NodePath) -> Option<&mut XmlElement> {
        self.select_mut_where(path, |_| true)
    }

    /// First element matching a root-anchored path for which `accept` holds.
    pub fn select_mut_where(&mut self, path: &NodePath, accept: impl Fn(&XmlElement) -> bool) -> Option<&mut XmlElement> {
        match path.segments().split_first() {
            Some((first, rest)) if *first == self.root.name => self.root.walk_mut(rest, &accept),
            _ => None,
        }
    }

    /// Serialize the declaration, prolog, root and epilog.
    ///
    /// # Errors
    /// Writer failures; the output buffer is in memory so these are not expected.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        if let Some(d) = &self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(&d.version, d.encoding.as_deref(), d.standalone.as_deref())))?;
            writer.get_mut().push(b'\n');
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
            writer.get_mut().push(b'\n');
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            writer.get_mut().push(b'\n');
            write_node(&mut writer, node)?;
        }
        String::from_utf8(writer.into_inner()).map_err(|e| EdsError::MalformedXml(e.to_string()))
    }
}

/// Child-combinator selector such as `"Plate > FeatureMap > Feature > Id"`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn parse(selector: &str) -> Self {
        NodePath(selector.split('>').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
    }

    pub fn segments(&self) -> &[String] { &self.0 }

    /// Last segment: the element name the path selects.
    pub fn leaf(&self) -> Option<&str> { self.0.last().map(String::as_str) }

    /// The path of the selected elements' parent; `None` for a root-only path.
    pub fn parent(&self) -> Option<NodePath> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(NodePath(self.0[..n - 1].to_vec())),
        }
    }
}

impl From<&str> for NodePath {
    fn from(selector: &str) -> Self { NodePath::parse(selector) }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0.join(" > ")) }
}

fn lossy(bytes: &[u8]) -> String { String::from_utf8_lossy(bytes).into_owned() }

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement> {
    let mut el = XmlElement::new(lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr?;
        el.attributes.push((lossy(attr.key.as_ref()), attr.unescape_value()?.into_owned()));
    }
    Ok(el)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(e) => write_element(writer, e)?,
        XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(t))))?,
        XmlNode::CData(c) => writer.write_event(Event::CData(BytesCData::new(c.as_str())))?,
        XmlNode::Comment(c) => writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))?,
        XmlNode::ProcessingInstruction(p) => writer.write_event(Event::PI(BytesPI::new(p.as_str())))?,
        XmlNode::DocType(d) => writer.write_event(Event::DocType(BytesText::from_escaped(d.as_str())))?,
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(Cow::Borrowed(el.name.as_str()));
    for (k, v) in &el.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod xml_tests {
    use super::*;

    const SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
<!-- plate -->\n\
<Plate kind=\"96\">\n    <Name>A &amp; B</Name>\n    <FeatureMap><Feature><Id>sample</Id></Feature></FeatureMap>\n    <FeatureMap><Feature><Id>detector-task</Id></Feature></FeatureMap>\n    <Note><![CDATA[<raw>]]></Note>\n</Plate>";

    #[test]
    fn round_trip_preserves_content() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let out = doc.to_xml_string().unwrap();
        assert_eq!(out, SAMPLE);
    }

    #[test]
    fn declaration_and_attributes_are_parsed() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let decl = doc.declaration().unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(decl.standalone.as_deref(), Some("yes"));
        assert_eq!(doc.root().attribute("kind"), Some("96"));
    }

    #[test]
    fn select_all_follows_child_steps_in_document_order() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let ids: Vec<String> = doc.select_all(&"Plate > FeatureMap > Feature > Id".into()).iter().map(|e| e.text()).collect();
        assert_eq!(ids, ["sample", "detector-task"]);
        assert!(doc.select(&"Experiment > Name".into()).is_none());
        assert_eq!(doc.select(&"Plate > Name".into()).unwrap().text(), "A & B");
    }

    #[test]
    fn find_is_anchored_at_any_descendant() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.root().find(&"Feature > Id".into()).unwrap().text(), "sample");
        assert!(doc.root().find(&"Plate > Name".into()).is_none());
        assert_eq!(doc.root().descendants("Id").len(), 2);
    }

    #[test]
    fn set_text_replaces_children_and_escapes_on_write() {
        let mut doc = XmlDocument::parse("<Plate><Name><b>old</b></Name></Plate>").unwrap();
        doc.select_mut(&"Plate > Name".into()).unwrap().set_text("x < y");
        assert_eq!(doc.to_xml_string().unwrap(), "<Plate><Name>x &lt; y</Name></Plate>");
        doc.select_mut(&"Plate > Name".into()).unwrap().set_text("");
        assert_eq!(doc.to_xml_string().unwrap(), "<Plate><Name/></Plate>");
    }

    #[test]
    fn fragments_parse_as_element_content() {
        let el = XmlElement::parse_fragment("FeatureItem", "<Sample><Name>a</Name></Sample>  ").unwrap();
        assert_eq!(el.name(), "FeatureItem");
        assert_eq!(el.child("Sample").unwrap().child("Name").unwrap().text(), "a");
        assert_eq!(el.children().len(), 2);
    }

    #[test]
    fn structural_errors_are_reported() {
        assert!(matches!(XmlDocument::parse(""), Err(EdsError::MalformedXml(_))));
        assert!(matches!(XmlDocument::parse("<a/><b/>"), Err(EdsError::MalformedXml(_))));
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
    }

    #[test]
    fn node_path_parent_and_leaf() {
        let p = NodePath::parse("Experiment > Samples");
        assert_eq!(p.leaf(), Some("Samples"));
        assert_eq!(p.parent(), Some(NodePath::parse("Experiment")));
        assert_eq!(NodePath::parse("Experiment").parent(), None);
        assert_eq!(p.to_string(), "Experiment > Samples");
    }
}
