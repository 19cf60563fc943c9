//! Parsed metadata documents and small namespace-aware helpers over `roxmltree`.

pub mod c14n;
pub mod dsig;

use roxmltree::{Attribute, Document, Node};

use crate::error::SchemaViolation;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A well-formed XML document parsed from raw feed bytes.
///
/// Borrows the bytes it was parsed from. Parsing refuses DTDs, so no entity
/// expansion ever happens on untrusted input.
pub struct MetadataDocument<'input> {
    doc: Document<'input>,
}

impl<'input> MetadataDocument<'input> {
    /// Parse raw bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaViolation`] with code
    /// [`SchemaViolation::NOT_WELL_FORMED`] for non-UTF-8 input, truncated or
    /// otherwise malformed XML, and documents carrying a DTD.
    pub fn parse(raw: &'input [u8]) -> Result<Self, SchemaViolation> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| SchemaViolation::not_well_formed(format!("input is not UTF-8: {e}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let doc = Document::parse(text).map_err(|e| SchemaViolation::not_well_formed(e.to_string()))?;
        Ok(Self { doc })
    }

    /// The document element.
    pub fn root(&self) -> Node<'_, 'input> {
        self.doc.root_element()
    }

    /// The underlying document, for whole-document canonicalization.
    pub fn document(&self) -> &Document<'input> {
        &self.doc
    }
}

impl std::fmt::Debug for MetadataDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataDocument")
            .field("root", &qualified_name(self.root()))
            .finish()
    }
}

/// True if `node` is an element with the given namespace and local name.
pub fn is(node: Node<'_, '_>, ns: &str, local: &str) -> bool {
    if !node.is_element() {
        return false;
    }
    let tag = node.tag_name();
    tag.name() == local && tag.namespace() == Some(ns)
}

/// Element children of `node`.
pub fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// Element children of `node` with the given namespace and local name.
pub fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    ns: &str,
    local: &str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| is(*child, ns, local))
}

/// The element's tag exactly as written in the source, prefix included.
pub fn qualified_name<'input>(node: Node<'_, 'input>) -> &'input str {
    let text = node.document().input_text();
    let start = node.range().start;
    let tag = text
        .get(start..)
        .and_then(|rest| rest.strip_prefix('<'))
        .map(|rest| {
            let end = rest
                .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
                .unwrap_or(rest.len());
            &rest[..end]
        });
    match tag {
        Some(tag) if !tag.is_empty() => tag,
        _ => node.tag_name().name(),
    }
}

/// The prefix of a qualified name, if it has one.
pub fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

/// The prefix `attr` was written with in the source. Several prefixes can be
/// bound to one namespace, so this is not recoverable from the URI alone.
/// `None` for unqualified attributes.
pub fn attribute_prefix<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    attr: &Attribute<'a, 'input>,
) -> Option<&'a str> {
    let uri = attr.namespace()?;
    let text: &'a str = node.document().input_text();
    text.get(attr.range_qname())
        .filter(|qname| qname.ends_with(attr.name()))
        .and_then(prefix_of)
        .or_else(|| prefix_for(node, uri))
}

/// A prefix bound to `uri` in the scope of `node`. `xml` for [`XML_NS`].
pub fn prefix_for<'a>(node: Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == XML_NS {
        return Some("xml");
    }
    node.namespaces()
        .filter(|ns| ns.uri() == uri)
        .find_map(|ns| ns.name())
}
