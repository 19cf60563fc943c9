//! Canonical XML 1.0 and Exclusive XML Canonicalization 1.0 of a subtree.
//!
//! Only the document-subset cases XML-DSig needs are covered: a whole
//! element subtree, optionally with one descendant subtree cut out (the
//! enveloped-signature transform). Namespace and attribute ordering, the
//! namespace rendering rules and text escaping follow the W3C algorithms.

use std::collections::{BTreeMap, BTreeSet};

use roxmltree::{Node, NodeId, NodeType};

use super::{XML_NS, attribute_prefix, prefix_of, qualified_name};

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// A canonicalization algorithm and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C14nMethod {
    Inclusive {
        with_comments: bool,
    },
    Exclusive {
        with_comments: bool,
        /// `InclusiveNamespaces/@PrefixList`; `#default` names the default namespace.
        inclusive_prefixes: Vec<String>,
    },
}

impl Default for C14nMethod {
    fn default() -> Self {
        Self::Inclusive {
            with_comments: false,
        }
    }
}

impl C14nMethod {
    /// Map an algorithm URI to a method. `None` for anything unsupported.
    pub fn from_algorithm(uri: &str) -> Option<Self> {
        match uri {
            C14N => Some(Self::Inclusive {
                with_comments: false,
            }),
            C14N_WITH_COMMENTS => Some(Self::Inclusive {
                with_comments: true,
            }),
            EXC_C14N => Some(Self::Exclusive {
                with_comments: false,
                inclusive_prefixes: Vec::new(),
            }),
            EXC_C14N_WITH_COMMENTS => Some(Self::Exclusive {
                with_comments: true,
                inclusive_prefixes: Vec::new(),
            }),
            _ => None,
        }
    }

    /// Set the inclusive prefix list. No effect on inclusive methods.
    #[must_use]
    pub fn with_inclusive_prefixes(self, prefixes: Vec<String>) -> Self {
        match self {
            Self::Exclusive { with_comments, .. } => Self::Exclusive {
                with_comments,
                inclusive_prefixes: prefixes,
            },
            inclusive @ Self::Inclusive { .. } => inclusive,
        }
    }

    fn with_comments(&self) -> bool {
        match self {
            Self::Inclusive { with_comments } | Self::Exclusive { with_comments, .. } => {
                *with_comments
            }
        }
    }
}

/// Canonicalize `node` and its descendants. The subtree rooted at `exclude`
/// is left out entirely.
///
/// Under inclusive canonicalization an element below the document element
/// also picks up the `xml:*` attributes in scope from its ancestors.
pub fn canonicalize(node: Node<'_, '_>, method: &C14nMethod, exclude: Option<NodeId>) -> String {
    let inherit_xml_attributes = match method {
        C14nMethod::Inclusive { .. } if node.is_element() => Some(node.id()),
        _ => None,
    };
    let mut canon = Canonicalizer {
        method,
        exclude,
        inherit_xml_attributes,
        out: String::new(),
    };
    canon.node(node, &Scope::new());
    canon.out
}

/// Namespace declarations already rendered on output ancestors, by prefix
/// (`""` is the default namespace).
type Scope = BTreeMap<String, String>;

struct Canonicalizer<'m> {
    method: &'m C14nMethod,
    exclude: Option<NodeId>,
    inherit_xml_attributes: Option<NodeId>,
    out: String,
}

/// An attribute as rendered: sorted by namespace URI then local name, written
/// with the prefix it carried in the source.
struct CanonicalAttribute<'a> {
    namespace: &'a str,
    local: &'a str,
    prefix: Option<&'a str>,
    value: &'a str,
}

impl<'a> CanonicalAttribute<'a> {
    fn of_element(node: Node<'a, '_>) -> Vec<Self> {
        node.attributes()
            .map(|attr| Self {
                namespace: attr.namespace().unwrap_or(""),
                local: attr.name(),
                prefix: attribute_prefix(node, &attr),
                value: attr.value(),
            })
            .collect()
    }
}

impl Canonicalizer<'_> {
    fn node(&mut self, node: Node<'_, '_>, rendered: &Scope) {
        if self.exclude == Some(node.id()) {
            return;
        }
        match node.node_type() {
            NodeType::Root => {
                for child in node.children() {
                    self.node(child, rendered);
                }
            }
            NodeType::Element => self.element(node, rendered),
            NodeType::Text => escape_text(node.text().unwrap_or_default(), &mut self.out),
            NodeType::Comment => {
                if self.method.with_comments() {
                    self.out.push_str("<!--");
                    self.out.push_str(node.text().unwrap_or_default());
                    self.out.push_str("-->");
                }
            }
            NodeType::PI => {
                if let Some(pi) = node.pi() {
                    self.out.push_str("<?");
                    self.out.push_str(pi.target);
                    if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
                        self.out.push(' ');
                        self.out.push_str(value);
                    }
                    self.out.push_str("?>");
                }
            }
        }
    }

    fn element<'a>(&mut self, node: Node<'a, '_>, rendered: &Scope) {
        let qname = qualified_name(node);
        let method = self.method;
        let prefixes = match method {
            C14nMethod::Inclusive { .. } => inclusive_prefixes(node),
            C14nMethod::Exclusive {
                inclusive_prefixes, ..
            } => visibly_utilized_prefixes(node, qname, inclusive_prefixes),
        };

        let mut scope = rendered.clone();
        self.out.push('<');
        self.out.push_str(qname);

        for prefix in prefixes {
            let Some(uri) = namespace_in_scope(node, &prefix) else {
                continue;
            };
            if rendered.get(&prefix).map_or("", String::as_str) == uri {
                continue;
            }
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(&prefix);
                self.out.push_str("=\"");
            }
            escape_attr(uri, &mut self.out);
            self.out.push('"');
            scope.insert(prefix, uri.to_string());
        }

        let mut attrs = CanonicalAttribute::of_element(node);
        if self.inherit_xml_attributes == Some(node.id()) {
            inherit_xml_attributes(node, &mut attrs);
        }
        attrs.sort_by(|a, b| (a.namespace, a.local).cmp(&(b.namespace, b.local)));
        for attr in &attrs {
            self.out.push(' ');
            if let Some(prefix) = attr.prefix {
                self.out.push_str(prefix);
                self.out.push(':');
            }
            self.out.push_str(attr.local);
            self.out.push_str("=\"");
            escape_attr(attr.value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');

        for child in node.children() {
            self.node(child, &scope);
        }

        self.out.push_str("</");
        self.out.push_str(qname);
        self.out.push('>');
    }
}

/// Add the `xml:*` attributes of `node`'s ancestors that `node` does not set
/// itself. The nearest ancestor wins.
fn inherit_xml_attributes<'a>(node: Node<'a, '_>, attrs: &mut Vec<CanonicalAttribute<'a>>) {
    for ancestor in node.ancestors().skip(1).filter(Node::is_element) {
        for attr in ancestor.attributes().filter(|a| a.namespace() == Some(XML_NS)) {
            let present = attrs
                .iter()
                .any(|a| a.namespace == XML_NS && a.local == attr.name());
            if !present {
                attrs.push(CanonicalAttribute {
                    namespace: XML_NS,
                    local: attr.name(),
                    prefix: Some("xml"),
                    value: attr.value(),
                });
            }
        }
    }
}

/// Every prefix in scope, plus the default namespace so that an inherited
/// default can be undeclared.
fn inclusive_prefixes(node: Node<'_, '_>) -> BTreeSet<String> {
    let mut prefixes: BTreeSet<String> = node
        .namespaces()
        .map(|ns| ns.name().unwrap_or("").to_string())
        .filter(|prefix| prefix != "xml")
        .collect();
    prefixes.insert(String::new());
    prefixes
}

/// Prefixes used by the element name and its attributes, plus any listed in
/// the inclusive prefix list that are in scope.
fn visibly_utilized_prefixes(
    node: Node<'_, '_>,
    qname: &str,
    inclusive: &[String],
) -> BTreeSet<String> {
    let mut prefixes = BTreeSet::new();
    prefixes.insert(prefix_of(qname).unwrap_or("").to_string());
    for attr in node.attributes() {
        if let Some(prefix) = attribute_prefix(node, &attr) {
            prefixes.insert(prefix.to_string());
        }
    }
    for listed in inclusive {
        let prefix = if listed == "#default" { "" } else { listed.as_str() };
        prefixes.insert(prefix.to_string());
    }
    prefixes.remove("xml");
    prefixes
}

/// The namespace `prefix` resolves to at `node`. The default namespace
/// resolves to `""` when undeclared; other prefixes to `None`.
fn namespace_in_scope<'a>(node: Node<'a, '_>, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        Some(node.lookup_namespace_uri(None).unwrap_or(""))
    } else {
        node.lookup_namespace_uri(Some(prefix))
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
