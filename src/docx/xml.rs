use anyhow::Context;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

/// One node of a parsed XML part. Attribute values are kept as raw
/// (already-escaped) bytes: OOXML parts such as VML `o:gfxdata` encode CRLF
/// with character references, and unescaping + re-escaping them would let XML
/// attribute normalization corrupt the value on write.
#[derive(Clone, Debug)]
pub enum XmlNode {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    PI(String),
    DocType(String),
}

#[derive(Clone, Debug)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Clone, Debug)]
pub struct XmlDecl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A whole XML part of the package: declaration, any prolog nodes, and the
/// document element.
#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub decl: Option<XmlDecl>,
    pub prolog: Vec<XmlNode>,
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, escaping the value for storage alongside raw
    /// round-tripped attribute bytes.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        let escaped = escape_attr_value(value);
        for (k, v) in self.attrs.iter_mut() {
            if k == key {
                *v = escaped;
                return;
            }
        }
        self.attrs.push((key.to_string(), escaped));
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|n| match n {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |n| match n {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// First existing child with `name`, or a fresh one appended at the end.
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        if self.child_index(name).is_none() {
            self.children.push(XmlNode::Element(Element::new(name)));
        }
        let idx = self.child_index(name).unwrap_or(self.children.len() - 1);
        self.element_at_mut(idx)
    }

    /// First existing child with `name`, or a fresh one inserted as the first
    /// child. Property containers (`w:pPr`, `w:rPr`) must precede content.
    pub fn ensure_child_first(&mut self, name: &str) -> &mut Element {
        let idx = match self.child_index(name) {
            Some(i) => i,
            None => {
                self.children.insert(0, XmlNode::Element(Element::new(name)));
                0
            }
        };
        self.element_at_mut(idx)
    }

    pub fn remove_children(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, XmlNode::Element(e) if e.name == name));
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, XmlNode::Element(e) if e.name == name))
    }

    fn element_at_mut(&mut self, idx: usize) -> &mut Element {
        match &mut self.children[idx] {
            XmlNode::Element(e) => e,
            _ => unreachable!("index points at element child"),
        }
    }
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut decl: Option<XmlDecl> = None;
    let mut prolog: Vec<XmlNode> = Vec::new();
    let mut root: Option<Element> = None;
    // Open-element stack; the bottom entry becomes the document element.
    let mut stack: Vec<Element> = Vec::new();

    fn push_node(stack: &mut [Element], prolog: &mut Vec<XmlNode>, node: XmlNode) {
        if let Some(top) = stack.last_mut() {
            top.children.push(node);
        } else {
            prolog.push(node);
        }
    }

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                decl = Some(XmlDecl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                stack.push(Element {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                    children: Vec::new(),
                });
            }
            Event::End(_) => {
                let done = stack.pop().context("unbalanced end tag")?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Element(done));
                } else {
                    root = Some(done);
                }
            }
            Event::Empty(s) => {
                let elem = Element {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                    children: Vec::new(),
                };
                if stack.is_empty() && root.is_none() {
                    root = Some(elem);
                } else {
                    push_node(&mut stack, &mut prolog, XmlNode::Element(elem));
                }
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                push_node(&mut stack, &mut prolog, XmlNode::Text(txt));
            }
            Event::CData(t) => {
                push_node(
                    &mut stack,
                    &mut prolog,
                    XmlNode::CData(bytes_to_string(t.into_inner())),
                );
            }
            Event::Comment(t) => {
                push_node(
                    &mut stack,
                    &mut prolog,
                    XmlNode::Comment(bytes_to_string(t.into_inner())),
                );
            }
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                push_node(
                    &mut stack,
                    &mut prolog,
                    XmlNode::PI(format!("{target}{content}")),
                );
            }
            Event::DocType(t) => {
                push_node(
                    &mut stack,
                    &mut prolog,
                    XmlNode::DocType(bytes_to_string(t.into_inner())),
                );
            }
        }
    }

    let root = root.with_context(|| format!("no document element in {name}"))?;
    Ok(XmlPart {
        name: name.to_string(),
        decl,
        prolog,
        root,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        // Raw (already-escaped) attribute bytes; see XmlNode doc.
        attrs.push((
            bytes_to_string(a.key.as_ref()),
            bytes_to_string(a.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    if let Some(d) = part.decl.as_ref() {
        let decl = BytesDecl::new(
            d.version.as_str(),
            d.encoding.as_deref(),
            d.standalone.as_deref(),
        );
        let mut writer = quick_xml::Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(decl))
            .context("write decl")?;
        out.extend_from_slice(&writer.into_inner());
    }
    for node in &part.prolog {
        write_node(&mut out, node);
    }
    write_element(&mut out, &part.root);
    Ok(out)
}

fn write_element(out: &mut Vec<u8>, e: &Element) {
    out.extend_from_slice(b"<");
    out.extend_from_slice(e.name.as_bytes());
    // Attribute values are stored as raw XML bytes. Do NOT escape again.
    for (k, v) in &e.attrs {
        out.extend_from_slice(b" ");
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(v.as_bytes());
        out.extend_from_slice(b"\"");
    }
    if e.children.is_empty() {
        out.extend_from_slice(b"/>");
        return;
    }
    out.extend_from_slice(b">");
    for child in &e.children {
        write_node(out, child);
    }
    out.extend_from_slice(b"</");
    out.extend_from_slice(e.name.as_bytes());
    out.extend_from_slice(b">");
}

fn write_node(out: &mut Vec<u8>, node: &XmlNode) {
    match node {
        XmlNode::Element(e) => write_element(out, e),
        XmlNode::Text(text) => escape_text_into(out, text),
        XmlNode::CData(text) => {
            // CDATA must remain unescaped.
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"]]>");
        }
        XmlNode::Comment(text) => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }
        XmlNode::PI(content) => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(b"?>");
        }
        XmlNode::DocType(text) => {
            out.extend_from_slice(b"<!DOCTYPE");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b">");
        }
    }
}

fn escape_text_into(out: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{parse_xml_part, write_xml_part};

    #[test]
    fn write_preserves_attr_entity_refs() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root xmlns:o="urn:test" o:gfxdata="A&#xD;&#xA;B"><o:x/></root>"#;
        let part = parse_xml_part("test.xml", xml).expect("parse xml");
        let out = write_xml_part(&part).expect("write xml");
        let s = String::from_utf8(out).expect("utf8");

        assert!(s.contains(r#"o:gfxdata="A&#xD;&#xA;B""#));
        assert!(!s.contains(r#"o:gfxdata="A&amp;#xD;"#));
    }

    #[test]
    fn reserialize_is_stable() {
        let xml = br#"<?xml version="1.0"?><w:p xmlns:w="urn:w"><w:pPr><w:pStyle w:val="a1"/></w:pPr><w:r><w:t xml:space="preserve"> a&amp;b </w:t></w:r></w:p>"#;
        let part = parse_xml_part("doc.xml", xml).expect("parse");
        let once = write_xml_part(&part).expect("write");
        let part2 = parse_xml_part("doc.xml", &once).expect("reparse");
        let twice = write_xml_part(&part2).expect("rewrite");
        assert_eq!(once, twice);
    }

    #[test]
    fn set_attr_escapes_value() {
        let xml = br#"<w:rFonts xmlns:w="urn:w"/>"#;
        let mut part = parse_xml_part("x.xml", xml).expect("parse");
        part.root.set_attr("w:eastAsia", "A\"&B");
        let out = write_xml_part(&part).expect("write");
        let s = String::from_utf8(out).expect("utf8");
        assert!(s.contains(r#"w:eastAsia="A&quot;&amp;B""#));
    }

    #[test]
    fn ensure_child_first_keeps_property_order() {
        let xml = br#"<w:r xmlns:w="urn:w"><w:t>x</w:t></w:r>"#;
        let mut part = parse_xml_part("x.xml", xml).expect("parse");
        part.root.ensure_child_first("w:rPr").set_attr("w:x", "1");
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.starts_with(r#"<w:r xmlns:w="urn:w"><w:rPr w:x="1"/><w:t>"#));
    }
}
