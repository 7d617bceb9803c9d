use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use crate::docx::package::DocxPackage;
use crate::docx::xml::{parse_xml_part, write_xml_part, Element, XmlNode, XmlPart};

pub const MAIN_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const NUMBERING_PART: &str = "word/numbering.xml";

/// Per-style facts the classifier and numbering sync need. Built once per
/// load; style definitions themselves are never mutated.
#[derive(Clone, Debug, Default)]
pub struct StyleInfo {
    pub name: String,
    pub outline_lvl: Option<i32>,
    pub num_id: Option<i64>,
    pub num_ilvl: Option<i64>,
}

#[derive(Default)]
pub struct StyleTable {
    by_id: HashMap<String, StyleInfo>,
}

impl StyleTable {
    pub fn parse(part: &XmlPart) -> Self {
        let mut by_id = HashMap::new();
        for style in part.root.children_named("w:style") {
            let Some(style_id) = style.attr("w:styleId") else {
                continue;
            };
            let mut info = StyleInfo {
                name: style
                    .child("w:name")
                    .and_then(|n| n.attr("w:val"))
                    .unwrap_or_default()
                    .to_string(),
                ..Default::default()
            };
            if let Some(ppr) = style.child("w:pPr") {
                info.outline_lvl = ppr
                    .child("w:outlineLvl")
                    .and_then(|o| o.attr("w:val"))
                    .and_then(|v| v.trim().parse::<i32>().ok());
                if let Some(num_pr) = ppr.child("w:numPr") {
                    info.num_id = num_pr
                        .child("w:numId")
                        .and_then(|n| n.attr("w:val"))
                        .and_then(|v| v.trim().parse::<i64>().ok());
                    info.num_ilvl = num_pr
                        .child("w:ilvl")
                        .and_then(|n| n.attr("w:val"))
                        .and_then(|v| v.trim().parse::<i64>().ok());
                }
            }
            by_id.insert(style_id.to_string(), info);
        }
        Self { by_id }
    }

    pub fn get(&self, style_id: &str) -> Option<&StyleInfo> {
        self.by_id.get(style_id)
    }
}

/// Where a paragraph lives; table-cell paragraphs take the table pass rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Body,
    TableCell,
}

/// A fully parsed working document: the package plus the three parts the
/// engine touches. Parts are written back through `save_to`.
pub struct LoadedDocument {
    pub package: DocxPackage,
    pub document: XmlPart,
    pub numbering: Option<XmlPart>,
    pub styles: StyleTable,
}

impl LoadedDocument {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let package = DocxPackage::read(path)?;
        let doc_bytes = package
            .part_bytes(MAIN_PART)
            .with_context(|| format!("missing {MAIN_PART}"))?;
        let document = parse_xml_part(MAIN_PART, doc_bytes)?;
        document
            .root
            .child("w:body")
            .with_context(|| format!("{MAIN_PART} has no w:body"))?;

        let styles = match package.part_bytes(STYLES_PART) {
            Some(bytes) => StyleTable::parse(&parse_xml_part(STYLES_PART, bytes)?),
            None => StyleTable::default(),
        };
        let numbering = match package.part_bytes(NUMBERING_PART) {
            Some(bytes) => Some(parse_xml_part(NUMBERING_PART, bytes)?),
            None => None,
        };
        Ok(Self {
            package,
            document,
            numbering,
            styles,
        })
    }

    pub fn body(&self) -> &Element {
        self.document
            .root
            .child("w:body")
            .expect("w:body checked at load")
    }

    pub fn body_mut(&mut self) -> &mut Element {
        self.document
            .root
            .child_mut("w:body")
            .expect("w:body checked at load")
    }

    /// Serializes the mutated parts back into the package and rewrites the
    /// file at `path` (normally the working copy itself).
    pub fn save_to(&mut self, path: &Path) -> anyhow::Result<()> {
        let doc_bytes = write_xml_part(&self.document).context("serialize document part")?;
        self.package.replace_part(MAIN_PART, doc_bytes);
        if let Some(num) = self.numbering.as_ref() {
            let num_bytes = write_xml_part(num).context("serialize numbering part")?;
            self.package.replace_part(NUMBERING_PART, num_bytes);
        }
        self.package.write_to(path)
    }
}

/// Visits every paragraph under `root` in document order. Paragraphs inside
/// table cells (any nesting depth) are reported as `Container::TableCell`.
pub fn for_each_paragraph(root: &Element, f: &mut dyn FnMut(&Element, Container)) {
    fn go(e: &Element, in_cell: bool, f: &mut dyn FnMut(&Element, Container)) {
        for node in &e.children {
            let XmlNode::Element(child) = node else {
                continue;
            };
            if child.name == "w:p" {
                let container = if in_cell {
                    Container::TableCell
                } else {
                    Container::Body
                };
                f(child, container);
            } else {
                go(child, in_cell || child.name == "w:tc", f);
            }
        }
    }
    go(root, false, f);
}

pub fn for_each_paragraph_mut(root: &mut Element, f: &mut dyn FnMut(&mut Element, Container)) {
    fn go(e: &mut Element, in_cell: bool, f: &mut dyn FnMut(&mut Element, Container)) {
        for node in &mut e.children {
            let XmlNode::Element(child) = node else {
                continue;
            };
            if child.name == "w:p" {
                let container = if in_cell {
                    Container::TableCell
                } else {
                    Container::Body
                };
                f(child, container);
            } else {
                let nested_cell = in_cell || child.name == "w:tc";
                go(child, nested_cell, f);
            }
        }
    }
    go(root, false, f);
}

/// Visible content of one paragraph, gathered in a single walk.
#[derive(Clone, Debug, Default)]
pub struct ParaContent {
    /// Rendered text: `w:t` plus tab/break whitespace, field results included.
    pub text: String,
    /// Field instruction text (`w:instrText`, `w:fldSimple/@w:instr`).
    pub instr_text: String,
    /// `text` with `w:instrText` tokens left inline, in document order. The
    /// numbering resolver's field-code fallback strips tokens out of this.
    pub text_with_instr: String,
    pub run_count: usize,
    pub has_drawing: bool,
}

pub fn para_content(p: &Element) -> ParaContent {
    let mut out = ParaContent::default();
    collect_content(p, &mut out);
    out
}

fn collect_content(e: &Element, out: &mut ParaContent) {
    for node in &e.children {
        let XmlNode::Element(child) = node else {
            continue;
        };
        match child.name.as_str() {
            // Paragraph properties carry no visible text.
            "w:pPr" => {}
            "w:r" => {
                out.run_count += 1;
                collect_content(child, out);
            }
            "w:t" => {
                let t = element_text(child);
                out.text.push_str(&t);
                out.text_with_instr.push_str(&t);
            }
            "w:instrText" => {
                let t = element_text(child);
                out.instr_text.push_str(&t);
                out.text_with_instr.push_str(&t);
            }
            "w:fldSimple" => {
                if let Some(instr) = child.attr("w:instr") {
                    out.instr_text.push_str(instr);
                    out.text_with_instr.push_str(instr);
                }
                collect_content(child, out);
            }
            "w:tab" | "w:ptab" => {
                out.text.push('\t');
                out.text_with_instr.push('\t');
            }
            "w:cr" => {
                out.text.push('\n');
                out.text_with_instr.push('\n');
            }
            "w:br" => {
                if child.attr("w:type").unwrap_or("textWrapping") == "textWrapping" {
                    out.text.push('\n');
                    out.text_with_instr.push('\n');
                }
            }
            "w:noBreakHyphen" => {
                out.text.push('-');
                out.text_with_instr.push('-');
            }
            "w:drawing" | "w:pict" | "w:object" => out.has_drawing = true,
            _ => collect_content(child, out),
        }
    }
}

pub fn element_text(e: &Element) -> String {
    let mut s = String::new();
    for node in &e.children {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => s.push_str(t),
            _ => {}
        }
    }
    s
}

pub fn paragraph_style_id(p: &Element) -> Option<&str> {
    p.child("w:pPr")?.child("w:pStyle")?.attr("w:val")
}

pub fn paragraph_outline_level(p: &Element) -> Option<i32> {
    p.child("w:pPr")?
        .child("w:outlineLvl")?
        .attr("w:val")?
        .trim()
        .parse::<i32>()
        .ok()
}

/// Direct numbering reference `(numId, ilvl)`; ilvl defaults to 0 when the
/// reference omits it.
pub fn paragraph_num_ref(p: &Element) -> Option<(i64, i64)> {
    let num_pr = p.child("w:pPr")?.child("w:numPr")?;
    let num_id = num_pr
        .child("w:numId")?
        .attr("w:val")?
        .trim()
        .parse::<i64>()
        .ok()?;
    let ilvl = num_pr
        .child("w:ilvl")
        .and_then(|n| n.attr("w:val"))
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0);
    Some((num_id, ilvl))
}
