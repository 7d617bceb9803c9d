use once_cell::sync::Lazy;
use regex::Regex;

use crate::docx::document::{paragraph_num_ref, ParaContent};
use crate::docx::xml::{Element, XmlNode, XmlPart};

/// First `%N` placeholder in a `w:lvlText` template.
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%\d+").expect("placeholder re"));

/// Field instruction tokens stripped by the textual caption fallback:
/// STYLEREF/SEQ keywords with their argument, formatting switches, and the
/// MERGEFORMAT marker Word appends to cached fields.
static FIELD_INSTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:STYLEREF|SEQ)\s+\S+|\\\*\s*\w+|\\[a-zA-Z]|MERGEFORMAT").expect("field re")
});

static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws re"));

/// Resolves the literal numbering prefix of a paragraph: instance by
/// `numId`, level override preferred, abstract definition as fallback, then
/// the `w:lvlText` substring before the first placeholder, right-trimmed.
/// Empty when the paragraph has no numbering reference or nothing resolves.
pub fn numbering_prefix(p: &Element, numbering: Option<&XmlPart>) -> String {
    let Some((num_id, ilvl)) = paragraph_num_ref(p) else {
        return String::new();
    };
    prefix_for(numbering, num_id, ilvl)
}

pub fn prefix_for(numbering: Option<&XmlPart>, num_id: i64, ilvl: i64) -> String {
    let Some(part) = numbering else {
        return String::new();
    };
    let Some(lvl) = resolve_level(part, num_id, ilvl) else {
        return String::new();
    };
    let Some(lvl_text) = lvl.child("w:lvlText").and_then(|t| t.attr("w:val")) else {
        return String::new();
    };
    match PLACEHOLDER_RE.find(lvl_text) {
        Some(m) => lvl_text[..m.start()].trim_end().to_string(),
        None => lvl_text.trim_end().to_string(),
    }
}

/// The classification text of a paragraph: numbering prefix prepended when
/// one resolves, otherwise the field-code fallback, otherwise the raw text.
pub fn resolved_text(p: &Element, content: &ParaContent, numbering: Option<&XmlPart>) -> String {
    let prefix = numbering_prefix(p, numbering);
    if !prefix.is_empty() {
        return format!("{prefix}{}", content.text);
    }
    if content.instr_text.contains("STYLEREF") || content.instr_text.contains("SEQ") {
        let stripped = strip_field_codes(&content.text_with_instr);
        if stripped.starts_with('表') || stripped.starts_with('图') {
            return stripped;
        }
    }
    content.text.clone()
}

/// Removes field instruction tokens and collapses the leftover whitespace.
/// Textual fallback only; real numbering resolution never goes through here.
pub fn strip_field_codes(text: &str) -> String {
    let stripped = FIELD_INSTR_RE.replace_all(text, "");
    WS_RUN_RE.replace_all(stripped.trim(), " ").into_owned()
}

fn find_num<'a>(part: &'a XmlPart, num_id: i64) -> Option<&'a Element> {
    part.root
        .children_named("w:num")
        .find(|n| attr_i64(n, "w:numId") == Some(num_id))
}

fn find_override_level<'a>(num: &'a Element, ilvl: i64) -> Option<&'a Element> {
    num.children_named("w:lvlOverride")
        .find(|o| attr_i64(o, "w:ilvl") == Some(ilvl))
        .and_then(|o| o.child("w:lvl"))
}

fn find_abstract_level<'a>(part: &'a XmlPart, num: &Element, ilvl: i64) -> Option<&'a Element> {
    let abstract_id = num
        .child("w:abstractNumId")
        .and_then(|a| a.attr("w:val"))
        .and_then(|v| v.trim().parse::<i64>().ok())?;
    part.root
        .children_named("w:abstractNum")
        .find(|a| attr_i64(a, "w:abstractNumId") == Some(abstract_id))?
        .children_named("w:lvl")
        .find(|l| attr_i64(l, "w:ilvl") == Some(ilvl))
}

/// Level definition a `(numId, ilvl)` pair renders with: the instance-local
/// override when present, else the abstract definition's level.
pub fn resolve_level<'a>(part: &'a XmlPart, num_id: i64, ilvl: i64) -> Option<&'a Element> {
    let num = find_num(part, num_id)?;
    find_override_level(num, ilvl).or_else(|| find_abstract_level(part, num, ilvl))
}

fn attr_i64(e: &Element, key: &str) -> Option<i64> {
    e.attr(key).and_then(|v| v.trim().parse::<i64>().ok())
}

/// Makes the auto-number glyph of `(numId, ilvl)` render with the same font,
/// size and weight as the paragraph text it decorates.
///
/// Only applies when the rendered level already defines run properties (a
/// level without `w:rPr` inherits the paragraph mark formatting and needs no
/// sync). The abstract level is cloned into an instance-local `w:lvlOverride`
/// the first time it is touched, so sibling paragraphs using the same
/// abstract definition through other instances keep their numbering.
pub fn sync_level_override(
    part: &mut XmlPart,
    num_id: i64,
    ilvl: i64,
    east_asia_font: &str,
    latin_font: &str,
    half_points: u32,
    bold: bool,
) -> bool {
    let (needs_override, template) = {
        let Some(num) = find_num(part, num_id) else {
            return false;
        };
        match find_override_level(num, ilvl) {
            Some(lvl) => {
                if lvl.child("w:rPr").is_none() {
                    return false;
                }
                (false, None)
            }
            None => match find_abstract_level(part, num, ilvl) {
                Some(lvl) if lvl.child("w:rPr").is_some() => (true, Some(lvl.clone())),
                _ => return false,
            },
        }
    };

    sync_into_num(part, num_id, ilvl, needs_override, template, |rpr| {
        set_override_run_props(rpr, east_asia_font, latin_font, half_points, bold)
    })
}

fn sync_into_num(
    part: &mut XmlPart,
    num_id: i64,
    ilvl: i64,
    needs_override: bool,
    template: Option<Element>,
    apply: impl FnOnce(&mut Element),
) -> bool {
    let Some(num) = part
        .root
        .children
        .iter_mut()
        .filter_map(|n| match n {
            XmlNode::Element(e) if e.name == "w:num" => Some(e),
            _ => None,
        })
        .find(|n| attr_i64(n, "w:numId") == Some(num_id))
    else {
        return false;
    };

    if needs_override {
        let mut ovr = Element::new("w:lvlOverride");
        ovr.set_attr("w:ilvl", &ilvl.to_string());
        if let Some(lvl) = template {
            ovr.children.push(XmlNode::Element(lvl));
        }
        num.children.push(XmlNode::Element(ovr));
    }

    let Some(lvl) = num
        .children
        .iter_mut()
        .filter_map(|n| match n {
            XmlNode::Element(e) if e.name == "w:lvlOverride" => Some(e),
            _ => None,
        })
        .find(|o| attr_i64(o, "w:ilvl") == Some(ilvl))
        .and_then(|o| o.child_mut("w:lvl"))
    else {
        return false;
    };

    apply(lvl.ensure_child("w:rPr"));
    true
}

fn set_override_run_props(
    rpr: &mut Element,
    east_asia_font: &str,
    latin_font: &str,
    half_points: u32,
    bold: bool,
) {
    let fonts = rpr.ensure_child_first("w:rFonts");
    fonts.set_attr("w:ascii", latin_font);
    fonts.set_attr("w:hAnsi", latin_font);
    fonts.set_attr("w:cs", latin_font);
    fonts.set_attr("w:eastAsia", east_asia_font);
    let half = half_points.to_string();
    rpr.ensure_child("w:sz").set_attr("w:val", &half);
    rpr.ensure_child("w:szCs").set_attr("w:val", &half);
    if bold {
        rpr.ensure_child("w:b").attrs.clear();
    } else {
        rpr.remove_children("w:b");
        rpr.remove_children("w:bCs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::document::para_content;
    use crate::docx::xml::parse_xml_part;

    fn numbering_part() -> XmlPart {
        parse_xml_part(
            "numbering.xml",
            r#"<w:numbering xmlns:w="urn:w">
              <w:abstractNum w:abstractNumId="0">
                <w:lvl w:ilvl="0">
                  <w:lvlText w:val="表5.6.1-%1 "/>
                  <w:rPr><w:rFonts w:eastAsia="仿宋"/></w:rPr>
                </w:lvl>
                <w:lvl w:ilvl="1"><w:lvlText w:val="%1.%2"/></w:lvl>
              </w:abstractNum>
              <w:num w:numId="5"><w:abstractNumId w:val="0"/></w:num>
              <w:num w:numId="6"><w:abstractNumId w:val="0"/>
                <w:lvlOverride w:ilvl="0">
                  <w:lvl w:ilvl="0"><w:lvlText w:val="图2-%1 "/>
                    <w:rPr/></w:lvl>
                </w:lvlOverride>
              </w:num>
            </w:numbering>"#
                .as_bytes(),
        )
        .expect("parse numbering")
    }

    fn para(xml: &str) -> Element {
        parse_xml_part("p.xml", xml.as_bytes()).expect("parse").root
    }

    #[test]
    fn prefix_from_abstract_level() {
        let num = numbering_part();
        let p = para(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="5"/></w:numPr></w:pPr></w:p>"#,
        );
        assert_eq!(numbering_prefix(&p, Some(&num)), "表5.6.1-");
    }

    #[test]
    fn override_wins_over_abstract() {
        let num = numbering_part();
        assert_eq!(prefix_for(Some(&num), 6, 0), "图2-");
    }

    #[test]
    fn missing_reference_resolves_empty() {
        let num = numbering_part();
        let p = para(r#"<w:p><w:r><w:t>正文</w:t></w:r></w:p>"#);
        assert_eq!(numbering_prefix(&p, Some(&num)), "");
        assert_eq!(prefix_for(Some(&num), 99, 0), "");
        assert_eq!(prefix_for(None, 5, 0), "");
    }

    #[test]
    fn level_without_placeholder_keeps_literal_text() {
        let part = parse_xml_part(
            "numbering.xml",
            r#"<w:numbering xmlns:w="urn:w">
              <w:abstractNum w:abstractNumId="0">
                <w:lvl w:ilvl="0"><w:lvlText w:val="表 "/></w:lvl>
              </w:abstractNum>
              <w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
            </w:numbering>"#
                .as_bytes(),
        )
        .expect("parse");
        assert_eq!(prefix_for(Some(&part), 1, 0), "表");
    }

    #[test]
    fn field_code_fallback_strips_instructions() {
        let p = para(
            r#"<w:p><w:r><w:t xml:space="preserve">表 </w:t></w:r>
               <w:r><w:instrText xml:space="preserve"> STYLEREF 1 \s </w:instrText></w:r>
               <w:r><w:t>5</w:t></w:r>
               <w:r><w:instrText xml:space="preserve"> SEQ 表 \* ARABIC \s 1 </w:instrText></w:r>
               <w:r><w:t xml:space="preserve">-1 工程特性表</w:t></w:r></w:p>"#,
        );
        let content = para_content(&p);
        let text = resolved_text(&p, &content, None);
        assert_eq!(text, "表 5 1 -1 工程特性表");
        assert!(text.starts_with('表'));
    }

    #[test]
    fn resolved_text_prefers_numbering_prefix() {
        let num = numbering_part();
        let p = para(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="5"/></w:numPr></w:pPr>
               <w:r><w:t>1 工程特性表</w:t></w:r></w:p>"#,
        );
        let content = para_content(&p);
        assert_eq!(
            resolved_text(&p, &content, Some(&num)),
            "表5.6.1-1 工程特性表"
        );
    }

    #[test]
    fn sync_materializes_override_from_abstract() {
        let mut num = numbering_part();
        assert!(sync_level_override(&mut num, 5, 0, "黑体", "Times New Roman", 32, true));

        let five = num
            .root
            .children_named("w:num")
            .find(|n| n.attr("w:numId") == Some("5"))
            .expect("num 5");
        let lvl = five
            .children_named("w:lvlOverride")
            .next()
            .and_then(|o| o.child("w:lvl"))
            .expect("override level");
        // Cloned template keeps the abstract lvlText.
        assert_eq!(
            lvl.child("w:lvlText").and_then(|t| t.attr("w:val")),
            Some("表5.6.1-%1 ")
        );
        let rpr = lvl.child("w:rPr").expect("rPr");
        let fonts = rpr.child("w:rFonts").expect("rFonts");
        assert_eq!(fonts.attr("w:eastAsia"), Some("黑体"));
        assert_eq!(fonts.attr("w:ascii"), Some("Times New Roman"));
        assert_eq!(rpr.child("w:sz").and_then(|s| s.attr("w:val")), Some("32"));
        assert!(rpr.child("w:b").is_some());

        // The sibling instance sharing the abstract definition is untouched.
        let six = num
            .root
            .children_named("w:num")
            .find(|n| n.attr("w:numId") == Some("6"))
            .expect("num 6");
        let six_lvl = six
            .children_named("w:lvlOverride")
            .next()
            .and_then(|o| o.child("w:lvl"))
            .expect("level");
        assert!(six_lvl.child("w:rPr").expect("rPr").child("w:sz").is_none());
        let abstract_lvl = resolve_level(&num, 5, 1).expect("abstract level 1");
        assert!(abstract_lvl.child("w:rPr").is_none());
    }

    #[test]
    fn sync_skips_levels_without_run_props() {
        let mut num = numbering_part();
        // ilvl 1 has no w:rPr, nothing to synchronize.
        assert!(!sync_level_override(&mut num, 5, 1, "黑体", "Times New Roman", 32, false));
        let five = num
            .root
            .children_named("w:num")
            .find(|n| n.attr("w:numId") == Some("5"))
            .expect("num 5");
        assert!(five.children_named("w:lvlOverride").next().is_none());
    }

    #[test]
    fn sync_updates_existing_override_in_place() {
        let mut num = numbering_part();
        assert!(sync_level_override(&mut num, 6, 0, "宋体", "Times New Roman", 21, false));
        let six = num
            .root
            .children_named("w:num")
            .find(|n| n.attr("w:numId") == Some("6"))
            .expect("num 6");
        assert_eq!(six.children_named("w:lvlOverride").count(), 1);
        let rpr = six
            .children_named("w:lvlOverride")
            .next()
            .and_then(|o| o.child("w:lvl"))
            .and_then(|l| l.child("w:rPr"))
            .expect("rPr");
        assert_eq!(rpr.child("w:sz").and_then(|s| s.attr("w:val")), Some("21"));
        assert!(rpr.child("w:b").is_none());
    }
}
