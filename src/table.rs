use crate::classify::{is_table_caption_text, Role};
use crate::config::StyleConfig;
use crate::docx::xml::Element;
use crate::mutate::{apply_cell_fonts, apply_spec};

/// Table pass for one cell paragraph: caption-shaped resolved text gets the
/// full `TableCaption` treatment, everything else only the body font split
/// (tables keep their original sizing).
pub fn format_cell_paragraph(p: &mut Element, resolved_text: &str, cfg: &StyleConfig) -> Role {
    if is_table_caption_text(resolved_text.trim_end()) {
        let role = Role::TableCaption;
        apply_spec(p, cfg.spec_for(role), role);
        role
    } else {
        apply_cell_fonts(p, &cfg.normal.font_name);
        Role::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_part;
    use crate::mutate::LATIN_FONT;

    fn para(xml: &str) -> Element {
        parse_xml_part("p.xml", xml.as_bytes()).expect("parse").root
    }

    #[test]
    fn caption_cell_gets_caption_spec() {
        let mut p = para(r#"<w:p><w:r><w:t>表2-1 工程特性表</w:t></w:r></w:p>"#);
        let cfg = StyleConfig::default();
        assert_eq!(format_cell_paragraph(&mut p, "表2-1 工程特性表", &cfg), Role::TableCaption);
        let rpr = p.child("w:r").unwrap().child("w:rPr").unwrap();
        let fonts = rpr.child("w:rFonts").unwrap();
        assert_eq!(fonts.attr("w:eastAsia"), Some(cfg.table_caption.font_name.as_str()));
        assert!(rpr.child("w:sz").is_some());
    }

    #[test]
    fn plain_cell_keeps_size_and_gets_body_font() {
        let mut p = para(
            r#"<w:p><w:r><w:rPr><w:sz w:val="16"/></w:rPr><w:t>4.27</w:t></w:r></w:p>"#,
        );
        let cfg = StyleConfig::default();
        assert_eq!(format_cell_paragraph(&mut p, "4.27", &cfg), Role::Normal);
        let rpr = p.child("w:r").unwrap().child("w:rPr").unwrap();
        assert_eq!(rpr.child("w:sz").and_then(|s| s.attr("w:val")), Some("16"));
        let fonts = rpr.child("w:rFonts").unwrap();
        assert_eq!(fonts.attr("w:eastAsia"), Some(cfg.normal.font_name.as_str()));
        assert_eq!(fonts.attr("w:ascii"), Some(LATIN_FONT));
    }
}
