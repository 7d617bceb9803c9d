use crate::docx::document::for_each_paragraph;
use crate::docx::xml::{Element, XmlNode};

/// Counts the paragraphs making up the first `pages_to_skip` pages, walking
/// explicit page-break runs and new-page section breaks in document order.
/// Returns the index of the first paragraph of the retained region.
///
/// Conservative on undercount: when the document carries fewer explicit
/// breaks than requested (front matter relying on natural pagination), the
/// answer is 0 — skip nothing rather than guess.
pub fn count_skip(body: &Element, pages_to_skip: u32) -> usize {
    if pages_to_skip == 0 {
        return 0;
    }
    let mut breaks_seen = 0u32;
    let mut index = 0usize;
    let mut skip_until = None;
    for_each_paragraph(body, &mut |p, _| {
        if skip_until.is_none() {
            breaks_seen += breaks_in_paragraph(p);
            if breaks_seen >= pages_to_skip {
                skip_until = Some(index + 1);
            }
        }
        index += 1;
    });
    skip_until.unwrap_or(0)
}

fn breaks_in_paragraph(p: &Element) -> u32 {
    let mut count = count_page_break_runs(p);
    if let Some(sect) = p.child("w:pPr").and_then(|ppr| ppr.child("w:sectPr")) {
        // A section break starts a new page unless explicitly continuous.
        let sect_type = sect
            .child("w:type")
            .and_then(|t| t.attr("w:val"))
            .unwrap_or("nextPage");
        if sect_type != "continuous" {
            count += 1;
        }
    }
    count
}

fn count_page_break_runs(e: &Element) -> u32 {
    let mut count = 0;
    for node in &e.children {
        let XmlNode::Element(child) = node else {
            continue;
        };
        if child.name == "w:br" && child.attr("w:type") == Some("page") {
            count += 1;
        } else if child.name != "w:pPr" {
            count += count_page_break_runs(child);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::xml::parse_xml_part;

    fn body(xml: &str) -> Element {
        parse_xml_part("b.xml", xml.as_bytes()).expect("parse").root
    }

    #[test]
    fn zero_pages_skips_nothing() {
        let b = body(r#"<w:body><w:p/><w:p/></w:body>"#);
        assert_eq!(count_skip(&b, 0), 0);
    }

    #[test]
    fn skip_stops_after_requested_breaks() {
        let b = body(
            r#"<w:body>
                 <w:p><w:r><w:t>封面</w:t></w:r></w:p>
                 <w:p><w:r><w:br w:type="page"/></w:r></w:p>
                 <w:p><w:r><w:t>目录</w:t></w:r></w:p>
                 <w:p><w:r><w:br w:type="page"/></w:r></w:p>
                 <w:p><w:r><w:t>1 概述</w:t></w:r></w:p>
               </w:body>"#,
        );
        assert_eq!(count_skip(&b, 1), 2);
        assert_eq!(count_skip(&b, 2), 4);
    }

    #[test]
    fn undercount_returns_zero() {
        let b = body(
            r#"<w:body>
                 <w:p><w:r><w:br w:type="page"/></w:r></w:p>
                 <w:p><w:r><w:t>正文</w:t></w:r></w:p>
               </w:body>"#,
        );
        assert_eq!(count_skip(&b, 2), 0);
    }

    #[test]
    fn section_break_counts_unless_continuous() {
        let b = body(
            r#"<w:body>
                 <w:p><w:pPr><w:sectPr><w:type w:val="continuous"/></w:sectPr></w:pPr></w:p>
                 <w:p><w:pPr><w:sectPr/></w:pPr></w:p>
                 <w:p><w:r><w:t>正文</w:t></w:r></w:p>
               </w:body>"#,
        );
        assert_eq!(count_skip(&b, 1), 2);
    }

    #[test]
    fn text_wrapping_breaks_do_not_count() {
        let b = body(
            r#"<w:body>
                 <w:p><w:r><w:br/></w:r><w:r><w:br w:type="textWrapping"/></w:r></w:p>
                 <w:p/>
               </w:body>"#,
        );
        assert_eq!(count_skip(&b, 1), 0);
    }
}
