use crate::classify::Role;
use crate::config::FormatSpec;
use crate::docx::xml::{Element, XmlNode};

/// Fixed face for Latin/high-ANSI/complex scripts; the configured role font
/// only drives the East-Asian script slot.
pub const LATIN_FONT: &str = "Times New Roman";

/// 1pt = 20 twips, truncated toward zero.
pub fn points_to_twips(points: f64) -> i64 {
    (points * 20.0) as i64
}

/// 1pt = 2 half-points, rounded.
pub fn points_to_half_points(points: f64) -> u32 {
    (points * 2.0).round() as u32
}

/// Applies a role's formatting to one paragraph, in place. Image paragraphs
/// are never restyled. Mutation is strictly paragraph-local: style
/// definitions are never written through, so siblings sharing the paragraph's
/// named style are unaffected.
pub fn apply_spec(p: &mut Element, spec: &FormatSpec, role: Role) {
    if role == Role::Image {
        return;
    }

    let ppr = p.ensure_child_first("w:pPr");
    let spacing = ppr.ensure_child("w:spacing");
    spacing.set_attr("w:before", &points_to_twips(spec.space_before).to_string());
    spacing.set_attr("w:after", &points_to_twips(spec.space_after).to_string());
    if spec.line_spacing > 0.0 {
        spacing.set_attr("w:line", &points_to_twips(spec.line_spacing).to_string());
        spacing.set_attr("w:lineRule", "exact");
    }

    if let Some(level) = role.heading_outline() {
        ppr.ensure_child("w:outlineLvl")
            .set_attr("w:val", &level.to_string());
    } else if role.is_caption() {
        ppr.ensure_child("w:outlineLvl")
            .set_attr("w:val", &spec.outline_level.to_string());
    }

    style_runs_in(p, spec);
}

/// Body-font pass for table cells that are not captions: fonts only, size
/// and everything else untouched.
pub fn apply_cell_fonts(p: &mut Element, east_asia_font: &str) {
    fn walk(e: &mut Element, east_asia_font: &str) {
        for node in &mut e.children {
            let XmlNode::Element(child) = node else {
                continue;
            };
            match child.name.as_str() {
                "w:pPr" => {}
                "w:r" => {
                    set_run_fonts(child, east_asia_font);
                }
                _ => walk(child, east_asia_font),
            }
        }
    }
    walk(p, east_asia_font);
}

fn style_runs_in(p: &mut Element, spec: &FormatSpec) {
    fn walk(e: &mut Element, spec: &FormatSpec) {
        for node in &mut e.children {
            let XmlNode::Element(child) = node else {
                continue;
            };
            match child.name.as_str() {
                // Paragraph-mark run properties under w:pPr stay as they are.
                "w:pPr" => {}
                "w:r" => style_run(child, spec),
                _ => walk(child, spec),
            }
        }
    }
    walk(p, spec);
}

fn style_run(run: &mut Element, spec: &FormatSpec) {
    set_run_fonts(run, &spec.font_name);

    let rpr = run.ensure_child_first("w:rPr");
    let half = points_to_half_points(spec.font_size).to_string();
    rpr.ensure_child("w:sz").set_attr("w:val", &half);
    rpr.ensure_child("w:szCs").set_attr("w:val", &half);

    if spec.bold {
        // A bare w:b; any explicit w:val="0" from the source is dropped.
        rpr.ensure_child("w:b").attrs.clear();
        rpr.ensure_child("w:bCs").attrs.clear();
    } else {
        rpr.remove_children("w:b");
        rpr.remove_children("w:bCs");
    }

    // Formatting is normalized, not merged: underline never survives.
    rpr.remove_children("w:u");
}

fn set_run_fonts(run: &mut Element, east_asia_font: &str) {
    let rpr = run.ensure_child_first("w:rPr");
    let fonts = rpr.ensure_child_first("w:rFonts");
    fonts.set_attr("w:ascii", LATIN_FONT);
    fonts.set_attr("w:hAnsi", LATIN_FONT);
    fonts.set_attr("w:cs", LATIN_FONT);
    fonts.set_attr("w:eastAsia", east_asia_font);
}
