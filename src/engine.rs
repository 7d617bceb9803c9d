use std::path::Path;

use anyhow::Context;

use crate::classify::{classify, Role};
use crate::config::StyleConfig;
use crate::docx::document::{
    for_each_paragraph, for_each_paragraph_mut, para_content, paragraph_num_ref,
    paragraph_style_id, Container, LoadedDocument,
};
use crate::mutate::{apply_spec, points_to_half_points, LATIN_FONT};
use crate::numbering::{resolved_text, sync_level_override};
use crate::progress::ProgressSink;
use crate::segment::count_skip;
use crate::table::format_cell_paragraph;

#[derive(Clone, Copy, Debug, Default)]
pub struct FormatOutcome {
    pub total: usize,
    pub formatted: usize,
    pub skipped: usize,
    pub overrides_synced: usize,
}

/// Runs the whole formatting pass over the document at `path` (the working
/// copy) and rewrites it in place: skip offset, per-paragraph classification
/// and mutation, table pass, numbering override sync.
pub fn format_in_place(
    path: &Path,
    cfg: &StyleConfig,
    sink: &dyn ProgressSink,
) -> anyhow::Result<FormatOutcome> {
    let mut doc = LoadedDocument::load(path)?;

    let skip_index = count_skip(doc.body(), cfg.pages_to_skip);
    if skip_index > 0 {
        sink.log(&format!(
            "skipping {skip_index} front-matter paragraphs ({} pages)",
            cfg.pages_to_skip
        ));
    } else if cfg.pages_to_skip > 0 {
        sink.log("fewer page breaks than requested, skipping nothing");
    }

    let mut total = 0usize;
    for_each_paragraph(doc.body(), &mut |_, _| total += 1);

    let mut outcome = FormatOutcome {
        total,
        skipped: skip_index,
        ..Default::default()
    };

    {
        let LoadedDocument {
            ref mut document,
            ref mut numbering,
            ref styles,
            ..
        } = doc;
        let body = document
            .root
            .child_mut("w:body")
            .context("w:body disappeared")?;

        let mut index = 0usize;
        for_each_paragraph_mut(body, &mut |p, container| {
            let i = index;
            index += 1;
            if i < skip_index {
                return;
            }

            let content = para_content(p);
            let resolved = resolved_text(p, &content, numbering.as_ref());
            match container {
                Container::Body => {
                    let role = classify(p, &content, &resolved, styles);
                    let spec = cfg.spec_for(role);
                    apply_spec(p, spec, role);
                    if role != Role::Image {
                        // Numbering may come from the paragraph itself or be
                        // inherited from its referenced style.
                        let num_ref = paragraph_num_ref(p).or_else(|| {
                            paragraph_style_id(p)
                                .and_then(|id| styles.get(id))
                                .and_then(|s| s.num_id.map(|n| (n, s.num_ilvl.unwrap_or(0))))
                        });
                        if let (Some(np), Some((num_id, ilvl))) = (numbering.as_mut(), num_ref) {
                            if sync_level_override(
                                np,
                                num_id,
                                ilvl,
                                &spec.font_name,
                                LATIN_FONT,
                                points_to_half_points(spec.font_size),
                                spec.bold,
                            ) {
                                outcome.overrides_synced += 1;
                            }
                        }
                    }
                }
                Container::TableCell => {
                    format_cell_paragraph(p, &resolved, cfg);
                }
            }
            outcome.formatted += 1;

            if (i + 1) % 10 == 0 && total > 0 {
                sink.progress(&format!("{}%", (i + 1) * 100 / total));
            }
        });
    }

    doc.save_to(path)
        .with_context(|| format!("rewrite working copy: {}", path.display()))?;
    sink.progress("100%");
    sink.log(&format!(
        "formatted {} of {} paragraphs ({} skipped, {} numbering overrides)",
        outcome.formatted, outcome.total, outcome.skipped, outcome.overrides_synced
    ));
    Ok(outcome)
}
