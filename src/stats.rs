use std::collections::BTreeMap;

use crate::classify::{classify, Role};
use crate::docx::document::{for_each_paragraph, para_content, LoadedDocument};
use crate::numbering::resolved_text;

/// Paragraph counts per classified role, shown after a run and by `--stats`.
#[derive(Clone, Debug, Default)]
pub struct RoleStats {
    counts: BTreeMap<Role, usize>,
    pub total: usize,
}

impl RoleStats {
    pub fn get(&self, role: Role) -> usize {
        self.counts.get(&role).copied().unwrap_or(0)
    }

    pub fn lines(&self) -> Vec<String> {
        Role::ALL
            .iter()
            .map(|r| format!("{r}: {}", self.get(*r)))
            .collect()
    }
}

pub fn collect_stats(doc: &LoadedDocument) -> RoleStats {
    let mut stats = RoleStats::default();
    let numbering = doc.numbering.as_ref();
    let styles = &doc.styles;
    for_each_paragraph(doc.body(), &mut |p, _| {
        let content = para_content(p);
        let text = resolved_text(p, &content, numbering);
        let role = classify(p, &content, &text, styles);
        *stats.counts.entry(role).or_insert(0) += 1;
        stats.total += 1;
    });
    stats
}
