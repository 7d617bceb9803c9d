use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::classify::Role;

/// Target formatting for one role. Sizes/spacings are in points; the engine
/// converts to OOXML half-points and twips at mutation time.
///
/// Field names serialize PascalCase to stay compatible with the config.json
/// shape the original Windows tool wrote.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FormatSpec {
    pub font_name: String,
    pub font_size: f64,
    pub space_before: f64,
    pub space_after: f64,
    /// Exact line spacing; 0 leaves the paragraph's line spacing untouched.
    pub line_spacing: f64,
    /// 0–9, where 9 is OOXML's "body text" (no outline) level. Only caption
    /// roles honor this; heading roles always write their own 0–3.
    pub outline_level: u8,
    pub bold: bool,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            font_name: "宋体".to_string(),
            font_size: 10.5,
            space_before: 0.0,
            space_after: 0.0,
            line_spacing: 0.0,
            outline_level: 9,
            bold: false,
        }
    }
}

impl FormatSpec {
    fn new(
        font_name: &str,
        font_size: f64,
        space_before: f64,
        space_after: f64,
        line_spacing: f64,
        outline_level: u8,
    ) -> Self {
        Self {
            font_name: font_name.to_string(),
            font_size,
            space_before,
            space_after,
            line_spacing,
            outline_level,
            bold: false,
        }
    }
}

/// One `FormatSpec` per role plus the front-matter skip, loaded from
/// config.json. Immutable during a formatting run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StyleConfig {
    pub heading1: FormatSpec,
    pub heading2: FormatSpec,
    pub heading3: FormatSpec,
    pub heading4: FormatSpec,
    pub normal: FormatSpec,
    pub table_caption: FormatSpec,
    pub image_caption: FormatSpec,
    pub pages_to_skip: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            heading1: FormatSpec::new("黑体", 16.0, 16.0, 8.0, 20.0, 9),
            heading2: FormatSpec::new("楷体", 14.0, 12.0, 6.0, 18.0, 9),
            heading3: FormatSpec::new("宋体", 13.0, 10.0, 4.0, 16.0, 9),
            heading4: FormatSpec::new("宋体", 12.0, 8.0, 3.0, 15.0, 9),
            normal: FormatSpec::new("宋体", 10.5, 0.0, 0.0, 15.0, 9),
            table_caption: FormatSpec::new("黑体", 10.5, 0.0, 0.0, 15.0, 8),
            image_caption: FormatSpec::new("黑体", 10.5, 0.0, 0.0, 15.0, 6),
            pages_to_skip: 0,
        }
    }
}

impl StyleConfig {
    /// Role → spec lookup; anything without a spec of its own resolves to
    /// the `Normal` spec.
    pub fn spec_for(&self, role: Role) -> &FormatSpec {
        match role {
            Role::Heading1 => &self.heading1,
            Role::Heading2 => &self.heading2,
            Role::Heading3 => &self.heading3,
            Role::Heading4 => &self.heading4,
            Role::TableCaption => &self.table_caption,
            Role::ImageCaption => &self.image_caption,
            Role::Normal | Role::Image => &self.normal,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: StyleConfig = serde_json::from_str(&text).context("parse config json")?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, json).with_context(|| format!("write config: {}", path.display()))?;
        Ok(())
    }
}

pub const CONFIG_FILENAME: &str = "config.json";

/// `config.json` next to the input document, if present.
pub fn find_config_near(input: &Path) -> Option<PathBuf> {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let candidate = dir.join(CONFIG_FILENAME);
    candidate.is_file().then_some(candidate)
}

/// Writes a default config.json into `dir`; refuses to overwrite unless
/// `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() && !force {
        anyhow::bail!("config already exists: {} (use --force)", path.display());
    }
    StyleConfig::default().save(&path)?;
    Ok(path)
}
