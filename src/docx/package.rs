use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// An opened .docx package with every zip entry held in memory.
///
/// Entries keep their compression method, timestamps and permissions so a
/// rewrite only differs where parts were explicitly replaced.
pub struct DocxPackage {
    entries: Vec<DocxEntry>,
    replacements: HashMap<String, Vec<u8>>,
}

struct DocxEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    last_modified: zip::DateTime,
    unix_mode: Option<u32>,
    is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        let mut zip = ZipArchive::new(f).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self {
            entries,
            replacements: HashMap::new(),
        })
    }

    /// Current bytes of a part, replacement included if one is staged.
    pub fn part_bytes(&self, name: &str) -> Option<&[u8]> {
        if let Some(data) = self.replacements.get(name) {
            return Some(data.as_slice());
        }
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Stages new bytes for a part; applied on the next `write_to`.
    pub fn replace_part(&mut self, name: &str, data: Vec<u8>) {
        self.replacements.insert(name.to_string(), data);
    }

    pub fn write_to(&self, output_path: &Path) -> anyhow::Result<()> {
        let f = File::create(output_path)
            .with_context(|| format!("create output docx: {}", output_path.display()))?;
        let mut zout = ZipWriter::new(f);
        for ent in &self.entries {
            let data = self
                .replacements
                .get(&ent.name)
                .map(|d| d.as_slice())
                .unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(&ent.name, opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(&ent.name, opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        zout.finish().context("finish zip")?;
        Ok(())
    }

    pub fn xml_part_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir && e.name.to_lowercase().ends_with(".xml"))
            .map(|e| e.name.clone())
            .collect()
    }
}
