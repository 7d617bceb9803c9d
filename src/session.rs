use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;

use crate::config::StyleConfig;
use crate::docx::document::LoadedDocument;
use crate::engine::{format_in_place, FormatOutcome};
use crate::error::SessionError;
use crate::progress::ProgressSink;
use crate::stats::{collect_stats, RoleStats};

static WORKING_SEQ: AtomicUsize = AtomicUsize::new(0);

/// One document open for reformatting. The original file is never written;
/// all mutation happens on a disposable working copy in the temp directory,
/// exported with `save_as` and deleted on drop.
#[derive(Debug)]
pub struct DocumentSession {
    original: PathBuf,
    working: Option<PathBuf>,
}

impl DocumentSession {
    /// Opens and validates the document. Fails without creating any files
    /// when the target is not a well-formed package with a main part.
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        LoadedDocument::load(path).map_err(SessionError::open)?;
        Ok(Self {
            original: path.to_path_buf(),
            working: None,
        })
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// The latest formatted copy, or the original before any run.
    pub fn current_path(&self) -> &Path {
        self.working.as_deref().unwrap_or(&self.original)
    }

    /// Runs the formatting pass on a fresh working copy of the original.
    /// Always restarts from the original, so repeated runs do not compound;
    /// on failure the broken copy is removed and the session falls back to
    /// the original.
    pub fn apply_styles(
        &mut self,
        cfg: &StyleConfig,
        sink: &dyn ProgressSink,
    ) -> Result<FormatOutcome, SessionError> {
        self.discard_working();

        let working = fresh_working_path();
        std::fs::copy(&self.original, &working)
            .with_context(|| format!("copy to working path: {}", working.display()))
            .map_err(SessionError::formatting)?;

        match format_in_place(&working, cfg, sink) {
            Ok(outcome) => {
                self.working = Some(working);
                Ok(outcome)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&working);
                Err(SessionError::formatting(e))
            }
        }
    }

    /// Exports the current document (formatted copy if a run succeeded) to
    /// `output`. A failed export leaves both source files intact.
    pub fn save_as(&self, output: &Path) -> Result<(), SessionError> {
        std::fs::copy(self.current_path(), output)
            .map(|_| ())
            .with_context(|| format!("export to: {}", output.display()))
            .map_err(SessionError::save)
    }

    /// Role counts over the current document.
    pub fn stats(&self) -> Result<RoleStats, SessionError> {
        let doc = LoadedDocument::load(self.current_path()).map_err(SessionError::open)?;
        Ok(collect_stats(&doc))
    }

    pub fn close(mut self) {
        self.discard_working();
    }

    fn discard_working(&mut self) {
        if let Some(w) = self.working.take() {
            let _ = std::fs::remove_file(w);
        }
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        self.discard_working();
    }
}

fn fresh_working_path() -> PathBuf {
    let seq = WORKING_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "docstyler-{}-{}.docx",
        std::process::id(),
        seq
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Role;
    use crate::progress::NullProgress;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_docx(path: &Path, document_xml: &str) {
        let f = std::fs::File::create(path).expect("create docx");
        let mut z = ZipWriter::new(f);
        let opts = SimpleFileOptions::default();
        z.start_file("[Content_Types].xml", opts).expect("ct");
        z.write_all(br#"<?xml version="1.0"?><Types/>"#).expect("ct");
        z.start_file("word/document.xml", opts).expect("doc");
        z.write_all(document_xml.as_bytes()).expect("doc");
        z.finish().expect("finish");
    }

    fn tmp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docstyler-test-{}-{name}", std::process::id()))
    }

    const SIMPLE_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>1 总论</w:t></w:r></w:p>
<w:p><w:r><w:t>这是正文内容。</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn original_bytes_never_change() {
        let input = tmp("orig.docx");
        write_docx(&input, SIMPLE_DOC);
        let before = std::fs::read(&input).expect("read before");

        let mut session = DocumentSession::open(&input).expect("open");
        session
            .apply_styles(&StyleConfig::default(), &NullProgress)
            .expect("apply");
        assert_ne!(session.current_path(), input.as_path());

        let after = std::fs::read(&input).expect("read after");
        assert_eq!(before, after);
        session.close();
        let _ = std::fs::remove_file(&input);
    }

    #[test]
    fn formatting_is_idempotent_from_the_original() {
        let input = tmp("idem.docx");
        write_docx(&input, SIMPLE_DOC);

        let mut session = DocumentSession::open(&input).expect("open");
        session
            .apply_styles(&StyleConfig::default(), &NullProgress)
            .expect("first run");
        let first = std::fs::read(session.current_path()).expect("read first");
        session
            .apply_styles(&StyleConfig::default(), &NullProgress)
            .expect("second run");
        let second = std::fs::read(session.current_path()).expect("read second");
        assert_eq!(first, second);
        session.close();
        let _ = std::fs::remove_file(&input);
    }

    #[test]
    fn save_as_exports_the_formatted_copy() {
        let input = tmp("export-in.docx");
        let output = tmp("export-out.docx");
        write_docx(&input, SIMPLE_DOC);

        let mut session = DocumentSession::open(&input).expect("open");
        session
            .apply_styles(&StyleConfig::default(), &NullProgress)
            .expect("apply");
        session.save_as(&output).expect("save");
        let exported = std::fs::read(&output).expect("read output");
        let working = std::fs::read(session.current_path()).expect("read working");
        assert_eq!(exported, working);
        session.close();
        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn open_rejects_non_docx_input() {
        let input = tmp("bogus.docx");
        std::fs::write(&input, b"not a zip at all").expect("write");
        let err = DocumentSession::open(&input).expect_err("must fail");
        assert!(matches!(err, SessionError::Open { .. }));
        let _ = std::fs::remove_file(&input);
    }

    #[test]
    fn stats_reflect_classification() {
        let input = tmp("stats.docx");
        write_docx(&input, SIMPLE_DOC);
        let session = DocumentSession::open(&input).expect("open");
        let stats = session.stats().expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.get(Role::Heading1), 1);
        assert_eq!(stats.get(Role::Normal), 1);
        session.close();
        let _ = std::fs::remove_file(&input);
    }
}
