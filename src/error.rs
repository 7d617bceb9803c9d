use thiserror::Error;

/// Failure taxonomy of the session surface. `Open` aborts before any working
/// copy exists; `Formatting` means the working copy was deleted and the
/// original is untouched; `Save` means only the export step failed and both
/// files remain intact.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot open document: {source}")]
    Open {
        #[source]
        source: anyhow::Error,
    },
    #[error("formatting failed (original untouched): {source}")]
    Formatting {
        #[source]
        source: anyhow::Error,
    },
    #[error("save failed (working copy intact): {source}")]
    Save {
        #[source]
        source: anyhow::Error,
    },
}

impl SessionError {
    pub fn open(source: anyhow::Error) -> Self {
        Self::Open { source }
    }

    pub fn formatting(source: anyhow::Error) -> Self {
        Self::Formatting { source }
    }

    pub fn save(source: anyhow::Error) -> Self {
        Self::Save { source }
    }
}
