//! Renderable handles for assembled documents.
//!
//! A [`PreviewHandle`] owns a temporary `.html` file holding one document and
//! removes it when released or dropped. A [`PreviewSlot`] is the surface that
//! shows at most one preview at a time: publishing a new document releases
//! the one it supersedes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::assemble::AssembledDocument;
use crate::error::{PreviewError, PreviewResult};

/// Sandbox flags for the viewer: scripts run, top-level navigation is denied.
pub const IFRAME_SANDBOX: &str = "allow-scripts";

/// A live preview backed by a temporary file.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    path: TempPath,
}

impl PreviewHandle {
    /// Write `doc` to a fresh file in the system temp directory.
    pub fn create(doc: &AssembledDocument) -> PreviewResult<Self> {
        Self::create_in(&std::env::temp_dir(), doc)
    }

    pub fn create_in(dir: &Path, doc: &AssembledDocument) -> PreviewResult<Self> {
        let id = Uuid::new_v4();
        let mut file = tempfile::Builder::new()
            .prefix(&format!("codeweave-{id}-"))
            .suffix(".html")
            .tempfile_in(dir)
            .map_err(PreviewError::Write)?;
        file.write_all(doc.html.as_bytes())
            .and_then(|()| file.flush())
            .map_err(PreviewError::Write)?;
        let path = file.into_temp_path();
        debug!(preview_id = %id, path = %path.display(), bytes = doc.html.len(), "preview created");
        Ok(Self { id, path })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` URL a viewer can load.
    pub fn url(&self) -> String {
        let path: PathBuf = self.path.to_path_buf();
        format!("file://{}", path.display())
    }

    /// Sandboxed `<iframe>` markup pointing at this preview.
    pub fn iframe(&self) -> String {
        format!(
            "<iframe src=\"{}\" sandbox=\"{IFRAME_SANDBOX}\" title=\"preview {}\"></iframe>",
            escape_attr(&self.url()),
            self.id
        )
    }

    /// Delete the backing file now, reporting failure instead of ignoring it.
    pub fn release(self) -> PreviewResult<()> {
        let id = self.id;
        self.path
            .close()
            .map_err(|source| PreviewError::Release { id, source })?;
        debug!(preview_id = %id, "preview released");
        Ok(())
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Holds the one preview a surface is currently showing.
#[derive(Debug, Default)]
pub struct PreviewSlot {
    current: Option<PreviewHandle>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&PreviewHandle> {
        self.current.as_ref()
    }

    /// Show `doc`, releasing whatever was shown before.
    pub fn publish(&mut self, doc: &AssembledDocument) -> PreviewResult<&PreviewHandle> {
        self.publish_in(&std::env::temp_dir(), doc)
    }

    pub fn publish_in(&mut self, dir: &Path, doc: &AssembledDocument) -> PreviewResult<&PreviewHandle> {
        let fresh = PreviewHandle::create_in(dir, doc)?;
        if let Some(old) = self.current.take() {
            // A leaked file is not worth failing the new preview over.
            if let Err(e) = old.release() {
                warn!(error = %e, "superseded preview was not released");
            }
        }
        Ok(self.current.insert(fresh))
    }

    /// Tear down: release the current preview, if any.
    pub fn clear(&mut self) -> PreviewResult<()> {
        match self.current.take() {
            Some(handle) => handle.release(),
            None => Ok(()),
        }
    }
}
