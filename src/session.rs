//! File-backed stand-in for the client's cookie jar.
//!
//! The CLI has no browser to hold the `selected_country` cookie, so the
//! selection is written to a small JSON file between invocations.

use crate::country::CountrySelection;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// JSON file holding one persisted [`CountrySelection`].
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Creates a handle; nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored selection. A missing file means no selection.
    pub fn load(&self) -> Result<Option<CountrySelection>> {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;

        let selection = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;

        Ok(Some(selection))
    }

    /// Persists a selection, replacing any previous one.
    pub fn save(&self, selection: &CountrySelection) -> Result<()> {
        let json = serde_json::to_string_pretty(selection)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;

        debug!("Saved {} to {}", selection.country, self.path.display());
        Ok(())
    }

    /// Removes the stored selection.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove session file: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}
