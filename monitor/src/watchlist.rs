//! Watch-list document: one instrument of interest per paragraph.
//!
//! Paragraphs are separated by line breaks; blank lines and surrounding
//! whitespace are ignored. An entry matches an instrument when the paragraph
//! contains either its code or its display name, so both `600000` and
//! `600000 浦发银行 (bank)` are usable entries.

use std::path::Path;

use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub text: String,
}

impl WatchEntry {
    pub fn matches(&self, identifier: &str, display_name: &str) -> bool {
        (!identifier.is_empty() && self.text.contains(identifier))
            || (!display_name.is_empty() && self.text.contains(display_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchList {
    entries: Vec<WatchEntry>,
}

impl WatchList {
    /// Reads the document once. A missing or unreadable file is fatal at startup.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::WatchList {
            path: path.to_path_buf(),
            source,
        })?;

        let list = Self::parse(&text);
        info!(path = %path.display(), entries = list.len(), "watch-list loaded");
        Ok(list)
    }

    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| WatchEntry { text: p.to_string() })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identifier: &str, display_name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.matches(identifier, display_name))
    }
}
