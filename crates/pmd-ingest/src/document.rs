//! Feed documents and their attachments
//!
//! A [`FeedDocument`] is one feed to reconcile: an identifier, a name used to
//! correlate progress logs, the raw attachments, and the records staged by
//! the last successful prepare.

use base64::Engine;
use pmd_common::{PmdError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::PendingRecord;

/// Anything carrying a filename that type detection can look at
pub trait Named {
    fn filename(&self) -> &str;
}

impl Named for PathBuf {
    fn filename(&self) -> &str {
        self.file_name().and_then(|name| name.to_str()).unwrap_or_default()
    }
}

/// One input file of a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Build an attachment from a base64 payload
    pub fn from_base64(filename: impl Into<String>, encoded: &str) -> Result<Self> {
        let filename = filename.into();
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| PmdError::Decode(format!("{}: {}", filename, e)))?;
        Ok(Self { filename, data })
    }

    /// Read an attachment from disk, named after the file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PmdError::Decode(format!("unusable filename: {}", path.display())))?;
        Ok(Self::from_bytes(filename, data))
    }

    fn text(&self) -> Result<&str> {
        let text = std::str::from_utf8(&self.data)
            .map_err(|e| PmdError::Decode(format!("{}: {}", self.filename, e)))?;
        Ok(text.trim_start_matches('\u{feff}'))
    }
}

impl Named for Attachment {
    fn filename(&self) -> &str {
        &self.filename
    }
}

/// A feed awaiting reconciliation
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub id: Uuid,
    /// Correlates progress logs; carries no other meaning
    pub name: String,
    pub inputs: Vec<Attachment>,
    /// Records staged by the last successful prepare
    pub products: Vec<PendingRecord>,
}

impl FeedDocument {
    pub fn new(name: impl Into<String>, inputs: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            inputs,
            products: Vec::new(),
        }
    }

    /// Every non-blank line of every attachment, in order
    ///
    /// Single pass: a caller wanting the lines again must call `lines()`
    /// again, which re-reads the attachments from the start.
    pub fn lines(&self) -> FeedLines<'_> {
        FeedLines {
            inputs: self.inputs.iter(),
            current: None,
        }
    }

    /// Whether staged product records are present
    pub fn uses_products(&self) -> bool {
        !self.products.is_empty()
    }

    /// Staged records linked to an existing entity
    pub fn pending_updates(&self) -> impl Iterator<Item = &PendingRecord> {
        self.products.iter().filter(|record| record.is_update())
    }

    /// Staged records with no entity yet
    pub fn pending_creates(&self) -> impl Iterator<Item = &PendingRecord> {
        self.products.iter().filter(|record| !record.is_update())
    }
}

/// Iterator returned by [`FeedDocument::lines`]
#[derive(Debug)]
pub struct FeedLines<'a> {
    inputs: std::slice::Iter<'a, Attachment>,
    current: Option<std::str::Lines<'a>>,
}

impl Iterator for FeedLines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(lines) = self.current.as_mut() {
                if let Some(line) = lines.find(|line| !line.trim().is_empty()) {
                    return Some(Ok(line.to_string()));
                }
            }

            let attachment = self.inputs.next()?;
            match attachment.text() {
                Ok(text) => self.current = Some(text.lines()),
                Err(e) => {
                    self.current = None;
                    return Some(Err(e));
                },
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentSummary<'a> {
    id: Uuid,
    name: &'a str,
    inputs: Vec<&'a str>,
    staged: usize,
}

impl FeedDocument {
    /// JSON summary for logging
    pub fn summary(&self) -> serde_json::Value {
        let summary = DocumentSummary {
            id: self.id,
            name: &self.name,
            inputs: self.inputs.iter().map(|a| a.filename.as_str()).collect(),
            staged: self.products.len(),
        };
        serde_json::to_value(summary).unwrap_or_default()
    }
}
