//! Evolving context memory with a trailing window.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::record::IterationRecord;
use crate::error::{Result, SceneloopError};

/// Append-only log of iteration records plus a fixed-size trailing window.
///
/// Sequence policy: a record is accepted only if its `sequence_number` equals
/// the number of records already stored, so a run's numbering is gap-free and
/// starts at 0.
#[derive(Debug, Clone, Serialize)]
pub struct ContextMemory {
    records: Vec<IterationRecord>,
    window_size: usize,
    static_context: BTreeMap<String, String>,
}

impl ContextMemory {
    /// Create an empty memory. A zero window is a configuration error.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(SceneloopError::Config("memory window size must be > 0".to_string()));
        }
        Ok(Self {
            records: Vec::new(),
            window_size,
            static_context: BTreeMap::new(),
        })
    }

    /// Attach a task-level fact before the run starts.
    pub fn with_static_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_context.insert(key.into(), value.into());
        self
    }

    pub fn static_context(&self) -> &BTreeMap<String, String> {
        &self.static_context
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Full history, oldest first.
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    /// Append a completed record.
    pub fn append(&mut self, record: IterationRecord) -> Result<()> {
        let expected = self.records.len() as u32;
        if record.sequence_number != expected {
            return Err(SceneloopError::InvalidRecord {
                expected,
                actual: record.sequence_number,
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// The last `min(window_size, len)` records in insertion order.
    pub fn window(&self) -> &[IterationRecord] {
        let start = self.records.len().saturating_sub(self.window_size);
        &self.records[start..]
    }

    /// Most recent non-empty code artifact anywhere in the history, or `""`.
    pub fn latest_code(&self) -> &str {
        self.records.iter().rev().find_map(|r| r.code()).unwrap_or("")
    }

    /// Render the window as a prompt block, oldest to newest.
    pub fn render_prompt_block(&self) -> String {
        let mut prompt = String::from("### Interaction History (Recent)\n\n");
        for record in self.window() {
            prompt.push_str(&record.to_prompt_block());
            prompt.push_str("\n\n");
        }
        prompt
    }

    /// Write the full history as JSON lines, one record per line.
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for record in &self.records {
            writeln!(writer, "{}", serde_json::to_string(record)?)?;
        }
        writer.flush()?;
        Ok(())
    }
}
