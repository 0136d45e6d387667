//! JSON export of the current dashboard state.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::view_model::{FilteredView, VersionCount, ViewModel};

/// Document written by `--export` and the in-app export key.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub summary: ExportSummary,
    pub version_counts: &'a [VersionCount],
    pub nodes: FilteredView<'a>,
}

/// Headline numbers for an export.
#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub total_nodes: usize,
    pub bootstrapping: usize,
    pub other: usize,
    pub skipped_records: usize,
    pub max_block_count: u64,
    pub max_cemented_count: u64,
}

impl<'a> ExportDocument<'a> {
    pub fn new(view_model: &'a ViewModel, version: Option<&str>, skipped_records: usize) -> Self {
        let nodes = view_model.filter_by_version(version);
        Self {
            summary: ExportSummary {
                total_nodes: view_model.node_count(),
                bootstrapping: nodes.bootstrapping_count(),
                other: nodes.other_count(),
                skipped_records,
                max_block_count: view_model.max_block_count,
                max_cemented_count: view_model.max_cemented_count,
            },
            version_counts: &view_model.version_counts,
            nodes,
        }
    }

    /// Write the document as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
