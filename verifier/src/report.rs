//! Run report export
//!
//! Writes one JSON document per run so CI can archive what the verifier
//! measured alongside the exit code.

use crate::types::CaptureReport;
use anyhow::{Context, Result};
use std::{fs::File, io::Write, path::PathBuf};

/// JSON report writer
pub struct JsonReportWriter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonReportWriter {
    /// Create a new report writer
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }

    /// Write the report to the output file.
    pub fn write(&self, report: &CaptureReport) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create report file: {:?}", self.output_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write report file: {:?}", self.output_path))?;

        Ok(())
    }
}
