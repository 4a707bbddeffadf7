//! Text or JSON rendering of command reports
//!
//! Handlers build a report value and hand it to [`OutputWriter`]; none of
//! them write to stdout directly.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Human-readable form of a report. JSON output uses `Serialize` instead.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Prints reports in the format chosen with `--output`.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print a report to stdout.
    pub fn render<T: Render + Serialize>(&self, report: &T) -> Result<(), CliError> {
        let mut stdout = std::io::stdout().lock();
        self.render_to(&mut stdout, report)?;
        stdout.flush()?;
        Ok(())
    }

    /// Print a report to `w`. JSON is pretty-printed with a trailing newline.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        report: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => report.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, report)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}
