//! CSV position log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use vtrack_models::PositionRow;

use crate::error::PipelineResult;

/// Writes `frame,object_id,label,x,y,w,h` rows.
///
/// The header is written on creation, so an empty run still yields a valid
/// CSV file.
pub struct PositionLogWriter<W: Write> {
    out: W,
    rows: u64,
}

impl PositionLogWriter<BufWriter<File>> {
    /// Create (or truncate) a log file.
    pub fn create(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> PositionLogWriter<W> {
    pub fn new(mut out: W) -> PipelineResult<Self> {
        writeln!(out, "{}", PositionRow::HEADER.join(","))?;
        Ok(Self { out, rows: 0 })
    }

    pub fn append(&mut self, row: &PositionRow) -> PipelineResult<()> {
        writeln!(
            self.out,
            "{},{},{},{},{},{},{}",
            row.frame,
            row.object_id,
            escape_field(&row.label),
            row.x,
            row.y,
            row.w,
            row.h
        )?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> PipelineResult<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Rows written so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}
