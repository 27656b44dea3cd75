//! Trace Logger
//!
//! Writes the run trace: human-readable lines to stdout and, optionally,
//! append-only JSONL records to a file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use sim_events::TraceRecord;

pub struct TraceLogger {
    writer: Option<BufWriter<File>>,
    echo: bool,
    record_count: u64,
}

impl TraceLogger {
    /// Logger that prints console lines and writes JSONL to `path`.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            echo: true,
            record_count: 0,
        })
    }

    /// Logger that only prints console lines.
    pub fn console() -> Self {
        Self {
            writer: None,
            echo: true,
            record_count: 0,
        }
    }

    /// Create a logger that discards records (for testing)
    pub fn null() -> Self {
        Self {
            writer: None,
            echo: false,
            record_count: 0,
        }
    }

    /// Enables or disables console output.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Get the number of records logged so far
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Log a record to the console and the file
    pub fn log(&mut self, record: &TraceRecord) -> std::io::Result<()> {
        self.record_count += 1;
        if self.echo {
            if let Some(line) = record.console_line() {
                println!("{}", line);
            }
        }
        if let Some(ref mut writer) = self.writer {
            let json = record.to_jsonl()?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    /// Log multiple records
    pub fn log_batch(&mut self, records: &[TraceRecord]) -> std::io::Result<()> {
        for record in records {
            self.log(record)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for TraceLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to flush trace logger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_events::OpinionVector;
    use std::io::BufRead;
    use tempfile::tempdir;

    #[test]
    fn test_trace_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");

        let mut logger = TraceLogger::new(&path).unwrap().with_echo(false);
        logger
            .log_batch(&[
                TraceRecord::EpochLoss {
                    epoch: 0,
                    loss: 0.5,
                },
                TraceRecord::AgentUpdated {
                    step: 1,
                    agent: "Ava".into(),
                    opinion: OpinionVector::from([0.1, 0.2, 0.3]),
                },
            ])
            .unwrap();
        logger.flush().unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        let parsed = TraceRecord::from_jsonl(&lines[1]).unwrap();
        assert!(matches!(parsed, TraceRecord::AgentUpdated { step: 1, .. }));
    }

    #[test]
    fn test_null_logger() {
        let mut logger = TraceLogger::null();

        logger
            .log(&TraceRecord::RunFinished {
                steps: 5,
                skipped: 0,
            })
            .unwrap();
        assert_eq!(logger.record_count(), 1);
    }
}
