//! Record destinations

use std::io::{self, Write};
use std::sync::Arc;

use crate::error::Result;
use crate::rotation::RotatingFileWriter;

/// A destination for formatted records.
///
/// Each call receives one complete record, newline included.
pub trait LogSink: Send + Sync {
    fn write_record(&self, record: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

impl LogSink for RotatingFileWriter {
    fn write_record(&self, record: &[u8]) -> Result<()> {
        self.write(record).map(|_| ())
    }

    fn flush(&self) -> Result<()> {
        RotatingFileWriter::flush(self)
    }
}

/// Standard output of the process
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl LogSink for Console {
    fn write_record(&self, record: &[u8]) -> Result<()> {
        io::stdout().lock().write_all(record)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        io::stdout().lock().flush()?;
        Ok(())
    }
}

/// Writes every record to each of its sinks in order
#[derive(Clone, Default)]
pub struct FanOut {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn LogSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl LogSink for FanOut {
    /// Every sink sees the record even if an earlier one failed; the first
    /// failure is returned.
    fn write_record(&self, record: &[u8]) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.write_record(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects records in memory
    #[derive(Default)]
    pub struct MemorySink {
        records: Mutex<Vec<String>>,
    }

    impl MemorySink {
        pub fn records(&self) -> Vec<String> {
            self.records.lock().unwrap().clone()
        }
    }

    impl LogSink for MemorySink {
        fn write_record(&self, record: &[u8]) -> Result<()> {
            self.records
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(record).into_owned());
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Rejects every record
    pub struct BrokenSink;

    impl LogSink for BrokenSink {
        fn write_record(&self, _record: &[u8]) -> Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed").into())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{BrokenSink, MemorySink};
    use super::*;
    use crate::error::Error;
    use crate::rotation::RotationUnit;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let first = Arc::new(MemorySink::default());
        let second = Arc::new(MemorySink::default());
        let fan_out = FanOut::new(vec![first.clone(), second.clone()]);

        fan_out.write_record(b"hello\n").unwrap();

        assert_eq!(first.records(), vec!["hello\n"]);
        assert_eq!(second.records(), vec!["hello\n"]);
    }

    #[test]
    fn test_fan_out_continues_past_failure() {
        let memory = Arc::new(MemorySink::default());
        let fan_out = FanOut::new(vec![Arc::new(BrokenSink), memory.clone()]);

        let result = fan_out.write_record(b"hello\n");

        assert!(matches!(result, Err(Error::Write(_))));
        assert_eq!(memory.records(), vec!["hello\n"]);
    }

    #[test]
    fn test_empty_fan_out_accepts_records() {
        let fan_out = FanOut::default();
        assert!(fan_out.is_empty());
        assert!(fan_out.write_record(b"dropped\n").is_ok());
    }

    #[test]
    fn test_writer_sink() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.log");
        let writer = Arc::new(RotatingFileWriter::new(&path, RotationUnit::Daily, 3).unwrap());
        let mut fan_out = FanOut::default();
        fan_out.push(writer);

        fan_out.write_record(b"one\n").unwrap();
        fan_out.write_record(b"two\n").unwrap();
        fan_out.flush().unwrap();

        assert_eq!(fan_out.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }
}
