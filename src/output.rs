//! Line oriented output shared by concurrent work units.
//!
//! Lines from different writers may appear in any order, but a line is never interleaved with
//! another one.

use parking_lot::Mutex;
use std::io::{self, Write};

pub trait OutputSink: Send + Sync {
    /// Append `text` followed by a newline, atomically with respect to other callers.
    fn write_line(&self, text: &str) -> io::Result<()>;
}

/// An [OutputSink] over any writer, serialized by a single lock.
pub struct LockedWriter<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> LockedWriter<W> {
    pub fn new(writer: W) -> Self {
        LockedWriter {
            inner: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl LockedWriter<io::Stdout> {
    pub fn stdout() -> Self {
        LockedWriter::new(io::stdout())
    }
}

impl<W: Write + Send> OutputSink for LockedWriter<W> {
    fn write_line(&self, text: &str) -> io::Result<()> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        let mut inner = self.inner.lock();
        inner.write_all(line.as_bytes())?;
        inner.flush()
    }
}

impl<W: Write + Send> std::fmt::Debug for LockedWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LockedWriter")
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<String>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Default::default()
    }

    /// The lines written so far, in arrival order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// The lines written so far, sorted, for order independent comparisons.
    pub fn sorted_lines(&self) -> Vec<String> {
        let mut lines = self.lines();
        lines.sort();
        lines
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for CaptureSink {
    fn write_line(&self, text: &str) -> io::Result<()> {
        self.lines.lock().push(text.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    /// A writer that hands every `write` call a tiny buffer, so unsynchronized writers would
    /// interleave at byte granularity.
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            std::thread::yield_now();
            Ok(n)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let sink = LockedWriter::new(Trickle(Vec::new()));
        let writers = 16;
        let per_writer = 200;
        (0..writers).into_par_iter().for_each(|w| {
            let text = format!("writer {w:02} {}", "x".repeat(w * 3));
            for _ in 0..per_writer {
                sink.write_line(&text).unwrap();
            }
        });
        let bytes = sink.into_inner().0;
        let out = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), writers * per_writer);
        for w in 0..writers {
            let expected = format!("writer {w:02} {}", "x".repeat(w * 3));
            assert_eq!(lines.iter().filter(|l| **l == expected).count(), per_writer);
        }
    }

    #[test]
    fn capture_sink_keeps_lines() {
        let sink = CaptureSink::new();
        sink.write_line("b").unwrap();
        sink.write_line("a").unwrap();
        assert_eq!(sink.lines(), vec!["b", "a"]);
        assert_eq!(sink.sorted_lines(), vec!["a", "b"]);
    }
}
