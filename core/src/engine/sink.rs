//! Output sinks
//!
//! The engine pushes chunks into an [`OutputSink`] strictly in emit order and
//! closes it once when the render completes.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub trait OutputSink {
    fn accept(&mut self, chunk: &str) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/* ===================== Collector ===================== */

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct ChunkCollector {
    chunks: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ChunkCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks received so far, in order
    pub fn chunks(&self) -> Vec<String> {
        self.chunks
            .lock()
            .map(|chunks| chunks.clone())
            .unwrap_or_default()
    }

    /// Concatenation of everything received so far
    pub fn text(&self) -> String {
        self.chunks().concat()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl OutputSink for ChunkCollector {
    fn accept(&mut self, chunk: &str) -> io::Result<()> {
        self.chunks
            .lock()
            .map_err(|_| io::Error::other("chunk collector poisoned"))?
            .push(chunk.to_string());
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/* ===================== Writer ===================== */

/// Adapts any `io::Write`
///
/// With `flush_each_chunk`, partial output becomes visible while the render is
/// still suspended on a variable.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    flush_each_chunk: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            flush_each_chunk: false,
        }
    }

    pub fn flush_each_chunk(mut self, flush: bool) -> Self {
        self.flush_each_chunk = flush;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriterSink<W> {
    fn accept(&mut self, chunk: &str) -> io::Result<()> {
        self.writer.write_all(chunk.as_bytes())?;
        if self.flush_each_chunk {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_clones_share_buffer() {
        let collector = ChunkCollector::new();
        let mut handle = collector.clone();
        handle.accept("a").unwrap();
        handle.accept("b").unwrap();
        handle.close().unwrap();

        assert_eq!(collector.chunks(), vec!["a", "b"]);
        assert_eq!(collector.text(), "ab");
        assert!(collector.is_closed());
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new()).flush_each_chunk(true);
        sink.accept("<h1>").unwrap();
        sink.accept("Title").unwrap();
        sink.close().unwrap();
        assert_eq!(sink.into_inner(), b"<h1>Title".to_vec());
    }
}
