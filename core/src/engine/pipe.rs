//! Stream piping
//!
//! A [`Pipe`] forwards a stream value's chunks (optionally through a filter
//! chain) to the engine. It stays open until both the source has ended and
//! the chain has signalled its end; a chain may end well after its input did.
//! The engine drains it whenever output is available and stays suspended
//! while it is open but idle.

use super::errors::RenderError;
use super::filters::FilterChain;
use super::types::{StreamValue, VarPath};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Outcome of one read
#[derive(Debug, PartialEq)]
pub enum PipeRead {
    /// Chunks that were ready, in order; the pipe is still open
    Pending(Vec<String>),
    /// The pipe finished; these are the final chunks and the pipe is spent
    Closed(Vec<String>),
}

/// What woke an async wait on the pipe
#[derive(Debug, PartialEq)]
pub enum PipeEvent {
    Chunk(String),
    SourceEnded,
    /// A filter stage produced late output or ended
    Stage,
}

#[derive(Debug)]
pub struct Pipe {
    /// `None` once the source has ended
    source: Option<UnboundedReceiver<String>>,
    chain: Option<FilterChain>,
}

impl Pipe {
    /// Take over a stream value; fails if something already piped it
    pub fn open(
        stream: &StreamValue,
        path: &VarPath,
        chain: Option<FilterChain>,
    ) -> Result<Self, RenderError> {
        let source = stream
            .take_reader()
            .ok_or_else(|| RenderError::StreamConsumed { path: path.clone() })?;
        Ok(Self {
            source: Some(source),
            chain,
        })
    }

    /// A chain whose input is complete but which has not ended yet
    pub fn draining(chain: FilterChain) -> Self {
        Self {
            source: None,
            chain: Some(chain),
        }
    }

    pub fn source_open(&self) -> bool {
        self.source.is_some()
    }

    /// Non-blocking read of everything available
    pub fn read(&mut self) -> Result<PipeRead, RenderError> {
        let mut chunks = Vec::new();

        while let Some(source) = self.source.as_mut() {
            match source.try_recv() {
                Ok(chunk) => chunks.extend(self.pass(chunk)),
                Err(TryRecvError::Empty) => {
                    if let Some(chain) = self.chain.as_mut() {
                        chunks.extend(chain.poll());
                    }
                    return Ok(PipeRead::Pending(chunks));
                }
                Err(TryRecvError::Disconnected) => {
                    self.source = None;
                    if let Some(chain) = self.chain.as_mut() {
                        chunks.extend(chain.finish());
                    }
                }
            }
        }

        let Some(chain) = self.chain.as_mut() else {
            return Ok(PipeRead::Closed(chunks));
        };
        chunks.extend(chain.poll());
        if chain.is_ended() {
            Ok(PipeRead::Closed(chunks))
        } else if chain.is_stalled() {
            Err(RenderError::FilterStalled)
        } else {
            Ok(PipeRead::Pending(chunks))
        }
    }

    /// Wait until the source or a filter stage has something
    ///
    /// Pending forever when neither can produce again.
    pub async fn wait(&mut self) -> PipeEvent {
        let Self { source, chain } = self;
        let source_open = source.is_some();
        let stages_live = chain.as_ref().is_some_and(FilterChain::has_live_handles);

        tokio::select! {
            chunk = recv_source(source), if source_open => match chunk {
                Some(chunk) => PipeEvent::Chunk(chunk),
                None => PipeEvent::SourceEnded,
            },
            _ = wait_chain(chain), if stages_live => PipeEvent::Stage,
            else => std::future::pending::<PipeEvent>().await,
        }
    }

    /// Forward one chunk through the chain
    pub fn pass(&mut self, chunk: String) -> Vec<String> {
        match self.chain.as_mut() {
            Some(chain) => chain.accept(&chunk),
            None => vec![chunk],
        }
    }
}

async fn recv_source(source: &mut Option<UnboundedReceiver<String>>) -> Option<String> {
    match source.as_mut() {
        Some(source) => source.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_chain(chain: &mut Option<FilterChain>) {
    match chain.as_mut() {
        Some(chain) => chain.wait_late().await,
        None => std::future::pending().await,
    }
}
