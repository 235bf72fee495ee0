//! Engine state
//!
//! The engine holds all render state:
//! - cursor: index of the next instruction
//! - blocks / skip: block nesting and whether a block is being suppressed
//! - store: variables plus the waits parked on them
//! - pipe: the stream currently being forwarded, if any
//!
//! It is single-owner and never runs in parallel: a render moves forward only
//! from `attach_sink`, `set`, `pump` or the async host driver.

use super::blocks::BlockStack;
use super::directives::DirectiveRegistry;
use super::errors::RenderError;
use super::filters::FilterRegistry;
use super::pipe::Pipe;
use super::sink::OutputSink;
use super::store::VariableStore;
use super::types::{SkipState, Status, Template, Val, VarPath, Wait};
use crate::config::EngineConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Callback for a host-issued `get`
pub type HostCallback = Box<dyn FnOnce(&Val)>;

/// Who is waiting on a variable
pub(crate) enum Waiter {
    /// The engine's parked directive (see `Wait::Variable`)
    Engine,
    Host { path: VarPath, callback: HostCallback },
}

/* ===================== Engine ===================== */

pub struct Engine {
    pub(crate) template: Arc<Template>,
    pub(crate) directives: DirectiveRegistry,
    pub(crate) filters: FilterRegistry,
    pub(crate) config: EngineConfig,
    pub(crate) store: VariableStore<Waiter>,
    pub(crate) blocks: BlockStack,
    pub(crate) skip: SkipState,
    pub(crate) cursor: usize,
    pub(crate) sink: Option<Box<dyn OutputSink>>,
    pub(crate) status: Status,
    pub(crate) pipe: Option<Pipe>,
}

impl Engine {
    /// Create an engine for a compiled template
    ///
    /// Nothing runs until a sink is attached.
    pub fn new(
        template: impl Into<Arc<Template>>,
        directives: DirectiveRegistry,
        filters: FilterRegistry,
    ) -> Self {
        Self {
            template: template.into(),
            directives,
            filters,
            config: EngineConfig::default(),
            store: VariableStore::new(),
            blocks: BlockStack::new(),
            skip: SkipState::NotSkipping,
            cursor: 0,
            sink: None,
            status: Status::Idle,
            pipe: None,
        }
    }

    /// Create an engine with the built-in directives and filters
    pub fn with_builtins(template: impl Into<Arc<Template>>) -> Self {
        Self::new(
            template,
            DirectiveRegistry::with_builtins(),
            FilterRegistry::with_builtins(),
        )
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Create an engine already bound to a sink (execution starts immediately)
    pub fn with_sink(
        template: impl Into<Arc<Template>>,
        directives: DirectiveRegistry,
        filters: FilterRegistry,
        sink: impl OutputSink + 'static,
    ) -> Result<Self, RenderError> {
        let mut engine = Self::new(template, directives, filters);
        engine.attach_sink(sink)?;
        Ok(engine)
    }

    /// Bind the output and start rendering
    ///
    /// Starts exactly once: later calls keep the first sink and do nothing.
    pub fn attach_sink(&mut self, sink: impl OutputSink + 'static) -> Result<(), RenderError> {
        if self.status != Status::Idle {
            debug!("sink already attached, ignoring");
            return Ok(());
        }
        self.sink = Some(Box::new(sink));
        self.status = Status::Running;
        info!(instructions = self.template.len(), "render started");
        self.run()
    }

    /* ===================== Inspection ===================== */

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn block_depth(&self) -> usize {
        self.blocks.depth()
    }

    pub fn skip_state(&self) -> SkipState {
        self.skip
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Current value at `path`, if resolvable
    pub fn lookup(&self, path: &VarPath) -> Option<&Val> {
        self.store.resolve(path)
    }

    /* ===================== Host Data API ===================== */

    /// Write a variable and wake whatever waits on its first segment
    ///
    /// If the engine is parked on a path this set makes resolvable, the render
    /// resumes before `set` returns. Errors from the resumed render are
    /// returned here.
    pub fn set(
        &mut self,
        path: impl Into<VarPath>,
        value: impl Into<Val>,
    ) -> Result<(), RenderError> {
        let path = path.into();
        let notification = self.store.set(&path, value.into())?;
        debug!(
            path = %path,
            woken = notification.woken.len(),
            "variable set"
        );

        // Every host waiter gets its retry even if the resumed render fails
        let mut outcome = Ok(());
        for waiter in notification.woken {
            match waiter {
                Waiter::Host { path, callback } => self.get_boxed(path, callback),
                Waiter::Engine => outcome = self.resume_parked(),
            }
        }
        outcome
    }

    /// Resolve a variable, now if possible or once a `set` makes it resolvable
    ///
    /// An empty path is rejected the same way `set` rejects it, since no set
    /// could ever resolve it.
    pub fn get<F>(&mut self, path: impl Into<VarPath>, on_resolved: F) -> Result<(), RenderError>
    where
        F: FnOnce(&Val) + 'static,
    {
        let path = path.into();
        if path.is_empty() {
            return Err(RenderError::MalformedPath {
                path,
                reason: "empty path".to_string(),
            });
        }
        self.get_boxed(path, Box::new(on_resolved));
        Ok(())
    }

    fn get_boxed(&mut self, path: VarPath, callback: HostCallback) {
        match self.store.resolve(&path) {
            Some(value) => callback(value),
            None => {
                trace!(path = %path, "host get parked");
                self.store.subscribe(&path, Waiter::Host { path: path.clone(), callback });
            }
        }
    }

    /* ===================== Directive API ===================== */

    /// Push a chunk to the sink
    pub fn emit(&mut self, chunk: &str) -> Result<(), RenderError> {
        let Some(sink) = self.sink.as_mut() else {
            warn!("emit without a sink, chunk dropped");
            return Ok(());
        };
        trace!(len = chunk.len(), "emit");
        sink.accept(chunk)?;
        Ok(())
    }

    /// Suppress everything up to the close of the current block
    pub fn skip_current_block(&mut self) {
        self.skip = SkipState::SkippingSince(self.blocks.depth());
        debug!(depth = self.blocks.depth(), "skipping block");
    }

    /// Pop the current block and move the cursor back to its opening directive
    ///
    /// The directive returning [`Flow::Advance`](super::directives::Flow)
    /// afterwards re-executes the block from the top.
    pub fn restart_current_block(&mut self) -> Result<(), RenderError> {
        let frame = self.close_block(self.current_directive())?;
        debug!(to = frame, "restarting block");
        self.cursor = frame;
        Ok(())
    }

    /// Pop the current block exactly as a `closes_block` directive would
    pub fn close_current_block(&mut self) -> Result<(), RenderError> {
        self.close_block(self.current_directive()).map(|_| ())
    }

    /// Pop a frame; leaving the skipped block ends skipping
    pub(crate) fn close_block(&mut self, index: usize) -> Result<usize, RenderError> {
        let frame = self
            .blocks
            .pop()
            .ok_or(RenderError::UnbalancedBlock { index })?;
        if let SkipState::SkippingSince(depth) = self.skip {
            if self.blocks.depth() < depth {
                self.skip = SkipState::NotSkipping;
            }
        }
        Ok(frame)
    }

    fn current_directive(&self) -> usize {
        self.cursor.saturating_sub(1)
    }

    /* ===================== Timeouts ===================== */

    /// When the current variable wait times out, if a timeout is configured
    pub fn wait_deadline(&self) -> Option<Instant> {
        let timeout = self.config.wait_timeout()?;
        match &self.status {
            Status::Suspended(Wait::Variable { since, .. }) => Some(*since + timeout),
            _ => None,
        }
    }

    /// Report a variable wait that has outlived the configured timeout
    ///
    /// The wait stays registered, so a later `set` still resumes the render.
    /// The clock restarts, so the next report comes one full timeout later.
    pub fn check_timeout(&mut self, now: Instant) -> Result<(), RenderError> {
        let Some(timeout) = self.config.wait_timeout() else {
            return Ok(());
        };
        if let Status::Suspended(Wait::Variable { path, since, .. }) = &mut self.status {
            let waited = now.saturating_duration_since(*since);
            if waited >= timeout {
                warn!(path = %path, ?waited, "variable wait timed out");
                *since = now;
                return Err(RenderError::UnresolvedVariable {
                    path: path.clone(),
                    waited,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .field("skip", &self.skip)
            .field("depth", &self.blocks.depth())
            .field("pending_waits", &self.store.pending())
            .finish()
    }
}
