//! Core execution loop
//!
//! This module contains advance() - the heart of the interpreter.
//! It walks the cursor over the template, emits literals, dispatches
//! directives and applies the [`Flow`] each directive returns.
//!
//! ## Function Organization
//! 1. advance() / run() - top-level drivers (call step repeatedly)
//! 2. step() - executes one instruction
//! 3. apply_flow() - carries out what a directive asked for
//! 4. resume_parked() / pump() - wake-ups from the store and from streams

use super::directives::Flow;
use super::errors::RenderError;
use super::pipe::{PipeEvent, PipeRead};
use super::types::{Instruction, Status, Step, Val, Wait};
use super::vm::{Engine, Waiter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

impl Engine {
    /* ===================== Public API ===================== */

    /// Run until the render suspends or completes
    ///
    /// Only meaningful while the engine is running. Before a sink is attached,
    /// while a directive is parked, and after completion it is a no-op: the
    /// parked directive's own completion is what moves the cursor on.
    pub fn advance(&mut self) -> Result<(), RenderError> {
        match &self.status {
            Status::Running => self.run(),
            Status::Idle => {
                debug!("advance before a sink was attached, ignoring");
                Ok(())
            }
            Status::Suspended(wait) => {
                warn!(?wait, "advance while suspended, ignoring");
                Ok(())
            }
            Status::Done | Status::Failed => Ok(()),
        }
    }

    /// Drain the pipe the engine is suspended on and continue
    ///
    /// Hosts call this after writing to a stream value that is being piped,
    /// or after a filter stage produced output on its own.
    pub fn pump(&mut self) -> Result<(), RenderError> {
        let directive = match &self.status {
            Status::Suspended(Wait::Stream { directive } | Wait::Filter { directive }) => *directive,
            _ => return Ok(()),
        };
        let step = self.drain_pipe(directive);
        self.settle(step)
    }

    /* ===================== Driver ===================== */

    /// Step until suspended or done
    pub(crate) fn run(&mut self) -> Result<(), RenderError> {
        loop {
            match self.step() {
                Ok(Step::Continue) => continue,
                other => return self.settle(other),
            }
        }
    }

    /// Turn the outcome of a step into the engine's next state
    fn settle(&mut self, step: Result<Step, RenderError>) -> Result<(), RenderError> {
        match step {
            Ok(Step::Continue) => self.run(),
            Ok(Step::Suspended) => Ok(()),
            Ok(Step::Done) => self.complete(),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn complete(&mut self) -> Result<(), RenderError> {
        self.status = Status::Done;
        info!(instructions = self.template.len(), "render complete");
        let closed = match self.sink.as_mut() {
            Some(sink) => sink.close(),
            None => Ok(()),
        };
        closed.map_err(|err| self.fail(err.into()))
    }

    fn fail(&mut self, err: RenderError) -> RenderError {
        error!(error = %err, cursor = self.cursor, "render aborted");
        self.status = Status::Failed;
        self.pipe = None;
        err
    }

    /* ===================== Stepping ===================== */

    /// Execute the instruction at the cursor
    pub(crate) fn step(&mut self) -> Result<Step, RenderError> {
        let template = Arc::clone(&self.template);
        let Some(instruction) = template.get(self.cursor) else {
            return Ok(Step::Done);
        };
        let index = self.cursor;
        self.cursor += 1;

        match instruction {
            Instruction::Literal { text } => {
                if !self.skip.is_skipping() {
                    self.emit(text)?;
                }
                Ok(Step::Continue)
            }

            Instruction::Directive { name, args } => {
                let handler =
                    self.directives
                        .get(name)
                        .ok_or_else(|| RenderError::UnknownDirective {
                            name: name.clone(),
                            index,
                        })?;

                if handler.opens_block() {
                    self.blocks.push(index);
                }
                if handler.closes_block() {
                    self.close_block(index)?;
                }

                if self.skip.is_skipping() {
                    trace!(directive = %name, index, "skipped");
                    return Ok(Step::Continue);
                }

                debug!(directive = %name, index, "dispatch");
                let flow = handler.call(self, args)?;
                self.apply_flow(index, flow)
            }
        }
    }

    /// Carry out a directive's flow
    fn apply_flow(&mut self, directive: usize, flow: Flow) -> Result<Step, RenderError> {
        let mut flow = flow;
        loop {
            match flow {
                Flow::Advance => return Ok(Step::Continue),

                Flow::Await(path) => match self.store.resolve(&path).cloned() {
                    Some(value) => flow = self.resume_directive(directive, value)?,
                    None => {
                        debug!(path = %path, directive, "suspended on variable");
                        self.store.subscribe(&path, Waiter::Engine);
                        self.status = Status::Suspended(Wait::Variable {
                            path,
                            directive,
                            since: Instant::now(),
                        });
                        return Ok(Step::Suspended);
                    }
                },

                Flow::Pipe(pipe) => {
                    self.pipe = Some(pipe);
                    return self.drain_pipe(directive);
                }
            }
        }
    }

    /// Hand a resolved value back to the directive at `directive`
    fn resume_directive(&mut self, directive: usize, value: Val) -> Result<Flow, RenderError> {
        let template = Arc::clone(&self.template);
        let Some(Instruction::Directive { name, args }) = template.get(directive) else {
            unreachable!("parked index {} is not a directive", directive);
        };
        let handler = self
            .directives
            .get(name)
            .ok_or_else(|| RenderError::UnknownDirective {
                name: name.clone(),
                index: directive,
            })?;
        handler.resume(self, args, value)
    }

    /* ===================== Wake-ups ===================== */

    /// A set woke the parked directive: retry the whole lookup
    pub(crate) fn resume_parked(&mut self) -> Result<(), RenderError> {
        let Status::Suspended(Wait::Variable { path, directive, .. }) = &self.status else {
            return Ok(());
        };
        let (path, directive) = (path.clone(), *directive);

        let Some(value) = self.store.resolve(&path).cloned() else {
            trace!(path = %path, "still unresolved, waiting again");
            self.store.subscribe(&path, Waiter::Engine);
            return Ok(());
        };

        debug!(path = %path, directive, "resumed");
        self.status = Status::Running;
        let step = self
            .resume_directive(directive, value)
            .and_then(|flow| self.apply_flow(directive, flow));
        self.settle(step)
    }

    /// Forward whatever the active pipe has buffered
    fn drain_pipe(&mut self, directive: usize) -> Result<Step, RenderError> {
        let Some(mut pipe) = self.pipe.take() else {
            return Ok(Step::Continue);
        };

        match pipe.read()? {
            PipeRead::Pending(chunks) => {
                for chunk in &chunks {
                    self.emit(chunk)?;
                }
                let wait = if pipe.source_open() {
                    trace!(directive, "stream idle");
                    Wait::Stream { directive }
                } else {
                    trace!(directive, "waiting for filter chain to end");
                    Wait::Filter { directive }
                };
                self.pipe = Some(pipe);
                self.status = Status::Suspended(wait);
                Ok(Step::Suspended)
            }
            PipeRead::Closed(chunks) => {
                for chunk in &chunks {
                    self.emit(chunk)?;
                }
                debug!(directive, "pipe closed");
                self.status = Status::Running;
                Ok(Step::Continue)
            }
        }
    }

    /// Wait for the active pipe to have something (used by the async host driver)
    ///
    /// Pending forever when nothing is being piped.
    pub(crate) async fn wait_pipe(&mut self) -> PipeEvent {
        match self.pipe.as_mut() {
            Some(pipe) => pipe.wait().await,
            None => std::future::pending().await,
        }
    }

    /// Apply what [`wait_pipe`](Self::wait_pipe) returned, then keep draining
    pub(crate) fn feed_pipe(&mut self, event: PipeEvent) -> Result<(), RenderError> {
        if let (PipeEvent::Chunk(chunk), Some(pipe)) = (event, self.pipe.as_mut()) {
            let chunks = pipe.pass(chunk);
            for chunk in &chunks {
                if let Err(err) = self.emit(chunk) {
                    return Err(self.fail(err));
                }
            }
        }
        self.pump()
    }
}
