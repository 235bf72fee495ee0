//! Async host driver
//!
//! Lets any task feed data into a running render. [`channel`] returns a
//! cloneable [`RenderHandle`] for producers and a receiver for [`drive`],
//! which owns the engine for the duration of the render on the current task:
//!
//! - applies `set` commands in arrival order
//! - pumps piped streams as their chunks arrive
//! - pumps filter chains whose stages produce output on their own
//! - enforces `EngineConfig::wait_timeout` on variable waits
//!
//! ```rust,no_run
//! use rill_core::engine::{ChunkCollector, Engine, Template, Val};
//! use rill_core::host;
//!
//! # async fn demo(template: Template) -> Result<(), rill_core::engine::RenderError> {
//! let (handle, mut commands) = host::channel();
//! let mut engine = Engine::with_builtins(template);
//! engine.attach_sink(ChunkCollector::new())?;
//!
//! tokio::spawn(async move {
//!     handle.set("title", Val::from("Test page"));
//! });
//! host::drive(&mut engine, &mut commands).await?;
//! # Ok(())
//! # }
//! ```

use crate::engine::{Engine, RenderError, Status, Val, VarPath, Wait};
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Data sent by the host into a running render
#[derive(Debug)]
pub enum HostCommand {
    Set { path: VarPath, value: Val },
}

/// Producer side of a render; cheap to clone and `Send`
#[derive(Debug, Clone)]
pub struct RenderHandle {
    tx: UnboundedSender<HostCommand>,
}

impl RenderHandle {
    /// Queue a `set`; returns false once the render is gone
    pub fn set(&self, path: impl Into<VarPath>, value: impl Into<Val>) -> bool {
        self.tx
            .send(HostCommand::Set {
                path: path.into(),
                value: value.into(),
            })
            .is_ok()
    }
}

pub fn channel() -> (RenderHandle, UnboundedReceiver<HostCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RenderHandle { tx }, rx)
}

enum Received {
    Command(HostCommand),
    Closed,
    TimedOut(Instant),
}

/// Drive an engine until the render finishes
///
/// Returns `Ok(())` when the render is done, or when every handle has been
/// dropped while the engine still waits on a variable (check
/// [`Engine::status`] in that case). Errors leave the engine intact:
/// `UnresolvedVariable` is recoverable, so the caller may `set` the variable
/// and drive again.
pub async fn drive(
    engine: &mut Engine,
    commands: &mut UnboundedReceiver<HostCommand>,
) -> Result<(), RenderError> {
    let mut commands_open = true;

    loop {
        match engine.status() {
            Status::Done | Status::Failed => return Ok(()),
            Status::Idle => {
                warn!("drive called before a sink was attached");
                return Ok(());
            }
            Status::Running | Status::Suspended(_) => {}
        }

        let piping = matches!(
            engine.status(),
            Status::Suspended(Wait::Stream { .. } | Wait::Filter { .. })
        );
        if !commands_open && !piping {
            warn!(status = ?engine.status(), "host channel closed before render completed");
            return Ok(());
        }
        let deadline = engine.wait_deadline();

        tokio::select! {
            received = next_command(commands, deadline), if commands_open => match received {
                Received::Command(HostCommand::Set { path, value }) => engine.set(path, value)?,
                Received::Closed => {
                    debug!("host channel closed");
                    commands_open = false;
                }
                Received::TimedOut(at) => engine.check_timeout(at)?,
            },
            event = engine.wait_pipe(), if piping => engine.feed_pipe(event)?,
        }
    }
}

async fn next_command(
    commands: &mut UnboundedReceiver<HostCommand>,
    deadline: Option<Instant>,
) -> Received {
    let Some(deadline) = deadline else {
        return commands.recv().await.map_or(Received::Closed, Received::Command);
    };
    match tokio::time::timeout_at(deadline.into(), commands.recv()).await {
        Ok(Some(command)) => Received::Command(command),
        Ok(None) => Received::Closed,
        Err(_) => Received::TimedOut(deadline),
    }
}
