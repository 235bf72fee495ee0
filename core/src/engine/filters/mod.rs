//! Filter pipeline
//!
//! A [`FilterStage`] is a stateful text transform. Stages are wired into a
//! [`FilterChain`]: the chunks stage *i* produces are fed to stage *i+1*, and
//! stage *i+1* is finished once stage *i* has signalled its end. The chain's
//! consumer only sees the last stage's chunks and end signal.
//!
//! Output is decoupled from input: a stage pushes into a [`StageOutput`]
//! during `accept` or `finish`, or later through the [`StageHandle`] it was
//! given in `attach`. Callers must not assume a chunk fed in comes straight
//! back out, nor that the chain has ended once `finish` returns.

pub mod text;

use super::errors::RenderError;
use super::types::{FilterSpec, Literal};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/* ===================== Stage Interface ===================== */

/// Sink a stage produces into
#[derive(Debug, Default)]
pub struct StageOutput {
    chunks: Vec<String>,
    ended: bool,
}

impl StageOutput {
    pub fn push(&mut self, chunk: impl Into<String>) {
        self.chunks.push(chunk.into());
    }

    /// Signal that this stage will produce nothing more
    pub fn end(&mut self) {
        self.ended = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn is_empty(&self) -> bool {
        self.chunks.is_empty() && !self.ended
    }

    fn absorb(&mut self, other: StageOutput) {
        self.chunks.extend(other.chunks);
        self.ended |= other.ended;
    }
}

/// Output produced after `accept`/`finish` returned
#[derive(Debug)]
enum LateOutput {
    Chunk(String),
    End,
}

/// Lets a stage produce output, or end, at any later time
///
/// Late output reaches the consumer the next time the chain is polled. Once
/// every handle of a chain is dropped, a chain that has not ended never will.
#[derive(Debug, Clone)]
pub struct StageHandle {
    link: usize,
    tx: UnboundedSender<(usize, LateOutput)>,
}

impl StageHandle {
    /// Returns false once the chain is gone
    pub fn push(&self, chunk: impl Into<String>) -> bool {
        self.tx.send((self.link, LateOutput::Chunk(chunk.into()))).is_ok()
    }

    pub fn end(&self) -> bool {
        self.tx.send((self.link, LateOutput::End)).is_ok()
    }
}

/// One named text transform
pub trait FilterStage {
    /// Accept one chunk of input
    fn accept(&mut self, chunk: &str, out: &mut StageOutput);

    /// Input is over. Stages that buffer flush here; the default just ends.
    fn finish(&mut self, out: &mut StageOutput) {
        out.end();
    }

    /// Called once when the stage is wired into a chain. Stages that produce
    /// asynchronously keep the handle; the default drops it.
    fn attach(&mut self, handle: StageHandle) {
        let _ = handle;
    }
}

/* ===================== Registry ===================== */

/// Builds a stage from its literal construction args
pub type FilterConstructor =
    Arc<dyn Fn(&[Literal]) -> Result<Box<dyn FilterStage>, RenderError> + Send + Sync>;

/// Filter name to constructor
#[derive(Clone, Default)]
pub struct FilterRegistry {
    constructors: HashMap<String, FilterConstructor>,
}

impl FilterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `uppercase` and `wrap`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("uppercase", |_| Ok(Box::new(text::Uppercase)));
        registry.register("wrap", |args| Ok(Box::new(text::Wrap::from_args(args)?)));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&[Literal]) -> Result<Box<dyn FilterStage>, RenderError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct a single stage
    pub fn build(&self, spec: &FilterSpec) -> Result<Box<dyn FilterStage>, RenderError> {
        let constructor =
            self.constructors
                .get(&spec.name)
                .ok_or_else(|| RenderError::UnknownFilter {
                    name: spec.name.clone(),
                })?;
        constructor(&spec.args)
    }

    /// Construct every stage and wire them in order
    pub fn build_chain<'a, I>(&self, specs: I) -> Result<FilterChain, RenderError>
    where
        I: IntoIterator<Item = &'a FilterSpec>,
    {
        let stages = specs
            .into_iter()
            .map(|spec| self.build(spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterChain::new(stages))
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

/* ===================== Chain ===================== */

struct Link {
    stage: Box<dyn FilterStage>,
    finished: bool,
    ended: bool,
    /// Delivered through the handle, not yet forwarded
    late: StageOutput,
}

/// Ordered stages; output of stage *i* feeds stage *i+1*
pub struct FilterChain {
    links: Vec<Link>,
    input_ended: bool,
    late_rx: UnboundedReceiver<(usize, LateOutput)>,
    /// Every stage handle has been dropped
    handles_dropped: bool,
}

impl FilterChain {
    pub fn new(stages: Vec<Box<dyn FilterStage>>) -> Self {
        let (tx, late_rx) = mpsc::unbounded_channel();
        let links = stages
            .into_iter()
            .enumerate()
            .map(|(link, mut stage)| {
                stage.attach(StageHandle {
                    link,
                    tx: tx.clone(),
                });
                Link {
                    stage,
                    finished: false,
                    ended: false,
                    late: StageOutput::default(),
                }
            })
            .collect();
        Self {
            links,
            input_ended: false,
            late_rx,
            handles_dropped: false,
        }
    }

    /// Feed one chunk into the first stage; returns what the last stage produced
    pub fn accept(&mut self, chunk: &str) -> Vec<String> {
        self.propagate(vec![chunk.to_string()])
    }

    /// Signal end of input; returns what the last stage produced
    pub fn finish(&mut self) -> Vec<String> {
        self.input_ended = true;
        self.propagate(Vec::new())
    }

    /// Forward late output; returns what the last stage produced
    pub fn poll(&mut self) -> Vec<String> {
        self.propagate(Vec::new())
    }

    /// True once the last stage has signalled its end
    pub fn is_ended(&self) -> bool {
        match self.links.last() {
            Some(link) => link.ended,
            None => self.input_ended,
        }
    }

    /// Input is over, the chain has not ended and no stage can still end it
    pub fn is_stalled(&self) -> bool {
        self.input_ended
            && !self.is_ended()
            && self.handles_dropped
            && self.links.iter().all(|link| link.late.is_empty())
    }

    /// Whether some stage may still produce late output
    pub fn has_live_handles(&self) -> bool {
        !self.handles_dropped
    }

    /// Wait for a stage to produce late output; pending forever once every
    /// handle is gone
    pub async fn wait_late(&mut self) {
        if self.handles_dropped {
            return std::future::pending().await;
        }
        match self.late_rx.recv().await {
            Some((link, output)) => deliver(&mut self.links, link, output),
            None => self.handles_dropped = true,
        }
    }

    fn propagate(&mut self, input: Vec<String>) -> Vec<String> {
        let mut output = self.pass(input);
        // An upstream stage may have produced while a later one was running
        while self.links.iter().any(|link| !link.late.is_empty()) {
            output.extend(self.pass(Vec::new()));
        }
        output
    }

    fn pass(&mut self, input: Vec<String>) -> Vec<String> {
        let Self {
            links,
            input_ended,
            late_rx,
            handles_dropped,
        } = self;
        collect_late(late_rx, links, handles_dropped);

        let mut pending = input;
        let mut upstream_ended = *input_ended;

        for index in 0..links.len() {
            let link = &mut links[index];
            let mut out = std::mem::take(&mut link.late);
            for chunk in &pending {
                link.stage.accept(chunk, &mut out);
            }
            if upstream_ended && !link.finished {
                link.finished = true;
                link.stage.finish(&mut out);
            }

            // Handle output sent while the stage was running belongs here too
            collect_late(late_rx, links, handles_dropped);
            let link = &mut links[index];
            out.absorb(std::mem::take(&mut link.late));

            link.ended |= out.ended;
            pending = out.chunks;
            upstream_ended = link.ended;
        }

        pending
    }
}

fn collect_late(
    rx: &mut UnboundedReceiver<(usize, LateOutput)>,
    links: &mut [Link],
    handles_dropped: &mut bool,
) {
    loop {
        match rx.try_recv() {
            Ok((link, output)) => deliver(links, link, output),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                *handles_dropped = true;
                break;
            }
        }
    }
}

fn deliver(links: &mut [Link], link: usize, output: LateOutput) {
    let Some(link) = links.get_mut(link) else {
        return;
    };
    match output {
        LateOutput::Chunk(chunk) => link.late.push(chunk),
        LateOutput::End => link.late.end(),
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.links.len())
            .field("ended", &self.is_ended())
            .field("stalled", &self.is_stalled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Holds every chunk back until finish
    struct Buffer(String);

    impl FilterStage for Buffer {
        fn accept(&mut self, chunk: &str, _out: &mut StageOutput) {
            self.0.push_str(chunk);
        }

        fn finish(&mut self, out: &mut StageOutput) {
            out.push(std::mem::take(&mut self.0));
            out.end();
        }
    }

    /// Forwards input; ends only through the handle it shares with the test
    struct Deferred {
        shared: Arc<Mutex<Option<StageHandle>>>,
    }

    impl FilterStage for Deferred {
        fn accept(&mut self, chunk: &str, out: &mut StageOutput) {
            out.push(chunk);
        }

        fn finish(&mut self, _out: &mut StageOutput) {}

        fn attach(&mut self, handle: StageHandle) {
            if let Ok(mut shared) = self.shared.lock() {
                *shared = Some(handle);
            }
        }
    }

    /// Never ends and drops its handle
    struct Mute;

    impl FilterStage for Mute {
        fn accept(&mut self, _chunk: &str, _out: &mut StageOutput) {}

        fn finish(&mut self, _out: &mut StageOutput) {}
    }

    fn deferred_registry() -> (FilterRegistry, Arc<Mutex<Option<StageHandle>>>) {
        let shared = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&shared);
        let mut registry = FilterRegistry::with_builtins();
        registry.register("deferred", move |_| {
            Ok(Box::new(Deferred {
                shared: Arc::clone(&slot),
            }) as Box<dyn FilterStage>)
        });
        registry.register("mute", |_| Ok(Box::new(Mute) as Box<dyn FilterStage>));
        (registry, shared)
    }

    fn specs(items: &[(&str, &[&str])]) -> Vec<FilterSpec> {
        items
            .iter()
            .map(|(name, args)| {
                FilterSpec::new(*name, args.iter().map(|a| Literal::from(*a)).collect())
            })
            .collect()
    }

    #[test]
    fn test_uppercase_then_wrap() {
        let registry = FilterRegistry::with_builtins();
        let specs = specs(&[("uppercase", &[]), ("wrap", &["[[ ", " ]]"])]);
        let mut chain = registry.build_chain(&specs).unwrap();

        let mut out = chain.accept("test page");
        assert!(!chain.is_ended());
        out.extend(chain.finish());

        assert_eq!(out, vec!["[[ ", "TEST PAGE", " ]]"]);
        assert!(chain.is_ended());
    }

    #[test]
    fn test_unknown_filter() {
        let registry = FilterRegistry::with_builtins();
        let err = registry
            .build_chain(&specs(&[("reverse", &[])]))
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::UnknownFilter { name } if name == "reverse"));
    }

    #[test]
    fn test_buffering_stage_defers_output() {
        let mut registry = FilterRegistry::with_builtins();
        registry.register("buffer", |_| Ok(Box::new(Buffer(String::new()))));
        let mut chain = registry
            .build_chain(&specs(&[("buffer", &[]), ("uppercase", &[])]))
            .unwrap();

        assert!(chain.accept("a").is_empty());
        assert!(chain.accept("b").is_empty());
        assert_eq!(chain.finish(), vec!["AB"]);
        assert!(chain.is_ended());
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let mut chain = FilterChain::new(Vec::new());
        assert_eq!(chain.accept("x"), vec!["x"]);
        assert!(!chain.is_ended());
        assert!(chain.finish().is_empty());
        assert!(chain.is_ended());
    }

    #[test]
    fn test_stage_ends_after_finish() {
        let (registry, shared) = deferred_registry();
        let mut chain = registry
            .build_chain(&specs(&[("deferred", &[]), ("wrap", &["<", ">"])]))
            .unwrap();

        assert_eq!(chain.accept("x"), vec!["<", "x"]);
        assert!(chain.finish().is_empty());
        assert!(!chain.is_ended());
        assert!(!chain.is_stalled());

        let handle = shared.lock().unwrap().take().unwrap();
        assert!(handle.push("y"));
        assert!(handle.end());

        // Downstream stages are finished once the late end arrives
        assert_eq!(chain.poll(), vec!["y", ">"]);
        assert!(chain.is_ended());
    }

    #[test]
    fn test_stall_once_handles_are_gone() {
        let (registry, shared) = deferred_registry();
        let mut chain = registry.build_chain(&specs(&[("deferred", &[])])).unwrap();
        chain.accept("x");
        chain.finish();
        assert!(!chain.is_stalled());

        drop(shared.lock().unwrap().take());
        assert!(chain.poll().is_empty());
        assert!(chain.is_stalled());

        let mut chain = registry.build_chain(&specs(&[("mute", &[])])).unwrap();
        chain.accept("x");
        chain.finish();
        assert!(chain.is_stalled());
    }
}
