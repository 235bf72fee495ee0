//! Variable store with wake-on-set
//!
//! Variables live in a nested map addressed by [`VarPath`]. A lookup that
//! cannot resolve yet parks a waiter on the path's *first* segment; the next
//! `set` under that segment drains (wakes) every waiter parked there, and the
//! owner re-attempts the whole lookup. Waiters are one-shot: an owner whose
//! path is still unresolvable after a wake subscribes again.
//!
//! Only sets touching the first segment wake a wait. A path that becomes
//! resolvable some other way stays parked until the next such set.

use super::errors::RenderError;
use super::types::{Val, VarPath};
use std::collections::HashMap;

/// Raised by every successful `set`
#[derive(Debug)]
pub struct Notification<W> {
    /// First segment of the path that was set
    pub key: String,
    /// Waiters that were parked on `key`, in registration order
    pub woken: Vec<W>,
}

/// Nested key/value store, generic over the waiter payload it parks
#[derive(Debug)]
pub struct VariableStore<W> {
    vars: HashMap<String, Val>,
    waiters: HashMap<String, Vec<W>>,
}

impl<W> Default for VariableStore<W> {
    fn default() -> Self {
        Self {
            vars: HashMap::new(),
            waiters: HashMap::new(),
        }
    }
}

impl<W> VariableStore<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a path against the current values
    ///
    /// Succeeds iff every segment but the last is an existing object and the
    /// last segment is present.
    pub fn resolve(&self, path: &VarPath) -> Option<&Val> {
        let (last, parents) = path.segments().split_last()?;
        let mut scope = &self.vars;
        for segment in parents {
            match scope.get(segment)? {
                Val::Obj(map) => scope = map,
                _ => return None,
            }
        }
        scope.get(last)
    }

    /// Park a waiter until the next set under the path's first segment
    pub fn subscribe(&mut self, path: &VarPath, waiter: W) {
        let key = path.root().unwrap_or_default().to_string();
        self.waiters.entry(key).or_default().push(waiter);
    }

    /// Write `value` at `path` and wake the waiters parked on its first segment
    ///
    /// Intermediate segments are never created: each must already hold an
    /// object. Anything else is rejected and the store is left unchanged.
    pub fn set(&mut self, path: &VarPath, value: Val) -> Result<Notification<W>, RenderError> {
        let malformed = |reason: String| RenderError::MalformedPath {
            path: path.clone(),
            reason,
        };

        let Some((last, parents)) = path.segments().split_last() else {
            return Err(malformed("empty path".to_string()));
        };

        let mut scope = &mut self.vars;
        for segment in parents {
            scope = match scope.get_mut(segment) {
                Some(Val::Obj(map)) => map,
                Some(other) => {
                    return Err(malformed(format!(
                        "'{}' holds {}, not an object",
                        segment,
                        kind_of(other)
                    )))
                }
                None => return Err(malformed(format!("'{}' is not set", segment))),
            };
        }
        scope.insert(last.clone(), value);

        let key = path.segments()[0].clone();
        let woken = self.waiters.remove(&key).unwrap_or_default();

        Ok(Notification { key, woken })
    }

    /// Number of parked waiters across all keys
    pub fn pending(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }
}

fn kind_of(value: &Val) -> &'static str {
    match value {
        Val::Null => "null",
        Val::Bool(_) => "a bool",
        Val::Num(_) => "a number",
        Val::Str(_) => "a string",
        Val::Obj(_) => "an object",
        Val::Stream(_) => "a stream",
    }
}
