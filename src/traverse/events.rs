// src/traverse/events.rs
// =============================================================================
// Progress events emitted while a traversal runs.
//
// Callers subscribe with on(kind, handler). Handlers run synchronously on
// whichever task emitted the event, so they should be quick (print a line,
// bump a counter) and must not block.
// =============================================================================

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    Visited,
    Found,
    Error,
    Finished,
}

#[derive(Debug)]
pub enum Event<'a, N> {
    /// The root is about to be scheduled
    Started { root: &'a N },
    /// A node passed the visited check and was submitted to the queue
    Visited { node: &'a N },
    /// A leaf matched the predicate
    Found { node: &'a N },
    /// A node failed (absorbed or fatal)
    Error {
        node: &'a N,
        kind: ErrorKind,
        message: &'a str,
    },
    /// The run settled without a fatal error
    Finished { hits: usize, errors: usize },
}

impl<N> Event<'_, N> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Started { .. } => EventKind::Started,
            Event::Visited { .. } => EventKind::Visited,
            Event::Found { .. } => EventKind::Found,
            Event::Error { .. } => EventKind::Error,
            Event::Finished { .. } => EventKind::Finished,
        }
    }
}

type Handler<N> = Box<dyn Fn(&Event<'_, N>) + Send + Sync>;

/// Subscribers of one traversal
pub struct Observers<N> {
    handlers: Vec<(EventKind, Handler<N>)>,
}

impl<N> Default for Observers<N> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }
}

impl<N> Observers<N> {
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&Event<'_, N>) + Send + Sync + 'static,
    {
        self.handlers.push((kind, Box::new(handler)));
    }

    pub fn emit(&self, event: &Event<'_, N>) {
        let kind = event.kind();
        for (wanted, handler) in &self.handlers {
            if *wanted == kind {
                handler(event);
            }
        }
    }
}
