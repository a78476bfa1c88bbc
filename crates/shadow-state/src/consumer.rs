//! Event sources and the background consumer handle.

use std::thread::JoinHandle;

use serde_json::Value;

use crate::StateError;

/// A blocking stream of raw JSON events.
///
/// `next_event` blocks until an event is available and returns `None` once
/// the stream has ended, which stops the consumer.
pub trait EventSource: Send + 'static {
    fn next_event(&mut self) -> Option<Value>;
}

impl EventSource for crossbeam_channel::Receiver<Value> {
    fn next_event(&mut self) -> Option<Value> {
        self.recv().ok()
    }
}

/// Adapts any iterator of events into an [`EventSource`].
#[derive(Debug)]
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Value>,
{
    pub fn new(events: impl IntoIterator<IntoIter = I, Item = Value>) -> Self {
        Self {
            inner: events.into_iter(),
        }
    }
}

impl<I> EventSource for IterSource<I>
where
    I: Iterator<Item = Value> + Send + 'static,
{
    fn next_event(&mut self) -> Option<Value> {
        self.inner.next()
    }
}

/// Handle to the running consumer thread.
///
/// Dropping the handle detaches the thread; it keeps running until its
/// source ends.
#[derive(Debug)]
pub struct ConsumerHandle {
    thread: JoinHandle<u64>,
}

impl ConsumerHandle {
    pub(crate) fn new(thread: JoinHandle<u64>) -> Self {
        Self { thread }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread.thread().name()
    }

    /// Wait for the source to end. Returns the number of events consumed.
    pub fn join(self) -> Result<u64, StateError> {
        self.thread.join().map_err(|_| StateError::ConsumerPanicked)
    }
}
