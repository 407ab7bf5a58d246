//! The set of live streams the mixer pulls from.

use std::sync::Arc;

use tracing::trace;

use crate::stream::SharedStream;

struct Entry {
    stream: SharedStream,
    /// Set during a pass when the stream finished or ran dry
    retired: bool,
}

/// Live streams, guarded by the manager's registry lock.
///
/// Entries are only ever removed by [`retire_marked`](Self::retire_marked)
/// (end of a mixing pass) or [`clear`](Self::clear) (teardown).
#[derive(Default)]
pub(crate) struct StreamRegistry {
    entries: Vec<Entry>,
}

impl StreamRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, stream: &SharedStream) -> bool {
        let ptr = Arc::as_ptr(stream) as *const ();
        self.entries
            .iter()
            .any(|e| Arc::as_ptr(&e.stream) as *const () == ptr)
    }

    /// Append a configured stream. Returns `false` if it is already present.
    pub fn insert(&mut self, stream: SharedStream) -> bool {
        if self.contains(&stream) {
            return false;
        }
        self.entries.push(Entry { stream, retired: false });
        true
    }

    pub fn streams(&self) -> impl Iterator<Item = &SharedStream> {
        self.entries.iter().map(|e| &e.stream)
    }

    /// Streams still taking part in the current pass.
    pub(crate) fn active_mut(&mut self) -> impl Iterator<Item = (&SharedStream, &mut bool)> {
        self.entries
            .iter_mut()
            .filter(|e| !e.retired)
            .map(|e| (&e.stream, &mut e.retired))
    }

    /// Drop every retired entry and stop it. Returns how many were removed.
    ///
    /// An entry whose stream is locked by its owner stays retired and is
    /// stopped on a later pass, so `stop` still runs exactly once and the
    /// audio thread never waits on a stream.
    pub fn retire_marked(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            if !e.retired {
                return true;
            }
            match e.stream.try_lock() {
                Some(mut source) => {
                    source.stop();
                    false
                }
                None => true,
            }
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            trace!(removed, remaining = self.entries.len(), "retired streams");
        }
        removed
    }

    /// Take every entry out, leaving the registry empty.
    pub fn clear(&mut self) -> Vec<SharedStream> {
        self.entries.drain(..).map(|e| e.stream).collect()
    }
}
