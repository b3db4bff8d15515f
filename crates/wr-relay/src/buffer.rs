//! The pending change buffer.
//!
//! One task appends, one task drains. Both go through a single mutex and the
//! drain swaps the whole vector out, so an append racing a flush lands either
//! in the batch being taken or in the fresh buffer, never both and never
//! neither.

use parking_lot::Mutex;
use wr_core::ChangeEvent;

/// Ordered, append-only buffer of changes awaiting the next flush.
///
/// # Examples
///
/// ```
/// use wr_core::{ChangeEvent, ChangeKind};
/// use wr_relay::PendingBuffer;
///
/// let buffer = PendingBuffer::new();
/// buffer.record(ChangeEvent::file("/d/a.txt", ChangeKind::Create));
/// assert_eq!(buffer.len(), 1);
///
/// let batch = buffer.take();
/// assert_eq!(batch.len(), 1);
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct PendingBuffer {
    events: Mutex<Vec<ChangeEvent>>,
}

impl PendingBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change, preserving arrival order.
    pub fn record(&self, event: ChangeEvent) {
        self.events.lock().push(event);
    }

    /// Takes every buffered change and leaves an empty buffer behind.
    #[must_use]
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of buffered changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use wr_core::ChangeKind;

    #[test]
    fn test_take_preserves_order_and_clears() {
        let buffer = PendingBuffer::new();
        for name in ["a", "b", "c"] {
            buffer.record(ChangeEvent::file(format!("/d/{name}"), ChangeKind::Create));
        }

        let batch = buffer.take();
        let paths: Vec<_> = batch.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/d/a", "/d/b", "/d/c"]);
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let buffer = PendingBuffer::new();
        let event = ChangeEvent::file("/d/a", ChangeKind::Remove);
        buffer.record(event.clone());
        buffer.record(event);
        assert_eq!(buffer.take().len(), 2);
    }

    #[test]
    fn test_concurrent_appends_land_in_exactly_one_batch() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 2_000;

        let buffer = Arc::new(PendingBuffer::new());
        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        buffer.record(ChangeEvent::file(format!("/d/{w}/{i}"), ChangeKind::Create));
                    }
                })
            })
            .collect();

        let mut batches = Vec::new();
        while writers.iter().any(|w| !w.is_finished()) {
            batches.push(buffer.take());
        }
        for writer in writers {
            writer.join().unwrap();
        }
        batches.push(buffer.take());

        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, WRITERS * PER_WRITER);

        let unique: HashSet<_> = batches.iter().flatten().map(|e| e.path.clone()).collect();
        assert_eq!(unique.len(), WRITERS * PER_WRITER);

        // Within one writer, order survives across batches.
        for w in 0..WRITERS {
            let prefix = format!("/d/{w}/");
            let seen: Vec<usize> = batches
                .iter()
                .flatten()
                .filter_map(|e| e.path.as_str().strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
