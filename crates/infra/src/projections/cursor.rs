use std::collections::HashMap;
use std::sync::RwLock;

use storefront_core::AggregateId;

use super::ProjectionError;

/// Last applied sequence number per stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&aggregate_id).copied())
            .unwrap_or(0)
    }

    /// `Ok(true)` when `seq` is the next event to apply, `Ok(false)` for a
    /// duplicate, an error for a gap. Streams start at 1.
    pub fn should_apply(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self.last(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.should_apply(id, 1).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.should_apply(id, 1).unwrap());
        assert!(cursors.should_apply(id, 2).unwrap());
        assert!(matches!(
            cursors.should_apply(id, 4),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        ));
        assert!(cursors.should_apply(id, 0).is_err());
    }

    #[test]
    fn an_unseen_stream_must_start_at_one() {
        let cursors = StreamCursors::new();
        assert!(matches!(
            cursors.should_apply(AggregateId::new(), 2),
            Err(ProjectionError::NonMonotonicSequence { last: 0, found: 2 })
        ));
    }
}
