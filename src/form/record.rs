//! Record state flags and the fetch cursor of single-record blocks.

use crate::db::source::RecordId;

/// Per-record bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Database id of the row this record shows, once fetched or inserted.
    pub id: Option<RecordId>,
    /// Whether the record mirrors a database row.
    pub fetched: bool,
    /// Whether the user changed the record since it was fetched or cleared.
    pub changed: bool,
}

impl Record {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// FetchCursor
// ---------------------------------------------------------------------------

/// Ids produced by the last bulk load of a single-record block, with the
/// position of the record currently shown.
///
/// Deleted rows keep their slot (as `None`) so that positions stay stable and
/// navigation simply skips them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchCursor {
    slots: Vec<Option<RecordId>>,
    position: Option<usize>,
}

impl FetchCursor {
    /// Replace the result set. The cursor points at nothing until `seek`.
    pub fn reset(&mut self, ids: impl IntoIterator<Item = RecordId>) {
        self.slots = ids.into_iter().map(Some).collect();
        self.position = None;
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.position = None;
    }

    /// Point at `position`. Out-of-range positions are ignored.
    pub fn seek(&mut self, position: usize) {
        if position < self.slots.len() {
            self.position = Some(position);
        }
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// The id at the current position, unless it was deleted.
    pub fn current(&self) -> Option<RecordId> {
        self.position.and_then(|p| self.slots.get(p).copied().flatten())
    }

    /// Find the nearest live slot `step` away from the current position,
    /// continuing in the same direction past deleted slots.
    pub fn find(&self, step: isize) -> Option<(usize, RecordId)> {
        let start = self.position?;
        if step == 0 {
            return None;
        }
        let direction = step.signum();
        let mut index = start as isize + step;
        while index >= 0 && (index as usize) < self.slots.len() {
            if let Some(id) = self.slots[index as usize] {
                return Some((index as usize, id));
            }
            index += direction;
        }
        None
    }

    /// Mark the slot at the current position as deleted.
    pub fn mark_current_deleted(&mut self) {
        if let Some(slot) = self.position.and_then(|p| self.slots.get_mut(p)) {
            *slot = None;
        }
    }

    /// Number of live ids.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(ids: &[i64]) -> FetchCursor {
        let mut cursor = FetchCursor::default();
        cursor.reset(ids.iter().copied().map(RecordId));
        cursor
    }

    #[test]
    fn reset_leaves_cursor_unpositioned() {
        let c = cursor(&[1, 2]);
        assert_eq!(c.position(), None);
        assert_eq!(c.current(), None);
        assert_eq!(c.find(1), None);
    }

    #[test]
    fn find_forward_and_backward() {
        let mut c = cursor(&[1, 2, 3]);
        c.seek(1);
        assert_eq!(c.find(1), Some((2, RecordId(3))));
        assert_eq!(c.find(-1), Some((0, RecordId(1))));
        c.seek(2);
        assert_eq!(c.find(1), None);
    }

    #[test]
    fn find_skips_deleted_slots() {
        let mut c = cursor(&[1, 2, 3]);
        c.seek(1);
        c.mark_current_deleted();
        assert_eq!(c.current(), None);
        assert_eq!(c.live_count(), 2);

        c.seek(0);
        assert_eq!(c.find(1), Some((2, RecordId(3))));
    }

    #[test]
    fn seek_out_of_range_is_ignored() {
        let mut c = cursor(&[1]);
        c.seek(4);
        assert_eq!(c.position(), None);
    }

    #[test]
    fn zero_step_finds_nothing() {
        let mut c = cursor(&[1, 2]);
        c.seek(0);
        assert_eq!(c.find(0), None);
    }
}
