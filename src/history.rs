// ============================================================================
// HISTORY — snapshot-based undo/redo over full-frame copies
// ============================================================================
//
// Each entry is an owned full-frame copy of the canvas.  Restore points are
// captured once per gesture (pointer-down), never per stamp.  The undo stack
// is bounded: overflow evicts the OLDEST entry.  Starting a new branch
// (capture or clear) discards everything on the redo stack.
// ============================================================================

use std::collections::VecDeque;

use crate::error::PainterResult;

/// Default undo depth (the interactive app captures with 12).
pub const DEFAULT_HISTORY_LIMIT: usize = 12;

/// Backing storage for snapshots.  On the GPU this is the render target
/// pool plus the persistent canvas target.
pub trait SnapshotStore {
    type Snapshot;

    /// Copy the current canvas into a freshly allocated snapshot.
    fn snapshot(&mut self) -> PainterResult<Self::Snapshot>;

    /// Overwrite the canvas contents with `snapshot` (the canvas keeps its
    /// own handle; only pixels change).
    fn restore(&mut self, snapshot: &Self::Snapshot) -> PainterResult<()>;

    /// Free the snapshot's resources.  Called exactly once per snapshot.
    fn release(&mut self, snapshot: Self::Snapshot);
}

pub struct HistoryManager<T> {
    undo_stack: VecDeque<T>,
    redo_stack: Vec<T>,
}

impl<T> HistoryManager<T> {
    pub fn new() -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Snapshots on the undo stack, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &T> {
        self.undo_stack.iter()
    }

    /// Push a copy of the current canvas as a restore point.
    ///
    /// On allocation failure nothing is pushed and the redo stack is left
    /// alone (the new branch never started).
    pub fn capture_restore_point<S>(&mut self, store: &mut S, limit: usize) -> PainterResult<()>
    where
        S: SnapshotStore<Snapshot = T>,
    {
        let snapshot = store.snapshot()?;
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > limit {
            if let Some(oldest) = self.undo_stack.pop_front() {
                store.release(oldest);
            }
        }
        self.drain_redo(store);
        tracing::debug!(undo = self.undo_stack.len(), "captured restore point");
        Ok(())
    }

    /// Step back one restore point.  Returns `false` when there is nothing
    /// to undo.
    pub fn undo<S>(&mut self, store: &mut S) -> PainterResult<bool>
    where
        S: SnapshotStore<Snapshot = T>,
    {
        if self.undo_stack.is_empty() {
            return Ok(false);
        }
        let current = store.snapshot()?;
        let Some(previous) = self.undo_stack.pop_back() else {
            store.release(current);
            return Ok(false);
        };
        if let Err(e) = store.restore(&previous) {
            self.undo_stack.push_back(previous);
            store.release(current);
            return Err(e);
        }
        store.release(previous);
        self.redo_stack.push(current);
        Ok(true)
    }

    /// Re-apply the most recently undone state.  Returns `false` when there
    /// is nothing to redo.
    pub fn redo<S>(&mut self, store: &mut S) -> PainterResult<bool>
    where
        S: SnapshotStore<Snapshot = T>,
    {
        if self.redo_stack.is_empty() {
            return Ok(false);
        }
        let current = store.snapshot()?;
        let Some(next) = self.redo_stack.pop() else {
            store.release(current);
            return Ok(false);
        };
        if let Err(e) = store.restore(&next) {
            self.redo_stack.push(next);
            store.release(current);
            return Err(e);
        }
        store.release(next);
        self.undo_stack.push_back(current);
        Ok(true)
    }

    /// Drop every snapshot on both stacks.  Irreversible.
    pub fn clear<S>(&mut self, store: &mut S)
    where
        S: SnapshotStore<Snapshot = T>,
    {
        for snapshot in self.undo_stack.drain(..) {
            store.release(snapshot);
        }
        self.drain_redo(store);
    }

    fn drain_redo<S>(&mut self, store: &mut S)
    where
        S: SnapshotStore<Snapshot = T>,
    {
        for snapshot in self.redo_stack.drain(..) {
            store.release(snapshot);
        }
    }
}

impl<T> Default for HistoryManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PainterError;

    /// Canvas is a single integer; snapshots are (serial, value) pairs.
    #[derive(Default)]
    struct MockStore {
        canvas: i32,
        next_serial: u32,
        live: Vec<u32>,
        fail_next_snapshot: bool,
    }

    impl SnapshotStore for MockStore {
        type Snapshot = (u32, i32);

        fn snapshot(&mut self) -> PainterResult<(u32, i32)> {
            if std::mem::take(&mut self.fail_next_snapshot) {
                return Err(PainterError::exhausted("mock"));
            }
            self.next_serial += 1;
            self.live.push(self.next_serial);
            Ok((self.next_serial, self.canvas))
        }

        fn restore(&mut self, snapshot: &(u32, i32)) -> PainterResult<()> {
            self.canvas = snapshot.1;
            Ok(())
        }

        fn release(&mut self, snapshot: (u32, i32)) {
            let pos = self.live.iter().position(|&s| s == snapshot.0);
            assert!(pos.is_some(), "double release of snapshot {}", snapshot.0);
            self.live.remove(pos.unwrap());
        }
    }

    #[test]
    fn depth_is_bounded_and_oldest_evicted() {
        let mut store = MockStore::default();
        let mut history = HistoryManager::new();
        let limit = 4;
        let k = 9;
        for _ in 0..k {
            history.capture_restore_point(&mut store, limit).unwrap();
        }
        assert_eq!(history.undo_depth(), limit);
        let oldest = history.undo_entries().next().unwrap().0;
        assert_eq!(oldest, (k - limit + 1) as u32);
        // Evicted snapshots were released.
        assert_eq!(store.live.len(), limit);
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut store = MockStore::default();
        let mut history = HistoryManager::new();

        history.capture_restore_point(&mut store, 10).unwrap();
        store.canvas = 42; // paint
        assert!(history.can_undo());

        assert!(history.undo(&mut store).unwrap());
        assert_eq!(store.canvas, 0);
        assert!(history.redo(&mut store).unwrap());
        assert_eq!(store.canvas, 42);
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn new_branch_discards_redo() {
        let mut store = MockStore::default();
        let mut history = HistoryManager::new();

        history.capture_restore_point(&mut store, 10).unwrap();
        store.canvas = 1;
        history.undo(&mut store).unwrap();
        assert!(history.can_redo());

        history.capture_restore_point(&mut store, 10).unwrap();
        store.canvas = 2;
        assert!(!history.redo(&mut store).unwrap());
        assert_eq!(store.canvas, 2);
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut store = MockStore::default();
        let mut history: HistoryManager<(u32, i32)> = HistoryManager::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.undo(&mut store).unwrap());
        assert!(!history.redo(&mut store).unwrap());
        assert!(store.live.is_empty());
    }

    #[test]
    fn clear_releases_everything() {
        let mut store = MockStore::default();
        let mut history = HistoryManager::new();
        for i in 0..3 {
            history.capture_restore_point(&mut store, 10).unwrap();
            store.canvas = i;
        }
        history.undo(&mut store).unwrap();
        history.clear(&mut store);
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 0);
        assert!(store.live.is_empty());
    }

    #[test]
    fn failed_capture_keeps_redo_branch() {
        let mut store = MockStore::default();
        let mut history = HistoryManager::new();
        history.capture_restore_point(&mut store, 10).unwrap();
        store.canvas = 5;
        history.undo(&mut store).unwrap();

        store.fail_next_snapshot = true;
        assert!(history.capture_restore_point(&mut store, 10).is_err());
        assert!(history.can_redo());
    }
}
