//! Linear undo/redo stack of full model snapshots.

use crate::model::ModelSnapshot;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<ModelSnapshot>,
    index: usize,
    limit: usize,
}

impl History {
    /// `limit` counts every retained entry, including the current one.
    pub fn new(initial: ModelSnapshot, limit: usize) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
            limit: limit.max(1),
        }
    }

    /// Drop everything and start over from `initial`.
    pub fn reset(&mut self, initial: ModelSnapshot) {
        self.entries.clear();
        self.entries.push(initial);
        self.index = 0;
    }

    /// Record a new state. Any redo tail is discarded; the oldest entries are
    /// evicted past the limit. Returns false if `snapshot` has the same cards
    /// and joins as the current entry.
    pub fn push(&mut self, snapshot: ModelSnapshot) -> bool {
        if self
            .entries
            .get(self.index)
            .is_some_and(|current| current.same_structure(&snapshot))
        {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(snapshot);
        self.index = self.entries.len() - 1;

        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
            self.index -= excess;
        }
        true
    }

    pub fn undo(&mut self) -> Option<&ModelSnapshot> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    pub fn redo(&mut self) -> Option<&ModelSnapshot> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    pub fn current(&self) -> Option<&ModelSnapshot> {
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableCardLayout;

    fn snap(x: f64) -> ModelSnapshot {
        ModelSnapshot {
            layout: vec![TableCardLayout {
                table_name: "t".into(),
                x,
                y: 0.0,
                collapsed: false,
            }],
            ..ModelSnapshot::default()
        }
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut h = History::new(snap(0.0), 10);
        h.push(snap(1.0));
        h.push(snap(2.0));
        assert_eq!(h.undo(), Some(&snap(1.0)));
        assert_eq!(h.undo(), Some(&snap(0.0)));
        assert_eq!(h.undo(), None);
        assert_eq!(h.redo(), Some(&snap(1.0)));
        assert_eq!(h.redo(), Some(&snap(2.0)));
        assert_eq!(h.redo(), None);
    }

    #[test]
    fn test_push_discards_redo_tail() {
        let mut h = History::new(snap(0.0), 10);
        h.push(snap(1.0));
        h.push(snap(2.0));
        h.undo();
        h.push(snap(3.0));
        assert!(!h.can_redo());
        assert_eq!(h.len(), 3);
        assert_eq!(h.undo(), Some(&snap(1.0)));
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut h = History::new(snap(0.0), 3);
        for i in 1..=5 {
            h.push(snap(i as f64));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.current(), Some(&snap(5.0)));
        h.undo();
        assert_eq!(h.undo(), Some(&snap(3.0)));
        assert!(!h.can_undo());
    }

    #[test]
    fn test_identical_push_ignored() {
        let mut h = History::new(snap(0.0), 10);
        assert!(!h.push(snap(0.0)));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_viewport_only_change_ignored() {
        let mut h = History::new(snap(0.0), 10);
        let mut panned = snap(0.0);
        panned.viewport.zoom = 2.0;
        panned.viewport.scroll_x = 150.0;
        assert!(!h.push(panned));
        assert!(!h.can_undo());
        assert!(h.push(snap(1.0)));
    }
}
