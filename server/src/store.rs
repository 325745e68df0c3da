//! Authoritative diagram state shared by every connection.
//!
//! Shapes live in a sharded concurrent map so mutations on different ids do
//! not contend. The store gate orders edits against whole-diagram reads: an
//! edit is applied and relayed while [`DiagramStore::edit`] is held, and a
//! resync or clear reads or replaces the diagram and dispatches the result
//! while [`DiagramStore::freeze`] is held. A newcomer therefore sees every
//! edit exactly once, either folded into its snapshot or as a relay after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use axum::body::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use drawboard_shared::Shape;
use tokio::sync::{RwLock as AsyncRwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Background {
    pub id: String,
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Shapes in first-insertion order.
    pub shapes: Vec<(String, Shape)>,
    pub background_id: Option<String>,
    pub user_count: u64,
}

struct Placed {
    order: u64,
    shape: Shape,
}

#[derive(Default)]
pub struct DiagramStore {
    gate: AsyncRwLock<()>,
    shapes: DashMap<String, Placed>,
    next_order: AtomicU64,
    background: RwLock<Option<Background>>,
    users: AtomicU64,
}

impl DiagramStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared gate for applying one edit and relaying it.
    pub async fn edit(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    /// Exclusive gate for snapshot-and-replay or clear-and-relay.
    pub async fn freeze(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Inserts or fully replaces a shape. Last write wins; a replaced shape
    /// keeps its place in the paint order.
    pub fn upsert_shape(&self, id: &str, shape: Shape) {
        match self.shapes.entry(id.to_string()) {
            Entry::Occupied(mut slot) => slot.get_mut().shape = shape,
            Entry::Vacant(slot) => {
                let order = self.next_order.fetch_add(1, Ordering::Relaxed);
                slot.insert(Placed { order, shape });
            }
        }
    }

    /// Appends coordinates to an existing shape.
    pub fn patch_shape(&self, id: &str, data: &[i32]) -> Result<(), StoreError> {
        let mut slot = self
            .shapes
            .get_mut(id)
            .ok_or_else(|| StoreError::ShapeNotFound(id.to_string()))?;
        slot.shape.data.extend_from_slice(data);
        Ok(())
    }

    pub fn remove_shape(&self, id: &str) -> Option<Shape> {
        self.shapes.remove(id).map(|(_, slot)| slot.shape)
    }

    /// Drops every shape and the background. The user count is untouched.
    pub fn clear(&self) {
        self.shapes.clear();
        *self
            .background
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn shape(&self, id: &str) -> Option<Shape> {
        self.shapes.get(id).map(|slot| slot.shape.clone())
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn set_background(&self, background: Background) {
        *self
            .background
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(background);
    }

    /// Returns the background only if `id` names the active one.
    pub fn background(&self, id: &str) -> Option<Background> {
        self.background
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|background| background.id == id)
            .cloned()
    }

    pub fn enter_user(&self) -> u64 {
        self.users.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrements the user count, never below zero.
    pub fn leave_user(&self) -> u64 {
        let previous = self
            .users
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or_else(|count| count);
        previous.saturating_sub(1)
    }

    pub fn user_count(&self) -> u64 {
        self.users.load(Ordering::SeqCst)
    }

    /// Copies the diagram. Callers that dispatch the copy hold [`Self::freeze`].
    pub fn snapshot(&self) -> Snapshot {
        let mut placed: Vec<(u64, String, Shape)> = self
            .shapes
            .iter()
            .map(|entry| (entry.order, entry.key().clone(), entry.shape.clone()))
            .collect();
        placed.sort_unstable_by_key(|(order, _, _)| *order);
        let background_id = self
            .background
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|background| background.id.clone());
        Snapshot {
            shapes: placed
                .into_iter()
                .map(|(_, id, shape)| (id, shape))
                .collect(),
            background_id,
            user_count: self.user_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use drawboard_shared::ShapeKind;

    use super::*;

    fn freehand(data: Vec<i32>) -> Shape {
        Shape::new(ShapeKind::Freehand, "#000000", 2, data)
    }

    fn background(id: &str) -> Background {
        Background {
            id: id.to_string(),
            bytes: Bytes::from_static(b"png"),
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn patches_append_in_order() {
        let store = DiagramStore::new();
        store.upsert_shape("s", freehand(vec![0, 0]));
        store.patch_shape("s", &[1, 2]).unwrap();
        store.patch_shape("s", &[3, 4]).unwrap();
        assert_eq!(store.shape("s").unwrap().data, vec![0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn patch_against_absent_shape_does_not_create_it() {
        let store = DiagramStore::new();
        assert_eq!(
            store.patch_shape("ghost", &[1, 1]),
            Err(StoreError::ShapeNotFound("ghost".to_string()))
        );
        assert!(store.shape("ghost").is_none());
        assert_eq!(store.shape_count(), 0);
    }

    #[test]
    fn upsert_replaces_whole_shape() {
        let store = DiagramStore::new();
        store.upsert_shape("s", freehand(vec![0, 0, 1, 1]));
        let replacement = Shape::new(ShapeKind::Ellipse, "#ff0000", 3, vec![5, 5, 9, 9]);
        store.upsert_shape("s", replacement.clone());
        assert_eq!(store.shape("s"), Some(replacement));
    }

    #[test]
    fn operations_on_one_id_leave_others_untouched() {
        let interleaved = DiagramStore::new();
        interleaved.upsert_shape("a", freehand(vec![0, 0]));
        interleaved.upsert_shape("b", freehand(vec![7, 7]));
        interleaved.patch_shape("a", &[1, 1]).unwrap();
        interleaved.patch_shape("b", &[8, 8]).unwrap();
        interleaved.remove_shape("a");
        interleaved.patch_shape("b", &[9, 9]).unwrap();
        interleaved.upsert_shape("a", freehand(vec![4, 4]));

        let isolated = DiagramStore::new();
        isolated.upsert_shape("b", freehand(vec![7, 7]));
        isolated.patch_shape("b", &[8, 8]).unwrap();
        isolated.patch_shape("b", &[9, 9]).unwrap();

        assert_eq!(interleaved.shape("b"), isolated.shape("b"));
    }

    #[test]
    fn clear_drops_shapes_and_background_but_keeps_users() {
        let store = DiagramStore::new();
        store.upsert_shape("s", freehand(vec![0, 0]));
        store.set_background(background("bg"));
        store.enter_user();
        store.clear();
        let snapshot = store.snapshot();
        assert!(snapshot.shapes.is_empty());
        assert_eq!(snapshot.background_id, None);
        assert_eq!(snapshot.user_count, 1);
    }

    #[test]
    fn snapshot_keeps_first_insertion_order() {
        let store = DiagramStore::new();
        for id in ["delta", "alpha", "charlie", "bravo"] {
            store.upsert_shape(id, freehand(vec![0, 0]));
        }
        store.upsert_shape("alpha", freehand(vec![1, 1]));
        store.patch_shape("charlie", &[2, 2]).unwrap();
        store.remove_shape("delta");
        store.upsert_shape("delta", freehand(vec![3, 3]));

        let order: Vec<_> = store
            .snapshot()
            .shapes
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(order, ["alpha", "charlie", "bravo", "delta"]);
    }

    #[test]
    fn background_lookup_requires_matching_id() {
        let store = DiagramStore::new();
        assert!(store.background("bg").is_none());
        store.set_background(background("bg"));
        assert_eq!(store.background("bg").unwrap().content_type, "image/png");
        assert!(store.background("other").is_none());
        store.set_background(background("bg2"));
        assert!(store.background("bg").is_none());
    }

    #[test]
    fn leave_is_clamped_at_zero() {
        let store = DiagramStore::new();
        assert_eq!(store.leave_user(), 0);
        assert_eq!(store.enter_user(), 1);
        assert_eq!(store.leave_user(), 0);
        assert_eq!(store.leave_user(), 0);
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn concurrent_enters_hand_out_every_count_once() {
        const N: u64 = 64;
        let store = Arc::new(DiagramStore::new());

        let mut seen: Vec<u64> = thread::scope(|scope| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    let store = store.clone();
                    scope.spawn(move || store.enter_user())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        seen.sort_unstable();
        assert_eq!(seen, (1..=N).collect::<Vec<_>>());

        let mut left: Vec<u64> = thread::scope(|scope| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    let store = store.clone();
                    scope.spawn(move || store.leave_user())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        left.sort_unstable();
        assert_eq!(left, (0..N).collect::<Vec<_>>());
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn concurrent_writers_on_distinct_ids() {
        let store = Arc::new(DiagramStore::new());
        thread::scope(|scope| {
            for writer in 0..8 {
                let store = store.clone();
                scope.spawn(move || {
                    let id = format!("shape-{writer}");
                    store.upsert_shape(&id, freehand(vec![]));
                    for step in 0..100 {
                        store.patch_shape(&id, &[step, step]).unwrap();
                    }
                });
            }
            let store = store.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    let snapshot = store.snapshot();
                    assert!(snapshot.shapes.iter().all(|(_, s)| s.data.len() % 2 == 0));
                }
            });
        });
        for writer in 0..8 {
            let shape = store.shape(&format!("shape-{writer}")).unwrap();
            let expected: Vec<i32> = (0..100).flat_map(|step| [step, step]).collect();
            assert_eq!(shape.data, expected);
        }
    }
}
