//! Dense position sequencing.
//!
//! Positions within a list are the contiguous range `0..n`. These
//! functions compute the renumbering a structural change requires and
//! return it as a complete delta: every displaced sibling appears in
//! the result because every one of them needs a persisted write.
//! Partial renumbering is what breaks the range, so there are no
//! boundary-only shortcuts here.

use focusboard_api::Positioned;

/// `(id, new_position)` updates produced by a sequencing step.
pub type PositionDelta = Vec<(String, i64)>;

/// Position for a new sibling appended at the end.
pub fn append_position(sibling_count: usize) -> i64 {
    sibling_count as i64
}

/// Plan an insertion at `target_index` among `siblings` (ordered,
/// excluding the incoming item).
///
/// Returns the effective index (clamped to append when out of range)
/// and the shift every existing sibling at or after it must take. The
/// incoming item itself is the caller's to place at the returned index.
pub fn insert_at<T: Positioned>(siblings: &[T], target_index: usize) -> (i64, PositionDelta) {
    let index = target_index.min(siblings.len()) as i64;
    let displaced = siblings
        .iter()
        .filter(|s| s.position() >= index)
        .map(|s| (s.id().to_string(), s.position() + 1))
        .collect();
    (index, displaced)
}

/// Close the gap left by removing the sibling that held
/// `removed_position`. `remaining` must already exclude the removed
/// item.
pub fn remove_at<T: Positioned>(remaining: &[T], removed_position: i64) -> PositionDelta {
    remaining
        .iter()
        .filter(|s| s.position() > removed_position)
        .map(|s| (s.id().to_string(), s.position() - 1))
        .collect()
}

/// Move a sibling from `old_index` to `new_index` within the same
/// ordered slice. The span between the two indices shifts by one
/// toward the vacated slot; equal indices are a no-op.
///
/// `new_index` clamps to the last slot; the item stays a member, so
/// there is no appending past the end here.
pub fn reorder<T: Positioned>(siblings: &[T], old_index: usize, new_index: usize) -> PositionDelta {
    if siblings.is_empty() || old_index >= siblings.len() {
        return Vec::new();
    }
    let new_index = new_index.min(siblings.len() - 1);
    if old_index == new_index {
        return Vec::new();
    }

    let mut deltas: PositionDelta = if old_index < new_index {
        siblings[old_index + 1..=new_index]
            .iter()
            .map(|s| (s.id().to_string(), s.position() - 1))
            .collect()
    } else {
        siblings[new_index..old_index]
            .iter()
            .map(|s| (s.id().to_string(), s.position() + 1))
            .collect()
    };
    deltas.push((siblings[old_index].id().to_string(), new_index as i64));
    deltas
}

/// Whether `siblings` hold exactly the positions `0..n`.
pub fn is_dense<T: Positioned>(siblings: &[T]) -> bool {
    let mut positions: Vec<i64> = siblings.iter().map(|s| s.position()).collect();
    positions.sort_unstable();
    positions
        .iter()
        .enumerate()
        .all(|(i, p)| *p == i as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sibling {
        id: String,
        position: i64,
    }

    impl Positioned for Sibling {
        fn id(&self) -> &str {
            &self.id
        }

        fn position(&self) -> i64 {
            self.position
        }
    }

    fn siblings(ids: &[&str]) -> Vec<Sibling> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Sibling {
                id: id.to_string(),
                position: i as i64,
            })
            .collect()
    }

    fn applied(siblings: &[Sibling], deltas: &PositionDelta) -> Vec<(String, i64)> {
        let mut rows: Vec<(String, i64)> = siblings
            .iter()
            .map(|s| {
                let moved = deltas.iter().find(|(id, _)| id == &s.id);
                (s.id.clone(), moved.map_or(s.position, |(_, p)| *p))
            })
            .collect();
        rows.sort_by_key(|(_, p)| *p);
        rows
    }

    #[test]
    fn append_is_sibling_count() {
        assert_eq!(append_position(0), 0);
        assert_eq!(append_position(3), 3);
    }

    #[test]
    fn insert_shifts_everything_at_and_after_the_slot() {
        let sibs = siblings(&["a", "b", "c"]);
        let (index, displaced) = insert_at(&sibs, 1);
        assert_eq!(index, 1);
        assert_eq!(
            displaced,
            vec![("b".to_string(), 2), ("c".to_string(), 3)]
        );
    }

    #[test]
    fn insert_at_len_is_an_append() {
        let sibs = siblings(&["a", "b"]);
        let (index, displaced) = insert_at(&sibs, 2);
        assert_eq!(index, append_position(sibs.len()));
        assert!(displaced.is_empty());
    }

    #[test]
    fn insert_past_the_end_clamps_to_append() {
        let sibs = siblings(&["a"]);
        let (index, displaced) = insert_at(&sibs, 5);
        assert_eq!(index, 1);
        assert!(displaced.is_empty());
    }

    #[test]
    fn empty_list_accepts_only_position_zero() {
        let sibs: Vec<Sibling> = Vec::new();
        let (index, displaced) = insert_at(&sibs, 7);
        assert_eq!(index, 0);
        assert!(displaced.is_empty());
    }

    #[test]
    fn remove_closes_the_gap() {
        // a(0), b(1), c(2) with b removed
        let remaining = vec![
            Sibling {
                id: "a".to_string(),
                position: 0,
            },
            Sibling {
                id: "c".to_string(),
                position: 2,
            },
        ];
        assert_eq!(remove_at(&remaining, 1), vec![("c".to_string(), 1)]);
    }

    #[test]
    fn insert_then_remove_restores_the_others() {
        let sibs = siblings(&["a", "b", "c"]);
        let (index, displaced) = insert_at(&sibs, 1);

        // Apply the insertion, then remove the inserted item again.
        let mut after: Vec<Sibling> = sibs
            .iter()
            .map(|s| {
                let moved = displaced.iter().find(|(id, _)| id == &s.id);
                Sibling {
                    id: s.id.clone(),
                    position: moved.map_or(s.position, |(_, p)| *p),
                }
            })
            .collect();
        let undo = remove_at(&after, index);
        for (id, p) in &undo {
            after.iter_mut().find(|s| &s.id == id).unwrap().position = *p;
        }

        for (i, original) in sibs.iter().enumerate() {
            let restored = after.iter().find(|s| s.id == original.id).unwrap();
            assert_eq!(restored.position, original.position, "sibling {i}");
        }
    }

    #[test]
    fn reorder_toward_the_front() {
        let sibs = siblings(&["a", "b", "c"]);
        let deltas = reorder(&sibs, 1, 0);
        assert_eq!(
            applied(&sibs, &deltas),
            vec![
                ("b".to_string(), 0),
                ("a".to_string(), 1),
                ("c".to_string(), 2),
            ]
        );
    }

    #[test]
    fn reorder_toward_the_back() {
        let sibs = siblings(&["a", "b", "c", "d"]);
        let deltas = reorder(&sibs, 0, 2);
        assert_eq!(
            applied(&sibs, &deltas),
            vec![
                ("b".to_string(), 0),
                ("c".to_string(), 1),
                ("a".to_string(), 2),
                ("d".to_string(), 3),
            ]
        );
    }

    #[test]
    fn reorder_to_same_slot_is_a_noop() {
        let sibs = siblings(&["a", "b"]);
        assert!(reorder(&sibs, 1, 1).is_empty());
    }

    #[test]
    fn reorder_clamps_to_last_slot() {
        let sibs = siblings(&["a", "b", "c"]);
        let deltas = reorder(&sibs, 0, 9);
        assert_eq!(
            applied(&sibs, &deltas),
            vec![
                ("b".to_string(), 0),
                ("c".to_string(), 1),
                ("a".to_string(), 2),
            ]
        );
    }

    #[test]
    fn density_check() {
        assert!(is_dense(&siblings(&["a", "b", "c"])));
        assert!(is_dense(&Vec::<Sibling>::new()));
        let gappy = vec![
            Sibling {
                id: "a".to_string(),
                position: 0,
            },
            Sibling {
                id: "b".to_string(),
                position: 2,
            },
        ];
        assert!(!is_dense(&gappy));
    }
}
