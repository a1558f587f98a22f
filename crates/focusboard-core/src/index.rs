//! In-memory view of a board: which cards belong to which list, in
//! what order, plus the lists' own ranks.
//!
//! The index is a cache of the store, owned by the caller's event loop
//! and passed `&mut` into every engine call. It is updated
//! optimistically ahead of store writes and corrected by change-feed
//! refetches, so it may be briefly wrong; the store is the record.
//!
//! Ordering queries sort by position and break ties by observed
//! insertion order. A feed race can momentarily hand the index
//! duplicate positions; callers still get a stable, usable order
//! instead of an error.

use std::collections::HashMap;

use focusboard_api::{Card, CardPatch, List, ListPatch};
use tracing::debug;

#[derive(Debug, Default)]
pub struct BoardIndex {
    cards: HashMap<String, Card>,
    lists: HashMap<String, List>,
    /// Observed insertion order, the ordering tiebreaker.
    arrivals: HashMap<String, u64>,
    arrival_counter: u64,
    /// Monotonic sequence handed to each move; tags snapshots so a
    /// stale rollback can be recognized and skipped.
    move_counter: u64,
    /// Per-card sequence of the latest move batch that wrote it.
    card_writes: HashMap<String, u64>,
    list_writes: HashMap<String, u64>,
}

/// The pre-move state of exactly the rows a move batch touches.
///
/// `None` entries record that the row did not exist when the snapshot
/// was taken (a rolled-back creation removes it again).
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    seq: u64,
    cards: Vec<(String, Option<Card>)>,
    lists: Vec<(String, Option<List>)>,
}

impl BoardIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_arrival(&mut self, id: &str) {
        if !self.arrivals.contains_key(id) {
            self.arrival_counter += 1;
            self.arrivals.insert(id.to_string(), self.arrival_counter);
        }
    }

    fn arrival(&self, id: &str) -> u64 {
        self.arrivals.get(id).copied().unwrap_or(u64::MAX)
    }

    /// Bulk-load list rows, e.g. from an initial fetch.
    pub fn load_lists(&mut self, lists: Vec<List>) {
        for list in lists {
            self.note_arrival(&list.id);
            self.lists.insert(list.id.clone(), list);
        }
    }

    /// Bulk-load card rows, e.g. from an initial fetch.
    pub fn load_cards(&mut self, cards: Vec<Card>) {
        for card in cards {
            self.note_arrival(&card.id);
            self.cards.insert(card.id.clone(), card);
        }
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn list(&self, id: &str) -> Option<&List> {
        self.lists.get(id)
    }

    /// Cards of a list, position ascending, arrival order as tiebreak.
    pub fn cards_in(&self, list_id: &str) -> Vec<Card> {
        let mut members: Vec<&Card> = self
            .cards
            .values()
            .filter(|c| c.list_id == list_id)
            .collect();
        members.sort_by_key(|c| (c.position, self.arrival(&c.id)));
        members.into_iter().cloned().collect()
    }

    /// Lists of a board, rank ascending, arrival order as tiebreak.
    pub fn lists_in(&self, board_id: &str) -> Vec<List> {
        let mut members: Vec<&List> = self
            .lists
            .values()
            .filter(|l| l.board_id == board_id)
            .collect();
        members.sort_by_key(|l| (l.position, self.arrival(&l.id)));
        members.into_iter().cloned().collect()
    }

    /// Hand out the sequence number for a starting move.
    pub fn begin_move(&mut self) -> u64 {
        self.move_counter += 1;
        self.move_counter
    }

    /// Capture the current state of the given rows, tagged with the
    /// move's sequence number.
    pub fn snapshot(&self, seq: u64, card_ids: &[String], list_ids: &[String]) -> IndexSnapshot {
        IndexSnapshot {
            seq,
            cards: card_ids
                .iter()
                .map(|id| (id.clone(), self.cards.get(id).cloned()))
                .collect(),
            lists: list_ids
                .iter()
                .map(|id| (id.clone(), self.lists.get(id).cloned()))
                .collect(),
        }
    }

    /// Merge partial card updates under a move sequence. Rows missing
    /// from the index (a feed raced a delete) are skipped.
    pub fn apply_card_deltas(&mut self, seq: u64, updates: &[(String, CardPatch)]) {
        for (id, patch) in updates {
            match self.cards.get_mut(id) {
                Some(card) => {
                    card.apply(patch);
                    self.card_writes.insert(id.clone(), seq);
                }
                None => debug!(card = %id, "skipping delta for card no longer in index"),
            }
        }
    }

    /// Merge partial list updates under a move sequence.
    pub fn apply_list_deltas(&mut self, seq: u64, updates: &[(String, ListPatch)]) {
        for (id, patch) in updates {
            match self.lists.get_mut(id) {
                Some(list) => {
                    list.apply(patch);
                    self.list_writes.insert(id.clone(), seq);
                }
                None => debug!(list = %id, "skipping delta for list no longer in index"),
            }
        }
    }

    /// Add a store-confirmed card (creation path; not move-tracked).
    pub fn insert_card(&mut self, card: Card) {
        self.note_arrival(&card.id);
        self.cards.insert(card.id.clone(), card);
    }

    /// Add a store-confirmed list.
    pub fn insert_list(&mut self, list: List) {
        self.note_arrival(&list.id);
        self.lists.insert(list.id.clone(), list);
    }

    /// Optimistically drop a card under a move sequence.
    pub fn remove_card(&mut self, seq: u64, id: &str) {
        self.cards.remove(id);
        self.card_writes.insert(id.to_string(), seq);
    }

    /// Optimistically drop a list under a move sequence.
    pub fn remove_list(&mut self, seq: u64, id: &str) {
        self.lists.remove(id);
        self.list_writes.insert(id.to_string(), seq);
    }

    /// Replace a list's full membership with freshly fetched rows.
    ///
    /// Inbound state is authoritative: anything the index held for
    /// this list — including in-flight optimistic positions — is
    /// overwritten, and that overwrite is only worth a debug line.
    pub fn replace_list(&mut self, list_id: &str, cards: Vec<Card>) {
        let stale: Vec<String> = self
            .cards
            .values()
            .filter(|c| c.list_id == list_id)
            .map(|c| c.id.clone())
            .collect();
        let differs = stale.len() != cards.len()
            || cards
                .iter()
                .any(|c| self.cards.get(&c.id).map(|held| held != c).unwrap_or(true));
        if differs && !stale.is_empty() {
            debug!(
                list = %list_id,
                "refetched list differs from held state; overwriting"
            );
        }
        for id in stale {
            self.cards.remove(&id);
        }
        self.load_cards(cards);
    }

    /// Replace a board's list rows with freshly fetched rows. Cards of
    /// lists that vanished are dropped too, mirroring the store's
    /// cascade.
    pub fn replace_board(&mut self, board_id: &str, lists: Vec<List>) {
        let stale: Vec<String> = self
            .lists
            .values()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.id.clone())
            .collect();
        for id in &stale {
            self.lists.remove(id);
        }
        let kept: Vec<String> = lists.iter().map(|l| l.id.clone()).collect();
        for gone in stale.iter().filter(|id| !kept.contains(id)) {
            let orphaned: Vec<String> = self
                .cards
                .values()
                .filter(|c| &c.list_id == gone)
                .map(|c| c.id.clone())
                .collect();
            for id in orphaned {
                self.cards.remove(&id);
            }
        }
        self.load_lists(lists);
    }

    /// Roll rows back to their snapshotted state.
    ///
    /// A row rewritten by a move newer than the snapshot is left
    /// alone: its failed batch lost the race and reverting it would
    /// clobber the newer move's view.
    pub fn restore(&mut self, snapshot: IndexSnapshot) {
        for (id, prior) in snapshot.cards {
            if self.card_writes.get(&id).copied().unwrap_or(0) > snapshot.seq {
                debug!(card = %id, "skipping stale rollback; a newer move owns this card");
                continue;
            }
            match prior {
                Some(card) => {
                    self.note_arrival(&id);
                    self.cards.insert(id, card);
                }
                None => {
                    self.cards.remove(&id);
                }
            }
        }
        for (id, prior) in snapshot.lists {
            if self.list_writes.get(&id).copied().unwrap_or(0) > snapshot.seq {
                debug!(list = %id, "skipping stale rollback; a newer move owns this list");
                continue;
            }
            match prior {
                Some(list) => {
                    self.note_arrival(&id);
                    self.lists.insert(id, list);
                }
                None => {
                    self.lists.remove(&id);
                }
            }
        }
    }
}
