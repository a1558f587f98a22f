//! Move orchestration.
//!
//! Translates user-level gestures (drop a card at an index, delete a
//! list, reorder lists) into full renumbering batches: read current
//! state from the [`BoardIndex`], plan the renumbering with the
//! sequencer, apply it to the index optimistically, then persist the
//! whole batch. A rejected batch rolls the index back to its pre-move
//! snapshot and surfaces a retryable error.
//!
//! The index is caller-owned and passed `&mut` into every call; the
//! reconciler itself holds only store handles.

use std::sync::Arc;

use focusboard_api::{
    BoardError, Card, CardPatch, CardStore, List, ListPatch, ListStore, NewCard, NewList,
    StoreError,
};
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::index::BoardIndex;
use crate::position;

/// Title given to the implicitly created catch-all list.
pub const DONT_FORGET_TITLE: &str = "Don't Forget Box";

pub struct MoveReconciler {
    cards: Arc<dyn CardStore>,
    lists: Arc<dyn ListStore>,
}

impl MoveReconciler {
    pub fn new(cards: Arc<dyn CardStore>, lists: Arc<dyn ListStore>) -> Self {
        Self { cards, lists }
    }

    /// Move a card to `target_index` in `to_list`.
    ///
    /// Same-list moves renumber the span between the old and new slot;
    /// cross-list moves close the source gap and open a destination
    /// slot. Either way every displaced sibling is renumbered and
    /// persisted in one logical batch together with the moved card.
    pub async fn move_card(
        &self,
        index: &mut BoardIndex,
        card_id: &str,
        from_list: &str,
        to_list: &str,
        target_index: usize,
    ) -> Result<(), BoardError> {
        let card = index
            .card(card_id)
            .cloned()
            .ok_or_else(|| BoardError::invalid(format!("unknown card {card_id}")))?;
        if card.list_id != from_list {
            return Err(BoardError::invalid(format!(
                "card {card_id} is not in list {from_list}"
            )));
        }
        if index.list(from_list).is_none() {
            return Err(BoardError::invalid(format!("unknown list {from_list}")));
        }
        if index.list(to_list).is_none() {
            return Err(BoardError::invalid(format!("unknown list {to_list}")));
        }

        let batch = if from_list == to_list {
            let siblings = index.cards_in(from_list);
            let old_index = siblings
                .iter()
                .position(|c| c.id == card_id)
                .ok_or_else(|| BoardError::invalid(format!("card {card_id} left the index")))?;
            position::reorder(&siblings, old_index, target_index)
                .into_iter()
                .map(|(id, p)| (id, CardPatch::position(p)))
                .collect::<Vec<_>>()
        } else {
            let source: Vec<Card> = index
                .cards_in(from_list)
                .into_iter()
                .filter(|c| c.id != card_id)
                .collect();
            let destination = index.cards_in(to_list);
            let (slot, opened) = position::insert_at(&destination, target_index);

            let mut batch: Vec<(String, CardPatch)> = position::remove_at(&source, card.position)
                .into_iter()
                .chain(opened)
                .map(|(id, p)| (id, CardPatch::position(p)))
                .collect();
            batch.push((card_id.to_string(), CardPatch::relocation(to_list, slot)));
            batch
        };

        if batch.is_empty() {
            return Ok(());
        }
        self.commit_card_batch(index, card_id, batch).await
    }

    /// Create a card at the end of a list. The index gains the card
    /// only once the store accepts it, so failure leaves nothing to
    /// undo.
    pub async fn create_card(
        &self,
        index: &mut BoardIndex,
        list_id: &str,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<Card, BoardError> {
        if index.list(list_id).is_none() {
            return Err(BoardError::invalid(format!("unknown list {list_id}")));
        }
        let position = position::append_position(index.cards_in(list_id).len());
        let created = self
            .cards
            .insert(NewCard {
                list_id: list_id.to_string(),
                title: title.into(),
                description,
                position,
            })
            .await?;
        index.insert_card(created.clone());
        Ok(created)
    }

    /// Delete a card and close the gap among its former siblings.
    pub async fn delete_card(
        &self,
        index: &mut BoardIndex,
        card_id: &str,
    ) -> Result<(), BoardError> {
        let card = index
            .card(card_id)
            .cloned()
            .ok_or_else(|| BoardError::invalid(format!("unknown card {card_id}")))?;
        let remaining: Vec<Card> = index
            .cards_in(&card.list_id)
            .into_iter()
            .filter(|c| c.id != card_id)
            .collect();
        let renumber: Vec<(String, CardPatch)> = position::remove_at(&remaining, card.position)
            .into_iter()
            .map(|(id, p)| (id, CardPatch::position(p)))
            .collect();

        let seq = index.begin_move();
        let mut touched: Vec<String> = renumber.iter().map(|(id, _)| id.clone()).collect();
        touched.push(card_id.to_string());
        let snap = index.snapshot(seq, &touched, &[]);

        index.remove_card(seq, card_id);
        index.apply_card_deltas(seq, &renumber);
        debug!(card = %card_id, renumbered = renumber.len(), "deleting card");

        let outcome = futures::try_join!(
            self.cards.delete(card_id),
            self.write_card_batch(&renumber)
        );
        if let Err(source) = outcome {
            warn!(card = %card_id, error = %source, "delete batch failed, rolling back");
            index.restore(snap);
            return Err(BoardError::WriteFailed { source });
        }
        Ok(())
    }

    /// Reorder a list among its board's lists.
    pub async fn move_list(
        &self,
        index: &mut BoardIndex,
        list_id: &str,
        target_index: usize,
    ) -> Result<(), BoardError> {
        let list = index
            .list(list_id)
            .cloned()
            .ok_or_else(|| BoardError::invalid(format!("unknown list {list_id}")))?;
        let siblings = index.lists_in(&list.board_id);
        let old_index = siblings
            .iter()
            .position(|l| l.id == list_id)
            .ok_or_else(|| BoardError::invalid(format!("list {list_id} left the index")))?;
        let batch: Vec<(String, ListPatch)> =
            position::reorder(&siblings, old_index, target_index)
                .into_iter()
                .map(|(id, p)| (id, ListPatch::position(p)))
                .collect();
        if batch.is_empty() {
            return Ok(());
        }

        let seq = index.begin_move();
        let touched: Vec<String> = batch.iter().map(|(id, _)| id.clone()).collect();
        let snap = index.snapshot(seq, &[], &touched);
        index.apply_list_deltas(seq, &batch);
        debug!(list = %list_id, writes = batch.len(), "applying list reorder");

        if let Err(source) = self.write_list_batch(&batch).await {
            warn!(list = %list_id, error = %source, "list reorder failed, rolling back");
            index.restore(snap);
            return Err(BoardError::WriteFailed { source });
        }
        Ok(())
    }

    /// Create a list at the end of a board.
    pub async fn create_list(
        &self,
        index: &mut BoardIndex,
        board_id: &str,
        title: impl Into<String>,
    ) -> Result<List, BoardError> {
        let position = position::append_position(index.lists_in(board_id).len());
        let created = self
            .lists
            .insert(NewList {
                board_id: board_id.to_string(),
                title: title.into(),
                position,
                is_dont_forget_box: false,
            })
            .await?;
        index.insert_list(created.clone());
        Ok(created)
    }

    /// Make sure the board has its catch-all list, creating it at the
    /// end of the board if missing. Idempotent.
    pub async fn ensure_dont_forget_box(
        &self,
        index: &mut BoardIndex,
        board_id: &str,
    ) -> Result<List, BoardError> {
        let lists = index.lists_in(board_id);
        if let Some(existing) = lists.iter().find(|l| l.is_dont_forget_box) {
            return Ok(existing.clone());
        }
        let created = self
            .lists
            .insert(NewList {
                board_id: board_id.to_string(),
                title: DONT_FORGET_TITLE.to_string(),
                position: position::append_position(lists.len()),
                is_dont_forget_box: true,
            })
            .await?;
        index.insert_list(created.clone());
        Ok(created)
    }

    /// Delete a list (the store cascades its cards) and close the rank
    /// gap among the lists that followed it. The deleted list's own
    /// cards cease to exist and need no renumbering. The catch-all
    /// list is refused.
    pub async fn delete_list(
        &self,
        index: &mut BoardIndex,
        list_id: &str,
    ) -> Result<(), BoardError> {
        let list = index
            .list(list_id)
            .cloned()
            .ok_or_else(|| BoardError::invalid(format!("unknown list {list_id}")))?;
        if list.is_dont_forget_box {
            return Err(BoardError::invalid(format!(
                "list {list_id} is the catch-all list and cannot be deleted"
            )));
        }
        let remaining: Vec<List> = index
            .lists_in(&list.board_id)
            .into_iter()
            .filter(|l| l.id != list_id)
            .collect();
        let ranks: Vec<(String, ListPatch)> = position::remove_at(&remaining, list.position)
            .into_iter()
            .map(|(id, p)| (id, ListPatch::position(p)))
            .collect();

        let member_cards: Vec<String> = index
            .cards_in(list_id)
            .into_iter()
            .map(|c| c.id)
            .collect();

        let seq = index.begin_move();
        let mut touched_lists: Vec<String> = ranks.iter().map(|(id, _)| id.clone()).collect();
        touched_lists.push(list_id.to_string());
        let snap = index.snapshot(seq, &member_cards, &touched_lists);

        index.remove_list(seq, list_id);
        for card_id in &member_cards {
            index.remove_card(seq, card_id);
        }
        index.apply_list_deltas(seq, &ranks);
        debug!(list = %list_id, cascaded = member_cards.len(), "deleting list");

        let outcome = futures::try_join!(self.lists.delete(list_id), self.write_list_batch(&ranks));
        if let Err(source) = outcome {
            warn!(list = %list_id, error = %source, "list delete failed, rolling back");
            index.restore(snap);
            return Err(BoardError::WriteFailed { source });
        }
        Ok(())
    }

    /// Flip a list's focus flag, keeping at most one focused list per
    /// board. Applied optimistically and reverted if the store refuses,
    /// the same contract as a move.
    pub async fn toggle_focus(
        &self,
        index: &mut BoardIndex,
        list_id: &str,
    ) -> Result<(), BoardError> {
        let list = index
            .list(list_id)
            .cloned()
            .ok_or_else(|| BoardError::invalid(format!("unknown list {list_id}")))?;

        let mut flips: Vec<(String, ListPatch)> =
            vec![(list_id.to_string(), ListPatch::focused(!list.is_focused))];
        if !list.is_focused {
            for other in index.lists_in(&list.board_id) {
                if other.id != list_id && other.is_focused {
                    flips.push((other.id.clone(), ListPatch::focused(false)));
                }
            }
        }

        let seq = index.begin_move();
        let touched: Vec<String> = flips.iter().map(|(id, _)| id.clone()).collect();
        let snap = index.snapshot(seq, &[], &touched);
        index.apply_list_deltas(seq, &flips);

        if let Err(source) = self.lists.toggle_focus(list_id).await {
            warn!(list = %list_id, error = %source, "focus toggle failed, reverting");
            index.restore(snap);
            return Err(BoardError::WriteFailed { source });
        }
        Ok(())
    }

    /// Optimistically apply a card batch, then persist it; roll back
    /// the index if the store refuses any write.
    async fn commit_card_batch(
        &self,
        index: &mut BoardIndex,
        card_id: &str,
        batch: Vec<(String, CardPatch)>,
    ) -> Result<(), BoardError> {
        let seq = index.begin_move();
        let touched: Vec<String> = batch.iter().map(|(id, _)| id.clone()).collect();
        let snap = index.snapshot(seq, &touched, &[]);
        index.apply_card_deltas(seq, &batch);
        debug!(card = %card_id, writes = batch.len(), "applying move batch");

        if let Err(source) = self.write_card_batch(&batch).await {
            warn!(card = %card_id, error = %source, "move batch failed, rolling back");
            index.restore(snap);
            return Err(BoardError::WriteFailed { source });
        }
        Ok(())
    }

    /// Issue a batch's writes concurrently. The rows are independent,
    /// but the batch is one logical unit: any failure fails the whole
    /// move.
    async fn write_card_batch(&self, batch: &[(String, CardPatch)]) -> Result<(), StoreError> {
        try_join_all(
            batch
                .iter()
                .map(|(id, patch)| self.cards.update(id, patch.clone())),
        )
        .await?;
        Ok(())
    }

    async fn write_list_batch(&self, batch: &[(String, ListPatch)]) -> Result<(), StoreError> {
        try_join_all(
            batch
                .iter()
                .map(|(id, patch)| self.lists.update(id, patch.clone())),
        )
        .await?;
        Ok(())
    }
}
