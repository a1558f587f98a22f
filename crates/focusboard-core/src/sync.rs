//! Change-feed ingestion.
//!
//! Every inbound event is treated the same way: re-fetch the affected
//! list's cards (or the board's lists) and replace that slice of the
//! index wholesale. The refetched rows are authoritative; optimistic
//! state they overwrite was going to be confirmed or corrected anyway,
//! so a mismatch is a log line, not an error.

use std::sync::Arc;

use focusboard_api::{BoardEvent, CardStore, EventEntity, EventStream, ListStore, StoreError};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::index::BoardIndex;
use crate::position;

pub struct FeedSynchronizer {
    cards: Arc<dyn CardStore>,
    lists: Arc<dyn ListStore>,
}

impl FeedSynchronizer {
    pub fn new(cards: Arc<dyn CardStore>, lists: Arc<dyn ListStore>) -> Self {
        Self { cards, lists }
    }

    /// Load a board's lists and all of their cards into the index,
    /// e.g. on first subscription.
    pub async fn hydrate(
        &self,
        index: &mut BoardIndex,
        board_id: &str,
    ) -> Result<(), StoreError> {
        let lists = self.lists.list_by_board(board_id).await?;
        index.replace_board(board_id, lists);
        for list in index.lists_in(board_id) {
            self.refresh_list(index, &list.id).await?;
        }
        Ok(())
    }

    /// Apply one feed event by re-fetching whatever it touches.
    pub async fn apply_event(
        &self,
        index: &mut BoardIndex,
        board_id: &str,
        event: &BoardEvent,
    ) -> Result<(), StoreError> {
        debug!(?event, board = %board_id, "applying feed event");
        match event.entity {
            EventEntity::Card => match &event.list_id {
                Some(list_id) => self.refresh_list(index, list_id).await,
                None => {
                    // Unscoped change: refresh every list we hold.
                    for list in index.lists_in(board_id) {
                        self.refresh_list(index, &list.id).await?;
                    }
                    Ok(())
                }
            },
            EventEntity::List => {
                let lists = self.lists.list_by_board(board_id).await?;
                index.replace_board(board_id, lists);
                Ok(())
            }
        }
    }

    /// Consume a feed until it ends, logging rather than propagating
    /// per-event fetch errors; the next event retries the same ground.
    pub async fn run(&self, index: &mut BoardIndex, board_id: &str, mut events: EventStream) {
        while let Some(event) = events.next().await {
            if let Err(error) = self.apply_event(index, board_id, &event).await {
                warn!(%error, ?event, "feed refresh failed; awaiting next event");
            }
        }
        info!(board = %board_id, "change feed closed");
    }

    async fn refresh_list(
        &self,
        index: &mut BoardIndex,
        list_id: &str,
    ) -> Result<(), StoreError> {
        let cards = self.cards.list_by_list(list_id).await?;
        if !position::is_dense(&cards) {
            warn!(
                list = %list_id,
                count = cards.len(),
                "refetched cards are not densely positioned; keeping stable order"
            );
        }
        index.replace_list(list_id, cards);
        Ok(())
    }
}
