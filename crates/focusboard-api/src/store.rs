//! Store traits the engine writes through.
//!
//! Any row store with per-row CRUD and ordered reads satisfies these;
//! the engine never assumes a wire format. Reads ordered by `position`
//! are the only query shape required.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    Board, BoardPatch, Card, CardPatch, List, ListPatch, NewBoard, NewCard, NewList,
};

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Insert a card; the store assigns id and timestamps.
    async fn insert(&self, card: NewCard) -> Result<Card, StoreError>;

    async fn update(&self, id: &str, patch: CardPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All cards of a list, ordered by position ascending.
    async fn list_by_list(&self, list_id: &str) -> Result<Vec<Card>, StoreError>;
}

#[async_trait]
pub trait ListStore: Send + Sync {
    async fn insert(&self, list: NewList) -> Result<List, StoreError>;

    async fn update(&self, id: &str, patch: ListPatch) -> Result<(), StoreError>;

    /// Delete a list. The store cascades to the list's cards.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All lists of a board, ordered by position ascending.
    async fn list_by_board(&self, board_id: &str) -> Result<Vec<List>, StoreError>;

    /// Atomically focus the given list and unfocus every other list of
    /// its board. Opaque to positioning.
    async fn toggle_focus(&self, list_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn insert(&self, board: NewBoard) -> Result<Board, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Board>, StoreError>;

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Board>, StoreError>;

    async fn update(&self, id: &str, patch: BoardPatch) -> Result<(), StoreError>;

    /// Delete a board. The store cascades to its lists and their cards.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
