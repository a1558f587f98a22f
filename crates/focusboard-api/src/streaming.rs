//! Change-feed contract.
//!
//! The store notifies watchers that something changed; it does not ship
//! row data. Watchers respond by re-fetching the affected list (or the
//! board's lists) and treating the result as authoritative. This keeps
//! the feed cheap and makes delivery order irrelevant: the latest
//! refetch always wins.

use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

/// Which kind of row an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventEntity {
    List,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A change notification scoped to one subscribed board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEvent {
    pub entity: EventEntity,
    pub kind: EventKind,
    /// The list whose cards are affected. `None` means the feed could
    /// not scope the change; watchers should refresh every list they
    /// hold.
    pub list_id: Option<String>,
}

impl BoardEvent {
    pub fn card(kind: EventKind, list_id: impl Into<String>) -> Self {
        Self {
            entity: EventEntity::Card,
            kind,
            list_id: Some(list_id.into()),
        }
    }

    pub fn list(kind: EventKind, list_id: impl Into<String>) -> Self {
        Self {
            entity: EventEntity::List,
            kind,
            list_id: Some(list_id.into()),
        }
    }
}

/// Stream of change notifications for one board.
pub type EventStream = Pin<Box<dyn Stream<Item = BoardEvent> + Send>>;

/// Subscription interface offered by the backing store.
///
/// One subscription per board. The stream ends when the store shuts
/// down; dropping the stream unsubscribes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, board_id: &str) -> EventStream;
}
