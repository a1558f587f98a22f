//! Shared types for the focusboard engine
//!
//! This crate defines the entity rows, the store traits the engine
//! writes through, the change-feed contract it listens on, and the
//! error taxonomy. It contains no ordering logic of its own.

pub mod error;
pub mod models;
pub mod store;
pub mod streaming;

pub use error::{BoardError, StoreError};
pub use models::{
    Board, BoardPatch, Card, CardPatch, List, ListPatch, NewBoard, NewCard, NewList, Positioned,
};
pub use store::{BoardStore, CardStore, ListStore};
pub use streaming::{BoardEvent, ChangeFeed, EventEntity, EventKind, EventStream};
