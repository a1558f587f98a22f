//! Ordered-position reconciliation for kanban boards.
//!
//! Keeps each list's card positions a dense `0..n` range while moves,
//! inserts, and deletes race against an eventually-consistent store:
//! - [`position`] computes the renumbering a change requires;
//! - [`index::BoardIndex`] is the in-memory, optimistically updated
//!   view the UI reads;
//! - [`reconciler::MoveReconciler`] turns gestures into persisted
//!   batches with rollback on failure;
//! - [`sync::FeedSynchronizer`] folds change-feed notifications back
//!   into the index.

pub mod index;
pub mod position;
pub mod reconciler;
pub mod sync;

pub use index::{BoardIndex, IndexSnapshot};
pub use reconciler::{DONT_FORGET_TITLE, MoveReconciler};
pub use sync::FeedSynchronizer;
