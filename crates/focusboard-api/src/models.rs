//! Entity rows and partial-update shapes.
//!
//! Rows mirror what the backing store persists. Positions are dense
//! 0-based integers, unique among siblings; everything else is opaque
//! payload as far as ordering is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level collection of lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ordered bucket of cards within a board.
///
/// `position` is the list's rank among its board's lists. At most one
/// list per board carries `is_focused`, and at most one carries
/// `is_dont_forget_box` (the catch-all list, created implicitly and
/// not user-deletable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub board_id: String,
    pub title: String,
    pub position: i64,
    pub is_focused: bool,
    pub is_dont_forget_box: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single card. `position` is unique and dense within `list_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub list_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for [`Board`]. The store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBoard {
    pub title: String,
    pub description: Option<String>,
    pub owner_id: String,
}

/// Insert shape for [`List`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewList {
    pub board_id: String,
    pub title: String,
    pub position: i64,
    pub is_dont_forget_box: bool,
}

/// Insert shape for [`Card`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    pub list_id: String,
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
}

/// Partial update for a card. `None` fields are left untouched.
///
/// `description` is doubly optional: the outer `None` means "keep",
/// `Some(None)` clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardPatch {
    pub list_id: Option<String>,
    pub position: Option<i64>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl CardPatch {
    /// Patch that only renumbers the card within its current list.
    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Patch that moves the card to another list at the given position.
    pub fn relocation(list_id: impl Into<String>, position: i64) -> Self {
        Self {
            list_id: Some(list_id.into()),
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list_id.is_none()
            && self.position.is_none()
            && self.title.is_none()
            && self.description.is_none()
    }
}

/// Partial update for a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPatch {
    pub position: Option<i64>,
    pub title: Option<String>,
    pub is_focused: Option<bool>,
}

impl ListPatch {
    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn focused(is_focused: bool) -> Self {
        Self {
            is_focused: Some(is_focused),
            ..Self::default()
        }
    }
}

/// Partial update for a board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl Card {
    /// Merge a patch into this row. Timestamps are the store's concern
    /// and are not touched here.
    pub fn apply(&mut self, patch: &CardPatch) {
        if let Some(list_id) = &patch.list_id {
            self.list_id = list_id.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

impl List {
    pub fn apply(&mut self, patch: &ListPatch) {
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(is_focused) = patch.is_focused {
            self.is_focused = is_focused;
        }
    }
}

impl Board {
    pub fn apply(&mut self, patch: &BoardPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

/// Entities that occupy a dense position among siblings.
///
/// The sequencing code sees siblings only through this trait; it never
/// inspects titles, flags, or timestamps.
pub trait Positioned {
    fn id(&self) -> &str;
    fn position(&self) -> i64;
}

impl Positioned for Card {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }
}

impl Positioned for List {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, list_id: &str, position: i64) -> Card {
        let now = Utc::now();
        Card {
            id: id.to_string(),
            list_id: list_id.to_string(),
            title: format!("Card {id}"),
            description: None,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn card_patch_merges_only_present_fields() {
        let mut c = card("a", "l1", 0);
        c.apply(&CardPatch::position(3));
        assert_eq!(c.position, 3);
        assert_eq!(c.list_id, "l1");

        c.apply(&CardPatch::relocation("l2", 0));
        assert_eq!(c.list_id, "l2");
        assert_eq!(c.position, 0);

        c.apply(&CardPatch {
            description: Some(Some("details".to_string())),
            ..CardPatch::default()
        });
        assert_eq!(c.description.as_deref(), Some("details"));

        c.apply(&CardPatch {
            description: Some(None),
            ..CardPatch::default()
        });
        assert_eq!(c.description, None);
    }

    #[test]
    fn empty_patch_is_detectable() {
        assert!(CardPatch::default().is_empty());
        assert!(!CardPatch::position(1).is_empty());
    }

    #[test]
    fn card_roundtrips_through_json() {
        let c = card("a", "l1", 2);
        let json = serde_json::to_string(&c).unwrap();
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
