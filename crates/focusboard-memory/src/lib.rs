//! In-memory store with a broadcast change feed.
//!
//! A HashMap-backed implementation of the store traits, used as the
//! test double and offline backend. Behaves like the real service in
//! the ways the engine cares about: rows get store-assigned ids and
//! timestamps, reads come back position-ordered, deletes cascade, and
//! every mutation is announced on a per-board change feed.
//!
//! Two affordances exist purely for tests: deterministic counter ids
//! (so property-based runs replay identically) and write-failure
//! injection (so rollback paths can be exercised).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use focusboard_api::{
    Board, BoardEvent, BoardPatch, BoardStore, Card, CardPatch, CardStore, ChangeFeed,
    EventEntity, EventKind, EventStream, List, ListPatch, ListStore, NewBoard, NewCard, NewList,
    StoreError,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug)]
struct State {
    boards: HashMap<String, Board>,
    lists: HashMap<String, List>,
    cards: HashMap<String, Card>,
    id_counter: u64,
    deterministic_ids: bool,
    fail_budget: u32,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        if self.deterministic_ids {
            self.id_counter += 1;
            format!("{prefix}-{}", self.id_counter)
        } else {
            Uuid::new_v4().to_string()
        }
    }

    /// Consume one unit of injected failure, if armed.
    fn take_failure(&mut self) -> Result<(), StoreError> {
        if self.fail_budget > 0 {
            self.fail_budget -= 1;
            return Err(StoreError::Rejected {
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }

    fn board_of_list(&self, list_id: &str) -> Option<String> {
        self.lists.get(list_id).map(|l| l.board_id.clone())
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<(String, BoardEvent)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Counter-based ids: the same operation sequence always produces
    /// the same rows, which property-based tests rely on.
    pub fn with_deterministic_ids() -> Self {
        Self::build(true)
    }

    fn build(deterministic_ids: bool) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(RwLock::new(State {
                boards: HashMap::new(),
                lists: HashMap::new(),
                cards: HashMap::new(),
                id_counter: 0,
                deterministic_ids,
                fail_budget: 0,
            })),
            events,
        }
    }

    /// Arm failure injection: the next `count` mutating calls are
    /// rejected.
    pub fn fail_next_writes(&self, count: u32) {
        self.state.write().unwrap().fail_budget = count;
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn emit(&self, board_id: &str, event: BoardEvent) {
        // Fire-and-forget; nobody listening is fine.
        let _ = self.events.send((board_id.to_string(), event));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardStore for MemoryStore {
    async fn insert(&self, card: NewCard) -> Result<Card, StoreError> {
        let mut state = self.state.write().unwrap();
        let board_id = state
            .board_of_list(&card.list_id)
            .ok_or_else(|| StoreError::not_found("list", &card.list_id))?;
        state.take_failure()?;

        let now = Self::now();
        let row = Card {
            id: state.next_id("card"),
            list_id: card.list_id,
            title: card.title,
            description: card.description,
            position: card.position,
            created_at: now,
            updated_at: now,
        };
        state.cards.insert(row.id.clone(), row.clone());
        drop(state);

        self.emit(&board_id, BoardEvent::card(EventKind::Created, &row.list_id));
        Ok(row)
    }

    async fn update(&self, id: &str, patch: CardPatch) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.cards.contains_key(id) {
            return Err(StoreError::not_found("card", id));
        }
        state.take_failure()?;

        let card = state.cards.get_mut(id).unwrap();
        let old_list = card.list_id.clone();
        card.apply(&patch);
        card.updated_at = Self::now();
        let new_list = card.list_id.clone();
        let old_board = state.board_of_list(&old_list);
        let new_board = state.board_of_list(&new_list);
        drop(state);

        if let Some(board) = &old_board {
            self.emit(board, BoardEvent::card(EventKind::Updated, &old_list));
        }
        if new_list != old_list {
            if let Some(board) = &new_board {
                self.emit(board, BoardEvent::card(EventKind::Updated, &new_list));
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.cards.contains_key(id) {
            return Err(StoreError::not_found("card", id));
        }
        state.take_failure()?;

        let card = state.cards.remove(id).unwrap();
        let board = state.board_of_list(&card.list_id);
        drop(state);

        if let Some(board) = board {
            self.emit(&board, BoardEvent::card(EventKind::Deleted, &card.list_id));
        }
        Ok(())
    }

    async fn list_by_list(&self, list_id: &str) -> Result<Vec<Card>, StoreError> {
        let state = self.state.read().unwrap();
        let mut rows: Vec<Card> = state
            .cards
            .values()
            .filter(|c| c.list_id == list_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
        Ok(rows)
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn insert(&self, list: NewList) -> Result<List, StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.boards.contains_key(&list.board_id) {
            return Err(StoreError::not_found("board", &list.board_id));
        }
        if list.is_dont_forget_box
            && state
                .lists
                .values()
                .any(|l| l.board_id == list.board_id && l.is_dont_forget_box)
        {
            return Err(StoreError::Constraint {
                message: format!("board {} already has a catch-all list", list.board_id),
            });
        }
        state.take_failure()?;

        let now = Self::now();
        let row = List {
            id: state.next_id("list"),
            board_id: list.board_id,
            title: list.title,
            position: list.position,
            is_focused: false,
            is_dont_forget_box: list.is_dont_forget_box,
            created_at: now,
            updated_at: now,
        };
        state.lists.insert(row.id.clone(), row.clone());
        drop(state);

        self.emit(&row.board_id, BoardEvent::list(EventKind::Created, &row.id));
        Ok(row)
    }

    async fn update(&self, id: &str, patch: ListPatch) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.lists.contains_key(id) {
            return Err(StoreError::not_found("list", id));
        }
        state.take_failure()?;

        let list = state.lists.get_mut(id).unwrap();
        list.apply(&patch);
        list.updated_at = Self::now();
        let board_id = list.board_id.clone();
        drop(state);

        self.emit(&board_id, BoardEvent::list(EventKind::Updated, id));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.lists.contains_key(id) {
            return Err(StoreError::not_found("list", id));
        }
        state.take_failure()?;

        let list = state.lists.remove(id).unwrap();
        state.cards.retain(|_, c| c.list_id != list.id);
        drop(state);

        self.emit(&list.board_id, BoardEvent::list(EventKind::Deleted, id));
        Ok(())
    }

    async fn list_by_board(&self, board_id: &str) -> Result<Vec<List>, StoreError> {
        let state = self.state.read().unwrap();
        let mut rows: Vec<List> = state
            .lists
            .values()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.position, &a.id).cmp(&(b.position, &b.id)));
        Ok(rows)
    }

    async fn toggle_focus(&self, list_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        let (board_id, was_focused) = match state.lists.get(list_id) {
            Some(list) => (list.board_id.clone(), list.is_focused),
            None => return Err(StoreError::not_found("list", list_id)),
        };
        state.take_failure()?;

        let now = Self::now();
        let mut flipped: Vec<String> = Vec::new();
        for list in state.lists.values_mut() {
            if list.board_id != board_id {
                continue;
            }
            let focus = if list.id == list_id {
                !was_focused
            } else {
                false
            };
            if list.is_focused != focus {
                list.is_focused = focus;
                list.updated_at = now;
                flipped.push(list.id.clone());
            }
        }
        drop(state);

        for id in flipped {
            self.emit(&board_id, BoardEvent::list(EventKind::Updated, &id));
        }
        Ok(())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn insert(&self, board: NewBoard) -> Result<Board, StoreError> {
        let mut state = self.state.write().unwrap();
        state.take_failure()?;

        let now = Self::now();
        let row = Board {
            id: state.next_id("board"),
            title: board.title,
            description: board.description,
            owner_id: board.owner_id,
            created_at: now,
            updated_at: now,
        };
        state.boards.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn get(&self, id: &str) -> Result<Option<Board>, StoreError> {
        Ok(self.state.read().unwrap().boards.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Board>, StoreError> {
        let state = self.state.read().unwrap();
        let mut rows: Vec<Board> = state
            .boards
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update(&self, id: &str, patch: BoardPatch) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.boards.contains_key(id) {
            return Err(StoreError::not_found("board", id));
        }
        state.take_failure()?;

        let board = state.boards.get_mut(id).unwrap();
        board.apply(&patch);
        board.updated_at = Self::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap();
        if !state.boards.contains_key(id) {
            return Err(StoreError::not_found("board", id));
        }
        state.take_failure()?;

        state.boards.remove(id);
        let gone: Vec<String> = state
            .lists
            .values()
            .filter(|l| l.board_id == id)
            .map(|l| l.id.clone())
            .collect();
        state.lists.retain(|_, l| l.board_id != id);
        state.cards.retain(|_, c| !gone.contains(&c.list_id));
        drop(state);

        self.emit(
            id,
            BoardEvent {
                entity: EventEntity::List,
                kind: EventKind::Deleted,
                list_id: None,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, board_id: &str) -> EventStream {
        let rx = self.events.subscribe();
        let board_id = board_id.to_string();
        let stream = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok((board, event)) if board == board_id => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "change feed lagged; notifications dropped");
                None
            }
        });
        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_board(store: &MemoryStore) -> Board {
        BoardStore::insert(
            store,
            NewBoard {
                title: "Week".to_string(),
                description: None,
                owner_id: "owner".to_string(),
            },
        )
        .await
        .unwrap()
    }

    async fn seed_list(store: &MemoryStore, board_id: &str, title: &str, position: i64) -> List {
        ListStore::insert(
            store,
            NewList {
                board_id: board_id.to_string(),
                title: title.to_string(),
                position,
                is_dont_forget_box: false,
            },
        )
        .await
        .unwrap()
    }

    async fn seed_card(store: &MemoryStore, list_id: &str, title: &str, position: i64) -> Card {
        CardStore::insert(
            store,
            NewCard {
                list_id: list_id.to_string(),
                title: title.to_string(),
                description: None,
                position,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn cards_read_back_position_ordered() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let list = seed_list(&store, &board.id, "Todo", 0).await;
        seed_card(&store, &list.id, "second", 1).await;
        seed_card(&store, &list.id, "first", 0).await;

        let rows = store.list_by_list(&list.id).await.unwrap();
        let titles: Vec<&str> = rows.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn card_insert_requires_a_list() {
        let store = MemoryStore::new();
        let err = CardStore::insert(
            &store,
            NewCard {
                list_id: "missing".to_string(),
                title: "x".to_string(),
                description: None,
                position: 0,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn toggle_focus_keeps_at_most_one_focused_list() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let a = seed_list(&store, &board.id, "A", 0).await;
        let b = seed_list(&store, &board.id, "B", 1).await;

        store.toggle_focus(&a.id).await.unwrap();
        store.toggle_focus(&b.id).await.unwrap();

        let lists = store.list_by_board(&board.id).await.unwrap();
        let focused: Vec<&str> = lists
            .iter()
            .filter(|l| l.is_focused)
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(focused, vec![b.id.as_str()]);

        // Toggling the focused list again clears focus entirely.
        store.toggle_focus(&b.id).await.unwrap();
        let lists = store.list_by_board(&board.id).await.unwrap();
        assert!(lists.iter().all(|l| !l.is_focused));
    }

    #[tokio::test]
    async fn second_catch_all_list_is_rejected() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let new_box = |position| NewList {
            board_id: board.id.clone(),
            title: "Don't Forget Box".to_string(),
            position,
            is_dont_forget_box: true,
        };
        ListStore::insert(&store, new_box(0)).await.unwrap();
        let err = ListStore::insert(&store, new_box(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint { .. }));
    }

    #[tokio::test]
    async fn list_delete_cascades_to_cards() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let list = seed_list(&store, &board.id, "Doomed", 0).await;
        let card = seed_card(&store, &list.id, "x", 0).await;

        ListStore::delete(&store, &list.id).await.unwrap();
        assert!(store.list_by_board(&board.id).await.unwrap().is_empty());
        let err = CardStore::update(&store, &card.id, CardPatch::position(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn relocation_announces_both_lists() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let a = seed_list(&store, &board.id, "A", 0).await;
        let b = seed_list(&store, &board.id, "B", 1).await;
        let card = seed_card(&store, &a.id, "x", 0).await;

        let mut feed = store.subscribe(&board.id).await;
        CardStore::update(&store, &card.id, CardPatch::relocation(&b.id, 0))
            .await
            .unwrap();

        let first = feed.next().await.unwrap();
        let second = feed.next().await.unwrap();
        assert_eq!(first, BoardEvent::card(EventKind::Updated, &a.id));
        assert_eq!(second, BoardEvent::card(EventKind::Updated, &b.id));
    }

    #[tokio::test]
    async fn events_are_scoped_to_the_subscribed_board() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let other = seed_board(&store).await;
        let list = seed_list(&store, &board.id, "A", 0).await;
        let other_list = seed_list(&store, &other.id, "B", 0).await;

        let mut feed = store.subscribe(&board.id).await;
        seed_card(&store, &other_list.id, "elsewhere", 0).await;
        seed_card(&store, &list.id, "here", 0).await;

        let event = feed.next().await.unwrap();
        assert_eq!(event, BoardEvent::card(EventKind::Created, &list.id));
    }

    #[tokio::test]
    async fn injected_failures_reject_exactly_n_writes() {
        let store = MemoryStore::with_deterministic_ids();
        let board = seed_board(&store).await;
        let list = seed_list(&store, &board.id, "A", 0).await;
        let card = seed_card(&store, &list.id, "x", 0).await;

        store.fail_next_writes(1);
        let err = CardStore::update(&store, &card.id, CardPatch::position(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        CardStore::update(&store, &card.id, CardPatch::position(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deterministic_ids_are_stable_across_runs() {
        let make = || async {
            let store = MemoryStore::with_deterministic_ids();
            let board = seed_board(&store).await;
            let list = seed_list(&store, &board.id, "A", 0).await;
            let card = seed_card(&store, &list.id, "x", 0).await;
            (board.id, list.id, card.id)
        };
        assert_eq!(make().await, make().await);
    }
}
