use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Result, ViewModelError};
use crate::db::LocalDao;
use crate::models::Entity;
use crate::repository::{EntityFeed, Repository};

/// What a screen shows for one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum UiState<T> {
    Loading,
    Empty,
    Success(Vec<T>),
    Error(String),
}

impl<T> UiState<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            UiState::Empty
        } else {
            UiState::Success(items)
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, UiState::Loading)
    }

    /// Loaded items; empty for every state but `Success`.
    pub fn items(&self) -> &[T] {
        match self {
            UiState::Success(items) => items,
            _ => &[],
        }
    }
}

/// Follows one repository feed and republishes it as `UiState`.
///
/// The following task is aborted when this is dropped.
pub struct CollectionState<E: Entity> {
    feed: EntityFeed<E>,
    state: watch::Receiver<UiState<E>>,
    task: JoinHandle<()>,
}

impl<E: Entity> CollectionState<E> {
    pub fn bind<D: LocalDao<E>>(repo: Arc<Repository<E, D>>) -> Self {
        let (tx, state) = watch::channel(UiState::Loading);
        let feed = repo.get_all();
        let mut updates = repo.get_all();

        let task = tokio::spawn(async move {
            if let Err(e) = repo.ensure_loaded().await {
                tracing::warn!(collection = %E::COLLECTION, "load failed: {}", e);
                tx.send_replace(UiState::Error(e.to_string()));
            }
            loop {
                let snapshot = updates.borrow_and_update().clone();
                if let Some(items) = snapshot {
                    tx.send_replace(UiState::from_items(items));
                }
                if updates.changed().await.is_err() {
                    break;
                }
            }
        });

        Self { feed, state, task }
    }

    pub fn state(&self) -> UiState<E> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState<E>> {
        self.state.clone()
    }

    /// Waits for the first emission or load failure.
    pub async fn ready(&self) -> UiState<E> {
        let mut state = self.state.clone();
        let settled = match state.wait_for(|s| !s.is_loading()).await {
            Ok(current) => current.clone(),
            Err(_) => UiState::Error("collection closed".to_string()),
        };
        settled
    }

    /// Like `ready`, but a failed load is an error.
    pub async fn loaded(&self) -> Result<()> {
        match self.ready().await {
            UiState::Error(message) => Err(ViewModelError::Unavailable {
                collection: E::COLLECTION,
                message,
            }),
            _ => Ok(()),
        }
    }

    /// Current contents of the underlying feed. Reflects a save as soon as
    /// it returns.
    pub fn items(&self) -> Vec<E> {
        self.feed.borrow().clone().unwrap_or_default()
    }

    pub fn find(&self, id: &str) -> Option<E> {
        self.feed
            .borrow()
            .as_ref()
            .and_then(|items| items.iter().find(|e| e.id() == id).cloned())
    }
}

impl<E: Entity> Drop for CollectionState<E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
