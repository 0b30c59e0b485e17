//! Hand-written fakes for the completion service and the document store.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    genai::{CompletionError, CompletionRequest, CompletionService},
    store::{DocumentStore, PersistenceError, StoredDocument},
};

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Behaviour {
    Canned,
    Fail { status: u16, message: String },
    Never,
}

#[derive(Debug)]
struct FakeState {
    behaviour: Behaviour,
    responses: VecDeque<Option<String>>,
    requests: Vec<CompletionRequest>,
}

/// Returns queued responses in order; an exhausted queue answers `None`.
#[derive(Debug, Clone)]
pub struct FakeCompletion {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCompletion {
    fn with_behaviour(behaviour: Behaviour, responses: VecDeque<Option<String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                behaviour,
                responses,
                requests: Vec::new(),
            })),
        }
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let queue = responses.into_iter().map(|r| r.map(Into::into)).collect();
        Self::with_behaviour(Behaviour::Canned, queue)
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self::with_behaviour(
            Behaviour::Fail {
                status,
                message: message.to_owned(),
            },
            VecDeque::new(),
        )
    }

    /// Never answers.
    pub fn never() -> Self {
        Self::with_behaviour(Behaviour::Never, VecDeque::new())
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, CompletionError> {
        let (behaviour, next) = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            let next = state.responses.pop_front().flatten();
            (state.behaviour.clone(), next)
        };

        match behaviour {
            Behaviour::Canned => Ok(next),
            Behaviour::Fail { status, message } => Err(CompletionError::Api { status, message }),
            Behaviour::Never => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// Records every successful append; fails appends whose `id` is listed.
#[derive(Debug, Default)]
pub struct RecordingStore {
    records: Mutex<Vec<(String, Value)>>,
    attempts: AtomicUsize,
    fail_ids: HashSet<String>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<(String, Value)> {
        self.records.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn append(&self, collection: &str, record: Value) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !record.is_object() {
            return Err(PersistenceError::NotAnObject);
        }
        let id = record["id"].as_str().unwrap_or_default();
        if self.fail_ids.contains(id) {
            return Err(PersistenceError::Database(sqlx::Error::PoolTimedOut));
        }
        self.records
            .lock()
            .unwrap()
            .push((collection.to_owned(), record));
        Ok(())
    }

    async fn recent(
        &self,
        collection: &str,
        community_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<StoredDocument>, PersistenceError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .records()
            .into_iter()
            .rev()
            .filter(|(c, _)| c == collection)
            .filter(|(_, r)| community_id.map_or(true, |id| r["communityId"] == id))
            .take(limit)
            .map(|(collection, record)| StoredDocument {
                id: Uuid::new_v4(),
                collection,
                record,
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Every append hangs forever.
#[derive(Debug, Default)]
pub struct PendingStore;

#[async_trait]
impl DocumentStore for PendingStore {
    async fn append(&self, _collection: &str, _record: Value) -> Result<(), PersistenceError> {
        std::future::pending().await
    }

    async fn recent(
        &self,
        _collection: &str,
        _community_id: Option<&str>,
        _limit: i64,
    ) -> Result<Vec<StoredDocument>, PersistenceError> {
        Ok(Vec::new())
    }
}
