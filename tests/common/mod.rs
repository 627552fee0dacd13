#![allow(dead_code)]

//! Shared test doubles: a scripted mock adapter and cache stores.

use async_trait::async_trait;
use db_pipeline::{
    Adapter, CacheSlot, CacheStore, ExecError, ExecOptions, ExecResult, Params, QueryResult,
    TransactionHandle, TransactionRequest,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of adapter activity across a test.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Adapter whose failures are scripted per operation.
///
/// Every call appends an event of the form `op:name` (plus the source text
/// for query/statement) to the log, so tests can assert both counts and
/// ordering.
pub struct MockAdapter {
    name: String,
    events: EventLog,
    query_errors: Mutex<VecDeque<ExecError>>,
    statement_errors: Mutex<VecDeque<ExecError>>,
    begin_errors: Mutex<VecDeque<ExecError>>,
    commit_errors: Mutex<VecDeque<ExecError>>,
    rollback_errors: Mutex<VecDeque<ExecError>>,
    uncacheable: bool,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: event_log(),
            query_errors: Mutex::new(VecDeque::new()),
            statement_errors: Mutex::new(VecDeque::new()),
            begin_errors: Mutex::new(VecDeque::new()),
            commit_errors: Mutex::new(VecDeque::new()),
            rollback_errors: Mutex::new(VecDeque::new()),
            uncacheable: false,
        }
    }

    /// Record activity into a log shared with other adapters.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Produce results that refuse the caching capability.
    pub fn with_uncacheable_results(mut self) -> Self {
        self.uncacheable = true;
        self
    }

    /// Queue an error for the next query call; later calls succeed again.
    pub fn script_query_error(&self, err: ExecError) {
        self.query_errors.lock().unwrap().push_back(err);
    }

    pub fn script_statement_error(&self, err: ExecError) {
        self.statement_errors.lock().unwrap().push_back(err);
    }

    pub fn script_begin_error(&self, err: ExecError) {
        self.begin_errors.lock().unwrap().push_back(err);
    }

    pub fn script_commit_error(&self, err: ExecError) {
        self.commit_errors.lock().unwrap().push_back(err);
    }

    pub fn script_rollback_error(&self, err: ExecError) {
        self.rollback_errors.lock().unwrap().push_back(err);
    }

    /// Number of recorded events starting with `op:name`.
    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{op}:{}", self.name);
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(&prefix))
            .count()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn pop(queue: &Mutex<VecDeque<ExecError>>) -> Option<ExecError> {
        queue.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin(&self, request: Option<&TransactionRequest>) -> ExecResult<TransactionHandle> {
        self.record(format!("begin:{}", self.name));
        match Self::pop(&self.begin_errors) {
            Some(err) => Err(err),
            None => Ok(TransactionHandle::new(&self.name, request)),
        }
    }

    async fn commit(&self, _handle: &TransactionHandle) -> ExecResult<()> {
        self.record(format!("commit:{}", self.name));
        match Self::pop(&self.commit_errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn rollback(&self, _handle: &TransactionHandle) -> ExecResult<()> {
        self.record(format!("rollback:{}", self.name));
        match Self::pop(&self.rollback_errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn query(
        &self,
        source: &str,
        params: Option<&Params>,
        _options: Option<&ExecOptions>,
    ) -> ExecResult<QueryResult> {
        self.record(format!("query:{}:{source}", self.name));
        if let Some(err) = Self::pop(&self.query_errors) {
            return Err(err);
        }
        let mut row = serde_json::Map::new();
        row.insert("connection".to_string(), json!(self.name));
        row.insert("source".to_string(), json!(source));
        row.insert(
            "params".to_string(),
            json!(params.map(|p| p.len()).unwrap_or(0)),
        );
        let result = QueryResult::new(
            vec![
                "connection".to_string(),
                "source".to_string(),
                "params".to_string(),
            ],
            vec![row],
            1,
        );
        Ok(if self.uncacheable {
            result.not_cacheable()
        } else {
            result
        })
    }

    async fn statement(
        &self,
        source: &str,
        _params: Option<&Params>,
        _options: Option<&ExecOptions>,
    ) -> ExecResult<u64> {
        self.record(format!("statement:{}:{source}", self.name));
        match Self::pop(&self.statement_errors) {
            Some(err) => Err(err),
            None => Ok(1),
        }
    }
}

/// Cache store without tag support, for unsupported-operation tests.
#[derive(Default)]
pub struct TaglessStore {
    inner: db_pipeline::MemoryCacheStore,
}

#[async_trait]
impl CacheStore for TaglessStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn save(&self, slot: &CacheSlot, payload: Vec<u8>) -> ExecResult<()> {
        self.inner.save(slot, payload).await
    }

    async fn delete(&self, key: &str) -> ExecResult<()> {
        self.inner.delete(key).await
    }

    fn supports_tags(&self) -> bool {
        false
    }

    async fn invalidate_tag(&self, _tag: &str) -> ExecResult<()> {
        Err(ExecError::unsupported("tag invalidation"))
    }
}
