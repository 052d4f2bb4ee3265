//! In-memory collections of the four resource kinds.
//!
//! Each [`Collection`] holds the entities of one kind in the order the
//! backend returned them, plus the request status a view needs to render
//! loading and error states. List fetches are tagged with a [`RequestToken`]
//! so a slow, earlier fetch can never overwrite the result of a later one.

use serde::Serialize;
use tracing::debug;

use crate::models::{Comment, Project, Resource, Task, TimeLog};

/// Sequence number handed out when a list fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestStatus {
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Collection<R> {
    items: Vec<R>,
    error: Option<String>,
    in_flight: usize,
    issued: u64,
    latest_fetch: Option<RequestToken>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            error: None,
            in_flight: 0,
            issued: 0,
            latest_fetch: None,
        }
    }
}

impl<R: Resource> Collection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[R] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn get(&self, id: i64) -> Option<&R> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop whatever is held and take `items` as the new contents.
    pub fn replace_all(&mut self, items: Vec<R>) {
        self.items = items;
    }

    /// Replace the entity with the same id in place, or append it.
    pub fn upsert(&mut self, item: R) {
        match self.items.iter().position(|existing| existing.id() == item.id()) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    /// Remove by id. Absent ids are ignored.
    pub fn remove(&mut self, id: i64) -> Option<R> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }

    /// Keep only the entities matching `keep`; returns how many were dropped.
    pub fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&R) -> bool,
    {
        let before = self.items.len();
        self.items.retain(keep);
        before - self.items.len()
    }

    pub fn status(&self) -> RequestStatus {
        RequestStatus {
            loading: self.is_loading(),
            error: self.error.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Mark a list fetch as started and return its token.
    ///
    /// The new token supersedes every token issued before it.
    pub fn begin_fetch(&mut self) -> RequestToken {
        self.issued += 1;
        let token = RequestToken(self.issued);
        self.latest_fetch = Some(token);
        self.in_flight += 1;
        self.error = None;
        token
    }

    /// Settle a list fetch. Returns `false` when the token is stale and the
    /// result (or error) was discarded.
    pub fn finish_fetch(&mut self, token: RequestToken, result: Result<Vec<R>, String>) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        if self.latest_fetch != Some(token) {
            debug!(
                kind = %R::KIND,
                token = token.value(),
                latest = self.latest_fetch.map(RequestToken::value),
                "discarding stale fetch result"
            );
            return false;
        }

        match result {
            Ok(items) => self.replace_all(items),
            Err(message) => self.error = Some(message),
        }
        true
    }

    pub fn begin_mutation(&mut self) {
        self.in_flight += 1;
        self.error = None;
    }

    pub fn finish_mutation(&mut self, error: Option<String>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if error.is_some() {
            self.error = error;
        }
    }
}

/// All four collections, owned by whoever drives the synchronization.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub projects: Collection<Project>,
    pub tasks: Collection<Task>,
    pub comments: Collection<Comment>,
    pub time_logs: Collection<TimeLog>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.projects.is_loading()
            || self.tasks.is_loading()
            || self.comments.is_loading()
            || self.time_logs.is_loading()
    }
}

/// Resources that have a collection in [`Store`].
pub trait Stored: Resource {
    fn collection(store: &Store) -> &Collection<Self>;
    fn collection_mut(store: &mut Store) -> &mut Collection<Self>;
}

impl Stored for Project {
    fn collection(store: &Store) -> &Collection<Self> {
        &store.projects
    }

    fn collection_mut(store: &mut Store) -> &mut Collection<Self> {
        &mut store.projects
    }
}

impl Stored for Task {
    fn collection(store: &Store) -> &Collection<Self> {
        &store.tasks
    }

    fn collection_mut(store: &mut Store) -> &mut Collection<Self> {
        &mut store.tasks
    }
}

impl Stored for Comment {
    fn collection(store: &Store) -> &Collection<Self> {
        &store.comments
    }

    fn collection_mut(store: &mut Store) -> &mut Collection<Self> {
        &mut store.comments
    }
}

impl Stored for TimeLog {
    fn collection(store: &Store) -> &Collection<Self> {
        &store.time_logs
    }

    fn collection_mut(store: &mut Store) -> &mut Collection<Self> {
        &mut store.time_logs
    }
}
