//! Boundary to the backend that owns the source of truth.
//!
//! The contract is transport-neutral: an implementation may talk HTTP, or,
//! like [`crate::db::Database`], answer from a local SQLite file. Every call
//! is asynchronous and may fail with a [`RemoteError`]. Futures are not
//! required to be `Send`; everything runs on one event loop.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{Comment, Project, Resource, Task, TimeLog};

/// CRUD for one resource kind.
#[async_trait(?Send)]
pub trait RemoteResource<R: Resource> {
    async fn list(&self, query: &R::Query) -> Result<Vec<R>, RemoteError>;

    async fn get(&self, id: i64) -> Result<R, RemoteError>;

    async fn create(&self, payload: &R::Create) -> Result<R, RemoteError>;

    /// Apply `changes` and return the backend's canonical representation.
    async fn update(&self, id: i64, changes: &R::Changes) -> Result<R, RemoteError>;

    async fn delete(&self, id: i64) -> Result<(), RemoteError>;
}

/// A backend that serves every resource kind.
pub trait Gateway:
    RemoteResource<Project>
    + RemoteResource<Task>
    + RemoteResource<Comment>
    + RemoteResource<TimeLog>
{
}

impl<T> Gateway for T where
    T: RemoteResource<Project>
        + RemoteResource<Task>
        + RemoteResource<Comment>
        + RemoteResource<TimeLog>
{
}
