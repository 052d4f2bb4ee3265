//! Applies confirmed gateway results to the [`Store`].
//!
//! Nothing is written to the store before the backend answers. Validation
//! runs first and blocks dispatch; a failed call leaves the data as it was
//! and records the message on the kind's collection. The store lives in a
//! `RefCell` and is only borrowed between await points, so several
//! operations may be in flight on the same event loop.

use std::cell::{Ref, RefCell};
use std::future::Future;
use tracing::{debug, warn};

use crate::error::{RemoteError, Result, SyncError};
use crate::gateway::{Gateway, RemoteResource};
use crate::models::{
    Comment, CommentChanges, CommentParent, CommentQuery, NewComment, NewProject, NewTask,
    NewTimeLog, Project, ProjectChanges, ProjectQuery, ResourceKind, Task, TaskChanges, TaskQuery,
    TimeLog, TimeLogChanges, TimeLogQuery,
};
use crate::store::{Store, Stored};

pub struct Reconciler<G> {
    gateway: G,
    store: RefCell<Store>,
}

impl<G: Gateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_store(gateway, Store::new())
    }

    pub fn with_store(gateway: G, store: Store) -> Self {
        Self {
            gateway,
            store: RefCell::new(store),
        }
    }

    /// Read access for views. Do not hold the guard across an await.
    pub fn store(&self) -> Ref<'_, Store> {
        self.store.borrow()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn require_project(&self, id: i64) -> Result<Project> {
        self.store
            .borrow()
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(ResourceKind::Project, id))
    }

    pub fn require_task(&self, id: i64) -> Result<Task> {
        self.store
            .borrow()
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(ResourceKind::Task, id))
    }

    /// List fetch under the token rule: only the latest fetch for a kind
    /// may replace its collection. A superseded fetch settles as `Ok` even
    /// when its request failed.
    async fn fetch<R>(&self, query: &R::Query) -> Result<()>
    where
        R: Stored,
        G: RemoteResource<R>,
    {
        let token = R::collection_mut(&mut self.store.borrow_mut()).begin_fetch();
        let result = RemoteResource::<R>::list(&self.gateway, query).await;

        let mut store = self.store.borrow_mut();
        let collection = R::collection_mut(&mut store);
        match result {
            Ok(items) => {
                let count = items.len();
                if collection.finish_fetch(token, Ok(items)) {
                    debug!(kind = %R::KIND, count, token = token.value(), "applied fetch");
                }
                Ok(())
            }
            Err(err) => {
                let message = err.message(&format!("Failed to fetch {}", R::KIND.plural()));
                if !collection.finish_fetch(token, Err(message.clone())) {
                    debug!(
                        kind = %R::KIND,
                        status = err.status,
                        %message,
                        "superseded fetch failed"
                    );
                    return Ok(());
                }
                warn!(kind = %R::KIND, status = err.status, %message, "fetch failed");
                Err(SyncError::Remote {
                    status: err.status,
                    message,
                })
            }
        }
    }

    /// Bracket a single gateway call with the kind's request status.
    async fn dispatch<R, T, F>(&self, op: &str, call: F) -> Result<T>
    where
        R: Stored,
        F: Future<Output = std::result::Result<T, RemoteError>>,
    {
        R::collection_mut(&mut self.store.borrow_mut()).begin_mutation();
        let result = call.await;

        let mut store = self.store.borrow_mut();
        let collection = R::collection_mut(&mut store);
        match result {
            Ok(value) => {
                collection.finish_mutation(None);
                Ok(value)
            }
            Err(err) => {
                let message = err.message(&format!("Failed to {} {}", op, R::KIND));
                warn!(kind = %R::KIND, op, status = err.status, %message, "request failed");
                collection.finish_mutation(Some(message.clone()));
                Err(SyncError::Remote {
                    status: err.status,
                    message,
                })
            }
        }
    }

    async fn fetch_one<R>(&self, id: i64) -> Result<R>
    where
        R: Stored,
        G: RemoteResource<R>,
    {
        let item = self
            .dispatch::<R, _, _>("fetch", RemoteResource::<R>::get(&self.gateway, id))
            .await?;
        R::collection_mut(&mut self.store.borrow_mut()).upsert(item.clone());
        Ok(item)
    }

    async fn create<R>(&self, payload: &R::Create) -> Result<R>
    where
        R: Stored,
        G: RemoteResource<R>,
    {
        let item = self
            .dispatch::<R, _, _>("create", RemoteResource::<R>::create(&self.gateway, payload))
            .await?;
        R::collection_mut(&mut self.store.borrow_mut()).upsert(item.clone());
        debug!(kind = %R::KIND, id = item.id(), "created");
        Ok(item)
    }

    async fn update<R>(&self, id: i64, changes: &R::Changes) -> Result<R>
    where
        R: Stored,
        G: RemoteResource<R>,
    {
        let call = RemoteResource::<R>::update(&self.gateway, id, changes);
        let item = self.dispatch::<R, _, _>("update", call).await?;
        R::collection_mut(&mut self.store.borrow_mut()).upsert(item.clone());
        debug!(kind = %R::KIND, id, "updated");
        Ok(item)
    }

    async fn delete<R>(&self, id: i64) -> Result<()>
    where
        R: Stored,
        G: RemoteResource<R>,
    {
        self.dispatch::<R, _, _>("delete", RemoteResource::<R>::delete(&self.gateway, id))
            .await?;
        R::collection_mut(&mut self.store.borrow_mut()).remove(id);
        debug!(kind = %R::KIND, id, "deleted");
        Ok(())
    }

    // Fetches

    pub async fn fetch_projects(&self, query: &ProjectQuery) -> Result<()> {
        self.fetch::<Project>(query).await
    }

    pub async fn fetch_tasks(&self, query: &TaskQuery) -> Result<()> {
        self.fetch::<Task>(query).await
    }

    pub async fn fetch_comments(&self, query: &CommentQuery) -> Result<()> {
        self.fetch::<Comment>(query).await
    }

    pub async fn fetch_time_logs(&self, query: &TimeLogQuery) -> Result<()> {
        self.fetch::<TimeLog>(query).await
    }

    pub async fn fetch_project(&self, id: i64) -> Result<Project> {
        self.fetch_one::<Project>(id).await
    }

    pub async fn fetch_task(&self, id: i64) -> Result<Task> {
        self.fetch_one::<Task>(id).await
    }

    // Projects

    pub async fn create_project(&self, payload: &NewProject) -> Result<Project> {
        payload.validate()?;
        self.create::<Project>(payload).await
    }

    pub async fn update_project(&self, id: i64, changes: &ProjectChanges) -> Result<Project> {
        changes.validate()?;
        self.update::<Project>(id, changes).await
    }

    /// Also drops the project's tasks (with their logs and comments) and its
    /// own comments from the store.
    pub async fn delete_project(&self, id: i64) -> Result<()> {
        self.delete::<Project>(id).await?;

        let mut store = self.store.borrow_mut();
        let task_ids: Vec<i64> = store
            .tasks
            .iter()
            .filter(|task| task.project_id == id)
            .map(|task| task.id)
            .collect();
        for task_id in task_ids {
            forget_task(&mut store, task_id);
        }
        store
            .comments
            .retain(|comment| comment.parent != CommentParent::Project(id));
        Ok(())
    }

    // Tasks

    pub async fn create_task(&self, payload: &NewTask) -> Result<Task> {
        payload.validate()?;
        self.create::<Task>(payload).await
    }

    pub async fn update_task(&self, id: i64, changes: &TaskChanges) -> Result<Task> {
        changes.validate()?;
        self.update::<Task>(id, changes).await
    }

    /// Also drops the task's time logs and comments from the store.
    pub async fn delete_task(&self, id: i64) -> Result<()> {
        self.delete::<Task>(id).await?;
        forget_task(&mut self.store.borrow_mut(), id);
        Ok(())
    }

    // Comments

    pub async fn create_comment(&self, payload: &NewComment) -> Result<Comment> {
        payload.validate()?;
        self.create::<Comment>(payload).await
    }

    pub async fn update_comment(&self, id: i64, changes: &CommentChanges) -> Result<Comment> {
        changes.validate()?;
        self.update::<Comment>(id, changes).await
    }

    pub async fn delete_comment(&self, id: i64) -> Result<()> {
        self.delete::<Comment>(id).await
    }

    // Time logs
    //
    // A held task's `actual_hours` moves by the hours each confirmed log
    // mutation adds or removes, so it stays equal to the backend's sum no
    // matter which of the task's logs the store holds.

    pub async fn create_time_log(&self, payload: &NewTimeLog) -> Result<TimeLog> {
        payload.validate()?;
        let log = self.create::<TimeLog>(payload).await?;
        adjust_actual_hours(&mut self.store.borrow_mut(), log.task_id, log.hours);
        Ok(log)
    }

    pub async fn update_time_log(&self, id: i64, changes: &TimeLogChanges) -> Result<TimeLog> {
        changes.validate()?;
        let previous = self.previous_log(id).await;
        let log = self.update::<TimeLog>(id, changes).await?;

        let mut store = self.store.borrow_mut();
        if let Some(previous) = previous {
            adjust_actual_hours(&mut store, previous.task_id, -previous.hours);
            adjust_actual_hours(&mut store, log.task_id, log.hours);
        }
        Ok(log)
    }

    pub async fn delete_time_log(&self, id: i64) -> Result<()> {
        let previous = self.previous_log(id).await;
        self.delete::<TimeLog>(id).await?;
        if let Some(previous) = previous {
            adjust_actual_hours(&mut self.store.borrow_mut(), previous.task_id, -previous.hours);
        }
        Ok(())
    }

    /// The log as it stands before a mutation: the held copy, else the
    /// backend's. `None` when neither knows it; the mutation itself then
    /// reports the failure.
    async fn previous_log(&self, id: i64) -> Option<TimeLog> {
        let held = self.store.borrow().time_logs.get(id).cloned();
        if held.is_some() {
            return held;
        }
        match RemoteResource::<TimeLog>::get(&self.gateway, id).await {
            Ok(log) => Some(log),
            Err(err) => {
                debug!(time_log_id = id, status = err.status, "previous time log unavailable");
                None
            }
        }
    }
}

/// Move a held task's `actual_hours` by `delta`.
fn adjust_actual_hours(store: &mut Store, task_id: i64, delta: f64) {
    let Some(task) = store.tasks.get(task_id) else {
        debug!(task_id, "task not held, skipping actual_hours cascade");
        return;
    };
    let mut task = task.clone();
    task.actual_hours = (task.actual_hours + delta).max(0.0);
    let actual_hours = task.actual_hours;
    store.tasks.upsert(task);
    debug!(task_id, actual_hours, "adjusted actual_hours");
}

fn forget_task(store: &mut Store, task_id: i64) {
    store.tasks.remove(task_id);
    let logs = store.time_logs.retain(|log| log.task_id != task_id);
    let comments = store
        .comments
        .retain(|comment| comment.parent != CommentParent::Task(task_id));
    if logs + comments > 0 {
        debug!(task_id, logs, comments, "dropped children of deleted task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ProjectStatus, Resource, TaskPriority, TaskStatus};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tempfile::tempdir;

    type Reply<T> = std::result::Result<T, RemoteError>;

    fn setup() -> (Reconciler<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (Reconciler::new(db), dir)
    }

    fn new_project(title: &str) -> NewProject {
        NewProject {
            title: title.to_string(),
            description: None,
            status: ProjectStatus::Active,
            owner_id: 1,
            start_date: None,
            end_date: None,
        }
    }

    fn new_task(project_id: i64, title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            project_id,
            assignee_id: None,
            estimated_hours: None,
        }
    }

    fn new_log(task_id: i64, hours: f64) -> NewTimeLog {
        NewTimeLog {
            task_id,
            user_id: None,
            hours,
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        }
    }

    fn task(id: i64, title: &str) -> Task {
        let now = Utc::now();
        Task {
            id,
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            project_id: 1,
            assignee_id: None,
            estimated_hours: None,
            actual_hours: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Gateway whose task endpoints answer from a script, after a delay.
    #[derive(Default)]
    struct Scripted {
        task_lists: RefCell<VecDeque<(u64, Reply<Vec<Task>>)>>,
        update_error: Option<RemoteError>,
    }

    impl Scripted {
        fn script_tasks(&self, delay_ms: u64, result: Reply<Vec<Task>>) {
            self.task_lists.borrow_mut().push_back((delay_ms, result));
        }
    }

    #[async_trait(?Send)]
    impl RemoteResource<Task> for Scripted {
        async fn list(&self, _: &TaskQuery) -> Reply<Vec<Task>> {
            let next = self.task_lists.borrow_mut().pop_front();
            let (delay, result) = next.unwrap_or((0, Ok(Vec::new())));
            tokio::time::sleep(Duration::from_millis(delay)).await;
            result
        }

        async fn get(&self, id: i64) -> Reply<Task> {
            Ok(task(id, "fetched"))
        }

        async fn create(&self, payload: &NewTask) -> Reply<Task> {
            Ok(task(99, &payload.title))
        }

        async fn update(&self, id: i64, changes: &TaskChanges) -> Reply<Task> {
            if let Some(err) = &self.update_error {
                return Err(err.clone());
            }
            let mut updated = task(id, "updated");
            if let Some(status) = changes.status {
                updated.status = status;
            }
            Ok(updated)
        }

        async fn delete(&self, _: i64) -> Reply<()> {
            Ok(())
        }
    }

    macro_rules! unscripted {
        ($($ty:ty),*) => {$(
            #[async_trait(?Send)]
            impl RemoteResource<$ty> for Scripted {
                async fn list(&self, _: &<$ty as Resource>::Query) -> Reply<Vec<$ty>> {
                    Ok(Vec::new())
                }

                async fn get(&self, _: i64) -> Reply<$ty> {
                    Err(RemoteError::new(404, "not scripted"))
                }

                async fn create(&self, _: &<$ty as Resource>::Create) -> Reply<$ty> {
                    Err(RemoteError::new(501, "not scripted"))
                }

                async fn update(&self, _: i64, _: &<$ty as Resource>::Changes) -> Reply<$ty> {
                    Err(RemoteError::new(501, "not scripted"))
                }

                async fn delete(&self, _: i64) -> Reply<()> {
                    Err(RemoteError::new(501, "not scripted"))
                }
            }
        )*};
    }

    unscripted!(Project, Comment, TimeLog);

    fn task_ids<G: Gateway>(reconciler: &Reconciler<G>) -> Vec<i64> {
        reconciler.store().tasks.iter().map(|t| t.id).collect()
    }

    // ==================== Race and failure handling ====================

    #[tokio::test(start_paused = true)]
    async fn test_later_fetch_wins_when_earlier_resolves_last() {
        let gateway = Scripted::default();
        gateway.script_tasks(50, Ok(vec![task(1, "from A")]));
        gateway.script_tasks(10, Ok(vec![task(2, "from B")]));
        let reconciler = Reconciler::new(gateway);

        let query = TaskQuery::default();
        let (a, b) = tokio::join!(reconciler.fetch_tasks(&query), reconciler.fetch_tasks(&query));
        assert!(a.is_ok());
        assert!(b.is_ok());

        assert_eq!(task_ids(&reconciler), vec![2]);
        assert!(!reconciler.store().tasks.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fetch_error_is_not_recorded() {
        let gateway = Scripted::default();
        gateway.script_tasks(50, Err(RemoteError::from_body(500, &json!({}))));
        gateway.script_tasks(10, Ok(vec![task(3, "fresh")]));
        let reconciler = Reconciler::new(gateway);

        let query = TaskQuery::default();
        let (a, b) = tokio::join!(reconciler.fetch_tasks(&query), reconciler.fetch_tasks(&query));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(reconciler.store().tasks.error(), None);
        assert_eq!(task_ids(&reconciler), vec![3]);
    }

    #[tokio::test]
    async fn test_fetch_failure_uses_fallback_message() {
        let gateway = Scripted::default();
        gateway.script_tasks(0, Err(RemoteError::from_body(503, &json!({ "error": "down" }))));
        let reconciler = Reconciler::new(gateway);

        let err = reconciler.fetch_tasks(&TaskQuery::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch tasks");
        assert_eq!(reconciler.store().tasks.error(), Some("Failed to fetch tasks"));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_task_and_sets_error() {
        let gateway = Scripted {
            update_error: Some(RemoteError::from_body(500, &json!({}))),
            ..Default::default()
        };
        gateway.script_tasks(0, Ok(vec![task(7, "Original")]));
        let reconciler = Reconciler::new(gateway);
        reconciler.fetch_tasks(&TaskQuery::default()).await.unwrap();

        let changes = TaskChanges {
            status: Some(TaskStatus::Closed),
            ..Default::default()
        };
        let err = reconciler.update_task(7, &changes).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { status: 500, .. }));

        let store = reconciler.store();
        let held = store.tasks.get(7).unwrap();
        assert_eq!(held.title, "Original");
        assert_eq!(held.status, TaskStatus::Todo);
        assert_eq!(store.tasks.error(), Some("Failed to update task"));
        assert!(!store.tasks.is_loading());
    }

    #[tokio::test]
    async fn test_concurrent_updates_last_resolution_wins() {
        let gateway = Scripted::default();
        gateway.script_tasks(0, Ok(vec![task(4, "t")]));
        let reconciler = Reconciler::new(gateway);
        reconciler.fetch_tasks(&TaskQuery::default()).await.unwrap();

        let review = TaskChanges {
            status: Some(TaskStatus::Review),
            ..Default::default()
        };
        let closed = TaskChanges {
            status: Some(TaskStatus::Closed),
            ..Default::default()
        };
        let (first, second) = tokio::join!(
            reconciler.update_task(4, &review),
            reconciler.update_task(4, &closed)
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(reconciler.store().tasks.get(4).unwrap().status, TaskStatus::Closed);
        assert_eq!(reconciler.store().tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_blocks_dispatch() {
        let gateway = Scripted::default();
        let reconciler = Reconciler::new(gateway);

        let err = reconciler.create_task(&new_task(1, "  ")).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(reconciler.store().tasks.is_empty());
        assert_eq!(reconciler.store().tasks.error(), None);
    }

    #[test]
    fn test_require_task_reports_not_found() {
        let reconciler = Reconciler::new(Scripted::default());
        let err = reconciler.require_task(12).unwrap_err();
        assert_eq!(err.to_string(), "Task #12 not found");
    }

    // ==================== Against the local backend ====================

    #[tokio::test]
    async fn test_time_logs_drive_actual_hours() {
        let (reconciler, _dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let task = reconciler.create_task(&new_task(project.id, "Build")).await.unwrap();

        let first = reconciler.create_time_log(&new_log(task.id, 3.0)).await.unwrap();
        reconciler.create_time_log(&new_log(task.id, 2.0)).await.unwrap();
        assert_eq!(reconciler.require_task(task.id).unwrap().actual_hours, 5.0);

        reconciler.delete_time_log(first.id).await.unwrap();
        assert_eq!(reconciler.require_task(task.id).unwrap().actual_hours, 2.0);
    }

    #[tokio::test]
    async fn test_time_log_update_recomputes_hours() {
        let (reconciler, _dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let task = reconciler.create_task(&new_task(project.id, "Build")).await.unwrap();
        let log = reconciler.create_time_log(&new_log(task.id, 1.0)).await.unwrap();

        let changes = TimeLogChanges {
            hours: Some(4.0),
            ..Default::default()
        };
        reconciler.update_time_log(log.id, &changes).await.unwrap();
        assert_eq!(reconciler.require_task(task.id).unwrap().actual_hours, 4.0);
    }

    #[tokio::test]
    async fn test_actual_hours_follow_backend_when_logs_partly_held() {
        let (reconciler, dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let task = reconciler.create_task(&new_task(project.id, "Build")).await.unwrap();

        let other = Database::open(&dir.path().join("test.db")).unwrap();
        let theirs = other
            .create_time_log(&NewTimeLog {
                user_id: Some(2),
                ..new_log(task.id, 3.0)
            })
            .unwrap();

        reconciler.fetch_tasks(&TaskQuery::default()).await.unwrap();
        let only_mine = TimeLogQuery {
            user_id: Some(1),
            ..Default::default()
        };
        reconciler.fetch_time_logs(&only_mine).await.unwrap();
        assert!(reconciler.store().time_logs.is_empty());

        let backend_hours = |r: &Reconciler<Database>| {
            r.gateway().get_task(task.id).unwrap().actual_hours
        };
        let held_hours = |r: &Reconciler<Database>| r.require_task(task.id).unwrap().actual_hours;

        let mine = reconciler
            .create_time_log(&NewTimeLog {
                user_id: Some(1),
                ..new_log(task.id, 2.0)
            })
            .await
            .unwrap();
        assert_eq!(backend_hours(&reconciler), 5.0);
        assert_eq!(held_hours(&reconciler), 5.0);

        let changes = TimeLogChanges {
            hours: Some(4.0),
            ..Default::default()
        };
        reconciler.update_time_log(mine.id, &changes).await.unwrap();
        assert_eq!(held_hours(&reconciler), backend_hours(&reconciler));
        assert_eq!(held_hours(&reconciler), 7.0);

        reconciler.delete_time_log(theirs.id).await.unwrap();
        assert_eq!(held_hours(&reconciler), backend_hours(&reconciler));
        assert_eq!(held_hours(&reconciler), 4.0);
    }

    #[tokio::test]
    async fn test_forbidden_delete_keeps_comment_and_records_error() {
        let (reconciler, dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let comment = reconciler
            .create_comment(&NewComment {
                content: "mine".to_string(),
                user_id: 1,
                parent: CommentParent::Project(project.id),
            })
            .await
            .unwrap();

        let intruder =
            Reconciler::new(Database::open(&dir.path().join("test.db")).unwrap().acting_as(2));
        intruder.fetch_comments(&CommentQuery::All).await.unwrap();
        let err = intruder.delete_comment(comment.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { status: 403, .. }));
        assert_eq!(err.to_string(), "Not authorized to delete this comment");

        let store = intruder.store();
        assert_eq!(store.comments.len(), 1);
        assert_eq!(store.comments.error(), Some("Not authorized to delete this comment"));
    }

    #[tokio::test]
    async fn test_time_log_for_unheld_task_skips_cascade() {
        let (reconciler, dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let task = reconciler.create_task(&new_task(project.id, "Build")).await.unwrap();

        let other = Reconciler::new(Database::open(&dir.path().join("test.db")).unwrap());
        other.create_time_log(&new_log(task.id, 2.0)).await.unwrap();
        assert!(other.store().tasks.is_empty());
        assert_eq!(other.store().time_logs.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_task_drops_children() {
        let (reconciler, _dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();
        let task = reconciler.create_task(&new_task(project.id, "T")).await.unwrap();
        reconciler.create_time_log(&new_log(task.id, 1.0)).await.unwrap();
        reconciler
            .create_comment(&NewComment {
                content: "note".to_string(),
                user_id: 1,
                parent: CommentParent::Task(task.id),
            })
            .await
            .unwrap();

        reconciler.delete_task(task.id).await.unwrap();
        let store = reconciler.store();
        assert!(store.tasks.is_empty());
        assert!(store.time_logs.is_empty());
        assert!(store.comments.is_empty());
    }

    #[tokio::test]
    async fn test_delete_project_drops_tasks_and_comments() {
        let (reconciler, _dir) = setup();
        let keep = reconciler.create_project(&new_project("Keep")).await.unwrap();
        let doomed = reconciler.create_project(&new_project("Doomed")).await.unwrap();
        let kept_task = reconciler.create_task(&new_task(keep.id, "stays")).await.unwrap();
        reconciler.create_task(&new_task(doomed.id, "goes")).await.unwrap();
        reconciler
            .create_comment(&NewComment {
                content: "bye".to_string(),
                user_id: 1,
                parent: CommentParent::Project(doomed.id),
            })
            .await
            .unwrap();

        reconciler.delete_project(doomed.id).await.unwrap();
        let store = reconciler.store();
        assert_eq!(store.projects.len(), 1);
        assert_eq!(store.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![kept_task.id]);
        assert!(store.comments.is_empty());
    }

    #[tokio::test]
    async fn test_backend_detail_message_surfaces() {
        let (reconciler, _dir) = setup();
        let err = reconciler.create_task(&new_task(42, "Orphan")).await.unwrap_err();
        assert_eq!(err.to_string(), "Project not found");
        assert_eq!(reconciler.store().tasks.error(), Some("Project not found"));
    }

    #[tokio::test]
    async fn test_fetch_project_upserts_detail() {
        let (reconciler, dir) = setup();
        let project = reconciler.create_project(&new_project("P")).await.unwrap();

        let other = Reconciler::new(Database::open(&dir.path().join("test.db")).unwrap());
        let fetched = other.fetch_project(project.id).await.unwrap();
        assert_eq!(fetched.title, "P");
        assert_eq!(other.require_project(project.id).unwrap().id, project.id);

        let err = other.fetch_project(project.id + 1).await.unwrap_err();
        assert_eq!(err.to_string(), "Project not found");
        assert_eq!(other.store().projects.error(), Some("Project not found"));
        assert_eq!(other.store().projects.len(), 1);
    }
}
