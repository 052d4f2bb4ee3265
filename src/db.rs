use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::gateway::RemoteResource;
use crate::models::{
    Comment, CommentChanges, CommentParent, CommentQuery, NewComment, NewProject, NewTask,
    NewTimeLog, Project, ProjectChanges, ProjectQuery, ResourceKind, Task, TaskChanges, TaskQuery,
    TimeLog, TimeLogChanges, TimeLogQuery, User,
};

const SCHEMA_VERSION: i32 = 1;

const PROJECT_COLUMNS: &str =
    "id, title, description, status, owner_id, start_date, end_date, created_at, updated_at";
const TASK_COLUMNS: &str = "id, title, description, status, priority, project_id, assignee_id, estimated_hours, actual_hours, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, content, user_id, task_id, project_id, created_at";
const TIME_LOG_COLUMNS: &str = "id, task_id, user_id, hours, description, date, created_at";

type Outcome<T> = std::result::Result<T, RemoteError>;

/// Local backend: a SQLite file that answers the gateway contract the way
/// the REST service does, including server-side timestamps, `actual_hours`
/// bookkeeping and structured error bodies.
///
/// With an acting user set, edits and deletes are limited to what that
/// user owns. Without one every change is allowed.
pub struct Database {
    conn: Connection,
    acting_user: Option<i64>,
}

impl From<rusqlite::Error> for RemoteError {
    fn from(err: rusqlite::Error) -> Self {
        warn!(error = %err, "database error");
        RemoteError::from_body(500, &json!({ "detail": format!("Database error: {}", err) }))
    }
}

fn not_found(kind: ResourceKind) -> RemoteError {
    RemoteError::from_body(404, &json!({ "detail": format!("{} not found", kind.title()) }))
}

fn forbidden(detail: &str) -> RemoteError {
    RemoteError::from_body(403, &json!({ "detail": detail }))
}

fn unprocessable(field: &str, msg: &str) -> RemoteError {
    RemoteError::from_body(
        422,
        &json!({
            "detail": [{ "loc": ["body", field], "msg": msg, "type": "value_error" }]
        }),
    )
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Database {
            conn,
            acting_user: None,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Answer every later call on behalf of `user_id`.
    pub fn acting_as(mut self, user_id: i64) -> Self {
        self.acting_user = Some(user_id);
        self
    }

    fn may_change(&self, owner_id: Option<i64>) -> bool {
        self.acting_user.map_or(true, |me| owner_id == Some(me))
    }

    /// Only the owner may touch a project; anyone else sees it as missing.
    fn check_project_owner(&self, id: i64, action: &str) -> Outcome<()> {
        let owner: Option<i64> = self
            .conn
            .query_row("SELECT owner_id FROM projects WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        match owner {
            None if self.acting_user.is_none() => Err(not_found(ResourceKind::Project)),
            Some(owner) if self.may_change(Some(owner)) => Ok(()),
            _ => Err(RemoteError::from_body(
                404,
                &json!({
                    "detail": format!(
                        "Project not found or you don't have permission to {} it",
                        action
                    )
                }),
            )),
        }
    }

    fn init_schema(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or(0);

        if version < SCHEMA_VERSION {
            self.conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    full_name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL DEFAULT 'active',
                    owner_id INTEGER NOT NULL,
                    start_date TEXT,
                    end_date TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL DEFAULT 'todo',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    project_id INTEGER NOT NULL,
                    assignee_id INTEGER,
                    estimated_hours REAL,
                    actual_hours REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
                );

                -- Exactly one parent per comment
                CREATE TABLE IF NOT EXISTS comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    content TEXT NOT NULL,
                    user_id INTEGER NOT NULL,
                    task_id INTEGER,
                    project_id INTEGER,
                    created_at TEXT NOT NULL,
                    CHECK ((task_id IS NULL) <> (project_id IS NULL)),
                    FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
                    FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS time_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_id INTEGER NOT NULL,
                    user_id INTEGER,
                    hours REAL NOT NULL,
                    description TEXT,
                    date TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
                CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
                CREATE INDEX IF NOT EXISTS idx_comments_task ON comments(task_id);
                CREATE INDEX IF NOT EXISTS idx_comments_project ON comments(project_id);
                CREATE INDEX IF NOT EXISTS idx_time_logs_task ON time_logs(task_id);
                CREATE INDEX IF NOT EXISTS idx_time_logs_user ON time_logs(user_id);
                "#,
            )?;

            self.conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
        }

        self.conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(())
    }

    fn exists(&self, table: &str, id: i64) -> Outcome<bool> {
        let found = self
            .conn
            .query_row(&format!("SELECT 1 FROM {} WHERE id = ?1", table), [id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    // Users
    pub fn create_user(&self, username: &str, full_name: &str) -> Outcome<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(unprocessable("username", "username is required"));
        }
        if self.user_by_username(username)?.is_some() {
            return Err(RemoteError::from_body(
                409,
                &json!({ "detail": "Username already registered" }),
            ));
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (username, full_name, created_at) VALUES (?1, ?2, ?3)",
            params![username, full_name, now],
        )?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            full_name: full_name.to_string(),
        })
    }

    pub fn list_users(&self) -> Outcome<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, full_name FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn user_by_username(&self, username: &str) -> Outcome<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, full_name FROM users WHERE username = ?1",
                [username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> Outcome<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username, full_name FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // Projects
    pub fn list_projects(&self, query: &ProjectQuery) -> Outcome<Vec<Project>> {
        let mut sql = format!("SELECT {} FROM projects", PROJECT_COLUMNS);
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = query.status {
            params_vec.push(Box::new(status.as_str()));
            conditions.push(format!("status = ?{}", params_vec.len()));
        }

        if let Some(owner_id) = query.owner_id {
            params_vec.push(Box::new(owner_id));
            conditions.push(format!("owner_id = ?{}", params_vec.len()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let projects = stmt
            .query_map(params_refs.as_slice(), project_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn get_project(&self, id: i64) -> Outcome<Project> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
                [id],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found(ResourceKind::Project))
    }

    pub fn create_project(&self, payload: &NewProject) -> Outcome<Project> {
        if payload.title.trim().is_empty() {
            return Err(unprocessable("title", "title must not be empty"));
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO projects (title, description, status, owner_id, start_date, end_date, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                payload.title,
                payload.description,
                payload.status.as_str(),
                payload.owner_id,
                payload.start_date.map(|d| d.to_string()),
                payload.end_date.map(|d| d.to_string()),
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(project_id = id, "created project");
        self.get_project(id)
    }

    pub fn update_project(&self, id: i64, changes: &ProjectChanges) -> Outcome<Project> {
        self.check_project_owner(id, "update")?;
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(unprocessable("title", "title must not be empty"));
            }
        }

        let mut assignments = Assignments::new();
        if let Some(title) = &changes.title {
            assignments.set("title", title.clone());
        }
        if let Some(description) = &changes.description {
            assignments.set("description", description.clone());
        }
        if let Some(status) = changes.status {
            assignments.set("status", status.as_str());
        }
        if let Some(start) = changes.start_date {
            assignments.set("start_date", start.to_string());
        }
        if let Some(end) = changes.end_date {
            assignments.set("end_date", end.to_string());
        }
        assignments.execute(&self.conn, "projects", id)?;
        self.get_project(id)
    }

    pub fn delete_project(&self, id: i64) -> Outcome<()> {
        self.check_project_owner(id, "delete")?;
        self.conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
        debug!(project_id = id, "deleted project");
        Ok(())
    }

    // Tasks
    pub fn list_tasks(&self, query: &TaskQuery) -> Outcome<Vec<Task>> {
        if let Some(project_id) = query.project_id {
            if !self.exists("projects", project_id)? {
                return Err(not_found(ResourceKind::Project));
            }
        }

        let mut sql = format!("SELECT {} FROM tasks", TASK_COLUMNS);
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(project_id) = query.project_id {
            params_vec.push(Box::new(project_id));
            conditions.push(format!("project_id = ?{}", params_vec.len()));
        }

        if let Some(assignee_id) = query.assignee_id {
            params_vec.push(Box::new(assignee_id));
            conditions.push(format!("assignee_id = ?{}", params_vec.len()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let tasks = stmt
            .query_map(params_refs.as_slice(), task_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, id: i64) -> Outcome<Task> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                [id],
                task_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found(ResourceKind::Task))
    }

    fn check_assignee(&self, assignee_id: Option<i64>) -> Outcome<()> {
        if let Some(user_id) = assignee_id {
            if self.get_user(user_id)?.is_none() {
                return Err(RemoteError::from_body(404, &json!({ "detail": "Assignee not found" })));
            }
        }
        Ok(())
    }

    pub fn create_task(&self, payload: &NewTask) -> Outcome<Task> {
        if payload.title.trim().is_empty() {
            return Err(unprocessable("title", "title must not be empty"));
        }
        if !self.exists("projects", payload.project_id)? {
            return Err(not_found(ResourceKind::Project));
        }
        self.check_assignee(payload.assignee_id)?;

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tasks (title, description, status, priority, project_id, assignee_id, estimated_hours, actual_hours, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)",
            params![
                payload.title,
                payload.description,
                payload.status.as_str(),
                payload.priority.as_str(),
                payload.project_id,
                payload.assignee_id,
                payload.estimated_hours,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(task_id = id, project_id = payload.project_id, "created task");
        self.get_task(id)
    }

    pub fn update_task(&self, id: i64, changes: &TaskChanges) -> Outcome<Task> {
        if !self.exists("tasks", id)? {
            return Err(not_found(ResourceKind::Task));
        }
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(unprocessable("title", "title must not be empty"));
            }
        }
        if let Some(project_id) = changes.project_id {
            if !self.exists("projects", project_id)? {
                return Err(not_found(ResourceKind::Project));
            }
        }
        self.check_assignee(changes.assignee_id)?;

        let mut assignments = Assignments::new();
        if let Some(title) = &changes.title {
            assignments.set("title", title.clone());
        }
        if let Some(description) = &changes.description {
            assignments.set("description", description.clone());
        }
        if let Some(status) = changes.status {
            assignments.set("status", status.as_str());
        }
        if let Some(priority) = changes.priority {
            assignments.set("priority", priority.as_str());
        }
        if let Some(project_id) = changes.project_id {
            assignments.set("project_id", project_id);
        }
        if let Some(assignee_id) = changes.assignee_id {
            assignments.set("assignee_id", assignee_id);
        }
        if let Some(hours) = changes.estimated_hours {
            assignments.set("estimated_hours", hours);
        }
        assignments.execute(&self.conn, "tasks", id)?;
        self.get_task(id)
    }

    pub fn delete_task(&self, id: i64) -> Outcome<()> {
        let task = self.get_task(id)?;
        let owner = self.get_project(task.project_id)?.owner_id;
        if !self.may_change(Some(owner)) {
            return Err(forbidden("You don't have permission to delete this task"));
        }
        self.conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        debug!(task_id = id, "deleted task");
        Ok(())
    }

    // Comments
    pub fn list_comments(&self, query: &CommentQuery) -> Outcome<Vec<Comment>> {
        let (condition, id) = match *query {
            CommentQuery::All => (None, None),
            CommentQuery::Task(task_id) => {
                if !self.exists("tasks", task_id)? {
                    return Err(not_found(ResourceKind::Task));
                }
                (Some("task_id = ?1"), Some(task_id))
            }
            CommentQuery::Project(project_id) => {
                if !self.exists("projects", project_id)? {
                    return Err(not_found(ResourceKind::Project));
                }
                (Some("project_id = ?1"), Some(project_id))
            }
        };

        let mut sql = format!("SELECT {} FROM comments", COMMENT_COLUMNS);
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let comments = match id {
            Some(id) => stmt.query_map([id], comment_from_row)?,
            None => stmt.query_map([], comment_from_row)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn get_comment(&self, id: i64) -> Outcome<Comment> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
                [id],
                comment_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found(ResourceKind::Comment))
    }

    pub fn create_comment(&self, payload: &NewComment) -> Outcome<Comment> {
        if payload.content.trim().is_empty() {
            return Err(unprocessable("content", "content must not be empty"));
        }
        match payload.parent {
            CommentParent::Task(task_id) if !self.exists("tasks", task_id)? => {
                return Err(not_found(ResourceKind::Task));
            }
            CommentParent::Project(project_id) if !self.exists("projects", project_id)? => {
                return Err(not_found(ResourceKind::Project));
            }
            _ => {}
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO comments (content, user_id, task_id, project_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                payload.content,
                payload.user_id,
                payload.parent.task_id(),
                payload.parent.project_id(),
                now
            ],
        )?;
        self.get_comment(self.conn.last_insert_rowid())
    }

    pub fn update_comment(&self, id: i64, changes: &CommentChanges) -> Outcome<Comment> {
        if changes.content.trim().is_empty() {
            return Err(unprocessable("content", "content must not be empty"));
        }
        let existing = self.get_comment(id)?;
        if !self.may_change(Some(existing.user_id)) {
            return Err(forbidden("Not authorized to update this comment"));
        }
        self.conn.execute(
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            params![changes.content, id],
        )?;
        self.get_comment(id)
    }

    pub fn delete_comment(&self, id: i64) -> Outcome<()> {
        let existing = self.get_comment(id)?;
        if !self.may_change(Some(existing.user_id)) {
            return Err(forbidden("Not authorized to delete this comment"));
        }
        self.conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
        Ok(())
    }

    // Time logs
    pub fn list_time_logs(&self, query: &TimeLogQuery) -> Outcome<Vec<TimeLog>> {
        let mut sql = format!("SELECT {} FROM time_logs", TIME_LOG_COLUMNS);
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(task_id) = query.task_id {
            params_vec.push(Box::new(task_id));
            conditions.push(format!("task_id = ?{}", params_vec.len()));
        }
        if let Some(user_id) = query.user_id {
            params_vec.push(Box::new(user_id));
            conditions.push(format!("user_id = ?{}", params_vec.len()));
        }
        if let Some(start) = query.start_date {
            params_vec.push(Box::new(start.to_string()));
            conditions.push(format!("date >= ?{}", params_vec.len()));
        }
        if let Some(end) = query.end_date {
            params_vec.push(Box::new(end.to_string()));
            conditions.push(format!("date <= ?{}", params_vec.len()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY date DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let logs = stmt
            .query_map(params_refs.as_slice(), time_log_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    pub fn get_time_log(&self, id: i64) -> Outcome<TimeLog> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM time_logs WHERE id = ?1", TIME_LOG_COLUMNS),
                [id],
                time_log_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found(ResourceKind::TimeLog))
    }

    /// Recompute a task's `actual_hours` from its time logs.
    fn refresh_actual_hours(&self, task_id: i64) -> Outcome<()> {
        self.conn.execute(
            "UPDATE tasks SET actual_hours = (SELECT COALESCE(SUM(hours), 0) FROM time_logs WHERE task_id = ?1) WHERE id = ?1",
            [task_id],
        )?;
        Ok(())
    }

    pub fn create_time_log(&self, payload: &NewTimeLog) -> Outcome<TimeLog> {
        if !payload.hours.is_finite() || payload.hours <= 0.0 {
            return Err(unprocessable("hours", "hours must be greater than 0"));
        }
        let task = self.get_task(payload.task_id)?;
        if self.acting_user.is_some()
            && task.assignee_id != self.acting_user
            && !self.may_change(Some(self.get_project(task.project_id)?.owner_id))
        {
            return Err(forbidden("Not authorized to log time for this task"));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO time_logs (task_id, user_id, hours, description, date, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payload.task_id,
                payload.user_id,
                payload.hours,
                payload.description,
                payload.date.to_string(),
                now
            ],
        )?;
        let id = tx.last_insert_rowid();
        self.refresh_actual_hours(payload.task_id)?;
        tx.commit()?;

        debug!(time_log_id = id, task_id = payload.task_id, hours = payload.hours, "logged time");
        self.get_time_log(id)
    }

    pub fn update_time_log(&self, id: i64, changes: &TimeLogChanges) -> Outcome<TimeLog> {
        let existing = self.get_time_log(id)?;
        if !self.may_change(existing.user_id) {
            return Err(forbidden("Not authorized to update this time log"));
        }
        if let Some(hours) = changes.hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(unprocessable("hours", "hours must be greater than 0"));
            }
        }

        let mut assignments = Assignments::without_timestamp();
        if let Some(hours) = changes.hours {
            assignments.set("hours", hours);
        }
        if let Some(description) = &changes.description {
            assignments.set("description", description.clone());
        }
        if let Some(date) = changes.date {
            assignments.set("date", date.to_string());
        }

        let tx = self.conn.unchecked_transaction()?;
        assignments.execute(&tx, "time_logs", id)?;
        self.refresh_actual_hours(existing.task_id)?;
        tx.commit()?;

        self.get_time_log(id)
    }

    pub fn delete_time_log(&self, id: i64) -> Outcome<()> {
        let existing = self.get_time_log(id)?;
        if !self.may_change(existing.user_id) {
            return Err(forbidden("Not authorized to delete this time log"));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM time_logs WHERE id = ?1", [id])?;
        self.refresh_actual_hours(existing.task_id)?;
        tx.commit()?;

        debug!(time_log_id = id, task_id = existing.task_id, "deleted time log");
        Ok(())
    }
}

/// `SET` clause builder for partial updates.
struct Assignments {
    columns: Vec<String>,
    values: Vec<Box<dyn ToSql>>,
}

impl Assignments {
    /// Starts with `updated_at = now`.
    fn new() -> Self {
        let mut assignments = Self::without_timestamp();
        assignments.set("updated_at", Utc::now().to_rfc3339());
        assignments
    }

    fn without_timestamp() -> Self {
        Self {
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    fn set<T: ToSql + 'static>(&mut self, column: &str, value: T) {
        self.values.push(Box::new(value));
        self.columns.push(format!("{} = ?{}", column, self.values.len()));
    }

    fn execute(mut self, conn: &Connection, table: &str, id: i64) -> rusqlite::Result<usize> {
        if self.columns.is_empty() {
            return Ok(0);
        }
        self.values.push(Box::new(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            self.columns.join(", "),
            self.values.len()
        );
        let params_refs: Vec<&dyn ToSql> = self.values.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
    })
}

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        owner_id: row.get(4)?,
        start_date: parse_optional_date(row, 5)?,
        end_date: parse_optional_date(row, 6)?,
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        priority: parse_column(row, 4)?,
        project_id: row.get(5)?,
        assignee_id: row.get(6)?,
        estimated_hours: row.get(7)?,
        actual_hours: row.get(8)?,
        created_at: parse_datetime(row.get::<_, String>(9)?),
        updated_at: parse_datetime(row.get::<_, String>(10)?),
    })
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    let task_id: Option<i64> = row.get(3)?;
    let project_id: Option<i64> = row.get(4)?;
    let parent = match (task_id, project_id) {
        (Some(id), None) => CommentParent::Task(id),
        (None, Some(id)) => CommentParent::Project(id),
        _ => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Integer,
                "comment must have exactly one parent".into(),
            ))
        }
    };

    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        user_id: row.get(2)?,
        parent,
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn time_log_from_row(row: &Row) -> rusqlite::Result<TimeLog> {
    Ok(TimeLog {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        hours: row.get(3)?,
        description: row.get(4)?,
        date: parse_column(row, 5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

#[async_trait(?Send)]
impl RemoteResource<Project> for Database {
    async fn list(&self, query: &ProjectQuery) -> Outcome<Vec<Project>> {
        self.list_projects(query)
    }

    async fn get(&self, id: i64) -> Outcome<Project> {
        self.get_project(id)
    }

    async fn create(&self, payload: &NewProject) -> Outcome<Project> {
        self.create_project(payload)
    }

    async fn update(&self, id: i64, changes: &ProjectChanges) -> Outcome<Project> {
        self.update_project(id, changes)
    }

    async fn delete(&self, id: i64) -> Outcome<()> {
        self.delete_project(id)
    }
}

#[async_trait(?Send)]
impl RemoteResource<Task> for Database {
    async fn list(&self, query: &TaskQuery) -> Outcome<Vec<Task>> {
        self.list_tasks(query)
    }

    async fn get(&self, id: i64) -> Outcome<Task> {
        self.get_task(id)
    }

    async fn create(&self, payload: &NewTask) -> Outcome<Task> {
        self.create_task(payload)
    }

    async fn update(&self, id: i64, changes: &TaskChanges) -> Outcome<Task> {
        self.update_task(id, changes)
    }

    async fn delete(&self, id: i64) -> Outcome<()> {
        self.delete_task(id)
    }
}

#[async_trait(?Send)]
impl RemoteResource<Comment> for Database {
    async fn list(&self, query: &CommentQuery) -> Outcome<Vec<Comment>> {
        self.list_comments(query)
    }

    async fn get(&self, id: i64) -> Outcome<Comment> {
        self.get_comment(id)
    }

    async fn create(&self, payload: &NewComment) -> Outcome<Comment> {
        self.create_comment(payload)
    }

    async fn update(&self, id: i64, changes: &CommentChanges) -> Outcome<Comment> {
        self.update_comment(id, changes)
    }

    async fn delete(&self, id: i64) -> Outcome<()> {
        self.delete_comment(id)
    }
}

#[async_trait(?Send)]
impl RemoteResource<TimeLog> for Database {
    async fn list(&self, query: &TimeLogQuery) -> Outcome<Vec<TimeLog>> {
        self.list_time_logs(query)
    }

    async fn get(&self, id: i64) -> Outcome<TimeLog> {
        self.get_time_log(id)
    }

    async fn create(&self, payload: &NewTimeLog) -> Outcome<TimeLog> {
        self.create_time_log(payload)
    }

    async fn update(&self, id: i64, changes: &TimeLogChanges) -> Outcome<TimeLog> {
        self.update_time_log(id, changes)
    }

    async fn delete(&self, id: i64) -> Outcome<()> {
        self.delete_time_log(id)
    }
}
