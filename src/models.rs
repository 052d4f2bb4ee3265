use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// The four kinds of entity the store keeps a collection for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    Task,
    Comment,
    TimeLog,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Task => "task",
            ResourceKind::Comment => "comment",
            ResourceKind::TimeLog => "time log",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Task => "tasks",
            ResourceKind::Comment => "comments",
            ResourceKind::TimeLog => "time logs",
        }
    }

    /// Capitalized form used in backend error details ("Task not found").
    pub fn title(self) -> &'static str {
        match self {
            ResourceKind::Project => "Project",
            ResourceKind::Task => "Task",
            ResourceKind::Comment => "Comment",
            ResourceKind::TimeLog => "Time log",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity kind with its own collection and CRUD contract.
///
/// The associated types name the payloads the gateway accepts for it.
pub trait Resource: Clone + fmt::Debug + 'static {
    const KIND: ResourceKind;

    type Query: fmt::Debug + 'static;
    type Create: fmt::Debug + 'static;
    type Changes: fmt::Debug + 'static;

    fn id(&self) -> i64;
}

fn parse_variant<T: Copy>(
    field: &'static str,
    value: &str,
    all: &[T],
    name: fn(T) -> &'static str,
) -> Result<T, ValidationError> {
    all.iter().copied().find(|v| name(*v) == value).ok_or_else(|| {
        let valid: Vec<&str> = all.iter().map(|v| name(*v)).collect();
        ValidationError::new(
            field,
            format!("invalid value '{}', must be one of: {}", value, valid.join(", ")),
        )
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [
        ProjectStatus::Active,
        ProjectStatus::OnHold,
        ProjectStatus::Completed,
        ProjectStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether the project is finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant("status", s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    ReadyToTest,
    InTest,
    Closed,
}

impl TaskStatus {
    /// Declared workflow order, also the Kanban column order.
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::ReadyToTest,
        TaskStatus::InTest,
        TaskStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::ReadyToTest => "ready_to_test",
            TaskStatus::InTest => "in_test",
            TaskStatus::Closed => "closed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::ReadyToTest => "Ready to Test",
            TaskStatus::InTest => "In Test",
            TaskStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant("status", s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant("priority", s, &Self::ALL, Self::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub project_id: i64,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single parent a comment hangs off.
///
/// On the wire this is the flat `task_id` / `project_id` pair with exactly
/// one of them set; anything else is rejected when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ParentIds", into = "ParentIds")]
pub enum CommentParent {
    Task(i64),
    Project(i64),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ParentIds {
    #[serde(default)]
    task_id: Option<i64>,
    #[serde(default)]
    project_id: Option<i64>,
}

impl TryFrom<ParentIds> for CommentParent {
    type Error = String;

    fn try_from(ids: ParentIds) -> Result<Self, Self::Error> {
        match (ids.task_id, ids.project_id) {
            (Some(task_id), None) => Ok(CommentParent::Task(task_id)),
            (None, Some(project_id)) => Ok(CommentParent::Project(project_id)),
            (Some(_), Some(_)) => {
                Err("comment cannot belong to both a task and a project".to_string())
            }
            (None, None) => Err("either task_id or project_id is required".to_string()),
        }
    }
}

impl From<CommentParent> for ParentIds {
    fn from(parent: CommentParent) -> Self {
        match parent {
            CommentParent::Task(id) => ParentIds {
                task_id: Some(id),
                project_id: None,
            },
            CommentParent::Project(id) => ParentIds {
                task_id: None,
                project_id: Some(id),
            },
        }
    }
}

impl CommentParent {
    pub fn task_id(self) -> Option<i64> {
        match self {
            CommentParent::Task(id) => Some(id),
            CommentParent::Project(_) => None,
        }
    }

    pub fn project_id(self) -> Option<i64> {
        match self {
            CommentParent::Project(id) => Some(id),
            CommentParent::Task(_) => None,
        }
    }
}

impl fmt::Display for CommentParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentParent::Task(id) => write!(f, "task #{}", id),
            CommentParent::Project(id) => write!(f, "project #{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    #[serde(flatten)]
    pub parent: CommentParent,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: i64,
    pub task_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub hours: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// Payloads

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub owner_id: i64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub project_id: i64,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub user_id: i64,
    #[serde(flatten)]
    pub parent: CommentParent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentChanges {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeLog {
    pub task_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub hours: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeLogChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

// List queries

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub project_id: Option<i64>,
    pub assignee_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentQuery {
    #[default]
    All,
    Task(i64),
    Project(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeLogQuery {
    pub task_id: Option<i64>,
    pub user_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Resource for Project {
    const KIND: ResourceKind = ResourceKind::Project;
    type Query = ProjectQuery;
    type Create = NewProject;
    type Changes = ProjectChanges;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Task {
    const KIND: ResourceKind = ResourceKind::Task;
    type Query = TaskQuery;
    type Create = NewTask;
    type Changes = TaskChanges;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Comment {
    const KIND: ResourceKind = ResourceKind::Comment;
    type Query = CommentQuery;
    type Create = NewComment;
    type Changes = CommentChanges;

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for TimeLog {
    const KIND: ResourceKind = ResourceKind::TimeLog;
    type Query = TimeLogQuery;
    type Create = NewTimeLog;
    type Changes = TimeLogChanges;

    fn id(&self) -> i64 {
        self.id
    }
}

// Client-side validation, run before anything is dispatched.

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive_hours(field: &'static str, hours: f64) -> Result<(), ValidationError> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }
    Ok(())
}

fn require_date_order(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::new("end_date", "must not be before start_date"));
        }
    }
    Ok(())
}

fn nothing_to_update() -> ValidationError {
    ValidationError::new("changes", "nothing to update")
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        require_date_order(self.start_date, self.end_date)
    }
}

impl ProjectChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(nothing_to_update());
        }
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        require_date_order(self.start_date, self.end_date)
    }
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)?;
        if let Some(hours) = self.estimated_hours {
            require_positive_hours("estimated_hours", hours)?;
        }
        Ok(())
    }
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.project_id.is_none()
            && self.assignee_id.is_none()
            && self.estimated_hours.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(nothing_to_update());
        }
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(hours) = self.estimated_hours {
            require_positive_hours("estimated_hours", hours)?;
        }
        Ok(())
    }
}

impl NewComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}

impl CommentChanges {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}

impl NewTimeLog {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_positive_hours("hours", self.hours)
    }
}

impl TimeLogChanges {
    pub fn is_empty(&self) -> bool {
        self.hours.is_none() && self.description.is_none() && self.date.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(nothing_to_update());
        }
        if let Some(hours) = self.hours {
            require_positive_hours("hours", hours)?;
        }
        Ok(())
    }
}
