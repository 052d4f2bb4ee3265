//! Read-only projections over store contents.
//!
//! Everything here is a pure function of its arguments: no caching, no
//! interior state. Callers recompute whenever the inputs change.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::models::{Comment, Project, ProjectStatus, Resource, Task, TaskStatus, TimeLog};

/// Entities that sit in exactly one status column.
pub trait HasStatus {
    type Status: Copy + Eq + Hash + fmt::Debug;

    fn status(&self) -> Self::Status;
}

impl HasStatus for Task {
    type Status = TaskStatus;

    fn status(&self) -> TaskStatus {
        self.status
    }
}

impl HasStatus for Project {
    type Status = ProjectStatus;

    fn status(&self) -> ProjectStatus {
        self.status
    }
}

/// Kanban columns: one bucket per status, each in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusBuckets<'a, T: HasStatus> {
    buckets: Vec<(T::Status, Vec<&'a T>)>,
}

impl<'a, T: HasStatus> StatusBuckets<'a, T> {
    /// Items in `status`'s bucket; empty when there is no such bucket.
    pub fn get(&self, status: T::Status) -> &[&'a T] {
        self.buckets
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, items)| items.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (T::Status, &[&'a T])> + '_ {
        self.buckets.iter().map(|(s, items)| (*s, items.as_slice()))
    }

    pub fn statuses(&self) -> Vec<T::Status> {
        self.buckets.iter().map(|(s, _)| *s).collect()
    }

    /// Number of items across all buckets.
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|(_, items)| items.len()).sum()
    }
}

/// Group `items` by status.
///
/// Every status in `order` gets a bucket, empty or not, in that order;
/// repeated statuses in `order` count once. Items whose status is missing
/// from `order` land in trailing buckets in first-seen order, so the
/// buckets always partition the input.
pub fn group_by_status<'a, T, I>(items: I, order: &[T::Status]) -> StatusBuckets<'a, T>
where
    T: HasStatus + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buckets: Vec<(T::Status, Vec<&'a T>)> = Vec::with_capacity(order.len());
    for status in order {
        if !buckets.iter().any(|(s, _)| s == status) {
            buckets.push((*status, Vec::new()));
        }
    }

    for item in items {
        let status = item.status();
        match buckets.iter_mut().find(|(s, _)| *s == status) {
            Some((_, bucket)) => bucket.push(item),
            None => buckets.push((status, vec![item])),
        }
    }

    StatusBuckets { buckets }
}

/// A filter value that is either a wildcard or one exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<T> {
    All,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T: PartialEq> Selector<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(expected) => expected == value,
        }
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    /// `"all"` (any case) is the wildcard.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Selector::All)
        } else {
            s.parse().map(Selector::Only)
        }
    }
}

fn matches_search(needle: &str, title: &str, description: Option<&str>) -> bool {
    if needle.is_empty() {
        return true;
    }
    title.to_lowercase().contains(needle)
        || description.is_some_and(|d| d.to_lowercase().contains(needle))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub search: String,
    pub status: Selector<TaskStatus>,
    pub project: Selector<i64>,
}

/// Tasks matching every part of `filter`, in source order.
pub fn filter_tasks<'a, I>(tasks: I, filter: &TaskFilter) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let needle = filter.search.trim().to_lowercase();
    tasks
        .into_iter()
        .filter(|task| matches_search(&needle, &task.title, task.description.as_deref()))
        .filter(|task| filter.status.matches(&task.status))
        .filter(|task| filter.project.matches(&task.project_id))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectFilter {
    pub search: String,
    pub status: Selector<ProjectStatus>,
}

pub fn filter_projects<'a, I>(projects: I, filter: &ProjectFilter) -> Vec<&'a Project>
where
    I: IntoIterator<Item = &'a Project>,
{
    let needle = filter.search.trim().to_lowercase();
    projects
        .into_iter()
        .filter(|project| {
            matches_search(&needle, &project.title, project.description.as_deref())
        })
        .filter(|project| filter.status.matches(&project.status))
        .collect()
}

pub fn my_tasks<'a, I>(tasks: I, current_user_id: i64) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| task.assignee_id == Some(current_user_id))
        .collect()
}

// Project health

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    NoTasks,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::NoTasks => "no_tasks",
        }
    }

    fn severity(self) -> u8 {
        match self {
            HealthStatus::Healthy | HealthStatus::NoTasks => 0,
            HealthStatus::Warning => 1,
            HealthStatus::Critical => 2,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds mapping a completion rate to a [`HealthStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Minimum completion rate (percent) for `healthy`.
    pub healthy_at: u32,
    /// Minimum completion rate (percent) for `warning`; below is `critical`.
    pub warning_at: u32,
    /// Best tier an overdue project can reach. `None` ignores due dates.
    pub overdue_cap: Option<HealthStatus>,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            healthy_at: 70,
            warning_at: 40,
            overdue_cap: Some(HealthStatus::Warning),
        }
    }
}

impl HealthPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.healthy_at > 100 {
            return Err(ValidationError::new("healthy_at", "must be at most 100"));
        }
        if self.warning_at > self.healthy_at {
            return Err(ValidationError::new(
                "warning_at",
                "must not exceed healthy_at",
            ));
        }
        if self.overdue_cap == Some(HealthStatus::NoTasks) {
            return Err(ValidationError::new(
                "overdue_cap",
                "must be healthy, warning or critical",
            ));
        }
        Ok(())
    }

    pub fn tier(&self, completion_rate: u32) -> HealthStatus {
        if completion_rate >= self.healthy_at {
            HealthStatus::Healthy
        } else if completion_rate >= self.warning_at {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectHealth {
    pub project_id: i64,
    pub project_title: String,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub completion_rate: u32,
    pub overdue: bool,
    pub health_status: HealthStatus,
}

/// Past its end date and still open.
pub fn is_overdue(project: &Project, today: NaiveDate) -> bool {
    !project.status.is_terminal() && project.end_date.is_some_and(|end| end < today)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Completion and health of `project`, counting only tasks that belong to it.
pub fn project_health<'a, I>(
    project: &Project,
    tasks: I,
    policy: &HealthPolicy,
    today: NaiveDate,
) -> ProjectHealth
where
    I: IntoIterator<Item = &'a Task>,
{
    let (total, completed) = tasks
        .into_iter()
        .filter(|task| task.project_id == project.id)
        .fold((0usize, 0usize), |(total, completed), task| {
            (total + 1, completed + usize::from(task.status == TaskStatus::Closed))
        });

    let completion_rate = percent(completed, total).round() as u32;
    let overdue = is_overdue(project, today);

    let tier = if total == 0 {
        HealthStatus::NoTasks
    } else {
        policy.tier(completion_rate)
    };
    let health_status = match policy.overdue_cap {
        Some(cap) if overdue && cap.severity() > tier.severity() => cap,
        _ => tier,
    };

    ProjectHealth {
        project_id: project.id,
        project_title: project.title.clone(),
        completed_tasks: completed,
        total_tasks: total,
        completion_rate,
        overdue,
        health_status,
    }
}

/// Per-status task counts in workflow order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    counts: Vec<(TaskStatus, usize)>,
}

impl StatusTally {
    pub fn get(&self, status: TaskStatus) -> usize {
        self.counts
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskStatus, usize)> + '_ {
        self.counts.iter().copied()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

pub fn status_tally<'a, I>(tasks: I) -> StatusTally
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut counts: Vec<(TaskStatus, usize)> =
        TaskStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for task in tasks {
        if let Some((_, count)) = counts.iter_mut().find(|(s, _)| *s == task.status) {
            *count += 1;
        }
    }
    StatusTally { counts }
}

// Recency

pub trait Timestamped: Resource {
    fn created_at(&self) -> DateTime<Utc>;
}

impl Timestamped for Project {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Task {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Comment {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for TimeLog {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The `n` newest items; ties on `created_at` put the higher id first.
pub fn most_recent<'a, T, I>(items: I, n: usize) -> Vec<&'a T>
where
    T: Timestamped + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut items: Vec<&'a T> = items.into_iter().collect();
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
    items.truncate(n);
    items
}

// Dashboard and metrics

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub total_tasks: usize,
    pub my_tasks: usize,
    pub closed_tasks: usize,
}

pub fn dashboard_summary(
    projects: &[Project],
    tasks: &[Task],
    current_user_id: Option<i64>,
) -> DashboardSummary {
    DashboardSummary {
        total_projects: projects.len(),
        total_tasks: tasks.len(),
        my_tasks: current_user_id.map_or(0, |id| my_tasks(tasks, id).len()),
        closed_tasks: tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Closed)
            .count(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub project_id: i64,
    pub total_tasks: usize,
    pub by_status: StatusTally,
    /// Closed over total, in percent, two decimals.
    pub completion_percentage: f64,
    pub total_estimated_hours: f64,
    pub total_actual_hours: f64,
}

pub fn project_stats(project_id: i64, tasks: &[Task]) -> ProjectStats {
    let owned: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.project_id == project_id)
        .collect();
    let by_status = status_tally(owned.iter().copied());
    let closed = by_status.get(TaskStatus::Closed);

    ProjectStats {
        project_id,
        total_tasks: owned.len(),
        completion_percentage: round_to(percent(closed, owned.len()), 2),
        total_estimated_hours: owned.iter().filter_map(|task| task.estimated_hours).sum(),
        total_actual_hours: owned.iter().map(|task| task.actual_hours).sum(),
        by_status,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCompletions {
    pub day: NaiveDate,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub tasks_completed_this_week: usize,
    pub avg_completion_days: f64,
    /// Closed over total, in percent, one decimal.
    pub productivity_score: f64,
    pub total_logged_hours: f64,
    pub avg_hours_per_task: f64,
    pub project_health: Vec<ProjectHealth>,
    pub weekly_trend: Vec<DailyCompletions>,
}

/// Team-wide metrics as of `now`.
///
/// A closed task counts as completed at its `updated_at`.
pub fn performance_metrics(
    projects: &[Project],
    tasks: &[Task],
    time_logs: &[TimeLog],
    policy: &HealthPolicy,
    now: DateTime<Utc>,
) -> PerformanceMetrics {
    let week_ago = now - Duration::days(7);
    let closed: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Closed)
        .collect();

    let completion_days: Vec<i64> = closed
        .iter()
        .map(|task| (task.updated_at - task.created_at).num_days())
        .filter(|days| *days >= 0)
        .collect();
    let avg_completion_days = if completion_days.is_empty() {
        0.0
    } else {
        round_to(
            completion_days.iter().sum::<i64>() as f64 / completion_days.len() as f64,
            1,
        )
    };

    let total_logged_hours: f64 = time_logs.iter().map(|log| log.hours).sum();
    let avg_hours_per_task = if tasks.is_empty() {
        0.0
    } else {
        round_to(total_logged_hours / tasks.len() as f64, 1)
    };

    let today = now.date_naive();
    let weekly_trend = (0..7)
        .map(|offset| {
            let start = week_ago + Duration::days(offset);
            let end = start + Duration::days(1);
            DailyCompletions {
                day: start.date_naive(),
                completed: closed
                    .iter()
                    .filter(|task| task.updated_at >= start && task.updated_at < end)
                    .count(),
            }
        })
        .collect();

    PerformanceMetrics {
        total_tasks: tasks.len(),
        completed_tasks: closed.len(),
        tasks_completed_this_week: closed
            .iter()
            .filter(|task| task.updated_at >= week_ago)
            .count(),
        avg_completion_days,
        productivity_score: round_to(percent(closed.len(), tasks.len()), 1),
        total_logged_hours,
        avg_hours_per_task,
        project_health: projects
            .iter()
            .map(|project| project_health(project, tasks, policy, today))
            .collect(),
        weekly_trend,
    }
}

// Time tracking

/// Inclusive calendar range; an open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskHours {
    pub task_id: i64,
    pub task_title: Option<String>,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSummary {
    pub user_id: i64,
    pub total_hours: f64,
    pub tasks: Vec<TaskHours>,
    pub range: DateRange,
}

/// Hours `user_id` logged inside `range`, grouped by task in first-seen
/// order. Titles come from `tasks` when the task is known.
pub fn time_summary(
    user_id: i64,
    time_logs: &[TimeLog],
    tasks: &[Task],
    range: DateRange,
) -> TimeSummary {
    let titles: HashMap<i64, &str> = tasks
        .iter()
        .map(|task| (task.id, task.title.as_str()))
        .collect();

    let mut summary: Vec<TaskHours> = Vec::new();
    for log in time_logs
        .iter()
        .filter(|log| log.user_id == Some(user_id) && range.contains(log.date))
    {
        match summary.iter_mut().find(|entry| entry.task_id == log.task_id) {
            Some(entry) => entry.hours += log.hours,
            None => summary.push(TaskHours {
                task_id: log.task_id,
                task_title: titles.get(&log.task_id).map(|t| t.to_string()),
                hours: log.hours,
            }),
        }
    }

    TimeSummary {
        user_id,
        total_hours: summary.iter().map(|entry| entry.hours).sum(),
        tasks: summary,
        range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: i64, project_id: i64, status: TaskStatus) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: None,
            status,
            priority: TaskPriority::Medium,
            project_id,
            assignee_id: None,
            estimated_hours: None,
            actual_hours: 0.0,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    fn project(id: i64, end_date: Option<NaiveDate>) -> Project {
        Project {
            id,
            title: format!("Project {}", id),
            description: None,
            status: ProjectStatus::Active,
            owner_id: 1,
            start_date: None,
            end_date,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    fn time_log(id: i64, task_id: i64, user_id: i64, hours: f64, day: NaiveDate) -> TimeLog {
        TimeLog {
            id,
            task_id,
            user_id: Some(user_id),
            hours,
            description: None,
            date: day,
            created_at: at(1),
        }
    }

    fn ids(tasks: &[&Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_group_by_status_has_every_column() {
        let tasks = vec![
            task(1, 1, TaskStatus::Review),
            task(2, 1, TaskStatus::Todo),
            task(3, 1, TaskStatus::Review),
        ];
        let board = group_by_status(&tasks, &TaskStatus::ALL);

        assert_eq!(board.statuses(), TaskStatus::ALL.to_vec());
        assert_eq!(ids(board.get(TaskStatus::Review)), vec![1, 3]);
        assert_eq!(ids(board.get(TaskStatus::Todo)), vec![2]);
        assert!(board.get(TaskStatus::Closed).is_empty());
        assert_eq!(board.total(), 3);
    }

    #[test]
    fn test_group_by_status_handles_partial_order() {
        let tasks = vec![
            task(1, 1, TaskStatus::Closed),
            task(2, 1, TaskStatus::Todo),
            task(3, 1, TaskStatus::InTest),
        ];
        let board = group_by_status(&tasks, &[TaskStatus::Todo, TaskStatus::Todo]);

        assert_eq!(
            board.statuses(),
            vec![TaskStatus::Todo, TaskStatus::Closed, TaskStatus::InTest]
        );
        assert_eq!(board.total(), 3);
    }

    #[test]
    fn test_group_projects_by_status() {
        let mut held = project(2, None);
        held.status = ProjectStatus::OnHold;
        let projects = vec![project(1, None), held];
        let board = group_by_status(&projects, &ProjectStatus::ALL);
        assert_eq!(board.get(ProjectStatus::OnHold).len(), 1);
        assert_eq!(board.get(ProjectStatus::Completed).len(), 0);
    }

    #[test]
    fn test_filter_tasks_search_is_case_insensitive() {
        let mut a = task(1, 1, TaskStatus::Todo);
        a.title = "Fix Login".to_string();
        let mut b = task(2, 1, TaskStatus::Todo);
        b.description = Some("the LOGIN page breaks".to_string());
        let c = task(3, 1, TaskStatus::Todo);
        let tasks = vec![a, b, c];

        let filter = TaskFilter {
            search: "login".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter)), vec![1, 2]);
    }

    #[test]
    fn test_filter_tasks_combines_filters() {
        let tasks = vec![
            task(1, 1, TaskStatus::Todo),
            task(2, 2, TaskStatus::Todo),
            task(3, 2, TaskStatus::Closed),
        ];
        let filter = TaskFilter {
            search: String::new(),
            status: "todo".parse().unwrap(),
            project: "2".parse().unwrap(),
        };
        assert_eq!(ids(&filter_tasks(&tasks, &filter)), vec![2]);

        let all = TaskFilter {
            status: "all".parse().unwrap(),
            project: "ALL".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(filter_tasks(&tasks, &all).len(), 3);
    }

    #[test]
    fn test_selector_rejects_unknown_status() {
        assert!("done".parse::<Selector<TaskStatus>>().is_err());
    }

    #[test]
    fn test_filter_projects() {
        let mut done = project(2, None);
        done.status = ProjectStatus::Completed;
        done.title = "Website relaunch".to_string();
        let projects = vec![project(1, None), done];

        let filter = ProjectFilter {
            search: "website".to_string(),
            status: Selector::Only(ProjectStatus::Completed),
        };
        let found = filter_projects(&projects, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[test]
    fn test_my_tasks() {
        let mut mine = task(1, 1, TaskStatus::Todo);
        mine.assignee_id = Some(7);
        let mut theirs = task(2, 1, TaskStatus::Todo);
        theirs.assignee_id = Some(8);
        let tasks = vec![mine, theirs, task(3, 1, TaskStatus::Todo)];
        assert_eq!(ids(&my_tasks(&tasks, 7)), vec![1]);
    }

    #[test]
    fn test_project_health_three_of_four() {
        let tasks = vec![
            task(1, 1, TaskStatus::Closed),
            task(2, 1, TaskStatus::Closed),
            task(3, 1, TaskStatus::Closed),
            task(4, 1, TaskStatus::Todo),
            task(5, 2, TaskStatus::Todo),
        ];
        let policy = HealthPolicy::default();
        let health = project_health(&project(1, None), &tasks, &policy, date(2024, 6, 1));
        assert_eq!(health.completion_rate, 75);
        assert_eq!(health.completed_tasks, 3);
        assert_eq!(health.total_tasks, 4);
        assert_eq!(health.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn test_project_health_no_tasks() {
        let policy = HealthPolicy::default();
        let health = project_health(&project(1, None), &Vec::new(), &policy, date(2024, 6, 1));
        assert_eq!(health.completion_rate, 0);
        assert_eq!(health.health_status, HealthStatus::NoTasks);
    }

    #[test]
    fn test_project_health_thresholds_are_configurable() {
        let tasks = vec![task(1, 1, TaskStatus::Closed), task(2, 1, TaskStatus::Todo)];
        let today = date(2024, 6, 1);

        let default = project_health(&project(1, None), &tasks, &HealthPolicy::default(), today);
        assert_eq!(default.health_status, HealthStatus::Warning);

        let lenient = HealthPolicy {
            healthy_at: 50,
            warning_at: 20,
            overdue_cap: None,
        };
        let health = project_health(&project(1, None), &tasks, &lenient, today);
        assert_eq!(health.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn test_overdue_project_is_capped() {
        let tasks = vec![task(1, 1, TaskStatus::Closed)];
        let late = project(1, Some(date(2024, 5, 1)));
        let today = date(2024, 6, 1);

        let health = project_health(&late, &tasks, &HealthPolicy::default(), today);
        assert!(health.overdue);
        assert_eq!(health.health_status, HealthStatus::Warning);

        let strict = HealthPolicy {
            overdue_cap: Some(HealthStatus::Critical),
            ..Default::default()
        };
        assert_eq!(
            project_health(&late, &tasks, &strict, today).health_status,
            HealthStatus::Critical
        );

        let mut finished = late.clone();
        finished.status = ProjectStatus::Completed;
        let health = project_health(&finished, &tasks, &HealthPolicy::default(), today);
        assert!(!health.overdue);
        assert_eq!(health.health_status, HealthStatus::Healthy);
    }

    #[test]
    fn test_health_policy_validation() {
        assert!(HealthPolicy::default().validate().is_ok());
        let inverted = HealthPolicy {
            healthy_at: 30,
            warning_at: 60,
            overdue_cap: None,
        };
        assert_eq!(inverted.validate().unwrap_err().field, "warning_at");
    }

    #[test]
    fn test_status_tally_counts_every_status() {
        let tasks = vec![
            task(1, 1, TaskStatus::Todo),
            task(2, 1, TaskStatus::Todo),
            task(3, 1, TaskStatus::Closed),
        ];
        let tally = status_tally(&tasks);
        assert_eq!(tally.get(TaskStatus::Todo), 2);
        assert_eq!(tally.get(TaskStatus::Closed), 1);
        assert_eq!(tally.get(TaskStatus::Review), 0);
        assert_eq!(tally.iter().count(), TaskStatus::ALL.len());
        assert_eq!(status_tally(&Vec::new()).total(), 0);
    }

    #[test]
    fn test_most_recent_orders_by_created_at_then_id() {
        let mut a = task(1, 1, TaskStatus::Todo);
        a.created_at = at(3);
        let mut b = task(2, 1, TaskStatus::Todo);
        b.created_at = at(5);
        let mut c = task(3, 1, TaskStatus::Todo);
        c.created_at = at(3);
        let tasks = vec![a, b, c];

        assert_eq!(ids(&most_recent(&tasks, 2)), vec![2, 3]);
        assert_eq!(most_recent(&tasks, 10).len(), 3);
    }

    #[test]
    fn test_dashboard_summary() {
        let mut mine = task(1, 1, TaskStatus::Closed);
        mine.assignee_id = Some(4);
        let tasks = vec![mine, task(2, 1, TaskStatus::Todo)];
        let summary = dashboard_summary(&[project(1, None)], &tasks, Some(4));
        assert_eq!(
            summary,
            DashboardSummary {
                total_projects: 1,
                total_tasks: 2,
                my_tasks: 1,
                closed_tasks: 1,
            }
        );
    }

    #[test]
    fn test_project_stats_hours_and_percentage() {
        let mut a = task(1, 1, TaskStatus::Closed);
        a.estimated_hours = Some(4.0);
        a.actual_hours = 3.5;
        let mut b = task(2, 1, TaskStatus::Todo);
        b.actual_hours = 1.0;
        let c = task(3, 1, TaskStatus::Todo);
        let tasks = vec![a, b, c, task(4, 9, TaskStatus::Closed)];

        let stats = project_stats(1, &tasks);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completion_percentage, 33.33);
        assert_eq!(stats.total_estimated_hours, 4.0);
        assert_eq!(stats.total_actual_hours, 4.5);
        assert_eq!(stats.by_status.get(TaskStatus::Todo), 2);
    }

    #[test]
    fn test_performance_metrics() {
        let mut done = task(1, 1, TaskStatus::Closed);
        done.created_at = at(1);
        done.updated_at = at(5);
        let mut old = task(2, 1, TaskStatus::Closed);
        old.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        old.updated_at = Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap();
        let tasks = vec![done, old, task(3, 1, TaskStatus::Todo)];
        let logs = vec![time_log(1, 1, 1, 2.0, date(2024, 6, 2))];

        let metrics = performance_metrics(
            &[project(1, None)],
            &tasks,
            &logs,
            &HealthPolicy::default(),
            at(8),
        );
        assert_eq!(metrics.total_tasks, 3);
        assert_eq!(metrics.completed_tasks, 2);
        assert_eq!(metrics.tasks_completed_this_week, 1);
        assert_eq!(metrics.avg_completion_days, 3.0);
        assert_eq!(metrics.productivity_score, 66.7);
        assert_eq!(metrics.total_logged_hours, 2.0);
        assert_eq!(metrics.avg_hours_per_task, 0.7);
        assert_eq!(metrics.project_health.len(), 1);
        assert_eq!(metrics.weekly_trend.len(), 7);
        assert_eq!(metrics.weekly_trend.iter().map(|d| d.completed).sum::<usize>(), 1);
    }

    #[test]
    fn test_performance_metrics_empty() {
        let metrics = performance_metrics(&[], &[], &[], &HealthPolicy::default(), at(8));
        assert_eq!(metrics.productivity_score, 0.0);
        assert_eq!(metrics.avg_hours_per_task, 0.0);
        assert_eq!(metrics.avg_completion_days, 0.0);
    }

    #[test]
    fn test_time_summary_groups_by_task_within_range() {
        let tasks = vec![task(1, 1, TaskStatus::Todo)];
        let logs = vec![
            time_log(1, 1, 5, 2.0, date(2024, 6, 1)),
            time_log(2, 2, 5, 1.5, date(2024, 6, 2)),
            time_log(3, 1, 5, 1.0, date(2024, 6, 3)),
            time_log(4, 1, 6, 8.0, date(2024, 6, 3)),
            time_log(5, 1, 5, 4.0, date(2024, 7, 1)),
        ];
        let range = DateRange {
            start: Some(date(2024, 6, 1)),
            end: Some(date(2024, 6, 30)),
        };

        let summary = time_summary(5, &logs, &tasks, range);
        assert_eq!(summary.total_hours, 4.5);
        assert_eq!(summary.tasks.len(), 2);
        assert_eq!(summary.tasks[0].task_title.as_deref(), Some("Task 1"));
        assert_eq!(summary.tasks[0].hours, 3.0);
        assert_eq!(summary.tasks[1].task_title, None);
    }

    // ==================== Property-Based Tests ====================

    fn arb_task() -> impl Strategy<Value = Task> {
        (
            1i64..1000,
            1i64..4,
            0usize..TaskStatus::ALL.len(),
            "[a-zA-Z ]{0,12}",
            proptest::option::of("[a-zA-Z ]{0,12}"),
        )
            .prop_map(|(id, project_id, status, title, description)| {
                let mut t = task(id, project_id, TaskStatus::ALL[status]);
                t.title = title;
                t.description = description;
                t
            })
    }

    proptest! {
        #[test]
        fn prop_group_by_status_partitions(
            tasks in proptest::collection::vec(arb_task(), 0..40),
            order in Just(TaskStatus::ALL.to_vec()).prop_shuffle(),
            keep in 0usize..=6,
        ) {
            let order = &order[..keep];
            let board = group_by_status(&tasks, order);
            prop_assert_eq!(board.total(), tasks.len());
            for (status, items) in board.iter() {
                prop_assert!(items.iter().all(|t| t.status == status));
            }
            let distinct = board.statuses();
            let mut deduped = distinct.clone();
            deduped.dedup();
            prop_assert_eq!(distinct.len(), deduped.len());
        }

        #[test]
        fn prop_filter_tasks_idempotent(
            tasks in proptest::collection::vec(arb_task(), 0..40),
            search in "[a-z]{0,3}",
            status in proptest::option::of(0usize..TaskStatus::ALL.len()),
            project in proptest::option::of(1i64..4),
        ) {
            let filter = TaskFilter {
                search,
                status: status.map_or(Selector::All, |i| Selector::Only(TaskStatus::ALL[i])),
                project: project.map_or(Selector::All, Selector::Only),
            };
            let once = filter_tasks(&tasks, &filter);
            let twice = filter_tasks(once.iter().copied(), &filter);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_status_tally_sums_to_len(tasks in proptest::collection::vec(arb_task(), 0..40)) {
            prop_assert_eq!(status_tally(&tasks).total(), tasks.len());
        }

        #[test]
        fn prop_completion_rate_bounded(tasks in proptest::collection::vec(arb_task(), 0..40)) {
            let policy = HealthPolicy::default();
            let health = project_health(&project(1, None), &tasks, &policy, date(2024, 6, 1));
            prop_assert!(health.completion_rate <= 100);
            prop_assert!(health.completed_tasks <= health.total_tasks);
        }
    }
}
