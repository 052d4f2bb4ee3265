#![no_main]

//! Feeds arbitrary task lists and filters through the derived views and
//! checks that grouping, filtering and tallying never lose or invent tasks.

use arbitrary::Arbitrary;
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use taskdeck::models::{Task, TaskPriority, TaskStatus};
use taskdeck::views::{filter_tasks, group_by_status, status_tally, Selector, TaskFilter};

const STATUSES: [TaskStatus; 6] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::ReadyToTest,
    TaskStatus::InTest,
    TaskStatus::Closed,
];

#[derive(Arbitrary, Debug)]
struct FuzzTask {
    title: String,
    description: Option<String>,
    status: u8,
    project_id: u8,
}

#[derive(Arbitrary, Debug)]
struct ViewsInput {
    tasks: Vec<FuzzTask>,
    search: String,
    status: Option<u8>,
    project: Option<u8>,
    order: Vec<u8>,
}

fn status(index: u8) -> TaskStatus {
    STATUSES[index as usize % STATUSES.len()]
}

fuzz_target!(|input: ViewsInput| {
    let stamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let tasks: Vec<Task> = input
        .tasks
        .into_iter()
        .take(200)
        .enumerate()
        .map(|(index, t)| Task {
            id: index as i64 + 1,
            title: t.title,
            description: t.description,
            status: status(t.status),
            priority: TaskPriority::Medium,
            project_id: i64::from(t.project_id % 8),
            assignee_id: None,
            estimated_hours: None,
            actual_hours: 0.0,
            created_at: stamp,
            updated_at: stamp,
        })
        .collect();

    let order: Vec<TaskStatus> = input.order.iter().take(12).map(|i| status(*i)).collect();
    let buckets = group_by_status(&tasks, &order);
    assert_eq!(buckets.total(), tasks.len());

    let statuses = buckets.statuses();
    let mut unique = statuses.clone();
    unique.sort_by_key(|s| s.as_str());
    unique.dedup();
    assert_eq!(unique.len(), statuses.len());

    let tally = status_tally(&tasks);
    assert_eq!(tally.total(), tasks.len());

    let filter = TaskFilter {
        search: input.search,
        status: input.status.map_or(Selector::All, |s| Selector::Only(status(s))),
        project: input
            .project
            .map_or(Selector::All, |p| Selector::Only(i64::from(p % 8))),
    };
    let matched = filter_tasks(&tasks, &filter);
    assert!(matched.len() <= tasks.len());
    for task in &matched {
        assert!(filter.status.matches(&task.status));
        assert!(filter.project.matches(&task.project_id));
    }
});
