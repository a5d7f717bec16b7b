//! Writers racing on the same event against a multi-connection store.

mod test_utils;

use activity_ingest::repositories::{ActivityWriter, NewActivity, WriteOutcome};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use test_utils::setup_file_db;

fn activity(remote_event_id: i64) -> NewActivity {
    NewActivity {
        remote_event_id,
        project_id: 1,
        issue_number: 42,
        actor: "octocat".to_string(),
        action: "close".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        text: None,
        text_raw: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writes_of_one_event_store_a_single_row() {
    let dir = TempDir::new().unwrap();
    let db = setup_file_db(dir.path(), 4).await.unwrap();
    let first = ActivityWriter::new(db.clone());
    let second = ActivityWriter::new(db);

    for remote_event_id in 1..=20 {
        let record = activity(remote_event_id);
        let (a, b) = tokio::join!(first.write(&record, false), second.write(&record, false));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|outcome| outcome.as_str());

        assert_eq!(
            outcomes,
            vec![WriteOutcome::Inserted, WriteOutcome::Skipped],
            "event {remote_event_id}"
        );
    }

    assert_eq!(first.count_for_project(1).await.unwrap(), 20);
    let stored = first.find_by_remote_event(7, 1).await.unwrap().unwrap();
    assert_eq!(stored.issue_number, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_forced_writes_keep_one_row() {
    let dir = TempDir::new().unwrap();
    let db = setup_file_db(dir.path(), 4).await.unwrap();
    let first = ActivityWriter::new(db.clone());
    let second = ActivityWriter::new(db);

    let record = activity(99);
    let (a, b) = tokio::join!(first.write(&record, true), second.write(&record, true));
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| **outcome == WriteOutcome::Inserted)
            .count(),
        1
    );
    assert!(outcomes.contains(&WriteOutcome::Overwritten));
    assert_eq!(first.count_for_project(1).await.unwrap(), 1);
}
