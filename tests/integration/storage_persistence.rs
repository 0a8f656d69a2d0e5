/// Data written through one storage handle is visible after reopening the file
use std::thread;

use chrono::{Days, NaiveDate};
use habit_tracker::operations::{self, CompletionQuery, NewCompletion, NewHabit};
use habit_tracker::*;
use tempfile::TempDir;

fn ctx() -> RequestContext {
    RequestContext::new(UserId::new("alice"))
}

#[test]
fn test_database_persistence() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("habits.db");

    let habit_id = {
        let storage = SqliteStorage::new(&db_path).expect("Failed to open storage");
        let habit = operations::create_habit(
            &storage,
            &ctx(),
            NewHabit {
                name: "Stretch".to_string(),
                frequency: "monthly".to_string(),
                target_days: Some(serde_json::json!([1, "last"])),
                ..Default::default()
            },
        )
        .expect("create habit");

        operations::create_completion(
            &storage,
            &ctx(),
            NewCompletion {
                habit_id: habit.id().clone(),
                completion_date: Some("2024-01-31".to_string()),
                count: 4,
                notes: Some("long session".to_string()),
            },
        )
        .expect("create completion");

        habit.id().clone()
    };

    let reopened = SqliteStorage::new(&db_path).expect("Failed to reopen storage");
    let habit = operations::get_habit(&reopened, &ctx(), &habit_id).expect("habit survives reopen");
    assert_eq!(habit.name, "Stretch");
    assert_eq!(habit.frequency, Frequency::Monthly);
    assert_eq!(habit.total_completions(), 4);
    let days = habit.target_days().expect("schedule survives reopen");
    assert_eq!(days.resolve_for_month(2024, 2), vec![1, 29]);

    let page = operations::list_habit_completions(&reopened, &ctx(), &habit_id, Default::default())
        .expect("list completions");
    assert_eq!(page.total, 1);
    assert_eq!(page.completions[0].notes.as_deref(), Some("long session"));
}

#[test]
fn test_storage_interface() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = SqliteStorage::new(dir.path().join("habits.db")).expect("Failed to create storage");

    let count = storage
        .read(|repo| repo.count_completions(&storage::CompletionFilter::for_user(UserId::new("alice"))))
        .expect("count on empty database");
    assert_eq!(count, 0);

    let result: Result<(), StorageError> = storage.transaction(None, |repo| {
        assert!(repo.find_habits_by_user(&UserId::new("alice"), false)?.is_empty());
        Ok(())
    });
    assert!(result.is_ok());
}

#[test]
fn test_concurrent_completions_keep_every_increment() {
    const WRITERS: u64 = 4;
    const PER_WRITER: u64 = 20;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("habits.db");

    let storage = SqliteStorage::new(&db_path).expect("Failed to open storage");
    let habit = operations::create_habit(
        &storage,
        &ctx(),
        NewHabit {
            name: "Push-ups".to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
    )
    .expect("create habit");

    let first_day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let db_path = db_path.clone();
            let habit_id = habit.id().clone();
            thread::spawn(move || {
                // Separate handle, so writers contend on the database lock
                let storage = SqliteStorage::new(&db_path).expect("Failed to open storage");
                for i in 0..PER_WRITER {
                    let date = first_day + Days::new(writer * PER_WRITER + i);
                    let request = NewCompletion {
                        habit_id: habit_id.clone(),
                        completion_date: Some(date.to_string()),
                        count: 1,
                        notes: None,
                    };
                    operations::create_completion(&storage, &ctx(), request).expect("create completion");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    let expected = WRITERS * PER_WRITER;
    let habit = operations::get_habit(&storage, &ctx(), habit.id()).expect("get habit");
    assert_eq!(u64::from(habit.total_completions()), expected);

    let page = operations::list_habit_completions(&storage, &ctx(), habit.id(), CompletionQuery::default())
        .expect("list completions");
    assert_eq!(page.total, expected);
}
