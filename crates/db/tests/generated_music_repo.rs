//! Repository tests against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a scratch server and
//! `cargo test -p tunesmith-db -- --ignored`.

use sqlx::PgPool;
use tunesmith_db::models::generated_music::CreateGeneratedMusic;
use tunesmith_db::repositories::GeneratedMusicRepo;
use tunesmith_db::store::{MediaRecordStore, PgMediaRecordStore};

fn track(name: &str, duration_seconds: i32) -> CreateGeneratedMusic {
    CreateGeneratedMusic {
        prompt: format!("{name} prompt"),
        file_url: format!("https://storage.example/music/generated/{name}.mp3"),
        file_path: format!("generated/{name}.mp3"),
        duration_seconds,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_find(pool: PgPool) {
    let created = GeneratedMusicRepo::create(&pool, &track("a", 42)).await.unwrap();
    assert_eq!(created.prompt, "a prompt");
    assert_eq!(created.duration_seconds, 42);

    let found = GeneratedMusicRepo::find_by_id(&pool, created.id)
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(found, created);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_recent_newest_first(pool: PgPool) {
    for name in ["a", "b", "c"] {
        GeneratedMusicRepo::create(&pool, &track(name, 60)).await.unwrap();
    }

    let rows = GeneratedMusicRepo::list_recent(&pool, 2).await.unwrap();
    let paths: Vec<_> = rows.iter().map(|r| r.file_path.as_str()).collect();
    assert_eq!(paths, ["generated/c.mp3", "generated/b.mp3"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_twice_is_idempotent(pool: PgPool) {
    let store = PgMediaRecordStore::new(pool);
    let row = store.insert(track("a", 60)).await.unwrap();

    assert!(store.delete_by_id(row.id).await.unwrap());
    assert!(!store.delete_by_id(row.id).await.unwrap());
    assert!(store.list(10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_file_path_rejected(pool: PgPool) {
    GeneratedMusicRepo::create(&pool, &track("dup", 60)).await.unwrap();
    let err = GeneratedMusicRepo::create(&pool, &track("dup", 60))
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("uq_generated_music_file_path"));
}
