use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn put_then_get_returns_latest_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("inbox_zero_user", "first").await.expect("put");
    storage.put("inbox_zero_user", "second").await.expect("overwrite");

    let entry = storage
        .get("inbox_zero_user")
        .await
        .expect("get")
        .expect("entry present");
    assert_eq!(entry.value, "second");
    assert!(entry.updated_at <= Utc::now());
}

#[tokio::test]
async fn missing_key_reads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.get("absent").await.expect("get").is_none());
}

#[tokio::test]
async fn delete_reports_whether_entry_existed() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.put("k", "v").await.expect("put");

    assert!(storage.delete("k").await.expect("delete"));
    assert!(!storage.delete("k").await.expect("second delete"));
    assert!(storage.get("k").await.expect("get").is_none());
}

#[tokio::test]
async fn creates_database_file_when_missing_and_survives_reopen() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("session.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage
        .put("inbox_zero_user", r#"{"email":"a@b.com"}"#)
        .await
        .expect("put");
    storage.close().await;
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let entry = reopened
        .get("inbox_zero_user")
        .await
        .expect("get")
        .expect("entry persisted");
    assert_eq!(entry.value, r#"{"email":"a@b.com"}"#);
}

#[tokio::test]
async fn memory_store_keeps_explicit_timestamps() {
    let store = MemoryStore::new();
    let at = Utc::now() - chrono::Duration::days(3);
    store.insert_with_timestamp("k", "v", at).await;

    let entry = store.get("k").await.expect("get").expect("entry");
    assert_eq!(entry.updated_at, at);
    assert!(store.delete("k").await.expect("delete"));
    assert!(store.get("k").await.expect("get").is_none());
}

#[test]
fn sqlite_path_ignores_memory_and_query_suffix() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/session.db?mode=rwc"),
        Some(PathBuf::from("./data/session.db"))
    );
    assert_eq!(sqlite_path("postgres://localhost/db"), None);
}

#[test]
fn default_database_url_points_at_session_file() {
    let url = default_database_url();
    assert!(url.starts_with("sqlite://"), "unexpected url: {url}");
    assert!(url.ends_with("inbox_zero/session.db"), "unexpected url: {url}");
}
