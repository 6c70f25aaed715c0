// tests/summary_cache.rs
use std::sync::Arc;

use feed_digest::{InMemorySummaryCache, SqliteSummaryCache, SummaryCache};

async fn put_twice_keeps_one_record(cache: &dyn SummaryCache) {
    cache
        .put("t3_abc", "Post title", Some("post body"), "first summary")
        .await
        .unwrap();
    let first = cache.get("t3_abc").await.unwrap().unwrap();

    cache
        .put("t3_abc", "Post title (edited)", None, "second summary")
        .await
        .unwrap();
    let second = cache.get("t3_abc").await.unwrap().unwrap();

    assert_eq!(cache.len().await.unwrap(), 1, "{}", cache.backend_name());
    assert_eq!(second.summary_text, "second summary");
    assert_eq!(second.title, "Post title (edited)");
    assert_eq!(second.body, None);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
}

#[tokio::test]
async fn upsert_semantics_hold_for_every_backend() {
    put_twice_keeps_one_record(&InMemorySummaryCache::new()).await;
    put_twice_keeps_one_record(&SqliteSummaryCache::open_in_memory().unwrap()).await;

    let tmp = tempfile::tempdir().unwrap();
    let file_cache = SqliteSummaryCache::open(tmp.path().join("summaries.sqlite3")).unwrap();
    put_twice_keeps_one_record(&file_cache).await;
}

#[tokio::test]
async fn identical_puts_are_idempotent() {
    let cache = SqliteSummaryCache::open_in_memory().unwrap();
    for _ in 0..3 {
        cache.put("same", "Title here", None, "same text").await.unwrap();
    }
    assert_eq!(cache.len().await.unwrap(), 1);
    assert_eq!(
        cache.get("same").await.unwrap().unwrap().summary_text,
        "same text"
    );
}

#[tokio::test]
async fn sqlite_records_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("cache.sqlite3");
    {
        let cache = SqliteSummaryCache::open(&path).unwrap();
        cache.put("keep", "Kept title", None, "kept").await.unwrap();
    }
    let reopened = SqliteSummaryCache::open(&path).unwrap();
    let rec = reopened.get("keep").await.unwrap().unwrap();
    assert_eq!(rec.summary_text, "kept");
    assert_eq!(reopened.db_path(), Some(path.as_path()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_for_one_key_leave_one_record() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = Arc::new(SqliteSummaryCache::open(tmp.path().join("c.sqlite3")).unwrap());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .put("hot_key", "Contended title", None, &format!("writer {i}"))
                    .await
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    assert_eq!(cache.len().await.unwrap(), 1);
    let rec = cache.get("hot_key").await.unwrap().unwrap();
    assert!(rec.summary_text.starts_with("writer "));
}

#[tokio::test]
async fn unreadable_path_is_storage_unavailable() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let err = SqliteSummaryCache::open(blocker.join("cache.sqlite3")).unwrap_err();
    assert!(matches!(err, feed_digest::EnrichError::StorageUnavailable(_)));
}
