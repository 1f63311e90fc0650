//! Integration tests for work leasing under concurrency

mod common;

use common::temp_db;
use sounddex::config::ClaimSettings;
use sounddex::db::claim::ClaimQueue;
use sounddex::db::sounds::{get_by_guid, insert_sound};
use sounddex::types::FetchStatus;
use std::collections::HashSet;
use tokio::task::JoinSet;

fn settings(batch_size: u32) -> ClaimSettings {
    ClaimSettings {
        batch_size,
        lease_max_age_minutes: 30,
        min_popularity: 0,
        locator_denylist: Vec::new(),
        recheck_cooldown_days: 10,
    }
}

#[tokio::test]
async fn test_concurrent_claims_never_intersect() {
    let (pool, _dir) = temp_db().await;

    for i in 0..40 {
        insert_sound(
            &pool,
            &format!("sound-{i}"),
            &format!("https://cdn.example/{i}.mp3"),
            i,
        )
        .await
        .unwrap();
    }

    let mut join_set = JoinSet::new();
    for worker in 0..2 {
        let pool = pool.clone();
        join_set.spawn(async move {
            let queue = ClaimQueue::new(pool, settings(25));
            let claimed = queue.claim_batch(&format!("worker-{worker}")).await.unwrap();
            claimed
                .into_iter()
                .map(|row| row.source_id)
                .collect::<Vec<_>>()
        });
    }

    let mut batches = Vec::new();
    while let Some(result) = join_set.join_next().await {
        batches.push(result.expect("claim task panicked"));
    }

    let first: HashSet<_> = batches[0].iter().cloned().collect();
    let second: HashSet<_> = batches[1].iter().cloned().collect();

    assert!(
        first.is_disjoint(&second),
        "two workers claimed the same rows: {:?}",
        first.intersection(&second).collect::<Vec<_>>()
    );
    // Between them the workers drained the whole pool exactly once
    assert_eq!(first.len() + second.len(), 40);
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_exactly_once() {
    let (pool, _dir) = temp_db().await;

    let guid = insert_sound(&pool, "crashed", "https://cdn.example/crashed.mp3", 5)
        .await
        .unwrap();

    let queue = ClaimQueue::new(pool.clone(), settings(10));
    let claimed = queue.claim_batch("dead-worker").await.unwrap();
    assert_eq!(claimed.len(), 1);

    // Age the lease past the 30 minute maximum
    sqlx::query("UPDATE sound_records SET lease_started_at = lease_started_at - 31 * 60000 WHERE guid = ?")
        .bind(guid.to_string())
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(queue.sweep_expired_leases().await.unwrap(), 1);
    assert_eq!(queue.sweep_expired_leases().await.unwrap(), 0);

    let row = get_by_guid(&pool, guid).await.unwrap().unwrap();
    assert_eq!(row.fetch_status, FetchStatus::NotFetched);
    assert!(row.lease_owner.is_none());
    assert!(row.lease_started_at.is_none());

    // The row is claimable again by a healthy worker
    let reclaimed = queue.claim_batch("healthy-worker").await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].guid, guid);
    assert_eq!(reclaimed[0].lease_owner.as_deref(), Some("healthy-worker"));
}

#[tokio::test]
async fn test_claimed_rows_are_invisible_until_released() {
    let (pool, _dir) = temp_db().await;

    let guid = insert_sound(&pool, "busy", "https://cdn.example/busy.mp3", 5)
        .await
        .unwrap();

    let queue = ClaimQueue::new(pool.clone(), settings(10));
    assert_eq!(queue.claim_batch("worker-1").await.unwrap().len(), 1);
    assert!(queue.claim_batch("worker-2").await.unwrap().is_empty());

    // A failed download releases the row without waiting for the sweep
    queue.report_download_outcome(guid, false).await.unwrap();
    let retried = queue.claim_batch("worker-2").await.unwrap();
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].lease_owner.as_deref(), Some("worker-2"));
}

#[tokio::test]
async fn test_resolved_rows_are_never_reclaimed() {
    let (pool, _dir) = temp_db().await;

    let guid = insert_sound(&pool, "done", "https://cdn.example/done.mp3", 5)
        .await
        .unwrap();

    // Simulate an earlier successful resolution
    sqlx::query(
        "UPDATE sound_records SET resolved_entity_id = ?, fetch_status = 0 WHERE guid = ?",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(guid.to_string())
    .execute(&pool)
    .await
    .unwrap();

    let queue = ClaimQueue::new(pool, settings(10));
    assert!(queue.claim_batch("worker-1").await.unwrap().is_empty());
}
