//! History Store Tests
//!
//! The tiered store is exercised with two in-process stores standing in for
//! the fast and durable tiers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use chat_fanout::config::WritePolicy;
use chat_fanout::domain::{
    HistorySource, HistoryStore, Message, MessageAction, PageParams,
};
use chat_fanout::infrastructure::history::{MemoryHistoryStore, TieredHistoryStore};

const CHAT: i64 = 99;

fn message(id: i64, minute: u32) -> Message {
    Message {
        id,
        action: MessageAction::Send,
        text: format!("message {}", id),
        chat_id: CHAT,
        sender_id: 5,
        target_id: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
    }
}

fn memory_store() -> Arc<MemoryHistoryStore> {
    Arc::new(MemoryHistoryStore::new(Duration::from_secs(3600), 100))
}

fn ids(messages: &[Message]) -> Vec<i64> {
    messages.iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn test_appends_read_back_in_ascending_order() {
    let store = memory_store();
    // Append out of order; reads are ordered by creation time
    for (id, minute) in [(3, 3), (1, 1), (2, 2), (4, 4)] {
        store.append(&message(id, minute)).await.unwrap();
    }

    let page = store.list(CHAT, &PageParams::latest(10)).await.unwrap();

    assert_eq!(ids(&page.items), vec![1, 2, 3, 4]);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let store = memory_store();
    for id in 1..=5 {
        store.append(&message(id, id as u32)).await.unwrap();
    }
    let params = PageParams::latest(3);

    let first = store.list(CHAT, &params).await.unwrap();
    let second = store.list(CHAT, &params).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(ids(&first.items), vec![3, 4, 5]);
}

#[tokio::test]
async fn test_stored_fields_round_trip() {
    let store = memory_store();
    let kick = Message {
        id: 77,
        action: MessageAction::Kick,
        text: String::new(),
        chat_id: CHAT,
        sender_id: 5,
        target_id: Some(6),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap(),
    };
    store.append(&kick).await.unwrap();

    let page = store.list(CHAT, &PageParams::latest(1)).await.unwrap();

    assert_eq!(page.items, vec![kick]);
}

#[tokio::test]
async fn test_before_and_after_windows() {
    let store = memory_store();
    for id in 1..=6 {
        store.append(&message(id, id as u32)).await.unwrap();
    }
    let pivot = message(4, 4).created_at;

    let before = store.list(CHAT, &PageParams::before(pivot, 2)).await.unwrap();
    let after = store.list(CHAT, &PageParams::after(pivot, 10)).await.unwrap();

    assert_eq!(ids(&before.items), vec![2, 3]);
    assert_eq!(ids(&after.items), vec![5, 6]);
}

#[tokio::test]
async fn test_tiered_reads_fast_tier_first() {
    let fast = memory_store();
    let durable = memory_store();
    fast.append(&message(1, 1)).await.unwrap();
    durable.append(&message(1, 1)).await.unwrap();
    durable.append(&message(2, 2)).await.unwrap();

    let tiered = TieredHistoryStore::new(fast, durable, WritePolicy::FastOnly);
    let page = tiered.list(CHAT, &PageParams::latest(10)).await.unwrap();

    assert_eq!(page.source, HistorySource::Fast);
    assert_eq!(ids(&page.items), vec![1]);
}

#[tokio::test]
async fn test_tiered_falls_back_to_durable_when_fast_is_empty() {
    let fast = memory_store();
    let durable = memory_store();
    durable.append(&message(1, 1)).await.unwrap();
    durable.append(&message(2, 2)).await.unwrap();

    let tiered = TieredHistoryStore::new(fast, durable, WritePolicy::FastOnly);
    let page = tiered.list(CHAT, &PageParams::latest(10)).await.unwrap();

    assert_eq!(page.source, HistorySource::Durable);
    assert_eq!(ids(&page.items), vec![1, 2]);
}

#[tokio::test]
async fn test_write_policy_decides_durable_writes() {
    let fast = memory_store();
    let durable = memory_store();

    let fast_only = TieredHistoryStore::new(fast.clone(), durable.clone(), WritePolicy::FastOnly);
    fast_only.append(&message(1, 1)).await.unwrap();
    assert_eq!(fast.len(CHAT), 1);
    assert_eq!(durable.len(CHAT), 0);

    let write_through =
        TieredHistoryStore::new(fast.clone(), durable.clone(), WritePolicy::WriteThrough);
    write_through.append(&message(2, 2)).await.unwrap();
    assert_eq!(fast.len(CHAT), 2);
    assert_eq!(durable.len(CHAT), 1);
}
