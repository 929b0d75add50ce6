//! Serving Session Tests
//!
//! Sessions run over the in-process bus; membership changes are announced
//! through the message service the way the chat management layer does.

use chat_fanout::application::services::{
    CreateMessageDto, LifecycleEvent, MessageService, SessionEnd,
};
use chat_fanout::domain::{MessageAction, PageParams, Topic};

use crate::common::{assert_silent, next_message, Harness};

const CHAT: i64 = 7;
const ALICE: i64 = 1;
const BOB: i64 = 2;

fn send(chat_id: i64, text: &str) -> CreateMessageDto {
    CreateMessageDto {
        chat_id,
        text: text.into(),
    }
}

#[tokio::test]
async fn test_member_receives_message_and_sender_does_not() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);
    harness.members.join(BOB, CHAT);

    let mut alice = harness.service.open_session(ALICE).await.unwrap();
    let mut bob = harness.service.open_session(BOB).await.unwrap();

    alice.inbound.send(send(CHAT, "hi")).await.unwrap();

    let received = next_message(&mut bob.outbound).await;
    assert_eq!(received.action, MessageAction::Send);
    assert_eq!(received.text, "hi");
    assert_eq!(received.sender_id, ALICE);
    assert_eq!(received.chat_id, CHAT);

    assert_silent(&mut alice.outbound).await;

    let page = harness
        .service
        .list_history(BOB, CHAT, PageParams::latest(1))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0], received);
}

#[tokio::test]
async fn test_join_send_leave_send() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);

    let mut bob = harness.service.open_session(BOB).await.unwrap();

    // Not yet a member: nothing arrives
    harness.service.create(ALICE, send(CHAT, "before")).await.unwrap();
    assert_silent(&mut bob.outbound).await;

    harness.members.join(BOB, CHAT);
    harness
        .service
        .announce(LifecycleEvent::join(CHAT, BOB))
        .await
        .unwrap();
    let joined = next_message(&mut bob.outbound).await;
    assert_eq!(joined.action, MessageAction::Join);
    assert_eq!(joined.affected_user(), BOB);

    harness.service.create(ALICE, send(CHAT, "during")).await.unwrap();
    assert_eq!(next_message(&mut bob.outbound).await.text, "during");

    harness.members.leave(BOB, CHAT);
    harness
        .service
        .announce(LifecycleEvent::leave(CHAT, BOB))
        .await
        .unwrap();
    let left = next_message(&mut bob.outbound).await;
    assert_eq!(left.action, MessageAction::Leave);

    harness.service.create(ALICE, send(CHAT, "after")).await.unwrap();
    assert_silent(&mut bob.outbound).await;
}

#[tokio::test]
async fn test_kicked_member_stops_receiving() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);
    harness.members.join(BOB, CHAT);

    let mut bob = harness.service.open_session(BOB).await.unwrap();

    harness.members.leave(BOB, CHAT);
    harness
        .service
        .announce(LifecycleEvent::kick(CHAT, ALICE, BOB))
        .await
        .unwrap();
    let kicked = next_message(&mut bob.outbound).await;
    assert_eq!(kicked.action, MessageAction::Kick);
    assert_eq!(kicked.sender_id, ALICE);
    assert_eq!(kicked.target_id, Some(BOB));

    harness.service.create(ALICE, send(CHAT, "gone")).await.unwrap();
    assert_silent(&mut bob.outbound).await;
}

#[tokio::test]
async fn test_join_of_other_chat_is_not_delivered() {
    let harness = Harness::new();
    harness.members.join(BOB, CHAT);

    let mut bob = harness.service.open_session(BOB).await.unwrap();

    // ALICE joins a chat BOB is not in; the join travels on the broadcast topic
    harness.members.join(ALICE, CHAT + 1);
    harness
        .service
        .announce(LifecycleEvent::join(CHAT + 1, ALICE))
        .await
        .unwrap();

    assert_silent(&mut bob.outbound).await;
}

#[tokio::test]
async fn test_rejected_send_keeps_session_alive() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);
    harness.members.join(BOB, CHAT);

    let alice = harness.service.open_session(ALICE).await.unwrap();
    let mut bob = harness.service.open_session(BOB).await.unwrap();

    // Not a member of CHAT + 1, then blank text: both are dropped
    alice.inbound.send(send(CHAT + 1, "nope")).await.unwrap();
    alice.inbound.send(send(CHAT, "  ")).await.unwrap();
    alice.inbound.send(send(CHAT, "still here")).await.unwrap();

    assert_eq!(next_message(&mut bob.outbound).await.text, "still here");
    assert_eq!(harness.history.len(CHAT + 1), 0);
}

#[tokio::test]
async fn test_undecodable_delivery_is_skipped() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);
    harness.members.join(BOB, CHAT);

    let mut bob = harness.service.open_session(BOB).await.unwrap();

    assert_eq!(harness.bus.publish_raw(&Topic::chat(CHAT), b"not json"), 1);
    harness
        .service
        .create(ALICE, send(CHAT, "after garbage"))
        .await
        .unwrap();

    assert_eq!(next_message(&mut bob.outbound).await.text, "after garbage");
    assert_eq!(harness.bus.subscriber_count(), 1);
}

#[tokio::test]
async fn test_open_close_cycles_release_subscriptions() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);

    for _ in 0..20 {
        let session = harness.service.open_session(ALICE).await.unwrap();
        assert_eq!(harness.bus.subscriber_count(), 1);

        drop(session.inbound);
        let end = session.task.await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::ClientClosed);
    }

    assert_eq!(harness.bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_dropping_outbound_ends_session() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);

    let session = harness.service.open_session(ALICE).await.unwrap();
    drop(session.outbound);

    let end = session.task.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::OutboundClosed);
    assert_eq!(harness.bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_bus_disconnect_ends_session() {
    let harness = Harness::new();
    harness.members.join(ALICE, CHAT);

    let mut session = harness.service.open_session(ALICE).await.unwrap();
    harness.bus.disconnect_all();

    let end = session.task.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::BusClosed);
    assert!(session.outbound.recv().await.is_none());
}
