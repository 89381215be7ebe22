//! Outbound pass: agent comments relayed to customers.

use chrono::Duration;
use helpdesk_bridge::models::task::{CommentKind, TrackerAttachment};
use helpdesk_bridge::orchestrator::outbound;
use helpdesk_bridge::persistence::ledger::LedgerNamespace;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{agent_comment, harness, t0, task, test_config, NEW_STAGE};

async fn sent_flag(h: &super::test_helpers::Harness, comment_id: i64) -> bool {
    h.ctx
        .ledger
        .has(LedgerNamespace::SentComment, &comment_id.to_string())
        .await
        .expect("ledger")
}

#[tokio::test]
async fn public_agent_comment_is_emailed() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    let at = t0();
    h.tracker
        .add_chatter(agent_comment(100, 5, "[public] Please restart the printer.", at));

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("outbound pass");

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jana@example.com");
    assert_eq!(sent[0].subject, "Re: [TICKET-#5] Task 5");
    assert!(sent[0].body.contains("Please restart the printer."));
    assert!(!sent[0].body.contains("[public]"));
    assert!(sent_flag(&h, 100).await);
    assert_eq!(h.ctx.ledger.watermark().await.expect("watermark"), Some(at));
}

#[tokio::test]
async fn internal_and_customer_comments_are_not_emailed() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 5, "internal: check logs", t0()));
    let mut customer = agent_comment(2, 5, "[public] from customer", t0() + Duration::minutes(1));
    customer.by_agent = false;
    h.tracker.add_chatter(customer);
    let mut note = agent_comment(3, 5, "[public] stage changed", t0() + Duration::minutes(2));
    note.kind = CommentKind::Notification;
    h.tracker.add_chatter(note);

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("outbound pass");

    assert!(h.mailer.sent().is_empty());
    assert_eq!(
        h.ctx.ledger.watermark().await.expect("watermark"),
        Some(t0() + Duration::minutes(1)),
        "notifications are filtered out of the listing"
    );
}

#[tokio::test]
async fn second_run_sends_nothing_new() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(100, 5, "[public] hi", t0()));

    let cancel = CancellationToken::new();
    outbound::run(&h.ctx, t0(), &cancel).await.expect("first");
    outbound::run(&h.ctx, t0(), &cancel).await.expect("second");

    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn lowest_unsent_policy_retries_failed_comment_once() {
    let h = harness(test_config("watermark_policy = \"lowest_unsent\"")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 5, "[public] first", t0()));
    h.tracker.add_chatter(agent_comment(
        2,
        5,
        "[public] second",
        t0() + Duration::minutes(5),
    ));
    h.mailer
        .fail_bodies_containing
        .lock()
        .unwrap()
        .push("second".into());

    let cancel = CancellationToken::new();
    outbound::run(&h.ctx, t0(), &cancel).await.expect("first run");
    assert_eq!(h.mailer.sent().len(), 1);
    assert!(sent_flag(&h, 1).await);
    assert!(!sent_flag(&h, 2).await);
    assert_eq!(
        h.ctx.ledger.watermark().await.expect("watermark"),
        Some(t0() + Duration::minutes(5) - Duration::milliseconds(1))
    );

    h.mailer.fail_bodies_containing.lock().unwrap().clear();
    outbound::run(&h.ctx, t0(), &cancel).await.expect("second run");

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].body.contains("second"));
    assert!(sent_flag(&h, 2).await);
}

#[tokio::test]
async fn max_seen_policy_moves_past_failures() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 5, "[public] lost", t0()));
    h.mailer
        .fail_bodies_containing
        .lock()
        .unwrap()
        .push("lost".into());

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("run");

    assert!(h.mailer.sent().is_empty());
    assert!(!sent_flag(&h, 1).await);
    assert_eq!(h.ctx.ledger.watermark().await.expect("watermark"), Some(t0()));
}

#[tokio::test]
async fn no_reply_customer_is_marked_without_email() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("robot@example.com")));
    h.tracker
        .add_chatter(agent_comment(7, 5, "[public] ack", t0()));

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("run");

    assert!(h.mailer.sent().is_empty());
    assert!(sent_flag(&h, 7).await);
}

#[tokio::test]
async fn task_without_customer_is_skipped() {
    let h = harness(test_config("")).await;
    h.tracker.insert_task(task(5, NEW_STAGE, "New", None));
    h.tracker
        .add_chatter(agent_comment(8, 5, "[public] anyone?", t0()));

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("run");

    assert!(h.mailer.sent().is_empty());
    assert!(!sent_flag(&h, 8).await);
}

#[tokio::test]
async fn task_attachments_are_forwarded() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker.store_attachment(
        5,
        TrackerAttachment {
            id: 900,
            name: "manual.pdf".into(),
            mime_type: "application/pdf".into(),
            size: 4,
        },
        b"%PDF",
    );
    h.tracker
        .add_chatter(agent_comment(9, 5, "[public] see the manual", t0()));

    outbound::run(&h.ctx, t0(), &CancellationToken::new())
        .await
        .expect("run");

    let sent = h.mailer.sent();
    assert_eq!(sent[0].attachments.len(), 1);
    assert_eq!(sent[0].attachments[0].filename, "manual.pdf");
    assert_eq!(sent[0].attachments[0].data, b"%PDF");
}

#[tokio::test]
async fn cancelled_pass_keeps_watermark() {
    let h = harness(test_config("")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 5, "[public] hi", t0()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    outbound::run(&h.ctx, t0(), &cancel).await.expect("run");

    assert!(h.mailer.sent().is_empty());
    assert_eq!(h.ctx.ledger.watermark().await.expect("watermark"), None);
}

#[tokio::test]
async fn lowest_unsent_does_not_wait_on_missing_task() {
    let h = harness(test_config("watermark_policy = \"lowest_unsent\"")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 999, "[public] task was deleted", t0()));
    let cancel = CancellationToken::new();

    for round in 1..=3_i64 {
        let at = t0() + Duration::minutes(round);
        h.tracker.add_chatter(agent_comment(
            10 + round,
            5,
            &format!("[public] update {round}"),
            at,
        ));
        outbound::run(&h.ctx, at, &cancel).await.expect("run");
        assert_eq!(
            h.ctx.ledger.watermark().await.expect("watermark"),
            Some(at),
            "round {round}"
        );
    }

    assert_eq!(h.mailer.sent().len(), 3);
    assert!(!sent_flag(&h, 1).await);
}

#[tokio::test]
async fn lowest_unsent_gives_up_after_changed_window() {
    let h = harness(test_config("watermark_policy = \"lowest_unsent\"")).await;
    h.tracker
        .insert_task(task(5, NEW_STAGE, "New", Some("jana@example.com")));
    h.tracker
        .add_chatter(agent_comment(1, 5, "[public] undeliverable", t0()));
    h.mailer
        .fail_bodies_containing
        .lock()
        .unwrap()
        .push("undeliverable".into());
    let cancel = CancellationToken::new();

    outbound::run(&h.ctx, t0(), &cancel).await.expect("fresh failure");
    assert_eq!(
        h.ctx.ledger.watermark().await.expect("watermark"),
        Some(t0() - Duration::milliseconds(1))
    );

    outbound::run(&h.ctx, t0() + Duration::hours(49), &cancel)
        .await
        .expect("stale failure");
    assert_eq!(h.ctx.ledger.watermark().await.expect("watermark"), Some(t0()));
    assert!(!sent_flag(&h, 1).await);
}
