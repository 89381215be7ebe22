use chrono::Utc;
use helpdesk_bridge::models::email::{Attachment, Email};
use helpdesk_bridge::models::task::{CommentKind, Stage, Task, TaskComment};

fn task(stage_id: i64, stage_name: &str) -> Task {
    Task {
        id: 1,
        name: "Printer".into(),
        stage: Stage {
            id: stage_id,
            name: stage_name.into(),
        },
        customer_email: None,
        customer_name: None,
        assignee_id: None,
        assignee_name: None,
        url: String::new(),
    }
}

fn comment(body: &str) -> TaskComment {
    TaskComment {
        id: 1,
        task_id: 1,
        body: body.into(),
        date: Utc::now(),
        by_agent: true,
        kind: CommentKind::Comment,
    }
}

#[test]
fn done_by_configured_ids() {
    assert!(task(7, "Anything").is_done(&[7, 8]));
    assert!(!task(6, "Done").is_done(&[7, 8]));
}

#[test]
fn done_by_stage_name_without_ids() {
    assert!(task(3, "Done").is_done(&[]));
    assert!(task(3, "Hotovo").is_done(&[]));
    assert!(task(3, "Resolved - waiting").is_done(&[]));
    assert!(!task(3, "In Progress").is_done(&[]));
}

#[test]
fn new_stage_by_id_or_name() {
    let names = vec!["new".to_owned(), "nový".to_owned()];
    assert!(task(1, "Whatever").is_new(1, &names));
    assert!(task(2, "Nový").is_new(1, &names));
    assert!(!task(2, "In Progress").is_new(1, &names));
    assert!(!task(0, "In Progress").is_new(0, &names));
}

#[test]
fn blank_customer_address_is_unusable() {
    let mut t = task(1, "New");
    t.customer_email = Some("   ".into());
    assert_eq!(t.customer_address(), None);

    t.customer_email = Some(" jana@example.com ".into());
    assert_eq!(t.customer_address(), Some("jana@example.com"));
    assert_eq!(t.customer_display_name(), "jana@example.com");

    t.customer_name = Some("Jana".into());
    assert_eq!(t.customer_display_name(), "Jana");
}

#[test]
fn public_marker_is_required_and_stripped() {
    assert_eq!(
        comment("[public] Your issue is fixed.").public_body().as_deref(),
        Some("Your issue is fixed.")
    );
    assert_eq!(
        comment("  [PUBLIC]   hello ").public_body().as_deref(),
        Some("hello")
    );
    assert_eq!(comment("internal note").public_body(), None);
    assert_eq!(comment("see [public] later").public_body(), None);
    assert_eq!(comment("[pub").public_body(), None);
}

#[test]
fn public_marker_handles_multibyte_prefix() {
    assert_eq!(comment("žluťoučký kůň").public_body(), None);
}

#[test]
fn email_identifier_is_folder_scoped() {
    assert_eq!(Email::mailbox_id("INBOX", 17), "INBOX-17");
    assert_eq!(Attachment::new("a.txt", "text/plain", b"abc".to_vec()).size(), 3);
}
