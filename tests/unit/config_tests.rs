use helpdesk_bridge::config::{GlobalConfig, WatermarkPolicy};
use helpdesk_bridge::AppError;

fn sample_toml() -> String {
    r#"
[app]
poll_seconds = 30
ledger_path = "state/test.db"
ticket_prefix = "HELP"
done_stage_ids = [7, 8]
excluded_emails = ["noreply@example.com"]
no_reply_emails = ["Robot@Example.com"]
operators = ["alice", "bob"]
quote_patterns = ["-----Reply above this line-----"]
watermark_policy = "lowest_unsent"

[app.sla]
start_time_hours = 2
resolution_time_hours = 12

[tracker]
url = "https://odoo.example.com"
db = "helpdesk"
username = "bridge@example.com"
project_id = 3

[tracker.stages]
new = 1
assigned = 2
in_progress = 4
done = 7

[slack]
channel_id = "C123"

[imap]
host = "imap.example.com"
username = "support@example.com"
search_to = "support@example.com"

[smtp]
host = "smtp.example.com"
from_name = "Support"
from_email = "support@example.com"
"#
    .to_owned()
}

const MINIMAL_TOML: &str = r#"
[tracker]
url = "https://odoo.example.com"
db = "helpdesk"
username = "bridge"
project_id = 3

[tracker.stages]
new = 1

[imap]
host = "imap.example.com"
username = "support@example.com"

[smtp]
host = "smtp.example.com"
from_email = "support@example.com"
"#;

#[test]
fn parses_valid_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");

    assert_eq!(config.app.poll_seconds, 30);
    assert_eq!(config.app.ticket_prefix, "HELP");
    assert_eq!(config.app.done_stage_ids, vec![7, 8]);
    assert_eq!(config.app.operators, vec!["alice", "bob"]);
    assert_eq!(config.app.sla.start_time_hours, 2);
    assert_eq!(config.app.sla.resolution_time_hours, 12);
    assert_eq!(config.app.watermark_policy, WatermarkPolicy::LowestUnsent);
    assert_eq!(config.tracker.stages.assigned, 2);
    assert_eq!(config.slack.channel_id, "C123");
    assert_eq!(config.imap.search_to, "support@example.com");
}

#[test]
fn applies_defaults_for_optional_fields() {
    let config = GlobalConfig::from_toml_str(MINIMAL_TOML).expect("config parses");

    assert_eq!(config.app.poll_seconds, 20);
    assert_eq!(config.app.ticket_prefix, "TICKET");
    assert_eq!(config.app.sla.start_time_hours, 4);
    assert_eq!(config.app.sla.resolution_time_hours, 24);
    assert_eq!(config.app.changed_window_hours, 48);
    assert_eq!(config.app.watermark_policy, WatermarkPolicy::MaxSeen);
    assert!(config.app.new_stage_names.iter().any(|n| n == "new"));
    assert_eq!(config.imap.port, 993);
    assert_eq!(config.imap.folder, "INBOX");
    assert_eq!(config.imap.max_messages_per_poll, 25);
    assert_eq!(config.smtp.port, 587);
    assert_eq!(config.tracker.timeout_seconds, 20);
    assert!(config.slack.channel_id.is_empty());
}

#[test]
fn credentials_are_never_read_from_toml() {
    let raw = format!("{MINIMAL_TOML}\n");
    let raw = raw.replace(
        "username = \"bridge\"",
        "username = \"bridge\"\npassword = \"in-file\"",
    );
    let config = GlobalConfig::from_toml_str(&raw).expect("config parses");
    assert!(config.tracker.password.is_empty());
}

#[test]
fn missing_required_fields_are_listed() {
    let raw = MINIMAL_TOML.replace("db = \"helpdesk\"", "db = \"\"");
    let raw = raw.replace("host = \"smtp.example.com\"", "host = \"\"");
    let err = GlobalConfig::from_toml_str(&raw).expect_err("validation fails");
    match err {
        AppError::Config(msg) => {
            assert!(msg.contains("tracker.db"), "{msg}");
            assert!(msg.contains("smtp.host"), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_new_stage_is_rejected() {
    let raw = MINIMAL_TOML.replace("new = 1", "new = 0");
    let err = GlobalConfig::from_toml_str(&raw).expect_err("validation fails");
    assert!(err.to_string().contains("tracker.stages.new"));
}

#[test]
fn zero_poll_interval_is_rejected() {
    let raw = format!("[app]\npoll_seconds = 0\n{MINIMAL_TOML}");
    let err = GlobalConfig::from_toml_str(&raw).expect_err("validation fails");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn blank_ticket_prefix_is_rejected() {
    let raw = format!("[app]\nticket_prefix = \"  \"\n{MINIMAL_TOML}");
    assert!(GlobalConfig::from_toml_str(&raw).is_err());
}

#[test]
fn invalid_toml_is_config_error() {
    let err = GlobalConfig::from_toml_str("[tracker\nurl =").expect_err("parse fails");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn unknown_watermark_policy_is_rejected() {
    let raw = format!("[app]\nwatermark_policy = \"newest\"\n{MINIMAL_TOML}");
    assert!(GlobalConfig::from_toml_str(&raw).is_err());
}

#[test]
fn sender_lists_match_case_insensitively() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");

    assert!(config.is_excluded("NoReply@Example.com"));
    assert!(config.is_no_reply("robot@example.com "));
    assert!(!config.is_no_reply("customer@example.com"));
}

#[test]
fn link_base_falls_back_to_rpc_url() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL_TOML).expect("config parses");
    assert_eq!(config.tracker.link_base(), "https://odoo.example.com");

    config.tracker.base_url = "https://help.example.com".into();
    assert_eq!(config.tracker.link_base(), "https://help.example.com");
}

#[test]
fn derived_durations() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");
    assert_eq!(config.poll_interval().as_secs(), 30);
    assert_eq!(config.changed_window(), chrono::Duration::hours(48));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, MINIMAL_TOML).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.tracker.project_id, 3);

    let missing = GlobalConfig::load_from_path(dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(AppError::Config(_))));
}
