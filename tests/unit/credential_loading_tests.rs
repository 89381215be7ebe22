//! Credential loading from the environment.
//!
//! These tests mutate process-global env vars and run serially. The
//! keychain service is assumed absent in test environments, so every
//! lookup falls through to the env var.

use helpdesk_bridge::config::GlobalConfig;

const CREDENTIAL_VARS: [&str; 4] = [
    "TRACKER_PASSWORD",
    "IMAP_PASSWORD",
    "SMTP_PASSWORD",
    "SLACK_BOT_TOKEN",
];

fn make_config(smtp_username: &str) -> GlobalConfig {
    let toml = format!(
        r#"
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
username = "{smtp_username}"
from_email = "support@example.com"
"#
    );
    GlobalConfig::from_toml_str(&toml).expect("config parses")
}

fn clear_env() {
    for var in CREDENTIAL_VARS {
        std::env::remove_var(var);
    }
}

#[tokio::test]
#[serial_test::serial]
async fn env_var_credentials_populate_config() {
    clear_env();
    std::env::set_var("TRACKER_PASSWORD", "tracker-secret");
    std::env::set_var("IMAP_PASSWORD", "imap-secret");
    std::env::set_var("SMTP_PASSWORD", "smtp-secret");
    std::env::set_var("SLACK_BOT_TOKEN", "xoxb-test");

    let mut config = make_config("mailer");
    config.load_credentials().await.expect("credentials load");

    assert_eq!(config.tracker.password, "tracker-secret");
    assert_eq!(config.imap.password, "imap-secret");
    assert_eq!(config.smtp.password, "smtp-secret");
    assert_eq!(config.slack.bot_token, "xoxb-test");

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn missing_tracker_password_names_env_var() {
    clear_env();
    std::env::set_var("IMAP_PASSWORD", "imap-secret");

    let mut config = make_config("");
    let err = config
        .load_credentials()
        .await
        .expect_err("tracker password is required");
    let msg = err.to_string();
    assert!(msg.contains("TRACKER_PASSWORD"), "got: {msg}");

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn smtp_password_only_required_with_username() {
    clear_env();
    std::env::set_var("TRACKER_PASSWORD", "tracker-secret");
    std::env::set_var("IMAP_PASSWORD", "imap-secret");

    let mut anonymous = make_config("");
    anonymous
        .load_credentials()
        .await
        .expect("anonymous smtp needs no password");
    assert!(anonymous.smtp.password.is_empty());

    let mut authenticated = make_config("mailer");
    let err = authenticated
        .load_credentials()
        .await
        .expect_err("smtp password is required with a username");
    assert!(err.to_string().contains("SMTP_PASSWORD"));

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn slack_token_is_optional() {
    clear_env();
    std::env::set_var("TRACKER_PASSWORD", "tracker-secret");
    std::env::set_var("IMAP_PASSWORD", "imap-secret");

    let mut config = make_config("");
    config.load_credentials().await.expect("credentials load");
    assert!(config.slack.bot_token.is_empty());

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn empty_env_var_counts_as_missing() {
    clear_env();
    std::env::set_var("TRACKER_PASSWORD", "");
    std::env::set_var("IMAP_PASSWORD", "imap-secret");

    let mut config = make_config("");
    assert!(config.load_credentials().await.is_err());

    clear_env();
}
