use helpdesk_bridge::AppError;

#[test]
fn display_prefixes_variant() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Db("locked".into()), "db: locked"),
        (AppError::Transient("timeout".into()), "transient: timeout"),
        (AppError::Unauthorized("denied".into()), "unauthorized: denied"),
        (AppError::NotFound("task 4".into()), "not found: task 4"),
        (AppError::Tracker("fault".into()), "tracker: fault"),
        (AppError::Slack("ratelimited".into()), "slack: ratelimited"),
        (AppError::Send("rejected".into()), "send: rejected"),
        (AppError::Render("undefined".into()), "render: undefined"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn only_transport_failures_are_transient() {
    assert!(AppError::Transient("reset".into()).is_transient());
    assert!(AppError::Io("broken pipe".into()).is_transient());
    assert!(!AppError::Unauthorized("denied".into()).is_transient());
    assert!(!AppError::Parse("bad json".into()).is_transient());
    assert!(!AppError::Db("locked".into()).is_transient());
}

#[test]
fn io_error_converts() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("disk full")));
}

#[test]
fn toml_error_converts_to_config() {
    let parse: Result<toml::Value, _> = toml::from_str("=");
    let err: AppError = parse.unwrap_err().into();
    assert!(matches!(err, AppError::Config(_)));
}
