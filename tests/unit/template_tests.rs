use helpdesk_bridge::gateway::{TemplateName, TemplateRenderer};
use helpdesk_bridge::templates::MiniJinjaRenderer;
use helpdesk_bridge::AppError;
use serde_json::json;

fn new_ticket_vars() -> serde_json::Value {
    json!({
        "ticket_ref": "[TICKET-#12]",
        "ticket_prefix": "TICKET",
        "task_id": 12,
        "customer_name": "Jana",
        "sla_start_hours": 4,
        "sla_resolution_hours": 24,
        "original_body": "The printer is offline.",
    })
}

#[test]
fn builtin_new_ticket_mentions_reference_and_budgets() {
    let rendered = MiniJinjaRenderer::builtin()
        .render(TemplateName::NewTicket, &new_ticket_vars())
        .expect("render");

    assert!(rendered.subject.contains("[TICKET-#12]"));
    assert!(!rendered.subject.contains('\n'));
    assert!(rendered.body.contains("Hello Jana"));
    assert!(rendered.body.contains("within 4 hours"));
    assert!(rendered.body.contains("The printer is offline."));
}

#[test]
fn builtin_agent_reply_subject_keeps_reference() {
    let vars = json!({
        "ticket_ref": "[TICKET-#3]",
        "ticket_prefix": "TICKET",
        "task_id": 3,
        "subject": "VPN access",
        "customer_name": "Petr",
        "agent_message": "Your account is enabled.",
    });
    let rendered = MiniJinjaRenderer::builtin()
        .render(TemplateName::AgentReply, &vars)
        .expect("render");
    assert_eq!(rendered.subject, "Re: [TICKET-#3] VPN access");
    assert!(rendered.body.contains("Your account is enabled."));
}

#[test]
fn builtin_closed_template_omits_empty_link() {
    let vars = json!({
        "ticket_ref": "[TICKET-#8]",
        "ticket_prefix": "TICKET",
        "task_id": 8,
        "customer_name": "Eva",
        "task_url": "",
    });
    let rendered = MiniJinjaRenderer::builtin()
        .render(TemplateName::TicketClosed, &vars)
        .expect("render");
    assert!(rendered.subject.contains("[TICKET-#8]"));
    assert!(!rendered.body.contains("Details:"));
}

#[test]
fn missing_variable_is_render_error() {
    let mut vars = new_ticket_vars();
    vars.as_object_mut().expect("object").remove("customer_name");

    let err = MiniJinjaRenderer::builtin()
        .render(TemplateName::NewTicket, &vars)
        .expect_err("strict rendering rejects undefined variables");
    assert!(matches!(err, AppError::Render(_)));
}

#[test]
fn explicit_sources_render_and_unknown_names_fail() {
    let renderer = MiniJinjaRenderer::from_sources([(
        TemplateName::AgentReply,
        "\n  {{ ticket_ref }} update  \nignored second line",
        "{{ agent_message }}",
    )]);
    let rendered = renderer
        .render(
            TemplateName::AgentReply,
            &json!({"ticket_ref": "[T-#1]", "agent_message": "done"}),
        )
        .expect("render");
    assert_eq!(rendered.subject, "[T-#1] update");
    assert_eq!(rendered.body, "done");

    let missing = renderer.render(TemplateName::TicketClosed, &json!({}));
    assert!(matches!(missing, Err(AppError::Render(_))));
}

#[test]
fn directory_overrides_fall_back_to_builtins() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("new_ticket_subject.j2"),
        "Ticket {{ ticket_ref }} opened",
    )
    .expect("write override");

    let renderer = MiniJinjaRenderer::from_dir(dir.path()).expect("load templates");
    let rendered = renderer
        .render(TemplateName::NewTicket, &new_ticket_vars())
        .expect("render");
    assert_eq!(rendered.subject, "Ticket [TICKET-#12] opened");
    assert!(rendered.body.contains("Hello Jana"));
}

#[test]
fn missing_template_dir_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = MiniJinjaRenderer::from_dir(&dir.path().join("absent"))
        .err()
        .expect("missing dir is rejected");
    assert!(matches!(err, AppError::Config(_)));
}
