use helpdesk_bridge::mail::{
    extract_ticket_id, format_ticket_reference, strip_quoted_reply, QuotePatterns,
};

#[test]
fn extracts_id_from_canonical_token() {
    assert_eq!(extract_ticket_id("Re: [TICKET-#123] Printer", "TICKET"), Some(123));
}

#[test]
fn tolerates_whitespace_and_case() {
    assert_eq!(extract_ticket_id("RE: [ ticket - # 77 ] hi", "TICKET"), Some(77));
    assert_eq!(extract_ticket_id("[Help-#5]", "HELP"), Some(5));
}

#[test]
fn ignores_other_prefixes() {
    assert_eq!(extract_ticket_id("[JIRA-#9] [TICKET-#10]", "TICKET"), Some(10));
    assert_eq!(extract_ticket_id("[JIRA-#9]", "TICKET"), None);
}

#[test]
fn rejects_missing_or_zero_ids() {
    assert_eq!(extract_ticket_id("No reference here", "TICKET"), None);
    assert_eq!(extract_ticket_id("[TICKET-#0]", "TICKET"), None);
    assert_eq!(extract_ticket_id("[TICKET-#]", "TICKET"), None);
    assert_eq!(extract_ticket_id("TICKET-#12", "TICKET"), None);
}

#[test]
fn first_matching_token_wins() {
    assert_eq!(extract_ticket_id("[TICKET-#1] fwd [TICKET-#2]", "TICKET"), Some(1));
}

#[test]
fn formatted_reference_round_trips() {
    let token = format_ticket_reference("TICKET", 321);
    assert_eq!(token, "[TICKET-#321]");
    assert_eq!(extract_ticket_id(&format!("Re: {token}"), "TICKET"), Some(321));
}

#[test]
fn strips_gmail_style_quote() {
    let body = "Thanks, it works now.\n\nOn Mon, 1 Jan 2024 at 10:00, Support wrote:\n> Did you restart it?\n";
    let stripped = strip_quoted_reply(body, &QuotePatterns::default());
    assert_eq!(stripped, "Thanks, it works now.");
}

#[test]
fn strips_czech_outlook_header() {
    let body = "Dekuji.\n\nOd: Podpora <support@example.com>\nOdesláno: pondělí\nPředmět: Re: x\n\nold text";
    let stripped = strip_quoted_reply(body, &QuotePatterns::default());
    assert_eq!(stripped, "Dekuji.");
}

#[test]
fn drops_inline_quoted_lines() {
    let body = "> earlier\nmy answer\n> more earlier\nsecond line";
    let stripped = strip_quoted_reply(body, &QuotePatterns::default());
    assert_eq!(stripped, "my answer\nsecond line");
}

#[test]
fn original_message_separator_ends_content() {
    let body = "Short reply\n-----Original Message-----\nFrom: someone";
    let stripped = strip_quoted_reply(body, &QuotePatterns::default());
    assert_eq!(stripped, "Short reply");
}

#[test]
fn all_quoted_body_falls_back_to_input() {
    let body = "  > only quoted\n> lines  ";
    let stripped = strip_quoted_reply(body, &QuotePatterns::default());
    assert_eq!(stripped, body.trim());
}

#[test]
fn empty_body_stays_empty() {
    assert_eq!(strip_quoted_reply("", &QuotePatterns::default()), "");
}

#[test]
fn extra_patterns_extend_builtins() {
    let patterns = QuotePatterns::with_extra(["-----Reply above this line-----", "  "]);
    let body = "New info\n-----REPLY ABOVE THIS LINE-----\nhistory";
    assert_eq!(strip_quoted_reply(body, &patterns), "New info");
    assert!(patterns.is_quote_header("John wrote:"));
    assert!(!patterns.is_quote_header(""));
}

#[test]
fn stripping_is_idempotent() {
    let patterns = QuotePatterns::default();
    let bodies = [
        "Thanks, it works now.\n\nOn Mon, 1 Jan 2024 at 10:00, Support wrote:\n> Did you restart it?\n",
        "Díky.\n\nDne 2. 4. 2024 v 10:00 Podpora napsal(a):\n> Zkuste to znovu.",
        "> only quoted\n> lines here",
        "  plain text with trailing space  \n\n",
        "",
    ];
    for body in bodies {
        let once = strip_quoted_reply(body, &patterns);
        assert_eq!(strip_quoted_reply(&once, &patterns), once, "{body:?}");
    }
}
