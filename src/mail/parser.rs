//! MIME decoding of raw RFC 822 messages.
//!
//! Parsing never fails. Structural problems degrade to the best text that
//! can be recovered from the bytes.

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use tracing::debug;

use super::{charset, html};
use crate::models::email::{Attachment, Email};

/// Exact content type to extension mapping.
const EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", ".jpg"),
    ("image/jpg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
    ("image/bmp", ".bmp"),
    ("image/tiff", ".tiff"),
    ("application/pdf", ".pdf"),
    ("application/msword", ".doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".docx",
    ),
    ("application/vnd.ms-excel", ".xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/zip", ".zip"),
    ("text/plain", ".txt"),
    ("text/html", ".html"),
];

/// Substring heuristics applied when no exact mapping exists.
const EXTENSION_HINTS: &[(&str, &str)] = &[
    ("jpeg", ".jpg"),
    ("jpg", ".jpg"),
    ("png", ".png"),
    ("pdf", ".pdf"),
    ("word", ".docx"),
    ("excel", ".xlsx"),
    ("spreadsheet", ".xlsx"),
    ("image/", ".bin"),
    ("text/", ".txt"),
];

const FALLBACK_FILENAME: &str = "attachment.bin";

/// Body text and attachments recovered from a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBody {
    /// Best-effort plain text body.
    pub body: String,
    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
}

/// Result of walking one MIME part.
#[derive(Debug, Default)]
struct PartContent {
    body: Option<String>,
    attachments: Vec<Attachment>,
}

impl PartContent {
    fn body(text: String) -> Self {
        Self {
            body: Some(text),
            attachments: Vec::new(),
        }
    }

    fn attachment(attachment: Attachment) -> Self {
        Self {
            body: None,
            attachments: vec![attachment],
        }
    }

    /// First non-empty body wins; attachments accumulate in order.
    fn merge(&mut self, other: Self) {
        let have_body = self.body.as_deref().is_some_and(|b| !b.is_empty());
        if !have_body {
            if let Some(text) = other.body.filter(|b| !b.is_empty()) {
                self.body = Some(text);
            }
        }
        self.attachments.extend(other.attachments);
    }
}

/// Decode a raw message into body text and attachments.
#[must_use]
pub fn parse(raw: &[u8]) -> ParsedBody {
    match mailparse::parse_mail(raw) {
        Ok(mail) => extract_body(&mail, raw),
        Err(err) => {
            debug!(%err, "mime parse failed, using header-stripped payload");
            ParsedBody {
                body: strip_headers(raw),
                attachments: Vec::new(),
            }
        }
    }
}

/// Decode a raw message fetched from `folder` under `uid` into an [`Email`].
#[must_use]
pub fn parse_message(raw: &[u8], folder: &str, uid: u32) -> Email {
    let id = Email::mailbox_id(folder, uid);
    let Ok(mail) = mailparse::parse_mail(raw) else {
        debug!(email_id = %id, "mime parse failed, using header-stripped payload");
        return Email {
            id,
            uid,
            subject: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            body: strip_headers(raw),
            attachments: Vec::new(),
        };
    };

    let subject = mail
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_owned())
        .unwrap_or_default();
    let (from_email, from_name) = sender(&mail);
    let ParsedBody { body, attachments } = extract_body(&mail, raw);

    Email {
        id,
        uid,
        subject,
        from_email,
        from_name,
        body,
        attachments,
    }
}

/// Primary sender address and display name; the name falls back to the address.
fn sender(mail: &ParsedMail<'_>) -> (String, String) {
    let Some(header) = mail.headers.get_first_header("From") else {
        return (String::new(), String::new());
    };
    let first = mailparse::addrparse_header(header)
        .ok()
        .and_then(|list| list.iter().find_map(first_single));
    match first {
        Some((addr, name)) => {
            let name = name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| addr.clone());
            (addr, name)
        }
        None => {
            let raw = header.get_value().trim().to_owned();
            (raw.clone(), raw)
        }
    }
}

fn first_single(addr: &MailAddr) -> Option<(String, Option<String>)> {
    match addr {
        MailAddr::Single(info) => Some((info.addr.trim().to_owned(), info.display_name.clone())),
        MailAddr::Group(group) => group
            .addrs
            .first()
            .map(|info| (info.addr.trim().to_owned(), info.display_name.clone())),
    }
}

fn extract_body(mail: &ParsedMail<'_>, raw: &[u8]) -> ParsedBody {
    let mimetype = mail.ctype.mimetype.to_ascii_lowercase();

    let content = if mimetype.starts_with("multipart/") {
        if mail.subparts.is_empty() {
            return ParsedBody {
                body: strip_headers(raw),
                attachments: Vec::new(),
            };
        }
        extract_part(mail)
    } else {
        match mimetype.as_str() {
            "text/plain" => PartContent::body(decode_text(mail)),
            "text/html" => PartContent::body(html::html_to_text(&decode_text(mail))),
            _ => PartContent::default(),
        }
    };

    let body = content.body.unwrap_or_default();
    if body.is_empty()
        && content.attachments.is_empty()
        && !mimetype.starts_with("text/")
        && !raw.is_empty()
    {
        debug!(%mimetype, "no body or attachments found, using raw payload");
        return ParsedBody {
            body: String::from_utf8_lossy(raw).trim().to_owned(),
            attachments: Vec::new(),
        };
    }

    ParsedBody {
        body,
        attachments: content.attachments,
    }
}

/// Walk one part, recursing through containers.
fn extract_part(part: &ParsedMail<'_>) -> PartContent {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();

    if mimetype.starts_with("multipart/") {
        let mut merged = PartContent::default();
        for sub in &part.subparts {
            merged.merge(extract_part(sub));
        }
        return merged;
    }

    if is_attachment(part, &mimetype) {
        return PartContent::attachment(to_attachment(part, &mimetype));
    }

    match mimetype.as_str() {
        "text/plain" => PartContent::body(decode_text(part)),
        "text/html" => PartContent::body(html::html_to_text(&decode_text(part))),
        _ => PartContent::default(),
    }
}

fn is_attachment(part: &ParsedMail<'_>, mimetype: &str) -> bool {
    let is_text = mimetype.starts_with("text/");
    if part.headers.get_first_header("Content-Disposition").is_some() {
        match part.get_content_disposition().disposition {
            DispositionType::Attachment => return true,
            DispositionType::Inline if !is_text => return true,
            _ => {}
        }
    }
    if part.ctype.params.contains_key("name") && !is_text {
        return true;
    }
    mimetype.starts_with("image/") || mimetype.starts_with("application/")
}

fn to_attachment(part: &ParsedMail<'_>, mimetype: &str) -> Attachment {
    let data = part.get_body_raw().unwrap_or_else(|err| {
        debug!(%err, %mimetype, "attachment body undecodable, storing empty payload");
        Vec::new()
    });
    Attachment::new(attachment_filename(part, mimetype), mimetype, data)
}

fn attachment_filename(part: &ParsedMail<'_>, mimetype: &str) -> String {
    let disposition = part.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| name.trim().trim_matches('"').to_owned())
        .filter(|name| !name.is_empty())
        .or_else(|| extension_for(mimetype).map(|ext| format!("attachment{ext}")))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_owned())
}

/// File extension for a content type, exact matches before heuristics.
#[must_use]
pub fn extension_for(mimetype: &str) -> Option<&'static str> {
    let mimetype = mimetype.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ct, _)| *ct == mimetype)
        .or_else(|| EXTENSION_HINTS.iter().find(|(hint, _)| mimetype.contains(hint)))
        .map(|(_, ext)| *ext)
}

/// Transfer-decode a text part and map its charset to Unicode.
fn decode_text(part: &ParsedMail<'_>) -> String {
    match part.get_body_raw() {
        Ok(bytes) => charset::decode(&bytes, &part.ctype.charset).trim().to_owned(),
        Err(err) => {
            debug!(%err, "text part undecodable");
            String::new()
        }
    }
}

/// Everything after the first blank line, or the whole payload when the
/// message has no header/body separator.
fn strip_headers(raw: &[u8]) -> String {
    let body = find_separator(raw).map_or(raw, |end| &raw[end..]);
    String::from_utf8_lossy(body).trim().to_owned()
}

fn find_separator(raw: &[u8]) -> Option<usize> {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
