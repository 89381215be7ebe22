//! Minimal HTML to plain text conversion for mail bodies.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Named entities seen in helpdesk mail, including Czech letters.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", " "),
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("copy", "©"),
    ("reg", "®"),
    ("trade", "™"),
    ("euro", "€"),
    ("pound", "£"),
    ("yen", "¥"),
    ("cent", "¢"),
    ("deg", "°"),
    ("mdash", "—"),
    ("ndash", "–"),
    ("hellip", "…"),
    ("laquo", "«"),
    ("raquo", "»"),
    ("bdquo", "„"),
    ("ldquo", "“"),
    ("rdquo", "”"),
    ("lsquo", "‘"),
    ("rsquo", "’"),
    ("bull", "•"),
    ("aacute", "á"),
    ("Aacute", "Á"),
    ("eacute", "é"),
    ("Eacute", "É"),
    ("iacute", "í"),
    ("Iacute", "Í"),
    ("oacute", "ó"),
    ("Oacute", "Ó"),
    ("uacute", "ú"),
    ("Uacute", "Ú"),
    ("yacute", "ý"),
    ("Yacute", "Ý"),
    ("ccaron", "č"),
    ("Ccaron", "Č"),
    ("dcaron", "ď"),
    ("Dcaron", "Ď"),
    ("ecaron", "ě"),
    ("Ecaron", "Ě"),
    ("ncaron", "ň"),
    ("Ncaron", "Ň"),
    ("rcaron", "ř"),
    ("Rcaron", "Ř"),
    ("scaron", "š"),
    ("Scaron", "Š"),
    ("tcaron", "ť"),
    ("Tcaron", "Ť"),
    ("uring", "ů"),
    ("Uring", "Ů"),
    ("zcaron", "ž"),
    ("Zcaron", "Ž"),
    ("auml", "ä"),
    ("ouml", "ö"),
    ("uuml", "ü"),
];

#[allow(clippy::expect_used)]
fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

fn hidden_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<(?:script|style|head)\b.*?</(?:script|style|head)\s*>")
}

fn line_break_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)</p\s*>|<br\s*/?\s*>|</div\s*>|</li\s*>|</tr\s*>")
}

fn list_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)<li\b[^>]*>")
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<[^>]*>")
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,10});")
}

fn blank_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\n{3,}")
}

/// Convert an HTML fragment to readable plain text.
///
/// Paragraph, line-break, `div` and list-item boundaries become newlines,
/// list items get a `"- "` marker, all other markup is dropped, entities are
/// decoded and blank-line runs collapse to a single empty line.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let text = html.replace("\r\n", "\n").replace('\r', "\n");
    let text = hidden_block_regex().replace_all(&text, "");
    let text = line_break_regex().replace_all(&text, "\n");
    let text = list_item_regex().replace_all(&text, "- ");
    // Opening <p> and <div> fall through to the generic tag strip.
    let text = tag_regex().replace_all(&text, "");
    let text = decode_entities(&text);

    let joined = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    blank_run_regex()
        .replace_all(&joined, "\n\n")
        .trim()
        .to_owned()
}

/// Decode named and numeric character references.
///
/// Unknown names and invalid code points are left untouched.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    entity_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = caps[0].to_owned();
            let inner = &caps[1];
            if let Some(num) = inner.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                return code.and_then(char::from_u32).map_or(whole, String::from);
            }
            NAMED_ENTITIES
                .iter()
                .find(|(name, _)| *name == inner)
                .or_else(|| {
                    NAMED_ENTITIES
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(inner))
                })
                .map_or(whole, |(_, value)| (*value).to_owned())
        })
        .into_owned()
}
