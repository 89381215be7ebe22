//! Ticket reference extraction and reply-quote stripping.

use std::sync::OnceLock;

use regex::Regex;

#[allow(clippy::expect_used)]
fn ticket_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\s*([A-Za-z0-9_-]+?)\s*-\s*#\s*(\d+)\s*\]").expect("valid ticket regex")
    })
}

/// Extract the task id from a `[PREFIX-#N]` token in `subject`.
///
/// Whitespace is tolerated around the dash and inside the brackets, the
/// prefix is compared case-insensitively and ids of zero are rejected.
/// The first token carrying `prefix` wins.
#[must_use]
pub fn extract_ticket_id(subject: &str, prefix: &str) -> Option<u64> {
    let prefix = prefix.trim();
    ticket_regex()
        .captures_iter(subject)
        .filter(|caps| caps[1].eq_ignore_ascii_case(prefix))
        .find_map(|caps| caps[2].parse::<u64>().ok().filter(|id| *id > 0))
}

/// Render the canonical reference token placed in outbound subjects.
#[must_use]
pub fn format_ticket_reference(prefix: &str, id: u64) -> String {
    format!("[{prefix}-#{id}]")
}

/// One way a line can announce the start of quoted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotePattern {
    /// Lowercased line contains the phrase anywhere.
    Contains(String),
    /// Lowercased line begins with the phrase.
    StartsWith(String),
    /// Lowercased line ends with the phrase.
    EndsWith(String),
}

impl QuotePattern {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Self::Contains(p) => lowered.contains(p.as_str()),
            Self::StartsWith(p) => lowered.starts_with(p.as_str()),
            Self::EndsWith(p) => lowered.ends_with(p.as_str()),
        }
    }
}

/// Ordered list of quote-header patterns.
///
/// The built-in list covers English and Czech mail clients; deployments
/// append their own phrases through configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePatterns {
    patterns: Vec<QuotePattern>,
}

impl Default for QuotePatterns {
    fn default() -> Self {
        let contains = [
            "original message",
            "původní zpráva",
            "forwarded message",
            "přeposlaná zpráva",
        ];
        let ends_with = ["wrote:", "napsal:", "napsala:", "napsal(a):"];
        let starts_with = ["from:", "od:", "sent:", "odesláno:"];

        let patterns = contains
            .into_iter()
            .map(|p| QuotePattern::Contains(p.to_owned()))
            .chain(ends_with.into_iter().map(|p| QuotePattern::EndsWith(p.to_owned())))
            .chain(starts_with.into_iter().map(|p| QuotePattern::StartsWith(p.to_owned())))
            .collect();
        Self { patterns }
    }
}

impl QuotePatterns {
    /// Built-in patterns plus `extra` substring phrases.
    #[must_use]
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut this = Self::default();
        this.patterns.extend(
            extra
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .map(QuotePattern::Contains),
        );
        this
    }

    /// Append a single pattern.
    pub fn push(&mut self, pattern: QuotePattern) {
        self.patterns.push(pattern);
    }

    /// Whether `line` starts quoted or forwarded content.
    #[must_use]
    pub fn is_quote_header(&self, line: &str) -> bool {
        let lowered = line.trim().to_lowercase();
        !lowered.is_empty() && self.patterns.iter().any(|p| p.matches(&lowered))
    }
}

/// Drop quoted reply content from a plain-text body.
///
/// Lines starting with `>` are skipped and everything from the first
/// quote header on is discarded. When nothing is left but the input had
/// content, the trimmed input is returned instead.
#[must_use]
pub fn strip_quoted_reply(body: &str, patterns: &QuotePatterns) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        if patterns.is_quote_header(trimmed) {
            break;
        }
        kept.push(line);
    }

    let stripped = kept.join("\n").trim().to_owned();
    if stripped.is_empty() {
        body.trim().to_owned()
    } else {
        stripped
    }
}
