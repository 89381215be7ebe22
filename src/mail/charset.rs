//! Single-byte code page decoding.
//!
//! Central European mail still arrives in Latin-2 and Windows code pages.
//! These are mapped through fixed tables; every other label is read as
//! UTF-8 with lossy replacement.

const REPLACEMENT: char = '\u{FFFD}';

/// ISO-8859-2, bytes `0xA0..=0xFF`.
const ISO_8859_2_HIGH: [char; 96] = [
    '\u{00A0}', 'Ą', '˘', 'Ł', '¤', 'Ľ', 'Ś', '§', '¨', 'Š', 'Ş', 'Ť', 'Ź', '\u{00AD}', 'Ž', 'Ż',
    '°', 'ą', '˛', 'ł', '´', 'ľ', 'ś', 'ˇ', '¸', 'š', 'ş', 'ť', 'ź', '˝', 'ž', 'ż',
    'Ŕ', 'Á', 'Â', 'Ă', 'Ä', 'Ĺ', 'Ć', 'Ç', 'Č', 'É', 'Ę', 'Ë', 'Ě', 'Í', 'Î', 'Ď',
    'Đ', 'Ń', 'Ň', 'Ó', 'Ô', 'Ő', 'Ö', '×', 'Ř', 'Ů', 'Ú', 'Ű', 'Ü', 'Ý', 'Ţ', 'ß',
    'ŕ', 'á', 'â', 'ă', 'ä', 'ĺ', 'ć', 'ç', 'č', 'é', 'ę', 'ë', 'ě', 'í', 'î', 'ď',
    'đ', 'ń', 'ň', 'ó', 'ô', 'ő', 'ö', '÷', 'ř', 'ů', 'ú', 'ű', 'ü', 'ý', 'ţ', '˙',
];

/// Windows-1250, bytes `0x80..=0xBF`. The upper quarter matches ISO-8859-2.
const WINDOWS_1250_MID: [char; 64] = [
    '€', REPLACEMENT, '‚', REPLACEMENT, '„', '…', '†', '‡', REPLACEMENT, '‰', 'Š', '‹', 'Ś', 'Ť', 'Ž', 'Ź',
    REPLACEMENT, '‘', '’', '“', '”', '•', '–', '—', REPLACEMENT, '™', 'š', '›', 'ś', 'ť', 'ž', 'ź',
    '\u{00A0}', 'ˇ', '˘', 'Ł', '¤', 'Ą', '¦', '§', '¨', '©', 'Ş', '«', '¬', '\u{00AD}', '®', 'Ż',
    '°', '±', '˛', 'ł', '´', 'µ', '¶', '·', '¸', 'ą', 'ş', '»', 'Ľ', '˝', 'ľ', 'ż',
];

/// Windows-1252, bytes `0x80..=0x9F`. Everything above is Latin-1.
const WINDOWS_1252_C1: [char; 32] = [
    '€', REPLACEMENT, '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', REPLACEMENT, 'Ž', REPLACEMENT,
    REPLACEMENT, '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', REPLACEMENT, 'ž', 'Ÿ',
];

/// Character sets the decoder knows how to map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// UTF-8 and anything unrecognized.
    Utf8,
    /// ISO-8859-1.
    Latin1,
    /// Windows-1252.
    Windows1252,
    /// ISO-8859-2.
    Latin2,
    /// Windows-1250.
    Windows1250,
}

impl Charset {
    /// Resolve a MIME charset label, case-insensitively.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        match label.as_str() {
            "iso-8859-2" | "iso8859-2" | "latin2" | "l2" => Self::Latin2,
            "windows-1250" | "cp1250" | "x-cp1250" => Self::Windows1250,
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" => Self::Latin1,
            "windows-1252" | "cp1252" | "x-cp1252" => Self::Windows1252,
            _ => Self::Utf8,
        }
    }

    /// Map a single byte to its character. ASCII is shared by every table.
    fn map_byte(self, byte: u8) -> char {
        if byte < 0x80 {
            return char::from(byte);
        }
        let idx = usize::from(byte);
        match self {
            Self::Utf8 => REPLACEMENT,
            Self::Latin1 => char::from(byte),
            Self::Windows1252 if byte < 0xA0 => WINDOWS_1252_C1[idx - 0x80],
            Self::Windows1252 => char::from(byte),
            Self::Latin2 if byte < 0xA0 => char::from(byte),
            Self::Latin2 => ISO_8859_2_HIGH[idx - 0xA0],
            Self::Windows1250 if byte < 0xC0 => WINDOWS_1250_MID[idx - 0x80],
            Self::Windows1250 => ISO_8859_2_HIGH[idx - 0xA0],
        }
    }
}

/// Decode `bytes` declared as `label` into a `String`.
///
/// Never fails: unknown labels and invalid UTF-8 degrade to replacement
/// characters.
#[must_use]
pub fn decode(bytes: &[u8], label: &str) -> String {
    match Charset::from_label(label) {
        Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        table => bytes.iter().map(|&b| table.map_byte(b)).collect(),
    }
}
