use regex::Regex;
use std::sync::OnceLock;

fn escape_sequence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[mK]").expect("static pattern is valid"))
}

/// Strip colour/erase escape sequences, normalize line endings to LF and trim.
pub fn normalize_log(raw: &str) -> String {
    let without_escapes = escape_sequence().replace_all(raw, "");
    without_escapes
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// Same as [`normalize_log`] for a raw captured byte stream; invalid UTF-8 is
/// replaced rather than rejected.
pub fn normalize_log_bytes(raw: &[u8]) -> String {
    normalize_log(&String::from_utf8_lossy(raw))
}
