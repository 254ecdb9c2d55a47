const FENCE: &str = "```";

/// Remove a surrounding markdown code fence (and its language tag) from
/// submitted source, then trim whitespace.
///
/// The single-pass rule only ever removes text, so it is applied until the
/// result stops changing. That makes the function idempotent even for inputs
/// such as nested or doubled fences.
pub fn strip_markdown(code: &str) -> String {
    let mut current = code.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(code: &str) -> String {
    let mut body = code;
    if body.starts_with(FENCE) {
        if let Some(newline) = body.find('\n') {
            body = &body[newline + 1..];
        }
        if let Some(stripped) = body.strip_suffix(FENCE) {
            body = stripped;
        }
    }
    body.trim().to_string()
}
