/// Marker pylint prints in front of every module it reports on.
pub const MODULE_MARKER: &str = "*************";
/// Phrase of the score line pylint appends when scoring is enabled.
pub const RATING_PHRASE: &str = "Your code has been rated at";

/// One linter line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine<'a> {
    Module(&'a str),
    Finding {
        path: &'a str,
        line: u32,
        column: u32,
        message: &'a str,
    },
    Rating(&'a str),
    Other(&'a str),
}

pub fn classify_line(line: &str) -> ReportLine<'_> {
    if let Some(rest) = line.strip_prefix(MODULE_MARKER) {
        let name = rest.trim().trim_start_matches("Module").trim();
        return ReportLine::Module(name);
    }
    if line.starts_with('/') {
        if let Some(finding) = parse_finding(line) {
            return finding;
        }
    }
    if line.contains(RATING_PHRASE) {
        return ReportLine::Rating(line.trim());
    }
    ReportLine::Other(line)
}

fn parse_finding(line: &str) -> Option<ReportLine<'_>> {
    let mut parts = line.splitn(4, ':');
    let path = parts.next()?;
    let line_no = parts.next()?.trim().parse().ok()?;
    let column = parts.next()?.trim().parse().ok()?;
    let message = parts.next()?.trim();
    Some(ReportLine::Finding {
        path,
        line: line_no,
        column,
        message,
    })
}

/// Render a raw linter report one finding per line, keeping source order.
pub fn format_lint_report(raw: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for line in raw.lines() {
        match classify_line(line) {
            ReportLine::Module(name) => {
                if !out.is_empty() {
                    out.push(String::new());
                }
                out.push(format!("Module: `{}`", name));
            }
            ReportLine::Finding {
                path,
                line,
                column,
                message,
            } => {
                out.push(format!(
                    "File: {}, Line: {}, Column: {} -> {}",
                    path, line, column, message
                ));
            }
            ReportLine::Rating(text) => {
                if !out.is_empty() {
                    out.push(String::new());
                }
                out.push(text.to_string());
                out.push(String::new());
            }
            ReportLine::Other(text) => out.push(text.to_string()),
        }
    }

    out.join("\n").trim_end().to_string()
}
