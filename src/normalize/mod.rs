pub mod logs;
pub mod markdown;
pub mod report;

pub use logs::{normalize_log, normalize_log_bytes};
pub use markdown::strip_markdown;
pub use report::format_lint_report;
