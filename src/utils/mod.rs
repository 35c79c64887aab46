pub mod logging;

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::Rendition;

const MAX_TITLE_CHARS: usize = 100;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("static regex"));

/// Make a title safe to use as a file name component.
///
/// Path-hostile characters are dropped, whitespace runs become a single `_`,
/// repeated underscores collapse, and the result is trimmed of underscores
/// and capped at 100 characters. Applying it twice changes nothing.
pub fn sanitize_filename(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    let underscored = WHITESPACE_RUN.replace_all(&stripped, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&underscored, "_");
    let trimmed = collapsed.trim_matches('_');

    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    truncated.trim_matches('_').to_string()
}

/// `{ordinal}-{title}-{quality}.{ext}`, with `ordinal` counted from 1.
pub fn output_filename(ordinal: usize, title: &str, rendition: &Rendition) -> String {
    let sanitized = sanitize_filename(title);
    let title = if sanitized.is_empty() {
        "untitled"
    } else {
        sanitized.as_str()
    };

    format!(
        "{}-{}-{}.{}",
        ordinal,
        title,
        rendition.quality_tag(),
        rendition.kind.extension()
    )
}
