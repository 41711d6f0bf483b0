//! Translation outcome: the tagged result of turning free text into a query.

/// Reserved model output meaning "this is not a file-search request".
pub const INVALID_SENTINEL: &str = "INVALID";

/// Result of the translate stage.
///
/// The pipeline dispatches on the tag; translators never raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// An opaque structured predicate. May be empty.
    Query(String),

    /// The translator classified the request as off-topic.
    Invalid,

    /// Transport or provider failure, with detail for the logs.
    Failed(String),
}

impl Translation {
    /// Interpret raw model output: strip formatting, then check the sentinel.
    pub fn from_model_output(raw: &str) -> Self {
        let query = sanitize(raw);
        if query.eq_ignore_ascii_case(INVALID_SENTINEL) {
            Translation::Invalid
        } else {
            Translation::Query(query)
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Translation::Failed(detail.into())
    }
}

/// Models like to wrap answers in code fences even when told not to.
fn sanitize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // drop an optional language tag on the opening fence line
        text = match rest.split_once('\n') {
            Some((tag, body)) if !tag.contains(' ') => body,
            _ => rest,
        };
        text = text.trim_end().strip_suffix("```").unwrap_or(text);
    }

    text.replace('`', "").trim().to_string()
}
