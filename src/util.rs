//! Small helpers shared by the collaborators, the stages and the CLI.

use std::future::Future;
use std::time::Duration;

use crate::errors::CollaboratorError;

/// Bound a collaborator call. An elapsed deadline becomes [`CollaboratorError::Timeout`].
pub async fn with_timeout<T, F>(after: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout { after }),
    }
}

/// Extract the first balanced JSON object from text that may contain other content.
///
/// Braces inside string literals are ignored, so a model reply such as
/// `Sure! {"title": "a {b}"}` yields the whole object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Truncate to at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
