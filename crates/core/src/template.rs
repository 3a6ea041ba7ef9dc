//! DM body composition from a workflow's message template.
//!
//! Supported placeholders: `{username}`, `{keyword}`, `{comment}`, `{link}`.
//! Missing variables substitute to the empty string so a half-filled template
//! never leaks placeholder syntax to a recipient.

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Provider-side maximum DM length, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Appended when a composed message had to be cut at [`MAX_MESSAGE_LENGTH`].
pub const TRUNCATION_MARKER: char = '…';

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Variables available to a message template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVars<'a> {
    pub username: Option<&'a str>,
    pub keyword: Option<&'a str>,
    pub comment: Option<&'a str>,
    pub link: Option<&'a str>,
}

/// Render `template` with `vars` substituted, enforcing the provider length
/// cap.
///
/// A configured link is appended after a blank line when the template does
/// not reference `{link}` itself, so link workflows work without template
/// edits.
pub fn compose(template: &str, vars: &TemplateVars) -> String {
    let has_link_placeholder = template.contains("{link}");

    let mut body = template
        .replace("{username}", vars.username.unwrap_or_default())
        .replace("{keyword}", vars.keyword.unwrap_or_default())
        .replace("{comment}", vars.comment.unwrap_or_default())
        .replace("{link}", vars.link.unwrap_or_default());

    if let Some(link) = vars.link {
        if !has_link_placeholder && !link.is_empty() {
            body.push_str("\n\n");
            body.push_str(link);
        }
    }

    truncate_message(body)
}

/// Cut `body` to at most [`MAX_MESSAGE_LENGTH`] characters, marking the cut.
fn truncate_message(body: String) -> String {
    if body.chars().count() <= MAX_MESSAGE_LENGTH {
        return body;
    }
    let mut truncated: String = body.chars().take(MAX_MESSAGE_LENGTH - 1).collect();
    truncated.push(TRUNCATION_MARKER);
    truncated
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
