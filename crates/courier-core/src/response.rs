//! Outbound response types.

use serde::{Deserialize, Serialize};

/// How the adapter should render [`Response::text`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// Plain text, no markup.
    #[default]
    Plain,
    /// Markdown markup.
    Markdown,
    /// HTML markup.
    Html,
}

/// One outbound reply.
///
/// Middleware may rewrite a response on the way back out (the cache stage
/// prepends its hit marker, for instance).
///
/// # Example
///
/// ```
/// use courier_core::{FormatHint, Response};
///
/// let response = Response::markdown("*bold*").without_link_preview();
/// assert_eq!(response.format, FormatHint::Markdown);
/// assert!(response.disable_link_preview);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Reply text.
    pub text: String,
    /// Rendering hint.
    #[serde(default)]
    pub format: FormatHint,
    /// Suppress link previews for URLs in the text.
    #[serde(default)]
    pub disable_link_preview: bool,
}

impl Response {
    /// Creates a response with an explicit format.
    #[must_use]
    pub fn new(text: impl Into<String>, format: FormatHint) -> Self {
        Self {
            text: text.into(),
            format,
            disable_link_preview: false,
        }
    }

    /// Creates a plain-text response.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, FormatHint::Plain)
    }

    /// Creates a Markdown response.
    #[must_use]
    pub fn markdown(text: impl Into<String>) -> Self {
        Self::new(text, FormatHint::Markdown)
    }

    /// Creates an HTML response.
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::new(text, FormatHint::Html)
    }

    /// Disables link previews.
    #[must_use]
    pub fn without_link_preview(mut self) -> Self {
        self.disable_link_preview = true;
        self
    }

    /// Prepends `prefix` to the text.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.text.insert_str(0, prefix);
        self
    }

    /// Returns true if there is anything to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Response::plain("a").format, FormatHint::Plain);
        assert_eq!(Response::html("a").format, FormatHint::Html);
        assert!(!Response::plain("a").disable_link_preview);
    }

    #[test]
    fn test_with_prefix() {
        let response = Response::plain("T=20").with_prefix("(cached) ");
        assert_eq!(response.text, "(cached) T=20");
    }

    #[test]
    fn test_is_empty() {
        assert!(Response::plain("  ").is_empty());
        assert!(!Response::plain("ok").is_empty());
    }

    #[test]
    fn test_deserialize_defaults() {
        let response: Response = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(response.format, FormatHint::Plain);
        assert!(!response.disable_link_preview);
    }
}
