//! Validation middleware.
//!
//! Every command is sanitized before anything else looks at it:
//!
//! - whitespace control characters become spaces, other control characters
//!   are removed,
//! - `<script>`, `</script>` and `javascript:` are removed, case-insensitively,
//!   until none remain,
//! - whitespace runs collapse to a single space and the ends are trimmed.
//!
//! The sanitized text replaces `cmd.text` for all inner stages. Text still
//! longer than the configured limit is rejected.
//!
//! Commands whose token has a registered [`Validator`] must also satisfy it;
//! all other commands pass through.
//!
//! # Example
//!
//! ```
//! use courier_middleware::stages::{ValidationMiddleware, Validator};
//!
//! let validation = ValidationMiddleware::new(500).rule(
//!     "/repo",
//!     Validator::new(r"[\w.-]+/[\w.-]+")
//!         .unwrap()
//!         .with_tokens(1, 1)
//!         .with_description("Show a GitHub repository")
//!         .with_usage("/repo owner/name"),
//! );
//! assert!(validation.validator("/repo").is_some());
//! ```

use crate::chain::Stage;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Outcome;
use courier_core::{replies, Command, DispatchContext, DispatchError, Response};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Default maximum sanitized length in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 500;

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)</?script>|javascript:").expect("valid regex"))
}

/// Cleans untrusted command text.
///
/// # Example
///
/// ```
/// use courier_middleware::stages::sanitize;
///
/// assert_eq!(sanitize("  /echo\t<SCRIPT>hi</script>\n there "), "/echo hi there");
/// ```
pub fn sanitize(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect();

    // Removal can splice a new match together ("<scr<script>ipt>").
    while script_pattern().is_match(&cleaned) {
        cleaned = script_pattern().replace_all(&cleaned, "").into_owned();
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Argument rules for one command.
///
/// The pattern is matched, anchored at both ends, against the arguments
/// after the command token, joined by single spaces. The token count bounds
/// apply to the same arguments.
#[derive(Debug, Clone)]
pub struct Validator {
    pattern: Regex,
    min_tokens: usize,
    max_tokens: usize,
    description: String,
    usage: String,
}

impl Validator {
    /// Creates a validator from an unanchored pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
            min_tokens: 0,
            max_tokens: usize::MAX,
            description: String::new(),
            usage: String::new(),
        })
    }

    /// Bounds the number of arguments.
    #[must_use]
    pub fn with_tokens(mut self, min: usize, max: usize) -> Self {
        self.min_tokens = min;
        self.max_tokens = max;
        self
    }

    /// Sets the description shown on rejection.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the usage hint shown on rejection.
    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Returns the usage hint.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true if `cmd`'s arguments satisfy this validator.
    pub fn accepts(&self, cmd: &Command) -> bool {
        let args: Vec<&str> = cmd.args().collect();
        (self.min_tokens..=self.max_tokens).contains(&args.len())
            && self.pattern.is_match(&args.join(" "))
    }
}

/// Sanitizing and per-command argument checks.
#[derive(Debug, Clone)]
pub struct ValidationMiddleware {
    rules: HashMap<String, Validator>,
    max_length: usize,
}

impl ValidationMiddleware {
    /// Creates a validation middleware with no per-command rules.
    pub fn new(max_length: usize) -> Self {
        Self {
            rules: HashMap::new(),
            max_length,
        }
    }

    /// Creates a validation middleware with rules for `/repo`, `/user` and
    /// `/weather`.
    pub fn with_default_rules(max_length: usize) -> Self {
        let repo = Validator::new(r"[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+")
            .expect("valid regex")
            .with_tokens(1, 1)
            .with_description("Show information about a GitHub repository.")
            .with_usage("/repo owner/name");
        let user = Validator::new(r"[A-Za-z0-9](?:[A-Za-z0-9-]{0,38})")
            .expect("valid regex")
            .with_tokens(1, 1)
            .with_description("Show a GitHub user profile.")
            .with_usage("/user <github-login>");
        let weather = Validator::new(r"[\p{L}\p{M}][\p{L}\p{M} .'-]{0,84}")
            .expect("valid regex")
            .with_tokens(1, 5)
            .with_description("Show the current weather for a city.")
            .with_usage("/weather <city>");

        Self::new(max_length)
            .rule("/repo", repo)
            .rule("/user", user)
            .rule("/weather", weather)
    }

    /// Adds or replaces the rule for `prefix`.
    #[must_use]
    pub fn rule(mut self, prefix: impl Into<String>, validator: Validator) -> Self {
        self.rules.insert(prefix.into(), validator);
        self
    }

    /// Returns the rule for `prefix`.
    pub fn validator(&self, prefix: &str) -> Option<&Validator> {
        self.rules.get(prefix)
    }

    /// Returns the maximum sanitized length in bytes.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Sanitizes `cmd` in place and checks it.
    ///
    /// Returns the rejection outcome if the command must not proceed.
    pub fn check(&self, cmd: &mut Command) -> Result<(), Outcome> {
        cmd.text = sanitize(&cmd.text);

        if cmd.text.len() > self.max_length {
            return Err(Outcome::failed(
                Response::plain(replies::TOO_LONG),
                DispatchError::invalid_input(format!(
                    "text is {} bytes, limit is {}",
                    cmd.text.len(),
                    self.max_length
                )),
            ));
        }

        let Some(validator) = cmd.head().and_then(|head| self.rules.get(head)) else {
            return Ok(());
        };

        if validator.accepts(cmd) {
            Ok(())
        } else {
            Err(Outcome::failed(
                Response::plain(replies::invalid_usage(&validator.description, &validator.usage)),
                DispatchError::invalid_input(format!("arguments rejected for {}", validator.usage)),
            ))
        }
    }
}

impl Default for ValidationMiddleware {
    fn default() -> Self {
        Self::with_default_rules(DEFAULT_MAX_LENGTH)
    }
}

impl Middleware for ValidationMiddleware {
    fn name(&self) -> &'static str {
        Stage::Validation.name()
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut DispatchContext,
        mut cmd: Command,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match self.check(&mut cmd) {
                Ok(()) => next.run(ctx, cmd).await,
                Err(rejection) => {
                    tracing::debug!(
                        command_id = %cmd.id,
                        reason = ?rejection.error,
                        "command rejected by validation"
                    );
                    rejection
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ErrorKind;
    use courier_test::command;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_basics() {
        assert_eq!(sanitize("  /ping  "), "/ping");
        assert_eq!(sanitize("/a\u{0}\u{7}b"), "/ab");
        assert_eq!(sanitize("/a\r\n\tb"), "/a b");
        assert_eq!(sanitize("/go JavaScript:alert(1)"), "/go alert(1)");
        assert_eq!(sanitize("<scr<script>ipt>x"), "x");
        assert_eq!(sanitize("/weather   New    York"), "/weather New York");
    }

    #[test]
    fn test_too_long_rejected() {
        let validation = ValidationMiddleware::new(10);
        let mut cmd = command("/echo 0123456789", 1);
        let rejection = validation.check(&mut cmd).unwrap_err();
        assert_eq!(rejection.response.text, replies::TOO_LONG);
        assert_eq!(rejection.error_kind(), Some(ErrorKind::InvalidInput));
    }

    #[test]
    fn test_length_measured_after_sanitizing() {
        let validation = ValidationMiddleware::new(10);
        let mut cmd = command("/echo          <script>hi", 1);
        assert!(validation.check(&mut cmd).is_ok());
        assert_eq!(cmd.text, "/echo hi");
    }

    #[test]
    fn test_default_rules() {
        let validation = ValidationMiddleware::default();

        let mut ok = command("/repo rust-lang/rust", 1);
        assert!(validation.check(&mut ok).is_ok());

        let mut bad = command("/repo invalidformat", 1);
        let rejection = validation.check(&mut bad).unwrap_err();
        assert!(rejection.response.text.contains("/repo owner/name"));
        assert!(!rejection.counts_as_failure());

        let mut city = command("/weather São Paulo", 1);
        assert!(validation.check(&mut city).is_ok());

        let mut missing = command("/weather", 1);
        assert!(validation.check(&mut missing).is_err());

        let mut login = command("/user -leading-dash", 1);
        assert!(validation.check(&mut login).is_err());
    }

    #[test]
    fn test_unknown_prefix_passes() {
        let validation = ValidationMiddleware::default();
        let mut cmd = command("/anything goes here", 1);
        assert!(validation.check(&mut cmd).is_ok());
    }

    #[test]
    fn test_mention_suffix_uses_same_rule() {
        let validation = ValidationMiddleware::default();
        let mut cmd = command("/repo@courier_bot nope", 1);
        assert!(validation.check(&mut cmd).is_err());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let validator = Validator::new("[0-9]+").unwrap();
        assert!(validator.accepts(&command("/n 42", 1)));
        assert!(!validator.accepts(&command("/n 42x", 1)));
        assert!(!validator.accepts(&command("/n x42", 1)));
    }

    proptest! {
        #[test]
        fn prop_sanitize_output_is_clean(input in any::<String>()) {
            let out = sanitize(&input);
            prop_assert!(!out.chars().any(char::is_control));
            prop_assert!(!out.contains("  "));
            prop_assert_eq!(out.trim(), out.as_str());
            prop_assert!(!script_pattern().is_match(&out));
        }

        #[test]
        fn prop_sanitize_is_idempotent(input in "[ a-zA-Z<>/:\t\n]{0,64}") {
            let once = sanitize(&input);
            prop_assert_eq!(sanitize(&once), once.clone());
        }
    }
}
