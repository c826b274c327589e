//! User-facing reply texts.
//!
//! Each text is owned by the layer that produces the matching error kind.

/// Sent when no handler claims the command token.
pub const UNKNOWN_COMMAND: &str = "Sorry, I don't know that command. Send /help to see what I can do.";

/// Sent when a handler fails or the deadline expires.
pub const GENERIC_FAILURE: &str = "Something went wrong while processing your request. Please try again later.";

/// Sent when the user could not be registered.
pub const REGISTRATION_FAILED: &str = "I couldn't set up your account right now. Please try again in a moment.";

/// Sent when the command text is too long.
pub const TOO_LONG: &str = "Your message is too long. Please shorten it and try again.";

/// Builds the throttling reply.
#[must_use]
pub fn throttled(retry_after_secs: u64) -> String {
    format!("Too many requests. Please wait {retry_after_secs}s before trying again.")
}

/// Builds the usage reply for a command that failed validation.
#[must_use]
pub fn invalid_usage(description: &str, usage: &str) -> String {
    format!("Invalid command format.\n{description}\nUsage: {usage}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_mentions_wait() {
        assert!(throttled(12).contains("12s"));
    }

    #[test]
    fn test_invalid_usage_contains_parts() {
        let text = invalid_usage("Show a repository", "/repo owner/name");
        assert!(text.contains("Show a repository"));
        assert!(text.contains("/repo owner/name"));
    }
}
