//! Welcome messages for new members.

/// Renders the welcome template for a member.
#[must_use]
pub fn render(template: &str, user: &str) -> String {
    template.replace("{user}", user)
}

/// Returns true if `name` is the configured welcome channel.
#[must_use]
pub fn is_welcome_channel(name: &str, configured: &str) -> bool {
    name.eq_ignore_ascii_case(configured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_user() {
        assert_eq!(render("Hello, {user}! Hi {user}.", "ada"), "Hello, ada! Hi ada.");
        assert_eq!(render("Welcome!", "ada"), "Welcome!");
    }

    #[test]
    fn channel_match_ignores_case() {
        assert!(is_welcome_channel("General", "general"));
        assert!(!is_welcome_channel("general-chat", "general"));
    }
}
