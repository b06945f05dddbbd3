use crate::infrastructure::provider::ProviderKind;

/// The provider a query goes to and the text it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub provider: ProviderKind,
    pub text: String,
}

impl Route {
    /// A directive counts only when followed by whitespace or the end of the
    /// query; anything else goes to `default` unchanged.
    pub fn parse(query: &str, default: ProviderKind) -> Self {
        let query = query.trim();
        for kind in ProviderKind::all() {
            if let Some(rest) = query.strip_prefix(kind.directive()) {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    return Self {
                        provider: *kind,
                        text: rest.trim().to_string(),
                    };
                }
            }
        }
        Self {
            provider: default,
            text: query.to_string(),
        }
    }
}

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_is_stripped() {
        let route = Route::parse("/openai   what time is it?", ProviderKind::Anthropic);
        assert_eq!(route.provider, ProviderKind::OpenAi);
        assert_eq!(route.text, "what time is it?");

        let route = Route::parse("/deepseek\thello", ProviderKind::Anthropic);
        assert_eq!(route.provider, ProviderKind::DeepSeek);
        assert_eq!(route.text, "hello");
    }

    #[test]
    fn unknown_or_glued_prefix_goes_to_default() {
        let route = Route::parse("/gemini hi", ProviderKind::Anthropic);
        assert_eq!(route.provider, ProviderKind::Anthropic);
        assert_eq!(route.text, "/gemini hi");

        let route = Route::parse("/openaix hi", ProviderKind::DeepSeek);
        assert_eq!(route.provider, ProviderKind::DeepSeek);
        assert_eq!(route.text, "/openaix hi");
    }

    #[test]
    fn bare_directive_has_empty_text() {
        let route = Route::parse("/anthropic", ProviderKind::OpenAi);
        assert_eq!(route.provider, ProviderKind::Anthropic);
        assert!(route.text.is_empty());
    }

    #[test]
    fn quit_is_case_insensitive() {
        assert!(is_quit_command("quit"));
        assert!(is_quit_command("  QUIT \n"));
        assert!(!is_quit_command("quit now"));
    }
}
