//! Keyword extraction for tool records and task strings.

use crate::config::MnemoConfig;

/// Verb prefixes stripped from identifier tokens: `create_checkout` and
/// `get_checkout` should both surface the `checkout` capability.
const VERB_PREFIXES: &[&str] = &["get", "set", "list", "create", "delete", "update"];

/// Splits an identifier on case transitions, underscores, and hyphens,
/// returning lower-cased parts.
#[must_use]
pub fn split_identifier(identifier: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in identifier.chars() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current.push(c.to_ascii_lowercase());
        } else {
            current.push(c.to_ascii_lowercase());
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Lower-cases and strips non-alphanumeric edges from one raw token.
fn clean_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Derives the deduplicated, lower-cased keyword set for a tool record.
///
/// Sources, in order: the identifier (split, verb prefixes stripped), the
/// description (tokenized, stop words removed, tokens of 4+ chars kept,
/// plus any configured phrase found verbatim), and parameter names (same
/// splitting as the identifier).
#[must_use]
pub fn extract_tool_keywords(
    config: &MnemoConfig,
    name: &str,
    description: &str,
    parameters: &[String],
) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |word: String| {
        if !word.is_empty() && !keywords.contains(&word) {
            keywords.push(word);
        }
    };

    for part in split_identifier(name) {
        if part.len() < 3 || VERB_PREFIXES.contains(&part.as_str()) || config.is_stop_word(&part) {
            continue;
        }
        push(part);
    }

    let description_lower = description.to_lowercase();
    for token in description_lower.split_whitespace() {
        let cleaned = clean_token(token);
        if cleaned.len() < 4 || config.is_stop_word(&cleaned) {
            continue;
        }
        push(cleaned);
    }
    for phrase in &config.phrases {
        if description_lower.contains(phrase.as_str()) {
            push(phrase.clone());
        }
    }

    for parameter in parameters {
        for part in split_identifier(parameter) {
            if part.len() < 3 || VERB_PREFIXES.contains(&part.as_str()) || config.is_stop_word(&part)
            {
                continue;
            }
            push(part);
        }
    }

    keywords
}

/// Extracts keywords from a free-form task string: tokenized, stop words
/// dropped, tokens of 3+ chars kept, deduplicated in order of appearance.
#[must_use]
pub fn extract_task_keywords(config: &MnemoConfig, task: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for token in task.split_whitespace() {
        let cleaned = clean_token(token);
        if cleaned.len() < 3 || config.is_stop_word(&cleaned) {
            continue;
        }
        if !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("create_checkout_session", &["create", "checkout", "session"]; "snake case")]
    #[test_case("createCheckoutSession", &["create", "checkout", "session"]; "camel case")]
    #[test_case("send-sms", &["send", "sms"]; "kebab case")]
    #[test_case("HTMLParser", &["h", "t", "m", "l", "parser"]; "consecutive capitals split eagerly")]
    fn test_split_identifier(input: &str, expected: &[&str]) {
        assert_eq!(split_identifier(input), expected);
    }

    #[test]
    fn test_tool_keywords_strip_verb_prefixes() {
        let config = MnemoConfig::default();
        let keywords = extract_tool_keywords(&config, "create_payment_link", "", &[]);
        assert_eq!(keywords, vec!["payment", "link"]);
    }

    #[test]
    fn test_tool_keywords_from_description() {
        let config = MnemoConfig::default();
        let keywords = extract_tool_keywords(
            &config,
            "send_sms",
            "Send a text message to a phone number.",
            &[],
        );
        // "sms" comes from the identifier; description tokens need 4+ chars
        // so "text" and "message" survive while "a"/"to" do not.
        assert!(keywords.contains(&"sms".to_string()));
        assert!(keywords.contains(&"text".to_string()));
        assert!(keywords.contains(&"message".to_string()));
        // The configured phrase allow-list fires on the full description.
        assert!(keywords.contains(&"phone number".to_string()));
    }

    #[test]
    fn test_tool_keywords_include_parameter_names() {
        let config = MnemoConfig::default();
        let keywords = extract_tool_keywords(
            &config,
            "charge",
            "",
            &["customerId".to_string(), "amount_cents".to_string()],
        );
        assert!(keywords.contains(&"customer".to_string()));
        assert!(keywords.contains(&"amount".to_string()));
        assert!(keywords.contains(&"cents".to_string()));
    }

    #[test]
    fn test_tool_keywords_deduplicate() {
        let config = MnemoConfig::default();
        let keywords = extract_tool_keywords(
            &config,
            "checkout",
            "Checkout checkout CHECKOUT",
            &["checkout".to_string()],
        );
        assert_eq!(keywords, vec!["checkout"]);
    }

    #[test]
    fn test_task_keywords() {
        let config = MnemoConfig::default();
        let keywords = extract_task_keywords(&config, "create a stripe checkout for the store");
        assert_eq!(keywords, vec!["create", "stripe", "checkout", "store"]);
    }

    #[test]
    fn test_task_keywords_length_floor_is_three() {
        let config = MnemoConfig::default();
        let keywords = extract_task_keywords(&config, "fix ci on my vm");
        assert_eq!(keywords, vec!["fix"]);
    }
}
