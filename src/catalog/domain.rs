//! Domain classification for tool records.

/// Classifies `text` against an ordered `(domain, triggers)` table.
///
/// Each domain scores one point per trigger found as a substring of the
/// lower-cased text. The strictly highest score wins; ties keep the earlier
/// table entry; zero hits everywhere classifies as `general`.
#[must_use]
pub fn classify(domain_table: &[(String, Vec<String>)], text: &str) -> String {
    let haystack = text.to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for (domain, triggers) in domain_table {
        let score = triggers
            .iter()
            .filter(|trigger| haystack.contains(trigger.as_str()))
            .count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((domain, score));
        }
    }

    best.map_or_else(|| "general".to_string(), |(domain, _)| domain.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_domain_table;
    use test_case::test_case;

    #[test_case("Create a Stripe checkout session", "payments"; "payments triggers")]
    #[test_case("Send an SMS via Twilio", "communication"; "communication triggers")]
    #[test_case("Export rows to a CSV spreadsheet", "data"; "data triggers")]
    #[test_case("Reticulate splines", "general"; "no trigger hits")]
    fn test_classify(text: &str, expected: &str) {
        assert_eq!(classify(&default_domain_table(), text), expected);
    }

    #[test]
    fn test_highest_hit_count_wins() {
        let table = vec![
            ("alpha".to_string(), vec!["red".to_string(), "blue".to_string()]),
            ("beta".to_string(), vec!["blue".to_string(), "green".to_string(), "teal".to_string()]),
        ];
        assert_eq!(classify(&table, "blue green teal"), "beta");
    }

    #[test]
    fn test_tie_keeps_earlier_entry() {
        let table = vec![
            ("alpha".to_string(), vec!["red".to_string()]),
            ("beta".to_string(), vec!["blue".to_string()]),
        ];
        assert_eq!(classify(&table, "red and blue"), "alpha");
    }
}
