//! Session boundary detection and expansion for dated activity logs.
//!
//! Sessions are contiguous line ranges bounded by `## ` heading lines. They
//! are computed at query time from current file content and never stored.

use crate::config::MnemoConfig;
use crate::models::{Session, SessionHit};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// A session delimiter: a top-level `## ` heading.
static SESSION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^##\s+(.+?)\s*$").expect("valid session header pattern"));

/// A subsection heading inside a session.
static SUBSECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^###\s+(.+?)\s*$").expect("valid subsection pattern"));

/// Expands raw chunk hits inside dated logs into their enclosing sessions.
pub struct SessionExpander<'a> {
    config: &'a MnemoConfig,
}

impl<'a> SessionExpander<'a> {
    /// Creates an expander with the given configuration.
    #[must_use]
    pub const fn new(config: &'a MnemoConfig) -> Self {
        Self { config }
    }

    /// Returns true if `file` is classified as a dated activity log: its
    /// file stem starts with a real `YYYY-MM-DD` date.
    #[must_use]
    pub fn is_dated_log(file: &str) -> bool {
        let Some(stem) = Path::new(file).file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        let Some(prefix) = stem.get(..10) else {
            return false;
        };
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok()
    }

    /// Finds all session delimiters as `(1-based line, session name)` pairs.
    #[must_use]
    pub fn delimiters(content: &str) -> Vec<(usize, String)> {
        content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                SESSION_HEADER
                    .captures(line)
                    .map(|caps| (i + 1, caps[1].to_string()))
            })
            .collect()
    }

    /// Expands the chunk hit starting at `hit_line` into its enclosing
    /// session.
    ///
    /// The span runs from the last delimiter at or before `hit_line` to the
    /// line before the next delimiter (or end of file). A file with zero
    /// delimiters expands to its entire content; a hit above the first
    /// delimiter expands to the preamble. Both of those take the file stem
    /// as the session name. With `summary`, only the configured high-value
    /// subsections are kept.
    #[must_use]
    pub fn expand(&self, file: &str, content: &str, hit_line: usize, summary: bool) -> Session {
        let lines: Vec<&str> = content.lines().collect();
        let delimiters = Self::delimiters(content);

        let stem_name = || {
            Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file)
                .to_string()
        };

        let (name, line_start, line_end) = match delimiters
            .iter()
            .rev()
            .find(|(line, _)| *line <= hit_line)
        {
            Some((start, session_name)) => {
                let end = delimiters
                    .iter()
                    .find(|(line, _)| line > start)
                    .map_or(lines.len(), |(next, _)| next - 1);
                (session_name.clone(), *start, end)
            },
            // No delimiter at or before the hit: whole file when there are
            // none at all, otherwise the preamble above the first one.
            None => {
                let end = delimiters
                    .first()
                    .map_or(lines.len(), |(first, _)| first.saturating_sub(1));
                (stem_name(), 1, end.max(1))
            },
        };

        let span = &lines[line_start - 1..line_end.min(lines.len())];
        let text = if summary {
            self.summarize(span)
        } else {
            span.join("\n")
        };

        Session {
            file: file.to_string(),
            name,
            line_start,
            line_end,
            content: text,
        }
    }

    /// Condenses a session span to its high-value subsections.
    ///
    /// Keeps the session heading plus each `### ` subsection whose title
    /// contains a configured summary keyword, up to the next subsection or
    /// end of session.
    fn summarize(&self, span: &[&str]) -> String {
        let mut kept: Vec<&str> = Vec::new();
        let mut keeping = false;

        for (i, line) in span.iter().enumerate() {
            if i == 0 && SESSION_HEADER.is_match(line) {
                kept.push(*line);
                continue;
            }

            if let Some(caps) = SUBSECTION_HEADER.captures(line) {
                let title = caps[1].to_lowercase();
                keeping = self
                    .config
                    .summary_sections
                    .iter()
                    .any(|section| title.contains(section.as_str()));
            }

            if keeping {
                kept.push(*line);
            }
        }

        kept.join("\n")
    }

    /// Drops later hits that resolve to an already-seen `(file, session)`
    /// pair, preserving the relative order of survivors.
    ///
    /// Input order is ranking order, so the kept occurrence is always the
    /// best-ranked one.
    #[must_use]
    pub fn dedupe(hits: Vec<SessionHit>) -> Vec<SessionHit> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        hits.into_iter()
            .filter(|hit| seen.insert((hit.session.file.clone(), hit.session.name.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const LOG: &str = "\
preamble line
## 09:00 standup
discussed webhook retries
decided on backoff
### Decisions
use exponential backoff
### Notes
misc chatter
## 14:30 pairing
debugged the indexer
### Insights
hash gate was inverted
";

    fn config() -> MnemoConfig {
        MnemoConfig::default()
    }

    #[test_case("2026-08-01.md", true; "plain dated log")]
    #[test_case("logs/2026-08-01-standup.md", true; "dated with suffix in subdir")]
    #[test_case("notes.md", false; "undated note")]
    #[test_case("2026-13-99.md", false; "invalid date")]
    #[test_case("20.md", false; "too short")]
    fn test_is_dated_log(file: &str, expected: bool) {
        assert_eq!(SessionExpander::is_dated_log(file), expected);
    }

    #[test]
    fn test_delimiters_ignore_subsections() {
        let delimiters = SessionExpander::delimiters(LOG);
        assert_eq!(
            delimiters,
            vec![(2, "09:00 standup".to_string()), (9, "14:30 pairing".to_string())]
        );
    }

    #[test_case(3, "09:00 standup", 2, 8; "hit inside first session")]
    #[test_case(2, "09:00 standup", 2, 8; "hit on the delimiter itself")]
    #[test_case(10, "14:30 pairing", 9, 12; "hit in last session runs to EOF")]
    fn test_expand_spans(hit_line: usize, name: &str, start: usize, end: usize) {
        let config = config();
        let expander = SessionExpander::new(&config);
        let session = expander.expand("2026-08-01.md", LOG, hit_line, false);
        assert_eq!(session.name, name);
        assert_eq!(session.line_start, start);
        assert_eq!(session.line_end, end);
    }

    #[test]
    fn test_expand_preamble_hit() {
        let config = config();
        let expander = SessionExpander::new(&config);
        let session = expander.expand("2026-08-01.md", LOG, 1, false);
        assert_eq!(session.name, "2026-08-01");
        assert_eq!((session.line_start, session.line_end), (1, 1));
        assert_eq!(session.content, "preamble line");
    }

    #[test]
    fn test_expand_file_without_delimiters() {
        let config = config();
        let expander = SessionExpander::new(&config);
        let content = "just notes\nno headings";
        let session = expander.expand("2026-08-02.md", content, 2, false);
        assert_eq!(session.name, "2026-08-02");
        assert_eq!((session.line_start, session.line_end), (1, 2));
        assert_eq!(session.content, content);
    }

    #[test]
    fn test_summary_keeps_high_value_subsections() {
        let config = config();
        let expander = SessionExpander::new(&config);
        let session = expander.expand("2026-08-01.md", LOG, 3, true);
        assert!(session.content.contains("## 09:00 standup"));
        assert!(session.content.contains("### Decisions"));
        assert!(session.content.contains("use exponential backoff"));
        // Non-summary subsection is dropped.
        assert!(!session.content.contains("misc chatter"));
        // Prose before the first subsection is dropped too.
        assert!(!session.content.contains("discussed webhook retries"));
    }

    #[test]
    fn test_dedupe_keeps_best_ranked_occurrence() {
        let make = |name: &str, score: f64| SessionHit {
            session: Session {
                file: "2026-08-01.md".to_string(),
                name: name.to_string(),
                line_start: 1,
                line_end: 2,
                content: String::new(),
            },
            score,
        };

        let hits = vec![
            make("standup", -2.0),
            make("pairing", -1.5),
            make("standup", -0.5),
            make("review", -0.4),
        ];
        let deduped = SessionExpander::dedupe(hits);
        let names: Vec<_> = deduped.iter().map(|h| h.session.name.as_str()).collect();
        assert_eq!(names, vec!["standup", "pairing", "review"]);
        assert!((deduped[0].score - -2.0).abs() < f64::EPSILON);
    }
}
