// ── Discovery filters ──
//
// Compiles the raw, delimiter-separated filter settings into the rule
// sets the crawler consults. Empty rule sets mean "no restriction".

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use emberlink_api::QualifiedPath;

/// Separator between entries of every raw filter list.
pub const DEFAULT_DELIMITER: char = ',';

/// Filter settings exactly as the user entered them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilters {
    /// Paths whose subtrees are auto-discovered, e.g. `"1.2,3"`.
    #[serde(default)]
    pub auto_parse_paths: Option<String>,
    /// Substrings matched against the accumulated label of a parameter.
    #[serde(default)]
    pub node_filters: Option<String>,
    /// Exact parameter identifiers.
    #[serde(default)]
    pub parameter_filters: Option<String>,
}

// ── AutoParseRule ────────────────────────────────────────────────────

/// A path prefix selecting which subtrees the crawler descends into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoParseRule {
    /// The rule path as configured, e.g. `"1.2"`.
    pub path: String,
    /// `path` split into its segments.
    pub elements: Vec<String>,
}

impl AutoParseRule {
    pub fn new(path: &str) -> Self {
        let path = path.trim().to_owned();
        let elements = path
            .split(['.', '/'])
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_owned)
            .collect();
        Self { path, elements }
    }

    /// Whether the crawler should descend into `child` when expanding a
    /// container at `depth`.
    ///
    /// Once the walk is at least as deep as the rule, the child must lie
    /// below the rule path. Above that depth the child must lie on the
    /// way to it. Comparison is per segment, so `1.2` does not match `1.20`.
    pub fn matches(&self, child: &QualifiedPath, depth: usize) -> bool {
        if depth >= self.elements.len() {
            segments_start_with(child.segments(), &self.elements)
        } else {
            elements_start_with(&self.elements, child.segments())
        }
    }
}

fn segments_start_with(segments: &[u32], prefix: &[String]) -> bool {
    prefix.len() <= segments.len()
        && prefix
            .iter()
            .zip(segments)
            .all(|(element, segment)| *element == segment.to_string())
}

fn elements_start_with(elements: &[String], prefix: &[u32]) -> bool {
    prefix.len() <= elements.len()
        && prefix
            .iter()
            .zip(elements)
            .all(|(segment, element)| *element == segment.to_string())
}

// ── FilterRules ──────────────────────────────────────────────────────

/// Compiled discovery filters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    pub auto_parse: Vec<AutoParseRule>,
    pub node_filters: IndexSet<String>,
    pub parameter_filters: IndexSet<String>,
}

impl FilterRules {
    /// Compile raw settings. Never fails: blank or missing lists simply
    /// produce empty rule sets.
    pub fn compile(raw: &RawFilters) -> Self {
        Self {
            auto_parse: split_list(raw.auto_parse_paths.as_deref())
                .iter()
                .map(|path| AutoParseRule::new(path))
                .filter(|rule| !rule.elements.is_empty())
                .collect(),
            node_filters: split_list(raw.node_filters.as_deref()),
            parameter_filters: split_list(raw.parameter_filters.as_deref()),
        }
    }

    /// True when no filter of any kind is configured.
    pub fn is_unrestricted(&self) -> bool {
        self.auto_parse.is_empty()
            && self.node_filters.is_empty()
            && self.parameter_filters.is_empty()
    }

    /// First auto-parse rule admitting `child` at `depth`.
    pub fn matching_rule(&self, child: &QualifiedPath, depth: usize) -> Option<&AutoParseRule> {
        self.auto_parse.iter().find(|rule| rule.matches(child, depth))
    }

    /// Whether the crawler descends into `child`. Without auto-parse
    /// rules every child is descended into.
    pub fn descends_into(&self, child: &QualifiedPath, depth: usize) -> bool {
        self.auto_parse.is_empty() || self.matching_rule(child, depth).is_some()
    }

    /// Leaf acceptance for a parameter with the given accumulated label
    /// and raw identifier.
    pub fn accepts_parameter(&self, label: &str, identifier: &str) -> bool {
        if !self.node_filters.is_empty() {
            let node_matched = self
                .node_filters
                .iter()
                .any(|filter| label.contains(filter.as_str()));
            return node_matched
                && (self.parameter_filters.is_empty()
                    || self.parameter_filters.contains(identifier));
        }
        self.parameter_filters.is_empty() || self.parameter_filters.contains(identifier)
    }
}

/// Split a delimited list, dropping blanks and repeated entries.
pub fn split_list(raw: Option<&str>) -> IndexSet<String> {
    raw.unwrap_or_default()
        .split(DEFAULT_DELIMITER)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(text: &str) -> QualifiedPath {
        text.parse().unwrap()
    }

    fn raw(auto: Option<&str>, nodes: Option<&str>, params: Option<&str>) -> RawFilters {
        RawFilters {
            auto_parse_paths: auto.map(str::to_owned),
            node_filters: nodes.map(str::to_owned),
            parameter_filters: params.map(str::to_owned),
        }
    }

    #[test]
    fn absent_input_compiles_to_no_restriction() {
        let rules = FilterRules::compile(&RawFilters::default());
        assert!(rules.is_unrestricted());
        assert!(rules.descends_into(&path("7.7.7"), 3));
        assert!(rules.accepts_parameter("Anything.Here", "Whatever"));
    }

    #[test]
    fn auto_parse_paths_split_into_elements() {
        let rules = FilterRules::compile(&raw(Some("1.2, 3"), None, None));
        assert_eq!(
            rules.auto_parse,
            vec![
                AutoParseRule {
                    path: "1.2".into(),
                    elements: vec!["1".into(), "2".into()],
                },
                AutoParseRule {
                    path: "3".into(),
                    elements: vec!["3".into()],
                },
            ]
        );
    }

    #[test]
    fn blank_and_duplicate_entries_are_dropped() {
        let set = split_list(Some("Audio,, Video ,Audio,"));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["Audio", "Video"]);
    }

    #[test]
    fn rule_matches_below_its_path_once_deep_enough() {
        let rule = AutoParseRule::new("1.2");
        assert!(rule.matches(&path("1.2.3"), 3));
    }

    #[test]
    fn rule_matches_ancestors_while_shallower() {
        let rule = AutoParseRule::new("1.2");
        assert!(rule.matches(&path("1"), 1));
    }

    #[test]
    fn rule_prunes_unrelated_siblings() {
        let rule = AutoParseRule::new("1.2");
        assert!(!rule.matches(&path("1.5"), 2));
    }

    #[test]
    fn rule_comparison_is_per_segment() {
        let rule = AutoParseRule::new("1.2");
        assert!(!rule.matches(&path("1.20"), 2));
        assert!(!rule.matches(&path("1.20.1"), 3));
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = FilterRules::compile(&raw(Some("4,1.2,1"), None, None));
        let rule = rules.matching_rule(&path("1"), 1).unwrap();
        assert_eq!(rule.path, "1.2");
        assert!(!rules.descends_into(&path("2"), 1));
    }

    #[test]
    fn node_filter_then_parameter_filter() {
        let rules = FilterRules::compile(&raw(None, Some("Audio"), Some("Gain")));
        assert!(rules.accepts_parameter("Audio.Ch1", "Gain"));
        assert!(!rules.accepts_parameter("Audio.Ch1", "Mute"));
        assert!(!rules.accepts_parameter("Video.Ch1", "Gain"));
    }

    #[test]
    fn node_filter_alone_is_substring_match() {
        let rules = FilterRules::compile(&raw(None, Some("Ch1"), None));
        assert!(rules.accepts_parameter("Audio.Ch1.Eq", "Mute"));
        assert!(!rules.accepts_parameter("Audio.Ch2", "Mute"));
    }

    #[test]
    fn parameter_filter_alone_is_exact_match() {
        let rules = FilterRules::compile(&raw(None, None, Some("Gain")));
        assert!(rules.accepts_parameter("Audio.Ch1", "Gain"));
        assert!(!rules.accepts_parameter("Audio.Ch1", "GainTrim"));
    }
}
