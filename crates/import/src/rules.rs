use serde::Serialize;
use tresor_core::{CategoryId, CategoryRule, RuleId};

/// Keywords must be longer than this to be worth learning.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Derives the keyword a manual categorization teaches: the first word of the
/// description, lower-cased, with surrounding punctuation removed. Short words
/// are poor discriminators and yield `None`.
pub fn derive_keyword(description: &str) -> Option<String> {
    let token = description.split_whitespace().next()?;
    let keyword = token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    (keyword.chars().count() > MIN_KEYWORD_LEN).then_some(keyword)
}

/// How a transaction ended up with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Explicit,
    Rule { rule_id: RuleId },
    Fallback,
    Uncategorized,
}

/// Internal pairing of a rule with its lower-cased keyword.
struct PreparedRule {
    rule: CategoryRule,
    needle: String,
}

/// Read-only keyword matcher over one snapshot of the rule store.
///
/// Rules are tried in the order given (the store returns them oldest first) and
/// the first whose keyword occurs in the description wins.
pub struct RuleMatcher {
    rules: Vec<PreparedRule>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|rule| {
                let needle = rule.keyword.trim().to_lowercase();
                (!needle.is_empty()).then_some(PreparedRule { rule, needle })
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find_match(&self, description: &str) -> Option<&CategoryRule> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|pr| text.contains(&pr.needle))
            .map(|pr| &pr.rule)
    }

    /// Match mode with the fallback applied: a matching rule, else `fallback`
    /// (the "Other" category), else nothing.
    pub fn categorize(
        &self,
        description: &str,
        fallback: Option<CategoryId>,
    ) -> (Option<CategoryId>, Resolution) {
        match self.find_match(description) {
            Some(rule) => (Some(rule.category_id), Resolution::Rule { rule_id: rule.id }),
            None => match fallback {
                Some(other) => (Some(other), Resolution::Fallback),
                None => (None, Resolution::Uncategorized),
            },
        }
    }
}
