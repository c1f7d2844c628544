//! State filter and search over the in-memory pull request collection.
//!
//! Filtering never mutates the collection and preserves its order; the
//! result borrows from the slice it was given.

use crate::gh::{PrState, PullRequest};
use std::fmt;
use std::str::FromStr;

/// Four-way view selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    #[default]
    All,
    Open,
    Closed,
    Draft,
}

impl StateFilter {
    pub const ALL: [StateFilter; 4] = [Self::All, Self::Open, Self::Closed, Self::Draft];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Draft => "draft",
        }
    }

    /// Label shown on the filter button, e.g. `Filters: Open`
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Draft => "Draft",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Open,
            Self::Open => Self::Closed,
            Self::Closed => Self::Draft,
            Self::Draft => Self::All,
        }
    }

    fn keeps(self, pr: &PullRequest) -> bool {
        match self {
            Self::All => true,
            Self::Open => pr.state == PrState::Open,
            Self::Closed => pr.state == PrState::Closed,
            Self::Draft => pr.is_draft(),
        }
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Invalid filter '{}'. Expected one of: all, open, closed, draft",
                    wanted
                )
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub state: StateFilter,
    pub search: String,
}

impl FilterState {
    pub fn new(state: StateFilter, search: impl Into<String>) -> Self {
        Self {
            state,
            search: search.into(),
        }
    }
}

pub fn filter<'a>(prs: &'a [PullRequest], state: &FilterState) -> Vec<&'a PullRequest> {
    let term = state.search.to_lowercase();
    prs.iter()
        .filter(|pr| state.state.keeps(pr))
        .filter(|pr| term.is_empty() || matches_search(&term, pr))
        .collect()
}

/// `term` must already be lowercased.
fn matches_search(term: &str, pr: &PullRequest) -> bool {
    matches_text(term, pr) || matches_qualifiers(term, pr)
}

fn matches_text(term: &str, pr: &PullRequest) -> bool {
    let title = pr.title.as_deref().unwrap_or_default();
    let login = pr.login().unwrap_or_default();

    title.to_lowercase().contains(term)
        || login.to_lowercase().contains(term)
        || format!("#{}", pr.number).contains(term)
}

/// Every whitespace-separated term must match.
///
/// `key:value` terms are qualifiers (`is`, `author`, `label`); unknown keys
/// match anything. Bare words fall back to the title/author/number check.
pub fn matches_qualifiers(query: &str, pr: &PullRequest) -> bool {
    query.split_whitespace().all(|term| {
        let mut parts = term.split(':');
        let key = parts.next().unwrap_or_default();
        let Some(value) = parts.next() else {
            return matches_text(&term.to_lowercase(), pr);
        };

        match key {
            "is" => value == pr.state.as_str() || value == "pr",
            "author" => pr
                .login()
                .is_some_and(|login| login.to_lowercase() == value.to_lowercase()),
            "label" => pr
                .labels
                .iter()
                .any(|label| label.name.to_lowercase() == value.to_lowercase()),
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gh::tests::{drafted, pr, with_labels};
    use rstest::rstest;

    fn numbers(prs: &[&PullRequest]) -> Vec<u64> {
        prs.iter().map(|pr| pr.number).collect()
    }

    fn sample() -> Vec<PullRequest> {
        vec![
            pr(1, "Fix crash", "alice", PrState::Open),
            pr(2, "Update docs", "bob", PrState::Closed),
        ]
    }

    fn labelled() -> Vec<PullRequest> {
        vec![
            with_labels(pr(10, "Parser rewrite", "Octocat", PrState::Open), &["bug"]),
            with_labels(pr(11, "octocat docs", "carol", PrState::Open), &["Docs"]),
            with_labels(pr(12, "Old fix", "octocat", PrState::Closed), &["BUG"]),
            drafted(with_labels(
                pr(13, "WIP bugfix", "dave", PrState::Open),
                &["bugfix"],
            )),
            drafted(pr(14, "Closed draft", "erin", PrState::Closed)),
        ]
    }

    #[test]
    fn all_with_empty_search_is_identity() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::default());
        assert_eq!(numbers(&result), vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn draft_keeps_drafts_regardless_of_state() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(StateFilter::Draft, ""));
        assert_eq!(numbers(&result), vec![13, 14]);
    }

    #[rstest]
    #[case(StateFilter::Open, vec![10, 11, 13])]
    #[case(StateFilter::Closed, vec![12, 14])]
    fn state_filter_compares_state(#[case] state: StateFilter, #[case] expected: Vec<u64>) {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(state, ""));
        assert_eq!(numbers(&result), expected);
    }

    #[rstest]
    #[case::login_substring("alice", StateFilter::All, vec![1])]
    #[case::title_case_insensitive("UPDATE", StateFilter::All, vec![2])]
    #[case::number_with_hash("#2", StateFilter::All, vec![2])]
    #[case::closed_no_search("", StateFilter::Closed, vec![2])]
    #[case::search_within_state("alice", StateFilter::Closed, vec![])]
    fn scenario_searches(
        #[case] search: &str,
        #[case] state: StateFilter,
        #[case] expected: Vec<u64>,
    ) {
        let prs = sample();
        let result = filter(&prs, &FilterState::new(state, search));
        assert_eq!(numbers(&result), expected);
    }

    #[test]
    fn author_qualifier_ignores_title() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(StateFilter::All, "author:OctoCat"));
        // #11 mentions octocat in its title but is authored by carol
        assert_eq!(numbers(&result), vec![10, 12]);
    }

    #[test]
    fn is_and_label_qualifiers_must_both_match() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(StateFilter::All, "is:open label:bug"));
        assert_eq!(numbers(&result), vec![10]);
    }

    #[test]
    fn is_pr_matches_every_record() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(StateFilter::All, "is:pr"));
        assert_eq!(result.len(), prs.len());
    }

    #[test]
    fn unknown_qualifier_is_permissive() {
        let prs = sample();
        let result = filter(&prs, &FilterState::new(StateFilter::All, "milestone:v2"));
        assert_eq!(numbers(&result), vec![1, 2]);
    }

    #[test]
    fn bare_words_must_each_match_some_field() {
        let prs = sample();
        assert!(!matches_qualifiers("author", &prs[0]));
        assert!(filter(&prs, &FilterState::new(StateFilter::All, "label")).is_empty());
        // neither word is a substring of the whole query, but each hits #1
        assert_eq!(
            numbers(&filter(&prs, &FilterState::new(StateFilter::All, "crash alice"))),
            vec![1]
        );
    }

    #[test]
    fn qualifiers_combine_with_bare_words() {
        let prs = labelled();
        let result = filter(&prs, &FilterState::new(StateFilter::All, "label:bug old"));
        assert_eq!(numbers(&result), vec![12]);
    }

    #[test]
    fn missing_title_and_user_do_not_panic() {
        let mut broken = pr(5, "", "x", PrState::Open);
        broken.title = None;
        broken.user = None;
        let prs = vec![broken];

        assert!(filter(&prs, &FilterState::new(StateFilter::All, "author:x")).is_empty());
        assert_eq!(
            numbers(&filter(&prs, &FilterState::new(StateFilter::All, "#5"))),
            vec![5]
        );
    }

    #[test]
    fn filter_is_idempotent() {
        let prs = labelled();
        let state = FilterState::new(StateFilter::Open, "bug");
        let once: Vec<PullRequest> = filter(&prs, &state).into_iter().cloned().collect();
        let twice = filter(&once, &state);
        assert_eq!(numbers(&twice), once.iter().map(|pr| pr.number).collect::<Vec<_>>());
    }

    #[test]
    fn parses_and_cycles_filters() {
        assert_eq!("Draft".parse::<StateFilter>().unwrap(), StateFilter::Draft);
        assert!("merged".parse::<StateFilter>().is_err());
        let mut state = StateFilter::All;
        for _ in 0..StateFilter::ALL.len() {
            state = state.next();
        }
        assert_eq!(state, StateFilter::All);
    }
}
