//! Projection of a filtered pull request set onto display rows.
//!
//! Nothing here knows about the terminal; `tui` and the `list` subcommand
//! both draw from the same descriptors.

use crate::gh::{PrState, PullRequest};

/// One display row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRow {
    pub number: u64,
    pub title: String,
    /// `#<number> opened by <login>`
    pub meta: String,
    pub state: PrState,
    pub draft: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub open: usize,
    pub closed: usize,
}

impl Counts {
    pub fn of(prs: &[&PullRequest]) -> Self {
        prs.iter().fold(Self::default(), |mut counts, pr| {
            match pr.state {
                PrState::Open => counts.open += 1,
                PrState::Closed => counts.closed += 1,
            }
            counts
        })
    }
}

/// Rows for every well-formed record; records without a title or author are skipped.
pub fn project(prs: &[&PullRequest]) -> Vec<PrRow> {
    prs.iter().filter_map(|pr| row(pr)).collect()
}

fn row(pr: &PullRequest) -> Option<PrRow> {
    let title = pr.title.as_deref().filter(|t| !t.is_empty())?;
    let login = pr.login()?;

    Some(PrRow {
        number: pr.number,
        title: title.to_string(),
        meta: format!("#{} opened by {}", pr.number, login),
        state: pr.state,
        draft: pr.is_draft(),
    })
}
