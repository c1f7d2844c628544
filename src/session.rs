//! Fetch orchestration: token, parallel open/closed fetch, cache and fallback.

use crate::cache::PrCache;
use crate::error::FetchError;
use crate::gh::{PrState, PullRequest, PullSource};
use crate::token::TokenProvider;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh data from GitHub, now cached
    Fetched { count: usize },
    /// Served from a valid cache without touching the network
    Cached { count: usize },
    /// Network failed; a valid cached snapshot was substituted
    Fallback { count: usize, error: String },
    /// Network failed and there was nothing to fall back to
    Failed { message: String },
}

impl RefreshOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Fetched { count } => format!("Fetched {} pull requests", count),
            Self::Cached { count } => format!("Using {} cached pull requests", count),
            // Fallback reads the same as a cache hit on screen
            Self::Fallback { count, .. } => format!("Using {} cached pull requests", count),
            Self::Failed { message } => message.clone(),
        }
    }
}

/// Owns the in-memory collection and the held token.
///
/// After the first successful network fetch, refreshes prefer a valid
/// cache entry and only go back to GitHub once it is empty or expired.
pub struct PrSession {
    source: Box<dyn PullSource>,
    tokens: Box<dyn TokenProvider>,
    cache: PrCache,
    token: Option<String>,
    prs: Vec<PullRequest>,
    initial_fetch_done: bool,
}

impl PrSession {
    pub fn new(
        source: Box<dyn PullSource>,
        tokens: Box<dyn TokenProvider>,
        cache: PrCache,
    ) -> Self {
        Self {
            source,
            tokens,
            cache,
            token: None,
            prs: Vec::new(),
            initial_fetch_done: false,
        }
    }

    pub fn prs(&self) -> &[PullRequest] {
        &self.prs
    }

    pub fn cache(&self) -> &PrCache {
        &self.cache
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `force` skips the cache-first shortcut and always hits the network.
    pub fn refresh(&mut self, now: DateTime<Utc>, force: bool) -> RefreshOutcome {
        if self.initial_fetch_done && !force {
            if let Some(entry) = self.cache.load_valid(now) {
                info!(count = entry.prs.len(), "Using cached pull requests");
                let count = entry.prs.len();
                self.prs = entry.prs;
                return RefreshOutcome::Cached { count };
            }
        }

        self.ensure_token();

        match self.fetch_remote() {
            Ok(prs) => {
                if let Err(err) = self.cache.store(&prs, now) {
                    warn!(error = %err, "Failed to write pull request cache");
                }
                let count = prs.len();
                info!(count, "Fetched pull requests from GitHub");
                self.prs = prs;
                self.initial_fetch_done = true;
                RefreshOutcome::Fetched { count }
            }
            Err(err) => {
                warn!(error = %err, "Error fetching pull requests");
                match self.cache.load_valid(now) {
                    Some(entry) => {
                        info!(count = entry.prs.len(), "Using cached data as fallback");
                        let count = entry.prs.len();
                        self.prs = entry.prs;
                        RefreshOutcome::Fallback {
                            count,
                            error: err.to_string(),
                        }
                    }
                    None => RefreshOutcome::Failed {
                        message: format!(
                            "Error loading pull requests. Please try again later. ({})",
                            err
                        ),
                    },
                }
            }
        }
    }

    fn ensure_token(&mut self) {
        if self.token.is_some() {
            return;
        }
        match self.tokens.acquire() {
            Ok(token) => self.token = Some(token),
            Err(err) => {
                warn!(source = self.tokens.name(), error = %err, "Error fetching GitHub token; continuing unauthenticated")
            }
        }
    }

    fn fetch_remote(&self) -> Result<Vec<PullRequest>, FetchError> {
        let source = self.source.as_ref();
        let token = self.token.as_deref();

        let (open, closed) = rayon::join(
            || source.fetch_state(PrState::Open, token),
            || source.fetch_state(PrState::Closed, token),
        );

        let mut prs = open?;
        prs.extend(closed?);
        Ok(prs)
    }
}
