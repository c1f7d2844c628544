use crate::error::FetchError;
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

pub const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

impl PrState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A pull request as returned by `GET /repos/{owner}/{repo}/pulls`.
///
/// Only the fields the dashboard reads are typed; everything else is kept
/// in `extra` so cached snapshots round-trip the original payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    pub state: PrState,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PullRequest {
    pub fn login(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn is_draft(&self) -> bool {
        self.draft.unwrap_or(false)
    }

    pub fn html_url(&self) -> Option<&str> {
        self.extra.get("html_url").and_then(Value::as_str)
    }
}

/// Anything that can list the pull requests of one state.
pub trait PullSource: Send + Sync {
    fn fetch_state(
        &self,
        state: PrState,
        token: Option<&str>,
    ) -> Result<Vec<PullRequest>, FetchError>;
}

/// Blocking client for the GitHub REST API, bound to one repository
pub struct GitHubApi {
    client: Client,
    pulls_url: String,
}

impl GitHubApi {
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base = url::Url::parse(api_base)
            .map_err(|e| FetchError::Setup(format!("invalid API base {api_base:?}: {e}")))?;
        let pulls_url = format!(
            "{}/repos/{}/{}/pulls",
            base.as_str().trim_end_matches('/'),
            owner,
            repo
        );

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Setup(e.to_string()))?;

        Ok(Self { client, pulls_url })
    }

    pub fn pulls_url(&self) -> &str {
        &self.pulls_url
    }
}

impl PullSource for GitHubApi {
    fn fetch_state(
        &self,
        state: PrState,
        token: Option<&str>,
    ) -> Result<Vec<PullRequest>, FetchError> {
        debug!(url = %self.pulls_url, %state, authenticated = token.is_some(), "Fetching pull requests");

        let mut request = self
            .client
            .get(&self.pulls_url)
            .query(&[("state", state.as_str())])
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, concat!("prboard/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request
            .send()
            .map_err(|source| FetchError::Transport { state, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                state,
                status: status.as_u16(),
            });
        }

        let prs: Vec<PullRequest> = response
            .json()
            .map_err(|source| FetchError::Decode { state, source })?;
        debug!(%state, count = prs.len(), "Fetched pull requests");
        Ok(prs)
    }
}

/// Open a PR in the web browser through the gh cli
pub fn open_pr_in_browser(repo_slug: &str, number: u64) -> anyhow::Result<()> {
    let output = Command::new("gh")
        .args(["pr", "view", &number.to_string(), "--repo", repo_slug, "--web"])
        .output()
        .context("Failed to run gh cli")?;

    if !output.status.success() {
        anyhow::bail!(
            "Failed to open PR: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn pr(number: u64, title: &str, login: &str, state: PrState) -> PullRequest {
        PullRequest {
            number,
            title: Some(title.to_string()),
            user: Some(User {
                login: login.to_string(),
                extra: Map::new(),
            }),
            state,
            draft: Some(false),
            labels: Vec::new(),
            extra: Map::new(),
        }
    }

    pub(crate) fn with_labels(mut pr: PullRequest, labels: &[&str]) -> PullRequest {
        pr.labels = labels
            .iter()
            .map(|name| Label {
                name: name.to_string(),
                extra: Map::new(),
            })
            .collect();
        pr
    }

    pub(crate) fn drafted(mut pr: PullRequest) -> PullRequest {
        pr.draft = Some(true);
        pr
    }

    #[test]
    fn decodes_github_payload_and_keeps_unknown_fields() {
        let payload = json!([{
            "number": 42,
            "title": "Add search",
            "user": { "login": "octocat", "id": 1 },
            "state": "open",
            "draft": true,
            "labels": [{ "name": "bug", "color": "f00" }],
            "html_url": "https://github.com/o/r/pull/42"
        }]);

        let prs: Vec<PullRequest> = serde_json::from_value(payload.clone()).unwrap();
        assert_eq!(prs.len(), 1);
        let pr = &prs[0];
        assert_eq!(pr.number, 42);
        assert_eq!(pr.login(), Some("octocat"));
        assert!(pr.is_draft());
        assert_eq!(pr.labels[0].name, "bug");
        assert_eq!(pr.html_url(), Some("https://github.com/o/r/pull/42"));

        let back = serde_json::to_value(&prs).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn tolerates_missing_title_user_and_draft() {
        let prs: Vec<PullRequest> = serde_json::from_value(json!([
            { "number": 7, "title": null, "user": null, "state": "closed" }
        ]))
        .unwrap();

        assert_eq!(prs[0].title, None);
        assert_eq!(prs[0].login(), None);
        assert!(!prs[0].is_draft());
        assert!(prs[0].labels.is_empty());
    }

    #[test]
    fn pulls_url_joins_base_owner_and_repo() {
        let api = GitHubApi::new(
            "https://api.github.com/",
            "hans-zanecoder",
            "Github-API",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            api.pulls_url(),
            "https://api.github.com/repos/hans-zanecoder/Github-API/pulls"
        );
    }

    #[test]
    fn rejects_invalid_api_base() {
        let result = GitHubApi::new("not a url", "o", "r", Duration::from_secs(5));
        assert!(matches!(result, Err(FetchError::Setup(_))));
    }
}
