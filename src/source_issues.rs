//! Issue searcher.
//!
//! Asks GitLab for issues matching the term (`search=`, all states), then
//! re-checks every returned issue client-side because the server-side
//! search also matches on fields we do not show and misses some substrings.
//! An issue is kept when its title or description contains the term.

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{GitLabClient, RemoteResponse, RequestSpec};
use crate::error::RemoteFailure;
use crate::excerpt::{contains_term, extract};
use crate::models::{IssueMatch, IssueState, Label, MatchResult, ProjectDescriptor, Source};
use crate::traits::{search_listing, ListingSearcher, SourceSearcher};

/// Issue payload as returned by `GET projects/:id/issues`.
#[derive(Debug, Clone, Deserialize)]
struct RawIssue {
    id: u64,
    iid: u64,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    labels: Vec<Label>,
}

impl RawIssue {
    fn issue_state(&self) -> IssueState {
        match self.state.as_deref() {
            Some("closed") => IssueState::Closed,
            _ => IssueState::Opened,
        }
    }
}

pub struct IssuesSearcher {
    per_page: u32,
    window: usize,
}

impl IssuesSearcher {
    pub fn new(per_page: u32, window: usize) -> Self {
        Self { per_page, window }
    }

    fn to_match(&self, issue: RawIssue, search_term: &str) -> MatchResult {
        let description = issue.description.as_deref().unwrap_or_default();
        MatchResult::Issue(IssueMatch {
            id: issue.id,
            iid: issue.iid,
            excerpt: extract(description, search_term, self.window),
            state: issue.issue_state(),
            title: issue.title,
            web_url: issue.web_url,
            labels: issue.labels,
        })
    }
}

fn issue_matches(issue: &RawIssue, search_term: &str) -> bool {
    contains_term(&issue.title, search_term)
        || issue
            .description
            .as_deref()
            .is_some_and(|d| contains_term(d, search_term))
}

#[async_trait]
impl SourceSearcher for IssuesSearcher {
    fn source(&self) -> Source {
        Source::Issues
    }

    fn description(&self) -> &str {
        "Issue titles and descriptions"
    }

    async fn search(
        &self,
        client: &GitLabClient,
        project: &ProjectDescriptor,
        search_term: &str,
    ) -> Result<Vec<MatchResult>, RemoteFailure> {
        search_listing(self, client, project, search_term).await
    }
}

impl ListingSearcher for IssuesSearcher {
    fn listing(&self, project: &ProjectDescriptor, search_term: &str) -> RequestSpec {
        RequestSpec::get(format!("projects/{}/issues", project.id))
            .query("search", search_term)
            .query("scope", "all")
            .query("per_page", self.per_page)
            .query("with_labels_details", "true")
    }

    fn collect(
        &self,
        _project: &ProjectDescriptor,
        search_term: &str,
        response: RemoteResponse,
    ) -> Result<Vec<MatchResult>, RemoteFailure> {
        let issues: Vec<RawIssue> = response.decode()?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue_matches(issue, search_term))
            .map(|issue| self.to_match(issue, search_term))
            .collect())
    }
}
