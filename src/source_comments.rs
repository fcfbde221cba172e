//! Comment searcher.
//!
//! GitLab has no project-wide note search, so comments are found in two
//! phases: list every issue of the project (unfiltered), then list the notes
//! of each issue and match their bodies. System notes ("changed the
//! description", label events) are skipped.
//!
//! The phases are exposed separately so the aggregator can run phase one for
//! all projects in one batch and phase two for all issues in another.
//! [`SourceSearcher::search`] runs both phases for a single project.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::client::{GitLabClient, RemoteResponse, RemoteResult, RequestSpec};
use crate::error::RemoteFailure;
use crate::excerpt::{contains_term, extract};
use crate::models::{CommentMatch, MatchResult, ProjectDescriptor, Source};
use crate::traits::SourceSearcher;

const UNKNOWN_AUTHOR: &str = "Unknown";

/// The parts of an issue a comment match points back to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueRef {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub web_url: String,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNote {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

pub struct CommentsSearcher {
    per_page: u32,
    window: usize,
    notes_concurrency: usize,
}

impl CommentsSearcher {
    pub fn new(per_page: u32, window: usize, notes_concurrency: usize) -> Self {
        Self {
            per_page,
            window,
            notes_concurrency,
        }
    }

    /// Pool size for the per-issue notes batch.
    pub fn notes_concurrency(&self) -> usize {
        self.notes_concurrency
    }

    /// Phase one: every issue of `project`, all states.
    pub fn issue_listing(&self, project: &ProjectDescriptor) -> RequestSpec {
        RequestSpec::get(format!("projects/{}/issues", project.id))
            .query("scope", "all")
            .query("per_page", self.per_page)
    }

    pub fn decode_issues(&self, response: RemoteResponse) -> Result<Vec<IssueRef>, RemoteFailure> {
        response.decode()
    }

    /// Phase two: the notes of one issue.
    pub fn notes_request(&self, project: &ProjectDescriptor, iid: u64) -> RequestSpec {
        RequestSpec::get(format!("projects/{}/issues/{}/notes", project.id, iid))
            .query("per_page", self.per_page)
    }

    /// Keep the user notes of `issue` whose body contains `search_term`.
    pub fn collect_notes(
        &self,
        issue: &IssueRef,
        search_term: &str,
        response: RemoteResponse,
    ) -> Result<Vec<MatchResult>, RemoteFailure> {
        let notes: Vec<RawNote> = response.decode()?;
        Ok(notes
            .into_iter()
            .filter(|note| !note.system)
            .filter_map(|note| {
                let body = note.body.as_deref().unwrap_or_default();
                if !contains_term(body, search_term) {
                    return None;
                }
                let author = note
                    .author
                    .and_then(|a| a.name)
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
                Some(MatchResult::Comment(CommentMatch {
                    id: note.id,
                    issue_iid: issue.iid,
                    issue_title: issue.title.clone(),
                    issue_url: issue.web_url.clone(),
                    author,
                    created_at: note.created_at,
                    excerpt: extract(body, search_term, self.window),
                    web_url: format!("{}#note_{}", issue.web_url, note.id),
                }))
            })
            .collect())
    }

    /// Fold the notes slots of `issues` (same order) into one match list.
    ///
    /// A failed notes call only drops its own issue.
    pub fn merge_notes(
        &self,
        project: &ProjectDescriptor,
        issues: &[IssueRef],
        slots: Vec<RemoteResult>,
        search_term: &str,
    ) -> Vec<MatchResult> {
        let mut matches = Vec::new();
        for (issue, slot) in issues.iter().zip(slots) {
            match slot.and_then(|response| self.collect_notes(issue, search_term, response)) {
                Ok(found) => matches.extend(found),
                Err(failure) => {
                    warn!(
                        project_id = project.id,
                        issue_iid = issue.iid,
                        %failure,
                        "Skipping issue whose notes could not be fetched"
                    );
                }
            }
        }
        matches
    }
}

#[async_trait]
impl SourceSearcher for CommentsSearcher {
    fn source(&self) -> Source {
        Source::Comments
    }

    fn description(&self) -> &str {
        "Non-system comments on issues"
    }

    async fn search(
        &self,
        client: &GitLabClient,
        project: &ProjectDescriptor,
        search_term: &str,
    ) -> Result<Vec<MatchResult>, RemoteFailure> {
        let listing = client.execute(&self.issue_listing(project)).await?;
        let issues = self.decode_issues(listing)?;

        let specs: Vec<RequestSpec> = issues
            .iter()
            .map(|issue| self.notes_request(project, issue.iid))
            .collect();
        let slots = client.execute_many(&specs, self.notes_concurrency).await;
        Ok(self.merge_notes(project, &issues, slots, search_term))
    }
}
