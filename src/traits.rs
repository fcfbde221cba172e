//! Source searcher traits and registry.
//!
//! Every content source (issues, wiki pages, comments) implements
//! [`SourceSearcher`]: list raw items for one project, keep the ones that
//! contain the search term, and map them to [`MatchResult`]s.
//!
//! Sources that need exactly one listing request per project also implement
//! [`ListingSearcher`], which splits the work into a request description and
//! a pure filter step. The aggregator uses that split to put every project's
//! listing request into one shared pool.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             SearcherRegistry             │
//! │  ┌─────────┐ ┌─────────┐ ┌────────────┐  │
//! │  │ Issues  │ │  Wiki   │ │  Comments  │  │
//! │  │(listing)│ │(listing)│ │ (2-phase)  │  │
//! │  └─────────┘ └─────────┘ └────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        Aggregator → SearchResponse
//! ```

use async_trait::async_trait;

use crate::client::{GitLabClient, RemoteResponse, RequestSpec};
use crate::config::SearchConfig;
use crate::error::RemoteFailure;
use crate::models::{MatchResult, ProjectDescriptor, Source};
use crate::source_comments::CommentsSearcher;
use crate::source_issues::IssuesSearcher;
use crate::source_wiki::WikiSearcher;

/// Searches one content source of one project.
#[async_trait]
pub trait SourceSearcher: Send + Sync {
    /// The source this searcher covers.
    fn source(&self) -> Source;

    /// One-line description for CLI output.
    fn description(&self) -> &str;

    /// List, filter, and map the items of `project` that contain
    /// `search_term` (case-insensitive).
    ///
    /// A failed remote call is returned as the source's failure; it is the
    /// caller's job to turn it into a `SourceError`.
    async fn search(
        &self,
        client: &GitLabClient,
        project: &ProjectDescriptor,
        search_term: &str,
    ) -> Result<Vec<MatchResult>, RemoteFailure>;
}

/// A searcher whose raw items come from a single listing request.
pub trait ListingSearcher: SourceSearcher {
    /// The request that lists the raw items of `project`.
    fn listing(&self, project: &ProjectDescriptor, search_term: &str) -> RequestSpec;

    /// Decode the listing, keep matching items, and map them.
    fn collect(
        &self,
        project: &ProjectDescriptor,
        search_term: &str,
        response: RemoteResponse,
    ) -> Result<Vec<MatchResult>, RemoteFailure>;
}

/// [`SourceSearcher::search`] for listing searchers: one request, then
/// [`ListingSearcher::collect`].
pub async fn search_listing<S>(
    searcher: &S,
    client: &GitLabClient,
    project: &ProjectDescriptor,
    search_term: &str,
) -> Result<Vec<MatchResult>, RemoteFailure>
where
    S: ListingSearcher + ?Sized,
{
    let response = client
        .execute(&searcher.listing(project, search_term))
        .await?;
    searcher.collect(project, search_term, response)
}

/// The set of searchers available for a request.
pub struct SearcherRegistry {
    issues: IssuesSearcher,
    wiki: WikiSearcher,
    comments: CommentsSearcher,
}

impl SearcherRegistry {
    /// Build all searchers from `[search]` settings.
    ///
    /// `base_url` is the GitLab instance URL, used when a wiki link has to
    /// be assembled without a project web URL.
    pub fn new(settings: &SearchConfig, base_url: &str) -> Self {
        Self {
            issues: IssuesSearcher::new(settings.issues_per_page, settings.excerpt_window),
            wiki: WikiSearcher::new(base_url, settings.excerpt_window),
            comments: CommentsSearcher::new(
                settings.issues_per_page,
                settings.excerpt_window,
                settings.notes_concurrency,
            ),
        }
    }

    /// The searcher for `source`.
    pub fn get(&self, source: Source) -> &dyn SourceSearcher {
        match source {
            Source::Issues => &self.issues,
            Source::Wiki => &self.wiki,
            Source::Comments => &self.comments,
        }
    }

    /// The searcher for `source`, if it is a single-listing searcher.
    pub fn listing(&self, source: Source) -> Option<&dyn ListingSearcher> {
        match source {
            Source::Issues => Some(&self.issues),
            Source::Wiki => Some(&self.wiki),
            Source::Comments => None,
        }
    }

    pub fn comments(&self) -> &CommentsSearcher {
        &self.comments
    }
}
