//! Core data types shared by the searchers, the aggregator, the CLI, and the
//! HTTP server.
//!
//! Everything here is transient: descriptors are resolved once per request,
//! and nothing is persisted between requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

/// A project the token can see, resolved from a caller-supplied id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    pub id: u64,
    pub name: String,
    /// Project page URL, e.g. `https://gitlab.example.com/group/app`.
    pub web_url: String,
    /// Full namespace path, e.g. `group/app`. Used for wiki link fallback.
    pub path_with_namespace: Option<String>,
}

/// A searchable content source within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Issues,
    #[serde(alias = "wikis", alias = "wiki_pages")]
    Wiki,
    Comments,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Issues, Source::Wiki, Source::Comments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Issues => "issues",
            Source::Wiki => "wiki",
            Source::Comments => "comments",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issues" | "issue" => Ok(Source::Issues),
            "wiki" | "wikis" | "wiki_pages" => Ok(Source::Wiki),
            "comments" | "comment" | "notes" => Ok(Source::Comments),
            other => Err(format!(
                "unknown source '{}': expected issues, wiki, or comments",
                other
            )),
        }
    }
}

/// An unvalidated search invocation, as received from the CLI or HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub project_ids: Vec<i64>,
    #[serde(default = "SearchRequest::default_sources")]
    pub sources: Vec<Source>,
}

/// A search invocation that passed [`SearchRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub search_term: String,
    /// Positive, de-duplicated, in caller order.
    pub project_ids: Vec<u64>,
    /// De-duplicated, in caller order.
    pub sources: Vec<Source>,
}

impl SearchRequest {
    /// Sources searched when a request does not name any.
    pub fn default_sources() -> Vec<Source> {
        vec![Source::Issues, Source::Wiki]
    }

    /// Check the request before any remote call is made.
    ///
    /// Non-positive project ids are discarded and duplicates collapsed
    /// before the emptiness check. The search term is trimmed.
    pub fn validate(self) -> Result<ValidatedRequest, SearchError> {
        let search_term = self.search_term.trim().to_string();
        if search_term.is_empty() {
            return Err(SearchError::Validation("Search term is required.".to_string()));
        }

        let mut project_ids: Vec<u64> = Vec::with_capacity(self.project_ids.len());
        for id in self.project_ids {
            if id > 0 && !project_ids.contains(&(id as u64)) {
                project_ids.push(id as u64);
            }
        }
        if project_ids.is_empty() {
            return Err(SearchError::Validation(
                "At least one project ID must be selected.".to_string(),
            ));
        }

        let mut sources: Vec<Source> = Vec::with_capacity(self.sources.len());
        for source in self.sources {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            return Err(SearchError::Validation(
                "At least one source must be selected.".to_string(),
            ));
        }

        Ok(ValidatedRequest {
            search_term,
            project_ids,
            sources,
        })
    }
}

// ============ Labels ============

/// Issue label in its one normalized shape.
///
/// GitLab returns either bare label names or label objects depending on
/// `with_labels_details`; both decode into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLabel")]
pub struct Label {
    pub name: String,
    pub color: String,
    pub text_color: String,
}

pub const DEFAULT_LABEL_COLOR: &str = "#888";
pub const DEFAULT_LABEL_TEXT_COLOR: &str = "#fff";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        text_color: Option<String>,
    },
}

impl From<RawLabel> for Label {
    fn from(raw: RawLabel) -> Self {
        match raw {
            RawLabel::Name(name) => Label {
                name,
                color: DEFAULT_LABEL_COLOR.to_string(),
                text_color: DEFAULT_LABEL_TEXT_COLOR.to_string(),
            },
            RawLabel::Detailed {
                name,
                color,
                text_color,
            } => Label {
                name,
                color: color.unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string()),
                text_color: text_color.unwrap_or_else(|| DEFAULT_LABEL_TEXT_COLOR.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    #[default]
    Opened,
    Closed,
}

// ============ Matches ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueMatch {
    pub id: u64,
    pub iid: u64,
    pub title: String,
    pub excerpt: String,
    pub web_url: String,
    pub labels: Vec<Label>,
    pub state: IssueState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WikiMatch {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentMatch {
    /// Note id.
    pub id: u64,
    pub issue_iid: u64,
    pub issue_title: String,
    pub issue_url: String,
    pub author: String,
    pub created_at: Option<DateTime<Utc>>,
    pub excerpt: String,
    /// Issue URL with a `#note_<id>` fragment.
    pub web_url: String,
}

/// A single item that matched the search term, in normalized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MatchResult {
    Issue(IssueMatch),
    Wiki(WikiMatch),
    Comment(CommentMatch),
}

impl MatchResult {
    pub fn web_url(&self) -> &str {
        match self {
            MatchResult::Issue(m) => &m.web_url,
            MatchResult::Wiki(m) => &m.web_url,
            MatchResult::Comment(m) => &m.web_url,
        }
    }

    pub fn excerpt(&self) -> &str {
        match self {
            MatchResult::Issue(m) => &m.excerpt,
            MatchResult::Wiki(m) => &m.excerpt,
            MatchResult::Comment(m) => &m.excerpt,
        }
    }
}

// ============ Response envelopes ============

/// Per-project result envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectResultBundle {
    pub project_id: u64,
    pub project_name: String,
    pub search_term: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IssueMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wiki: Vec<WikiMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentMatch>,
}

impl ProjectResultBundle {
    pub fn new(project: &ProjectDescriptor, search_term: &str) -> Self {
        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            search_term: search_term.to_string(),
            issues: Vec::new(),
            wiki: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn push(&mut self, result: MatchResult) {
        match result {
            MatchResult::Issue(m) => self.issues.push(m),
            MatchResult::Wiki(m) => self.wiki.push(m),
            MatchResult::Comment(m) => self.comments.push(m),
        }
    }

    pub fn match_count(&self) -> usize {
        self.issues.len() + self.wiki.len() + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.match_count() == 0
    }
}

/// A (project, source) pair that could not be searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceError {
    pub project_id: u64,
    pub source: Source,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ProjectResultBundle>,
    pub errors: Vec<SourceError>,
}

/// Entry of the project picker listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub id: u64,
    pub name: String,
    pub display_path: String,
    pub web_url: String,
}

/// Machine-readable error code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}
