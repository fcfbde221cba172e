//! Search orchestration.
//!
//! A validated request runs as three batches, each joined before the next
//! starts:
//!
//! 1. resolve every project id (`GET projects/:id`);
//! 2. issue and wiki listings for every resolved project, in one pool;
//! 3. comments: issue listings for every project, then the notes of every
//!    listed issue in a second, wider pool.
//!
//! Each (project, source) pair ends with either a match list or a
//! [`RemoteFailure`]. Merging walks projects in request order: matches go
//! into the project's bundle, failures become [`SourceError`]s. A bundle is
//! emitted only when it holds at least one match.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use crate::client::{GitLabClient, RequestSpec};
use crate::config::{Config, SearchConfig};
use crate::error::{RemoteFailure, SearchError};
use crate::models::{
    IssueState, MatchResult, ProjectDescriptor, ProjectResultBundle, SearchRequest,
    SearchResponse, Source, SourceError, ValidatedRequest,
};
use crate::resolver;
use crate::source_comments::IssueRef;
use crate::traits::{ListingSearcher, SearcherRegistry};

/// Lifecycle of one requested project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    Pending,
    Resolving,
    /// Lookup failed; the project takes no further part in the request.
    Skipped,
    Searching,
    Merging,
    Done,
}

type SourceOutcome = std::result::Result<Vec<MatchResult>, RemoteFailure>;

struct ProjectSlot {
    id: u64,
    state: ProjectState,
    project: Option<ProjectDescriptor>,
    /// One entry per requested source, same order as the request.
    outcomes: Vec<Option<SourceOutcome>>,
}

impl ProjectSlot {
    fn new(id: u64, sources: usize) -> Self {
        Self {
            id,
            state: ProjectState::Pending,
            project: None,
            outcomes: (0..sources).map(|_| None).collect(),
        }
    }

    fn advance(&mut self, next: ProjectState) {
        debug!(project_id = self.id, from = ?self.state, to = ?next, "Project state");
        self.state = next;
    }
}

/// Runs validated requests against one GitLab instance.
pub struct Aggregator {
    client: GitLabClient,
    registry: SearcherRegistry,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(client: GitLabClient, settings: &SearchConfig) -> Self {
        let registry = SearcherRegistry::new(settings, client.base_url());
        Self {
            client,
            registry,
            concurrency: settings.concurrency,
        }
    }

    pub async fn run(&self, request: &ValidatedRequest) -> SearchResponse {
        let term = request.search_term.as_str();
        let mut slots: Vec<ProjectSlot> = request
            .project_ids
            .iter()
            .map(|id| ProjectSlot::new(*id, request.sources.len()))
            .collect();

        self.resolve(&mut slots, &request.project_ids).await;
        self.run_listings(&mut slots, &request.sources, term).await;
        if let Some(index) = request.sources.iter().position(|s| *s == Source::Comments) {
            self.run_comments(&mut slots, index, term).await;
        }

        merge(slots, &request.sources, term)
    }

    async fn resolve(&self, slots: &mut [ProjectSlot], ids: &[u64]) {
        for slot in slots.iter_mut() {
            slot.advance(ProjectState::Resolving);
        }

        let mut resolved: HashMap<u64, ProjectDescriptor> =
            resolver::resolve(&self.client, ids, self.concurrency)
                .await
                .into_iter()
                .map(|project| (project.id, project))
                .collect();

        for slot in slots.iter_mut() {
            match resolved.remove(&slot.id) {
                Some(project) => {
                    slot.project = Some(project);
                    slot.advance(ProjectState::Searching);
                }
                None => slot.advance(ProjectState::Skipped),
            }
        }
    }

    /// Batch 2: every single-listing source of every searching project.
    async fn run_listings(&self, slots: &mut [ProjectSlot], sources: &[Source], term: &str) {
        let mut jobs: Vec<(usize, usize, &dyn ListingSearcher)> = Vec::new();
        for (slot_index, slot) in slots.iter().enumerate() {
            if slot.project.is_none() {
                continue;
            }
            for (source_index, source) in sources.iter().enumerate() {
                if let Some(searcher) = self.registry.listing(*source) {
                    jobs.push((slot_index, source_index, searcher));
                }
            }
        }
        if jobs.is_empty() {
            return;
        }

        let specs: Vec<RequestSpec> = jobs
            .iter()
            .filter_map(|(slot_index, _, searcher)| {
                let project = slots[*slot_index].project.as_ref()?;
                Some(searcher.listing(project, term))
            })
            .collect();
        let results = self.client.execute_many(&specs, self.concurrency).await;

        for ((slot_index, source_index, searcher), result) in jobs.into_iter().zip(results) {
            let slot = &mut slots[slot_index];
            let Some(project) = slot.project.as_ref() else {
                continue;
            };
            let outcome = result.and_then(|response| searcher.collect(project, term, response));
            slot.outcomes[source_index] = Some(outcome);
        }
    }

    /// Batch 3: issue listings, then the notes of every listed issue.
    async fn run_comments(&self, slots: &mut [ProjectSlot], source_index: usize, term: &str) {
        let comments = self.registry.comments();

        let searching: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.project.is_some())
            .map(|(index, _)| index)
            .collect();
        if searching.is_empty() {
            return;
        }

        let listing_specs: Vec<RequestSpec> = searching
            .iter()
            .filter_map(|index| slots[*index].project.as_ref())
            .map(|project| comments.issue_listing(project))
            .collect();
        let listings = self
            .client
            .execute_many(&listing_specs, self.concurrency)
            .await;

        let mut listed: Vec<(usize, Vec<IssueRef>)> = Vec::new();
        for (slot_index, result) in searching.into_iter().zip(listings) {
            match result.and_then(|response| comments.decode_issues(response)) {
                Ok(issues) => listed.push((slot_index, issues)),
                Err(failure) => slots[slot_index].outcomes[source_index] = Some(Err(failure)),
            }
        }

        let mut notes_specs = Vec::new();
        for (slot_index, issues) in &listed {
            if let Some(project) = slots[*slot_index].project.as_ref() {
                notes_specs.extend(issues.iter().map(|i| comments.notes_request(project, i.iid)));
            }
        }
        let mut notes = self
            .client
            .execute_many(&notes_specs, comments.notes_concurrency())
            .await
            .into_iter();

        for (slot_index, issues) in listed {
            let slot = &mut slots[slot_index];
            let Some(project) = slot.project.as_ref() else {
                continue;
            };
            let chunk: Vec<_> = notes.by_ref().take(issues.len()).collect();
            let found = comments.merge_notes(project, &issues, chunk, term);
            slot.outcomes[source_index] = Some(Ok(found));
        }
    }
}

fn merge(slots: Vec<ProjectSlot>, sources: &[Source], term: &str) -> SearchResponse {
    let mut response = SearchResponse::default();

    for mut slot in slots {
        let Some(project) = slot.project.take() else {
            slot.advance(ProjectState::Done);
            continue;
        };
        slot.advance(ProjectState::Merging);

        let mut bundle = ProjectResultBundle::new(&project, term);
        for (source, outcome) in sources.iter().zip(slot.outcomes.drain(..)) {
            match outcome {
                Some(Ok(matches)) => {
                    for m in matches {
                        bundle.push(m);
                    }
                }
                Some(Err(failure)) => response.errors.push(SourceError {
                    project_id: project.id,
                    source: *source,
                    message: format!("Failed to search {}: {}", source, failure),
                }),
                None => {}
            }
        }
        if !bundle.is_empty() {
            response.results.push(bundle);
        }
        slot.advance(ProjectState::Done);
    }

    response
}

/// Check credentials, validate, and run one search.
///
/// Nothing touches the network unless both checks pass. The orchestration
/// runs on its own task; a panic inside it is reported as
/// [`SearchError::Internal`].
pub async fn search_projects(
    config: &Config,
    request: SearchRequest,
) -> std::result::Result<SearchResponse, SearchError> {
    let credentials = config.gitlab.credentials()?;
    let request = request.validate()?;
    let client = GitLabClient::new(&credentials, &config.http)
        .map_err(|e| SearchError::Internal(format!("{:#}", e)))?;

    debug!(
        term = %request.search_term,
        projects = request.project_ids.len(),
        sources = ?request.sources,
        "Starting search"
    );

    let aggregator = Aggregator::new(client, &config.search);
    tokio::spawn(async move { aggregator.run(&request).await })
        .await
        .map_err(|e| SearchError::Internal(format!("Search task failed: {}", e)))
}

/// CLI entry point for `glms search`.
pub async fn run_search(
    config: &Config,
    search_term: &str,
    project_ids: Vec<i64>,
    sources: Vec<Source>,
    json: bool,
) -> Result<()> {
    let sources = if sources.is_empty() {
        SearchRequest::default_sources()
    } else {
        sources
    };
    let request = SearchRequest {
        search_term: search_term.to_string(),
        project_ids,
        sources,
    };
    let response = search_projects(config, request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.results.is_empty() && response.errors.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for bundle in &response.results {
        println!(
            "{} (project {}): {} match(es)",
            bundle.project_name,
            bundle.project_id,
            bundle.match_count()
        );
        for m in &bundle.issues {
            print_match(&MatchResult::Issue(m.clone()));
        }
        for m in &bundle.wiki {
            print_match(&MatchResult::Wiki(m.clone()));
        }
        for m in &bundle.comments {
            print_match(&MatchResult::Comment(m.clone()));
        }
        println!();
    }

    if !response.errors.is_empty() {
        println!("Errors:");
        for error in &response.errors {
            println!("  project {}: {}", error.project_id, error.message);
        }
    }
    Ok(())
}

/// CLI entry point for `glms debug`: one searcher, one project, with timing.
pub async fn run_debug(
    config: &Config,
    project_id: u64,
    search_term: &str,
    source: Source,
    json: bool,
) -> Result<()> {
    let term = search_term.trim();
    if term.is_empty() {
        anyhow::bail!("Search term is required.");
    }
    let credentials = config.gitlab.credentials()?;
    let client = GitLabClient::new(&credentials, &config.http)?;
    let registry = SearcherRegistry::new(&config.search, client.base_url());
    let searcher = registry.get(source);

    let started = Instant::now();
    let project = resolver::resolve_one(&client, project_id)
        .await
        .map_err(|failure| anyhow!(failure))
        .with_context(|| format!("Failed to resolve project {}", project_id))?;
    eprintln!(
        "Resolved project {} ({}) in {:?}",
        project.id,
        project.name,
        started.elapsed()
    );

    let started = Instant::now();
    let matches = searcher
        .search(&client, &project, term)
        .await
        .map_err(|failure| anyhow!("Failed to search {}: {}", source, failure))?;
    eprintln!(
        "Searcher '{}' ({}) finished in {:?}",
        searcher.source(),
        searcher.description(),
        started.elapsed()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!("{} match(es) in {}:", matches.len(), project.name);
    for m in &matches {
        print_match(m);
    }
    Ok(())
}

fn print_match(m: &MatchResult) {
    match m {
        MatchResult::Issue(issue) => {
            let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
            let state = match issue.state {
                IssueState::Opened => "opened",
                IssueState::Closed => "closed",
            };
            println!("  [issue] #{} {} ({})", issue.iid, issue.title, state);
            if !labels.is_empty() {
                println!("    labels: {}", labels.join(", "));
            }
        }
        MatchResult::Wiki(page) => println!("  [wiki] {}", page.title),
        MatchResult::Comment(note) => println!(
            "  [comment] {} on #{} {}",
            note.author, note.issue_iid, note.issue_title
        ),
    }
    println!("    url: {}", m.web_url());
    if !m.excerpt().is_empty() {
        println!("    excerpt: \"{}\"", m.excerpt().replace('\n', " ").trim());
    }
}
