//! Project listing for pickers and `glms projects`.
//!
//! Lists every non-archived project the token is a member of, sorted by
//! name. Pages are followed through the `Link: <...>; rel="next"` header
//! until GitLab stops sending one or `[projects].max_pages` is reached.

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{GitLabClient, RequestSpec};
use crate::config::{Config, ProjectsConfig};
use crate::error::RemoteFailure;
use crate::models::{ErrorDetail, ProjectListResponse, ProjectSummary};

#[derive(Debug, Deserialize)]
struct RawProjectSummary {
    id: u64,
    name: String,
    #[serde(default)]
    name_with_namespace: Option<String>,
    #[serde(default)]
    path_with_namespace: Option<String>,
    #[serde(default)]
    web_url: String,
}

impl From<RawProjectSummary> for ProjectSummary {
    fn from(raw: RawProjectSummary) -> Self {
        let display_path = raw
            .name_with_namespace
            .or(raw.path_with_namespace)
            .unwrap_or_else(|| raw.name.clone());
        ProjectSummary {
            id: raw.id,
            name: raw.name,
            display_path,
            web_url: raw.web_url,
        }
    }
}

pub fn first_page_request(settings: &ProjectsConfig) -> RequestSpec {
    RequestSpec::get("projects")
        .query("membership", "true")
        .query("archived", "false")
        .query("simple", "true")
        .query("order_by", "name")
        .query("sort", "asc")
        .query("per_page", settings.per_page)
}

/// Fetch all pages, in order.
///
/// Any failing page fails the whole listing. A `next` link outside the
/// configured instance ends the listing, so the token never leaves it.
pub async fn list_projects(
    client: &GitLabClient,
    settings: &ProjectsConfig,
) -> std::result::Result<Vec<ProjectSummary>, RemoteFailure> {
    let mut projects = Vec::new();
    let mut request = first_page_request(settings);

    for page in 1..=settings.max_pages {
        let response = client.execute(&request).await?;
        let next_page = response.next_page.clone();
        let batch: Vec<RawProjectSummary> = response.decode()?;
        debug!(page, count = batch.len(), "Fetched project page");
        projects.extend(batch.into_iter().map(ProjectSummary::from));

        match next_page {
            Some(url) if !client.is_own_url(&url) => {
                warn!(next = %url, "Ignoring pagination link to another host");
                break;
            }
            Some(url) if page < settings.max_pages => request = RequestSpec::url(url),
            Some(_) => {
                warn!(
                    max_pages = settings.max_pages,
                    "Project listing truncated at page limit"
                );
                break;
            }
            None => break,
        }
    }

    Ok(projects)
}

/// Listing payload, with the failure folded into `error`.
///
/// Missing credentials give code `configuration`, a failed remote call gives
/// `upstream`; `projects` is empty in both cases.
pub async fn project_listing(config: &Config) -> ProjectListResponse {
    match fetch(config).await {
        Ok(projects) => ProjectListResponse {
            projects,
            error: None,
        },
        Err(error) => ProjectListResponse {
            projects: Vec::new(),
            error: Some(error),
        },
    }
}

async fn fetch(config: &Config) -> std::result::Result<Vec<ProjectSummary>, ErrorDetail> {
    let credentials = config.gitlab.credentials().map_err(|e| ErrorDetail {
        code: "configuration".to_string(),
        message: e.to_string(),
    })?;
    let client = GitLabClient::new(&credentials, &config.http).map_err(|e| ErrorDetail {
        code: "internal".to_string(),
        message: format!("{:#}", e),
    })?;
    list_projects(&client, &config.projects)
        .await
        .map_err(|failure| ErrorDetail {
            code: "upstream".to_string(),
            message: format!("Failed to list projects: {}", failure),
        })
}

/// CLI entry point for `glms projects`.
pub async fn run_projects(config: &Config, json: bool) -> Result<()> {
    let credentials = config.gitlab.credentials()?;
    let client = GitLabClient::new(&credentials, &config.http)?;
    let projects = list_projects(&client, &config.projects)
        .await
        .map_err(|failure| anyhow::anyhow!("Failed to list projects: {}", failure))?;

    if json {
        let payload = ProjectListResponse {
            projects,
            error: None,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }

    println!("{:<8} PROJECT", "ID");
    for project in &projects {
        println!("{:<8} {}", project.id, project.display_path);
    }
    println!();
    println!("{} project(s)", projects.len());
    Ok(())
}
