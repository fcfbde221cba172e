//! Project id resolution.
//!
//! Looks up each requested project with `GET projects/:id` in one batch.
//! Resolution is best-effort: an id whose lookup fails for any reason is
//! dropped (and logged), and the search continues with the rest.

use serde::Deserialize;
use tracing::warn;

use crate::client::{GitLabClient, RequestSpec};
use crate::error::RemoteFailure;
use crate::models::ProjectDescriptor;

#[derive(Debug, Deserialize)]
struct RawProject {
    id: u64,
    name: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    path_with_namespace: Option<String>,
}

impl From<RawProject> for ProjectDescriptor {
    fn from(raw: RawProject) -> Self {
        ProjectDescriptor {
            id: raw.id,
            name: raw.name,
            web_url: raw.web_url.trim_end_matches('/').to_string(),
            path_with_namespace: raw.path_with_namespace,
        }
    }
}

pub fn project_request(id: u64) -> RequestSpec {
    RequestSpec::get(format!("projects/{}", id))
}

/// Look up a single project, keeping the failure.
pub async fn resolve_one(client: &GitLabClient, id: u64) -> Result<ProjectDescriptor, RemoteFailure> {
    let response = client.execute(&project_request(id)).await?;
    Ok(response.decode::<RawProject>()?.into())
}

/// Resolve `ids` into descriptors, keeping the caller's order.
///
/// The returned list is the id→descriptor mapping for every id that could be
/// looked up; ids missing from it were unresolvable.
pub async fn resolve(
    client: &GitLabClient,
    ids: &[u64],
    concurrency: usize,
) -> Vec<ProjectDescriptor> {
    let specs: Vec<RequestSpec> = ids.iter().map(|id| project_request(*id)).collect();
    let slots = client.execute_many(&specs, concurrency).await;

    ids.iter()
        .zip(slots)
        .filter_map(|(id, slot)| {
            match slot.and_then(|response| response.decode::<RawProject>()) {
                Ok(raw) => Some(ProjectDescriptor::from(raw)),
                Err(failure) => {
                    warn!(project_id = id, %failure, "Skipping project that could not be resolved");
                    None
                }
            }
        })
        .collect()
}
