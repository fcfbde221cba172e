//! Wiki page searcher.
//!
//! The wiki API has no search parameter, so all pages are listed with their
//! content and filtered locally on title or content.

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{GitLabClient, RemoteResponse, RequestSpec};
use crate::error::RemoteFailure;
use crate::excerpt::{contains_term, extract};
use crate::models::{MatchResult, ProjectDescriptor, Source, WikiMatch};
use crate::traits::{search_listing, ListingSearcher, SourceSearcher};

#[derive(Debug, Deserialize)]
struct RawWikiPage {
    slug: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    web_url: Option<String>,
}

pub struct WikiSearcher {
    base_url: String,
    window: usize,
}

impl WikiSearcher {
    pub fn new(base_url: &str, window: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            window,
        }
    }

    /// Browser URL of a wiki page.
    ///
    /// Assumes the standard `<project>/-/wikis/<slug>` layout; instances
    /// served under a relative root or with a nonstandard namespace layout
    /// may not match.
    pub fn page_url(&self, project: &ProjectDescriptor, slug: &str) -> String {
        if !project.web_url.is_empty() {
            return format!("{}/-/wikis/{}", project.web_url, slug);
        }
        let namespace = project
            .path_with_namespace
            .clone()
            .unwrap_or_else(|| project.id.to_string());
        format!("{}/{}/-/wikis/{}", self.base_url, namespace, slug)
    }
}

#[async_trait]
impl SourceSearcher for WikiSearcher {
    fn source(&self) -> Source {
        Source::Wiki
    }

    fn description(&self) -> &str {
        "Wiki page titles and content"
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

impl ListingSearcher for WikiSearcher {
    fn listing(&self, project: &ProjectDescriptor, _search_term: &str) -> RequestSpec {
        RequestSpec::get(format!("projects/{}/wikis", project.id)).query("with_content", 1)
    }

    fn collect(
        &self,
        project: &ProjectDescriptor,
        search_term: &str,
        response: RemoteResponse,
    ) -> Result<Vec<MatchResult>, RemoteFailure> {
        let pages: Vec<RawWikiPage> = response.decode()?;
        Ok(pages
            .into_iter()
            .filter(|page| {
                contains_term(&page.title, search_term)
                    || page
                        .content
                        .as_deref()
                        .is_some_and(|c| contains_term(c, search_term))
            })
            .map(|page| {
                let web_url = page
                    .web_url
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| self.page_url(project, &page.slug));
                MatchResult::Wiki(WikiMatch {
                    excerpt: extract(
                        page.content.as_deref().unwrap_or_default(),
                        search_term,
                        self.window,
                    ),
                    slug: page.slug,
                    title: page.title,
                    web_url,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(web_url: &str) -> ProjectDescriptor {
        ProjectDescriptor {
            id: 8,
            name: "docs".to_string(),
            web_url: web_url.to_string(),
            path_with_namespace: Some("group/sub/docs".to_string()),
        }
    }

    #[test]
    fn test_page_url_prefers_project_web_url() {
        let searcher = WikiSearcher::new("https://g.example/", 150);
        assert_eq!(
            searcher.page_url(&project("https://g.example/group/sub/docs"), "setup-guide"),
            "https://g.example/group/sub/docs/-/wikis/setup-guide"
        );
        assert_eq!(
            searcher.page_url(&project(""), "home"),
            "https://g.example/group/sub/docs/-/wikis/home"
        );
    }

    #[test]
    fn test_collect_filters_on_title_or_content() {
        let searcher = WikiSearcher::new("https://g.example", 150);
        let body = json!([
            {"slug": "deploy", "title": "Deploy", "format": "markdown", "content": "Steps to roll out"},
            {"slug": "runbook", "title": "Runbook", "content": "## Deploy\nRun the <b>pipeline</b>"},
            {"slug": "faq", "title": "FAQ", "content": "Nothing here"},
            {"slug": "linked", "title": "Deploy notes", "content": "", "web_url": "https://g.example/x/-/wikis/linked"}
        ]);
        let response = RemoteResponse {
            status: 200,
            body,
            next_page: None,
        };

        let matches = searcher
            .collect(&project("https://g.example/group/sub/docs"), "deploy", response)
            .unwrap();
        let slugs: Vec<&str> = matches
            .iter()
            .map(|m| match m {
                MatchResult::Wiki(w) => w.slug.as_str(),
                _ => panic!("expected wiki match"),
            })
            .collect();
        assert_eq!(slugs, vec!["deploy", "runbook", "linked"]);

        assert_eq!(matches[1].excerpt(), "## Deploy\nRun the pipeline");
        assert_eq!(
            matches[0].web_url(),
            "https://g.example/group/sub/docs/-/wikis/deploy"
        );
        assert_eq!(matches[2].web_url(), "https://g.example/x/-/wikis/linked");
    }
}
