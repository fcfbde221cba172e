//! # GitLab Multi-Project Search
//!
//! Free-text search over the issues, wiki pages, and issue comments of many
//! GitLab projects at once.
//!
//! GitLab's own search is per-project and behaves differently for each
//! content type, so this crate fans out to the REST v4 API with bounded
//! concurrency, re-filters every item client-side with one case-insensitive
//! substring matcher, builds short excerpts around the match, and merges the
//! results. A failing project or source never discards the rest: it shows up
//! as an entry in the `errors` list next to the results that did arrive.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────────────────────┐
//! │ CLI/HTTP │──▶│ Aggregator │──▶│ Resolver + Source Searchers│
//! │  (glms)  │   │            │   │ issues / wiki / comments   │
//! └──────────┘   └─────┬──────┘   └─────────────┬──────────────┘
//!                      │                        ▼
//!                      │                 ┌──────────────┐
//!                      │                 │ GitLabClient │──▶ GitLab API
//!                      ▼                 └──────────────┘
//!              SearchResponse {results, errors}
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Remote failure and request error types |
//! | [`models`] | Requests, matches, and response payloads |
//! | [`client`] | Authenticated GitLab client with bounded batches |
//! | [`resolver`] | Project id → descriptor lookup |
//! | [`excerpt`] | Markup stripping, term matching, excerpts |
//! | [`traits`] | Searcher traits and registry |
//! | [`source_issues`] | Issue searcher |
//! | [`source_wiki`] | Wiki searcher |
//! | [`source_comments`] | Comment searcher |
//! | [`aggregate`] | Search orchestration |
//! | [`projects`] | Paginated project listing |
//! | [`server`] | JSON HTTP server |

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod excerpt;
pub mod models;
pub mod projects;
pub mod resolver;
pub mod server;
pub mod source_comments;
pub mod source_issues;
pub mod source_wiki;
pub mod traits;
