//! Source hosting clients for buildsync.
//!
//! Each service implements `SourceHostingClient`; `GitService` selects which
//! implementation a syncer is built with.

mod bitbucket;
mod github;
mod repo_name;
mod service;

pub use bitbucket::{BitBucketClient, BITBUCKET_DEFAULT_API_BASE};
pub use github::{GithubClient, GITHUB_DEFAULT_API_BASE};
pub use repo_name::RepoName;
pub use service::{GitService, HostingClientConfig, DEFAULT_STATUS_CONTEXT};
