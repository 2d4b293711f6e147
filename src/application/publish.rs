//! Publish orchestrator: the round-keyed pipeline that reconciles the task's
//! repository, materializes its files, activates hosting and resolves the commit
//! that proves the work landed.
//!
//! Every step tolerates partial completion from an earlier attempt with the same
//! repository key: an existing repository is fetched, existing files are updated with
//! their current version token and an already active site is left as is. Content that
//! already matches is still rewritten.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::application::documents::{ReadmeContext, render_license, render_readme};
use crate::application::generator::{GenerationRequest, GeneratorError};
use crate::application::repos::{ArtifactGenerator, StoreError};
use crate::application::store::ContentStoreClient;
use crate::domain::publish::{CommitSha, ManagedFile, PublishResult, RepositoryHandle};
use crate::domain::task::{RepositoryKey, Round, TaskRequest};

pub const PRIMARY_DOCUMENT: &str = "index.html";
pub const DESCRIPTION_DOCUMENT: &str = "README.md";
pub const LICENSE_DOCUMENT: &str = "LICENSE";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("document template failed to render: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    /// Account that owns the published repositories.
    pub owner: String,
    /// Host suffix of the static site, e.g. `github.io`.
    pub pages_domain: String,
    /// Copyright holder named in the license document.
    pub license_holder: String,
}

impl PublishSettings {
    pub fn pages_url(&self, repository: &str) -> String {
        format!(
            "https://{}.{}/{}/",
            self.owner.to_ascii_lowercase(),
            self.pages_domain,
            repository
        )
    }
}

/// Per-repository-key mutual exclusion for pipelines running in this process.
#[derive(Clone, Default)]
pub struct RepositoryLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RepositoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &RepositoryKey) -> RepositoryLease {
        let lock = self
            .inner
            .entry(key.as_str().to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        RepositoryLease {
            guard: Some(guard),
            locks: self.inner.clone(),
            key: key.as_str().to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of one pipeline; releases and prunes the key's lock on drop.
pub struct RepositoryLease {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
}

impl Drop for RepositoryLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left means nobody else is waiting.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct PublishOrchestrator {
    store: ContentStoreClient,
    generator: Arc<dyn ArtifactGenerator>,
    settings: PublishSettings,
    locks: RepositoryLocks,
}

impl PublishOrchestrator {
    pub fn new(
        store: ContentStoreClient,
        generator: Arc<dyn ArtifactGenerator>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
            locks: RepositoryLocks::new(),
        }
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// Run the pipeline for `request` and return the published state.
    pub async fn publish(&self, request: &TaskRequest) -> Result<PublishResult, PublishError> {
        let key = request.repository_key();
        let round = request.round();
        let started = Instant::now();

        let _lease = self.locks.acquire(&key).await;
        let outcome = self.run(request, &key).await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("pagesmith_publish_ms", "round" => round.as_str()).record(elapsed_ms);
        match &outcome {
            Ok(result) => {
                counter!("pagesmith_publish_total", "round" => round.as_str(), "outcome" => "success")
                    .increment(1);
                info!(
                    target = "pagesmith::publish",
                    repo = %result.repository.full_name,
                    round = %round,
                    commit = %result.commit_sha,
                    elapsed_ms,
                    "publish completed"
                );
            }
            Err(err) => {
                counter!("pagesmith_publish_total", "round" => round.as_str(), "outcome" => "failure")
                    .increment(1);
                warn!(
                    target = "pagesmith::publish",
                    repo = key.as_str(),
                    round = %round,
                    error = %err,
                    elapsed_ms,
                    "publish failed"
                );
            }
        }
        outcome
    }

    async fn run(
        &self,
        request: &TaskRequest,
        key: &RepositoryKey,
    ) -> Result<PublishResult, PublishError> {
        let repo = self.store.reconcile_repository(key).await?;
        let pages_url = self.settings.pages_url(&repo.name);

        match request.round() {
            Round::Initial => self.create(request, &repo, &pages_url).await?,
            Round::Revision => self.revise(request, &repo, &pages_url).await?,
        }

        // Each write is its own commit; only the branch head reflects all of them.
        let commit_sha = self.store.resolve_head_commit(&repo).await?;

        Ok(PublishResult {
            repo_url: repo.html_url.clone(),
            repository: repo,
            commit_sha,
            pages_url,
        })
    }

    async fn create(
        &self,
        request: &TaskRequest,
        repo: &RepositoryHandle,
        pages_url: &str,
    ) -> Result<(), PublishError> {
        let markup = self
            .generator
            .generate(&GenerationRequest {
                brief: request.brief(),
                checks: request.checks(),
                attachments: request.attachments(),
                prior_content: None,
            })
            .await?;

        let readme = render_readme(&ReadmeContext {
            repository: &repo.name,
            brief: request.brief(),
            pages_url,
            checks: request.checks(),
            revised: false,
        })?;
        let license = render_license(&self.settings.license_holder)?;

        let files = [
            ManagedFile::new(PRIMARY_DOCUMENT, markup, "feat: Initial app"),
            ManagedFile::new(DESCRIPTION_DOCUMENT, readme, "docs: Add README"),
            ManagedFile::new(LICENSE_DOCUMENT, license, "chore: Add MIT license"),
        ];

        let mut candidate: Option<CommitSha> = None;
        for file in &files {
            let commit = self.store.write_file(repo, file).await?;
            candidate.get_or_insert(commit);
        }
        if let Some(commit) = candidate {
            debug!(
                target = "pagesmith::publish",
                repo = %repo.full_name,
                commit = %commit,
                "primary document committed"
            );
        }

        self.store.enable_static_hosting(repo).await?;
        Ok(())
    }

    async fn revise(
        &self,
        request: &TaskRequest,
        repo: &RepositoryHandle,
        pages_url: &str,
    ) -> Result<(), PublishError> {
        let existing = self.store.read_file(repo, PRIMARY_DOCUMENT).await?;
        if existing.is_none() {
            warn!(
                target = "pagesmith::publish",
                repo = %repo.full_name,
                "no primary document to revise; treating prior content as empty"
            );
        }

        let prior_content = existing
            .as_ref()
            .map(|snapshot| snapshot.content.as_str())
            .unwrap_or_default();
        let markup = self
            .generator
            .generate(&GenerationRequest {
                brief: request.brief(),
                checks: request.checks(),
                attachments: request.attachments(),
                prior_content: Some(prior_content),
            })
            .await?;

        self.store
            .write_file_over(
                repo,
                &ManagedFile::new(PRIMARY_DOCUMENT, markup, "feat: Round 2 update"),
                existing.as_ref().map(|snapshot| &snapshot.version),
            )
            .await?;

        let readme = render_readme(&ReadmeContext {
            repository: &repo.name,
            brief: request.brief(),
            pages_url,
            checks: request.checks(),
            revised: true,
        })?;
        self.store
            .write_file(
                repo,
                &ManagedFile::new(
                    DESCRIPTION_DOCUMENT,
                    readme,
                    "docs: Update README for Round 2",
                ),
            )
            .await?;

        Ok(())
    }
}
