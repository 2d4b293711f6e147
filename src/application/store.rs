//! Content store client: create-or-fetch and put-or-update primitives over a
//! [`ContentStore`] port.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tracing::{debug, info};

use crate::application::repos::{
    ContentStore, CreateRepository, HostingActivation, PutContent, RemoteFile, StoreError,
};
use crate::domain::publish::{CommitSha, FileSnapshot, ManagedFile, RepositoryHandle, VersionToken};
use crate::domain::task::RepositoryKey;

#[derive(Clone)]
pub struct ContentStoreClient {
    store: Arc<dyn ContentStore>,
    branch: String,
}

impl ContentStoreClient {
    pub fn new(store: Arc<dyn ContentStore>, branch: impl Into<String>) -> Self {
        Self {
            store,
            branch: branch.into(),
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Create the repository, or fetch it when the name is already taken.
    pub async fn reconcile_repository(
        &self,
        key: &RepositoryKey,
    ) -> Result<RepositoryHandle, StoreError> {
        match self.store.create_repository(key.as_str()).await? {
            CreateRepository::Created(handle) => {
                info!(
                    target = "pagesmith::store",
                    repo = %handle.full_name,
                    "repository created"
                );
                Ok(handle)
            }
            CreateRepository::AlreadyExists => {
                debug!(
                    target = "pagesmith::store",
                    repo = key.as_str(),
                    "repository exists; fetching"
                );
                self.store.fetch_repository(key.as_str()).await
            }
        }
    }

    /// Fetch and decode a file. Absence is `Ok(None)`, not an error.
    pub async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<Option<FileSnapshot>, StoreError> {
        let Some(remote) = self.store.get_content(&repo.name, path, &self.branch).await? else {
            return Ok(None);
        };

        let content = decode_content(&remote)?;
        Ok(Some(FileSnapshot {
            content,
            version: VersionToken::new(remote.sha),
        }))
    }

    /// Write a file, probing first for the version token of any existing content so the
    /// store accepts the write as an update.
    pub async fn write_file(
        &self,
        repo: &RepositoryHandle,
        file: &ManagedFile,
    ) -> Result<CommitSha, StoreError> {
        let prior = self
            .store
            .get_content(&repo.name, file.path, &self.branch)
            .await?
            .map(|remote| VersionToken::new(remote.sha));

        self.write_file_over(repo, file, prior.as_ref()).await
    }

    /// Write a file whose prior version token is already known. `None` creates it.
    pub async fn write_file_over(
        &self,
        repo: &RepositoryHandle,
        file: &ManagedFile,
        prior: Option<&VersionToken>,
    ) -> Result<CommitSha, StoreError> {
        let content = PutContent {
            message: file.message,
            encoded_content: BASE64_STANDARD.encode(file.content.as_bytes()),
            sha: prior.map(VersionToken::as_str),
            branch: &self.branch,
        };

        let commit = self.store.put_content(&repo.name, file.path, content).await?;
        debug!(
            target = "pagesmith::store",
            repo = %repo.full_name,
            path = file.path,
            update = prior.is_some(),
            commit = %commit,
            "file written"
        );
        Ok(CommitSha::new(commit))
    }

    /// Turn on static hosting; an already enabled site counts as success.
    pub async fn enable_static_hosting(
        &self,
        repo: &RepositoryHandle,
    ) -> Result<HostingActivation, StoreError> {
        let activation = self.store.enable_pages(&repo.name, &self.branch).await?;
        match activation {
            HostingActivation::Enabled => info!(
                target = "pagesmith::store",
                repo = %repo.full_name,
                "static hosting enabled"
            ),
            HostingActivation::AlreadyEnabled => debug!(
                target = "pagesmith::store",
                repo = %repo.full_name,
                "static hosting already enabled"
            ),
        }
        Ok(activation)
    }

    /// Current head of the configured branch.
    pub async fn resolve_head_commit(
        &self,
        repo: &RepositoryHandle,
    ) -> Result<CommitSha, StoreError> {
        self.store
            .branch_head(&repo.name, &self.branch)
            .await
            .map(CommitSha::new)
    }
}

fn decode_content(remote: &RemoteFile) -> Result<String, StoreError> {
    let compact: String = remote
        .encoded_content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = BASE64_STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| StoreError::decode("read file", err))?;
    String::from_utf8(bytes).map_err(|err| StoreError::decode("read file", err))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeStore {
        existing_repo: bool,
        files: Mutex<HashMap<String, RemoteFile>>,
        puts: Mutex<Vec<(String, Option<String>)>>,
        fetches: Mutex<usize>,
        pages_enabled: Mutex<bool>,
    }

    fn handle(name: &str) -> RepositoryHandle {
        RepositoryHandle {
            name: name.to_string(),
            full_name: format!("octo/{name}"),
            html_url: format!("https://github.com/octo/{name}"),
        }
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn create_repository(&self, name: &str) -> Result<CreateRepository, StoreError> {
            if self.existing_repo {
                Ok(CreateRepository::AlreadyExists)
            } else {
                Ok(CreateRepository::Created(handle(name)))
            }
        }

        async fn fetch_repository(&self, name: &str) -> Result<RepositoryHandle, StoreError> {
            *self.fetches.lock().await += 1;
            Ok(handle(name))
        }

        async fn get_content(
            &self,
            _repo: &str,
            path: &str,
            _branch: &str,
        ) -> Result<Option<RemoteFile>, StoreError> {
            Ok(self.files.lock().await.get(path).cloned())
        }

        async fn put_content(
            &self,
            _repo: &str,
            path: &str,
            content: PutContent<'_>,
        ) -> Result<String, StoreError> {
            let mut files = self.files.lock().await;
            let current = files.get(path).map(|file| file.sha.clone());
            if current.as_deref() != content.sha {
                return Err(StoreError::status("write file", 409, "sha mismatch"));
            }
            let mut puts = self.puts.lock().await;
            puts.push((path.to_string(), content.sha.map(str::to_string)));
            let sha = format!("blob-{}", puts.len());
            files.insert(
                path.to_string(),
                RemoteFile {
                    encoded_content: content.encoded_content,
                    sha,
                },
            );
            Ok(format!("commit-{}", puts.len()))
        }

        async fn enable_pages(
            &self,
            _repo: &str,
            _branch: &str,
        ) -> Result<HostingActivation, StoreError> {
            let mut enabled = self.pages_enabled.lock().await;
            if *enabled {
                Ok(HostingActivation::AlreadyEnabled)
            } else {
                *enabled = true;
                Ok(HostingActivation::Enabled)
            }
        }

        async fn branch_head(&self, _repo: &str, _branch: &str) -> Result<String, StoreError> {
            Ok(format!("commit-{}", self.puts.lock().await.len()))
        }
    }

    fn client(store: FakeStore) -> (ContentStoreClient, Arc<FakeStore>) {
        let store = Arc::new(store);
        (ContentStoreClient::new(store.clone(), "main"), store)
    }

    #[tokio::test]
    async fn reconcile_fetches_when_name_taken() {
        let (client, store) = client(FakeStore {
            existing_repo: true,
            ..Default::default()
        });

        let repo = client
            .reconcile_repository(&RepositoryKey::derive("calc", "abcdefgh99"))
            .await
            .expect("reconciled");

        assert_eq!(repo.name, "calc_abcdefgh");
        assert_eq!(*store.fetches.lock().await, 1);
    }

    #[tokio::test]
    async fn reconcile_uses_created_handle() {
        let (client, store) = client(FakeStore::default());
        client
            .reconcile_repository(&RepositoryKey::derive("calc", "abcdefgh"))
            .await
            .expect("reconciled");
        assert_eq!(*store.fetches.lock().await, 0);
    }

    #[tokio::test]
    async fn write_file_probes_for_existing_version() {
        let (client, store) = client(FakeStore::default());
        let repo = handle("calc_abcdefgh");

        client
            .write_file(&repo, &ManagedFile::new("index.html", "<p>v1</p>", "first"))
            .await
            .expect("create");
        let commit = client
            .write_file(&repo, &ManagedFile::new("index.html", "<p>v2</p>", "second"))
            .await
            .expect("update carries prior sha");

        assert_eq!(commit.as_str(), "commit-2");
        let puts = store.puts.lock().await;
        assert_eq!(puts[0], ("index.html".to_string(), None));
        assert_eq!(
            puts[1],
            ("index.html".to_string(), Some("blob-1".to_string()))
        );
    }

    #[tokio::test]
    async fn read_file_decodes_wrapped_base64() {
        let (client, store) = client(FakeStore::default());
        store.files.lock().await.insert(
            "index.html".to_string(),
            RemoteFile {
                encoded_content: "PGgxPkhp\nPC9oMT4=\n".to_string(),
                sha: "abc".to_string(),
            },
        );

        let snapshot = client
            .read_file(&handle("r"), "index.html")
            .await
            .expect("read")
            .expect("present");

        assert_eq!(snapshot.content, "<h1>Hi</h1>");
        assert_eq!(snapshot.version.as_str(), "abc");
    }

    #[tokio::test]
    async fn read_file_reports_absence_as_none() {
        let (client, _store) = client(FakeStore::default());
        let snapshot = client
            .read_file(&handle("r"), "index.html")
            .await
            .expect("read");
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn read_file_rejects_invalid_base64() {
        let (client, store) = client(FakeStore::default());
        store.files.lock().await.insert(
            "index.html".to_string(),
            RemoteFile {
                encoded_content: "not base64!".to_string(),
                sha: "abc".to_string(),
            },
        );

        let err = client
            .read_file(&handle("r"), "index.html")
            .await
            .expect_err("decode fails");
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[tokio::test]
    async fn enable_static_hosting_is_idempotent() {
        let (client, _store) = client(FakeStore::default());
        let repo = handle("r");
        assert_eq!(
            client.enable_static_hosting(&repo).await.expect("first"),
            HostingActivation::Enabled
        );
        assert_eq!(
            client.enable_static_hosting(&repo).await.expect("second"),
            HostingActivation::AlreadyEnabled
        );
    }
}
