//! GitHub REST adapter for the content store port.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::application::repos::{
    ContentStore, CreateRepository, HostingActivation, PutContent, RemoteFile, StoreError,
};
use crate::config::{GithubSettings, Secret};
use crate::domain::publish::RepositoryHandle;
use crate::infra::error::InfraError;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct RepositoryBody {
    name: String,
    full_name: String,
    html_url: String,
}

impl From<RepositoryBody> for RepositoryHandle {
    fn from(body: RepositoryBody) -> Self {
        Self {
            name: body.name,
            full_name: body.full_name,
            html_url: body.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentBody {
    content: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Clone)]
pub struct GitHubContentStore {
    client: Client,
    base: Url,
    owner: String,
    token: Secret,
}

impl GitHubContentStore {
    pub fn new(settings: &GithubSettings) -> Result<Self, InfraError> {
        Self::with_base(
            settings.api_base.clone(),
            settings.owner.clone(),
            settings.token.clone(),
            settings.timeout,
        )
    }

    pub fn with_base(
        base: Url,
        owner: String,
        token: Secret,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self {
            client,
            base,
            owner,
            token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("pagesmith/", env!("CARGO_PKG_VERSION"))
    }

    fn url(&self, operation: &'static str, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::transport(operation, "api base cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(
        &self,
        operation: &'static str,
        repo: &str,
        rest: &[&str],
    ) -> Result<Url, StoreError> {
        let mut segments = vec!["repos", self.owner.as_str(), repo];
        segments.extend_from_slice(rest);
        self.url(operation, &segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.token.expose())
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::transport(operation, err))?;
        debug!(
            target = "pagesmith::github",
            operation,
            status = response.status().as_u16(),
            "github responded"
        );
        Ok(response)
    }

    async fn failure(operation: &'static str, response: Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::status(operation, status, body)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, StoreError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|err| StoreError::transport(operation, err))?;
        serde_json::from_slice(&bytes).map_err(|err| StoreError::decode(operation, err))
    }
}

#[async_trait]
impl ContentStore for GitHubContentStore {
    async fn create_repository(&self, name: &str) -> Result<CreateRepository, StoreError> {
        const OP: &str = "create_repository";
        let url = self.url(OP, &["user", "repos"])?;
        let body = json!({
            "name": name,
            "private": false,
            "auto_init": false,
        });
        let response = Self::send(OP, self.request(Method::POST, url).json(&body)).await?;

        match response.status() {
            StatusCode::UNPROCESSABLE_ENTITY => Ok(CreateRepository::AlreadyExists),
            status if status.is_success() => {
                let repo: RepositoryBody = Self::decode(OP, response).await?;
                Ok(CreateRepository::Created(repo.into()))
            }
            _ => Err(Self::failure(OP, response).await),
        }
    }

    async fn fetch_repository(&self, name: &str) -> Result<RepositoryHandle, StoreError> {
        const OP: &str = "fetch_repository";
        let url = self.repo_url(OP, name, &[])?;
        let response = Self::send(OP, self.request(Method::GET, url)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(OP, response).await);
        }
        let repo: RepositoryBody = Self::decode(OP, response).await?;
        Ok(repo.into())
    }

    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<RemoteFile>, StoreError> {
        const OP: &str = "get_content";
        let mut url = self.repo_url(OP, repo, &["contents", path])?;
        url.query_pairs_mut().append_pair("ref", branch);
        let response = Self::send(OP, self.request(Method::GET, url)).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ContentBody = Self::decode(OP, response).await?;
                Ok(Some(RemoteFile {
                    encoded_content: body.content,
                    sha: body.sha,
                }))
            }
            _ => Err(Self::failure(OP, response).await),
        }
    }

    async fn put_content(
        &self,
        repo: &str,
        path: &str,
        content: PutContent<'_>,
    ) -> Result<String, StoreError> {
        const OP: &str = "put_content";
        let url = self.repo_url(OP, repo, &["contents", path])?;
        let body = PutBody {
            message: content.message,
            content: &content.encoded_content,
            sha: content.sha,
            branch: content.branch,
        };
        let response = Self::send(OP, self.request(Method::PUT, url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(OP, response).await);
        }
        let body: PutResponse = Self::decode(OP, response).await?;
        Ok(body.commit.sha)
    }

    async fn enable_pages(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<HostingActivation, StoreError> {
        const OP: &str = "enable_pages";
        let url = self.repo_url(OP, repo, &["pages"])?;
        let body = json!({
            "source": { "branch": branch, "path": "/" },
        });
        let response = Self::send(OP, self.request(Method::POST, url).json(&body)).await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(HostingActivation::AlreadyEnabled),
            status if status.is_success() => Ok(HostingActivation::Enabled),
            _ => Err(Self::failure(OP, response).await),
        }
    }

    async fn branch_head(&self, repo: &str, branch: &str) -> Result<String, StoreError> {
        const OP: &str = "branch_head";
        let url = self.repo_url(OP, repo, &["commits", branch])?;
        let response = Self::send(OP, self.request(Method::GET, url)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(OP, response).await);
        }
        let commit: CommitRef = Self::decode(OP, response).await?;
        Ok(commit.sha)
    }
}
