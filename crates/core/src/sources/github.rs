use crate::error::IngestError;
use crate::models::{Document, SourceKind};
use crate::sources::{FetchReport, SkippedSource};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("rag-chat-core/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RepoInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    download_url: Option<String>,
}

/// Collects markdown documentation from every repository of one GitHub user.
pub struct GithubSource {
    client: Client,
    api_base: String,
    username: String,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(client: Client, username: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            username: username.into(),
            token,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, IngestError> {
        let mut request = self.client.get(url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {token}"));
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                details: format!("github api returned {}", response.status()),
            });
        }
        Ok(response.json().await?)
    }

    /// Lists repository names, following the API's pagination.
    pub async fn user_repos(&self) -> Result<Vec<String>, IngestError> {
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let url = format!(
                "{}/users/{}/repos?per_page=100&page={page}",
                self.api_base, self.username
            );
            let repos: Vec<RepoInfo> = self.get_json(&url).await?;
            if repos.is_empty() {
                break;
            }
            names.extend(repos.into_iter().map(|repo| repo.name));
            page += 1;
        }
        Ok(names)
    }

    /// Walks a repository's file tree and returns download URLs for every
    /// markdown file. A directory listing that fails is skipped silently;
    /// private or empty trees simply contribute nothing.
    pub async fn markdown_urls(&self, repo: &str) -> Result<Vec<String>, IngestError> {
        let mut urls = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(path) = pending.pop() {
            let url = format!(
                "{}/repos/{}/{repo}/contents/{path}",
                self.api_base, self.username
            );
            let entries: Vec<ContentEntry> = match self.get_json(&url).await {
                Ok(entries) => entries,
                Err(error) => {
                    debug!(repo, path = %path, %error, "skipping unreadable tree");
                    continue;
                }
            };

            for entry in entries {
                if entry.entry_type == "dir" {
                    pending.push(entry.path);
                } else if entry.entry_type == "file" && entry.name.ends_with(".md") {
                    if let Some(download_url) = entry.download_url {
                        urls.push(download_url);
                    }
                }
            }
        }

        Ok(urls)
    }

    async fn fetch_markdown(&self, url: &str) -> Result<Document, IngestError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IngestError::Fetch {
                url: url.to_string(),
                details: format!("download returned {}", response.status()),
            });
        }
        Ok(Document {
            text: response.text().await?,
            source: url.to_string(),
            kind: SourceKind::Github,
        })
    }

    /// Fetches every markdown file across all of the user's repositories.
    pub async fn load_all(&self) -> Result<FetchReport, IngestError> {
        let repos = self.user_repos().await?;
        info!(user = %self.username, repos = repos.len(), "scanning repositories");

        let mut markdown_urls = Vec::new();
        for repo in &repos {
            let urls = self.markdown_urls(repo).await?;
            debug!(repo = %repo, files = urls.len(), "collected markdown files");
            markdown_urls.extend(urls);
        }

        let mut report = FetchReport::default();
        for url in markdown_urls {
            match self.fetch_markdown(&url).await {
                Ok(document) => report.documents.push(document),
                Err(error) => {
                    warn!(url = %url, %error, "skipping markdown file");
                    report.skipped.push(SkippedSource {
                        source: url,
                        reason: error.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
