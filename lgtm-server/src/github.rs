use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, Method, StatusCode, Url};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info};

use lgtm_core::{CommentId, Login, TreeHash};

use crate::collaborators::{
    ChangedFileProvider, CommentStore, CommitTreeProvider, LabelStore, OwnershipProvider,
    PullRequestRef, RemoteComment,
};
use crate::http_log::LoggingMiddleware;

const PER_PAGE: usize = 100;

pub struct GitHubClient {
    client: ClientWithMiddleware,
    api_base: String,
    token: String,
    bot_login: OnceCell<Login>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateCommentRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
struct AddLabelsRequest<'a> {
    labels: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: CommentUser,
}

#[derive(Debug, Deserialize)]
pub struct CommentUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct GitCommitResponse {
    tree: GitTree,
}

#[derive(Debug, Deserialize)]
struct GitTree {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct FileContentsResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestResponse {
    pub number: u64,
    pub state: String,
    pub user: CommentUser,
    pub head: PullRequestRefResponse,
    pub base: PullRequestRefResponse,
}

impl PullRequestResponse {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRefResponse {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

impl GitHubClient {
    /// `bot_login` skips the `GET /user` lookup when the login is already known.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        bot_login: Option<String>,
    ) -> Self {
        let cell = OnceCell::new();
        if let Some(login) = bot_login {
            // A fresh cell cannot already be set.
            let _ = cell.set(Login::new(&login));
        }

        Self {
            client: create_github_client(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            bot_login: cell,
        }
    }

    /// Build an API URL from path segments, percent-encoding each one.
    fn api_url<I, S>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = Url::parse(&self.api_base)
            .with_context(|| format!("Invalid GitHub API URL: {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL cannot be a base: {}", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, pr: &PullRequestRef, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos", pr.owner.as_str(), pr.repo.as_str()];
        segments.extend_from_slice(rest);
        self.api_url(segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    fn json_request<T: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: &T,
    ) -> Result<RequestBuilder> {
        Ok(self
            .request(method, url)
            .body(serde_json::to_string(body)?)
            .header("Content-Type", "application/json"))
    }

    pub async fn get_authenticated_user(&self) -> Result<String> {
        let url = self.api_url(["user"])?;

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("Failed to send user request")?;
        let response = error_for_status(response, "fetching authenticated user").await?;

        let user: UserResponse = response
            .json()
            .await
            .context("Failed to parse user response")?;
        info!("Authenticated as {}", user.login);
        Ok(user.login)
    }

    pub async fn get_pr_comments(&self, pr: &PullRequestRef) -> Result<Vec<Comment>> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["issues", number.as_str(), "comments"])?;

        info!("Fetching comments for {}", pr);
        let comments: Vec<Comment> = self.get_all_pages(url, "fetching comments").await?;
        info!("Found {} total comments on {}", comments.len(), pr);
        Ok(comments)
    }

    pub async fn post_pr_comment(
        &self,
        pr: &PullRequestRef,
        comment_body: &str,
    ) -> Result<Comment> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["issues", number.as_str(), "comments"])?;

        info!("Posting comment to {}", pr);

        let request_body = CreateCommentRequest {
            body: comment_body.to_string(),
        };
        let response = self
            .json_request(Method::POST, url, &request_body)?
            .send()
            .await
            .context("Failed to send PR comment request")?;
        let response = error_for_status(response, "posting comment").await?;

        let comment: Comment = response
            .json()
            .await
            .context("Failed to parse comment response")?;
        info!("Successfully posted comment with ID: {}", comment.id);
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        pr: &PullRequestRef,
        comment_id: u64,
        comment_body: &str,
    ) -> Result<Comment> {
        let id = comment_id.to_string();
        let url = self.repo_url(pr, &["issues", "comments", id.as_str()])?;

        info!("Updating comment {} on {}", comment_id, pr);

        let request_body = UpdateCommentRequest {
            body: comment_body.to_string(),
        };
        let response = self
            .json_request(Method::PATCH, url, &request_body)?
            .send()
            .await
            .context("Failed to send update comment request")?;
        let response = error_for_status(response, "updating comment").await?;

        let comment: Comment = response
            .json()
            .await
            .context("Failed to parse updated comment response")?;
        info!("Successfully updated comment with ID: {}", comment.id);
        Ok(comment)
    }

    pub async fn get_labels(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["issues", number.as_str(), "labels"])?;

        let labels: Vec<LabelResponse> = self.get_all_pages(url, "fetching labels").await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    pub async fn add_label(&self, pr: &PullRequestRef, label: &str) -> Result<()> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["issues", number.as_str(), "labels"])?;

        info!("Adding label {:?} to {}", label, pr);

        let response = self
            .json_request(Method::POST, url, &AddLabelsRequest { labels: [label] })?
            .send()
            .await
            .context("Failed to send add label request")?;
        error_for_status(response, "adding label").await?;
        Ok(())
    }

    /// Removing a label that is not on the PR succeeds.
    pub async fn remove_label(&self, pr: &PullRequestRef, label: &str) -> Result<()> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["issues", number.as_str(), "labels", label])?;

        info!("Removing label {:?} from {}", label, pr);

        let response = self
            .request(Method::DELETE, url)
            .send()
            .await
            .context("Failed to send remove label request")?;
        if response.status() == StatusCode::NOT_FOUND {
            info!("Label {:?} was not on {}", label, pr);
            return Ok(());
        }
        error_for_status(response, "removing label").await?;
        Ok(())
    }

    pub async fn get_pr_files(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["pulls", number.as_str(), "files"])?;

        let files: Vec<PullRequestFile> = self.get_all_pages(url, "fetching PR files").await?;
        info!("Found {} changed files on {}", files.len(), pr);
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    pub async fn get_tree_hash(&self, pr: &PullRequestRef, commit_sha: &str) -> Result<String> {
        let url = self.repo_url(pr, &["git", "commits", commit_sha])?;

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("Failed to send git commit request")?;
        let response = error_for_status(response, "fetching commit").await?;

        let commit: GitCommitResponse = response
            .json()
            .await
            .context("Failed to parse git commit response")?;
        Ok(commit.tree.sha)
    }

    /// Contents of `file_path` at `git_ref`, or `None` if the file does not exist.
    pub async fn get_file_contents(
        &self,
        pr: &PullRequestRef,
        file_path: &str,
        git_ref: &str,
    ) -> Result<Option<String>> {
        let mut segments = vec!["repos", pr.owner.as_str(), pr.repo.as_str(), "contents"];
        segments.extend(file_path.split('/').filter(|s| !s.is_empty()));
        let url = self.api_url(segments)?;

        info!("Fetching file contents: {} at {}", file_path, git_ref);

        let response = self
            .request(Method::GET, url)
            .query(&[("ref", git_ref)])
            .send()
            .await
            .context("Failed to send file contents request")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response, "fetching file").await?;

        let file_response: FileContentsResponse = response
            .json()
            .await
            .context("Failed to parse file contents response")?;

        let decoded = general_purpose::STANDARD
            .decode(file_response.content.replace('\n', ""))
            .context("Failed to decode base64 file content")?;
        let content_str = String::from_utf8(decoded).context("File content is not valid UTF-8")?;
        Ok(Some(content_str))
    }

    pub async fn get_pull_request(&self, pr: &PullRequestRef) -> Result<PullRequestResponse> {
        let number = pr.number.to_string();
        let url = self.repo_url(pr, &["pulls", number.as_str()])?;

        info!("Fetching {}", pr);

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .context("Failed to send get pull request request")?;
        let response = error_for_status(response, "fetching PR").await?;

        let pr_response: PullRequestResponse = response
            .json()
            .await
            .context("Failed to parse pull request response")?;

        info!(
            "Successfully fetched PR #{} (head: {}, base: {})",
            pr_response.number, pr_response.head.sha, pr_response.base.ref_name
        );
        Ok(pr_response)
    }

    /// Follow `page=` pagination until a short page comes back.
    async fn get_all_pages<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        action: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .request(Method::GET, url.clone())
                .query(&[("page", page), ("per_page", PER_PAGE)])
                .send()
                .await
                .with_context(|| format!("Failed to send request while {}", action))?;
            let response = error_for_status(response, action).await?;

            let batch: Vec<T> = response
                .json()
                .await
                .with_context(|| format!("Failed to parse response while {}", action))?;
            let count = batch.len();
            items.extend(batch);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

async fn error_for_status(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .context("Failed to read error response body")?;
    error!("GitHub API error {}: {} - {}", action, status, error_text);
    Err(anyhow!(
        "GitHub API error {}: {} - {}",
        action,
        status,
        error_text
    ))
}

pub fn create_github_client() -> ClientWithMiddleware {
    use reqwest_middleware::ClientBuilder;

    let client = Client::builder()
        .user_agent(concat!("lgtm-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new());

    ClientBuilder::new(client).with(LoggingMiddleware).build()
}

#[async_trait]
impl CommentStore for GitHubClient {
    async fn bot_login(&self) -> Result<Login> {
        let login = self
            .bot_login
            .get_or_try_init(|| async {
                let login = self
                    .get_authenticated_user()
                    .await
                    .context("Failed to determine bot login")?;
                Ok::<_, anyhow::Error>(Login::new(&login))
            })
            .await?;
        Ok(login.clone())
    }

    async fn list_comments(&self, pr: &PullRequestRef) -> Result<Vec<RemoteComment>> {
        Ok(self
            .get_pr_comments(pr)
            .await?
            .into_iter()
            .map(|c| RemoteComment {
                id: CommentId(c.id),
                author: Login::new(&c.user.login),
                body: c.body,
            })
            .collect())
    }

    async fn create_comment(&self, pr: &PullRequestRef, body: &str) -> Result<CommentId> {
        let comment = self.post_pr_comment(pr, body).await?;
        Ok(CommentId(comment.id))
    }

    async fn update_comment(&self, pr: &PullRequestRef, id: CommentId, body: &str) -> Result<()> {
        GitHubClient::update_comment(self, pr, id.0, body).await?;
        Ok(())
    }
}

#[async_trait]
impl LabelStore for GitHubClient {
    async fn list_labels(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
        self.get_labels(pr).await
    }

    async fn add_label(&self, pr: &PullRequestRef, label: &str) -> Result<()> {
        GitHubClient::add_label(self, pr, label).await
    }

    async fn remove_label(&self, pr: &PullRequestRef, label: &str) -> Result<()> {
        GitHubClient::remove_label(self, pr, label).await
    }
}

#[async_trait]
impl OwnershipProvider for GitHubClient {
    async fn owners_file(
        &self,
        pr: &PullRequestRef,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>> {
        self.get_file_contents(pr, path, git_ref).await
    }
}

#[async_trait]
impl ChangedFileProvider for GitHubClient {
    async fn changed_files(&self, pr: &PullRequestRef) -> Result<Vec<String>> {
        self.get_pr_files(pr).await
    }
}

#[async_trait]
impl CommitTreeProvider for GitHubClient {
    async fn tree_hash(&self, pr: &PullRequestRef, commit_sha: &str) -> Result<TreeHash> {
        self.get_tree_hash(pr, commit_sha).await.map(TreeHash)
    }
}
