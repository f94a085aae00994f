//! GitHub implementation of [`CodeHost`].
//!
//! Discovery uses one GraphQL query that returns both the pinned items and
//! the 100 most recently pushed repositories the user owns. Everything else
//! goes through the REST API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | ref → SHA | `GET /repos/{owner}/{repo}/git/ref/heads/{branch}` |
//! | tree | `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1` |
//! | content | `GET /repos/{owner}/{repo}/contents/{path}?ref={ref}` |
//!
//! Requests carry `Authorization: Bearer <token>` when a token is configured.
//! GitHub rejects anonymous GraphQL, so discovery needs one.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::host::{CodeHost, HostedRepo, UserRepositories};

const USER_REPOS_QUERY: &str = r#"
query($login: String!) {
  user(login: $login) {
    pinnedItems(first: 6, types: REPOSITORY) {
      nodes { ... on Repository { ...RepoFields } }
    }
    repositories(first: 100, ownerAffiliations: OWNER, orderBy: {field: PUSHED_AT, direction: DESC}) {
      nodes { ...RepoFields }
    }
  }
}
fragment RepoFields on Repository {
  nameWithOwner
  name
  isFork
  stargazerCount
  owner { login }
  defaultBranchRef { name }
  primaryLanguage { name }
}
"#;

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(auth: &AuthConfig, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(auth.api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid auth.api_url: {}", auth.api_url))?;
        let token = Some(auth.github_token.trim().to_string()).filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!("no GitHub token configured; discovery requires one");
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ghp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("auth.api_url cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let shown = url.to_string();
        let resp = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", shown))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GitHub API error {} for {}: {}", status, shown, body.trim());
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn user_repositories(&self, handle: &str) -> Result<UserRepositories> {
        let url = self.endpoint(&["graphql"])?;
        let body = serde_json::json!({
            "query": USER_REPOS_QUERY,
            "variables": { "login": handle },
        });

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .context("GraphQL request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("GitHub GraphQL error {}: {}", status, text.trim());
        }

        let json: serde_json::Value = resp.json().await?;
        parse_user_repositories(json, handle)
    }

    async fn commit_sha(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let reference = format!("heads/{}", branch);
        let mut segments = vec!["repos", owner, repo, "git", "ref"];
        segments.extend(reference.split('/'));
        let url = self.endpoint(&segments)?;

        let git_ref: GitRef = self.get_json(url).await?;
        Ok(git_ref.object.sha)
    }

    async fn list_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<Vec<String>> {
        let mut url = self.endpoint(&["repos", owner, repo, "git", "trees", sha])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: GitTree = self.get_json(url).await?;
        if tree.truncated {
            tracing::warn!(owner, repo, "tree listing truncated by GitHub");
        }
        Ok(blob_paths(tree))
    }

    async fn read_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        let mut segments = vec!["repos", owner, repo, "contents"];
        segments.extend(path.split('/'));
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        let content: ContentResponse = self.get_json(url).await?;
        decode_content(&content).with_context(|| format!("decoding {}/{}:{}", owner, repo, path))
    }
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RepoNode {
    #[serde(default)]
    name_with_owner: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_fork: bool,
    #[serde(default)]
    stargazer_count: Option<u32>,
    #[serde(default)]
    owner: Option<Login>,
    #[serde(default)]
    default_branch_ref: Option<Named>,
    #[serde(default)]
    primary_language: Option<Named>,
}

#[derive(Deserialize)]
struct Login {
    login: String,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct NodeList {
    #[serde(default)]
    nodes: Vec<Option<RepoNode>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    pinned_items: NodeList,
    repositories: NodeList,
}

impl From<RepoNode> for HostedRepo {
    fn from(node: RepoNode) -> Self {
        HostedRepo {
            name_with_owner: node.name_with_owner,
            owner: node.owner.map(|o| o.login).unwrap_or_default(),
            name: node.name,
            default_branch: node.default_branch_ref.map(|r| r.name),
            stars: node.stargazer_count,
            is_fork: node.is_fork,
            language: node.primary_language.map(|l| l.name),
        }
    }
}

fn parse_user_repositories(json: serde_json::Value, handle: &str) -> Result<UserRepositories> {
    let user = json.get("data").and_then(|d| d.get("user")).cloned();
    let user = match user {
        Some(u) if !u.is_null() => u,
        _ => {
            let messages: Vec<String> = json
                .get("errors")
                .and_then(|e| e.as_array())
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if messages.is_empty() {
                bail!("GitHub user @{} not found", handle);
            }
            bail!("GraphQL query failed: {}", messages.join("; "));
        }
    };

    let user: UserNode = serde_json::from_value(user).context("Unexpected GraphQL response")?;
    let collect = |list: NodeList| -> Vec<HostedRepo> {
        list.nodes.into_iter().flatten().map(HostedRepo::from).collect()
    };

    Ok(UserRepositories {
        pinned: collect(user.pinned_items),
        recent: collect(user.repositories),
    })
}

fn blob_paths(tree: GitTree) -> Vec<String> {
    tree.tree
        .into_iter()
        .filter(|entry| entry.kind == "blob")
        .map(|entry| entry.path)
        .collect()
}

fn decode_content(content: &ContentResponse) -> Result<String> {
    match content.encoding.as_str() {
        "base64" => {
            let compact: String = content
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "" | "utf-8" => Ok(content.content.clone()),
        // Files above 1 MB come back with encoding "none" and no body.
        other => bail!("unsupported content encoding '{}'", other),
    }
}
