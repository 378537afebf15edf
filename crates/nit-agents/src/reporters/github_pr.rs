//! GitHub PR reporter: branch, commit, push, open a pull request with
//! the generated tests. Prefers the `gh` CLI; falls back to the REST
//! API when a token is available.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use nit_adapters::process::{run_tool, which};
use nit_core::{Agent, TaskInput, TaskOutput};

use crate::orchestrator::RunSummary;

pub struct GithubPrReporter {
    project_root: PathBuf,
}

impl GithubPrReporter {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    async fn git(&self, args: &[&str]) -> Result<String, String> {
        let output = run_tool("git", args, &self.project_root, 120)
            .await
            .map_err(|e| e.to_string())?;
        if output.exit_code != 0 {
            return Err(format!("git {} failed: {}", args.join(" "), output.stderr));
        }
        Ok(output.stdout)
    }

    fn pr_body(summary: &RunSummary, files: &[String]) -> String {
        let mut body = format!(
            "## Generated tests\n\n- Targets: {}\n- Succeeded: {}\n- Failed: {}\n- Tokens used: {}\n\n### Files\n",
            summary.targets, summary.succeeded, summary.failed, summary.tokens_used
        );
        for file in files {
            body.push_str(&format!("- `{file}`\n"));
        }
        if !summary.errors.is_empty() {
            body.push_str("\n### Skipped targets\n");
            for error in summary.errors.iter().take(10) {
                body.push_str(&format!("- {error}\n"));
            }
        }
        body
    }

    async fn open_pr_with_gh(&self, branch: &str, title: &str, body: &str) -> Result<String, String> {
        let output = run_tool(
            "gh",
            &["pr", "create", "--head", branch, "--title", title, "--body", body],
            &self.project_root,
            120,
        )
        .await
        .map_err(|e| e.to_string())?;
        if output.exit_code != 0 {
            return Err(format!("gh pr create failed: {}", output.stderr));
        }
        Ok(output.stdout.trim().to_string())
    }

    async fn open_pr_with_api(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String, String> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| "GITHUB_TOKEN not set")?;
        let remote = self.git(&["remote", "get-url", "origin"]).await?;
        let repo = remote
            .trim()
            .trim_end_matches(".git")
            .rsplit(['/', ':'])
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("/");
        let base = self
            .git(&["symbolic-ref", "refs/remotes/origin/HEAD", "--short"])
            .await
            .map(|s| s.trim().trim_start_matches("origin/").to_string())
            .unwrap_or_else(|_| "main".into());

        let response = reqwest::Client::new()
            .post(format!("https://api.github.com/repos/{repo}/pulls"))
            .header("Authorization", format!("Bearer {token}"))
            .header("User-Agent", "nit-r")
            .header("Accept", "application/vnd.github+json")
            .json(&json!({ "title": title, "head": branch, "base": base, "body": body }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("GitHub API returned HTTP {}", response.status()));
        }
        let created: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(created
            .get("html_url")
            .and_then(|u| u.as_str())
            .unwrap_or("")
            .to_string())
    }

    /// Create the PR for a set of generated files. Errors are returned
    /// for logging but callers treat them as non-fatal.
    pub async fn publish(&self, summary: &RunSummary, files: &[String]) -> Result<String, String> {
        if files.is_empty() {
            return Err("no generated files to publish".into());
        }
        let branch = format!("nit/generated-tests-{}", chrono::Utc::now().timestamp());
        let title = format!("Add generated tests ({} files)", files.len());
        let body = Self::pr_body(summary, files);

        self.git(&["checkout", "-b", &branch]).await?;
        let mut add_args = vec!["add"];
        add_args.extend(files.iter().map(String::as_str));
        self.git(&add_args).await?;
        self.git(&["commit", "-m", &title]).await?;
        self.git(&["push", "-u", "origin", &branch]).await?;

        let url = if which("gh").is_some() {
            self.open_pr_with_gh(&branch, &title, &body).await?
        } else {
            self.open_pr_with_api(&branch, &title, &body).await?
        };
        info!("opened pull request: {url}");
        Ok(url)
    }
}

#[async_trait]
impl Agent for GithubPrReporter {
    fn name(&self) -> &str {
        "github-pr-reporter"
    }

    fn description(&self) -> &str {
        "Open a pull request containing the generated tests"
    }

    async fn run(&self, task: TaskInput) -> TaskOutput {
        let summary: RunSummary = match task
            .context
            .get("summary")
            .cloned()
            .map(serde_json::from_value)
        {
            Some(Ok(summary)) => summary,
            _ => RunSummary::default(),
        };
        let files: Vec<String> = task
            .context
            .get("files")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|f| f.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        match self.publish(&summary, &files).await {
            Ok(url) => TaskOutput::completed(json!({ "pr_url": url })),
            Err(e) => {
                // Reporter failures never abort a run.
                warn!("PR publication failed: {e}");
                TaskOutput::completed(json!({ "pr_url": null, "error": e }))
            }
        }
    }
}
