//! Fortune backend that runs the `fortune` executable.

use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use super::backend::{FortuneBackend, FortuneResponse, SearchResponse};
use super::options::FortuneOptions;
use crate::error::{FortuneError, Result};

/// Runs the fortune program found at a configured path.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    /// Path or name of the fortune executable
    program: String,
}

impl CommandBackend {
    /// Create a backend for the executable at `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        debug!(command = %self.program, args = ?args, "Running fortune");

        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let combined = combined_output(&output);
            error!(
                command = %self.program,
                args = ?args,
                status = %output.status,
                output = %combined,
                "Fortune command failed"
            );
            return Err(FortuneError::CommandFailed {
                status: output.status,
                output: combined,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl FortuneBackend for CommandBackend {
    async fn fortune(&self, options: &FortuneOptions) -> Result<FortuneResponse> {
        let output = self.run(&options.to_args()).await?;
        parse_fortune(&combined_output(&output), options.show_cookie)
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let output = self.run(&["-f".to_string()]).await?;
        Ok(parse_file_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn search(&self, pattern: &str, mut options: FortuneOptions) -> Result<SearchResponse> {
        if pattern.is_empty() {
            return Err(FortuneError::MissingPattern);
        }

        options.pattern = Some(pattern.to_string());
        let output = self.run(&options.to_args()).await?;
        Ok(parse_search_results(&combined_output(&output)))
    }
}

/// Stdout followed by stderr, lossily decoded.
fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

/// Parse a single fortune, splitting off the `(cookie)` trailer if asked to.
fn parse_fortune(output: &str, show_cookie: bool) -> Result<FortuneResponse> {
    let fortune = output.trim();
    if fortune.is_empty() {
        return Err(FortuneError::EmptyOutput);
    }

    if show_cookie {
        if let Some((text, last)) = fortune.rsplit_once('\n') {
            if last.contains('(') {
                return Ok(FortuneResponse {
                    fortune: text.to_string(),
                    source_file: Some(last.trim_matches(['(', ')']).to_string()),
                });
            }
        }
    }

    Ok(FortuneResponse::new(fortune))
}

/// One entry per non-blank line of `fortune -f` output.
fn parse_file_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fortunes in search output are separated by blank lines.
fn parse_search_results(output: &str) -> SearchResponse {
    let matches = output
        .split("\n\n")
        .map(str::trim)
        .filter(|fortune| !fortune.is_empty())
        .map(FortuneResponse::new)
        .collect();

    SearchResponse::new(matches)
}
