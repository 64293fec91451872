//! Operator confirmation for destructive runs.
//!
//! The operator must type the literal token `DELETE` (case-sensitive).
//! Anything else, including end of input, cancels the teardown.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Token the operator must enter to proceed.
pub const CONFIRMATION_TOKEN: &str = "DELETE";

/// Source of the operator's answer.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Present the stacks about to be destroyed and return the raw reply.
    async fn request(&self, project: &str, stacks: &[String]) -> std::io::Result<String>;
}

/// Whether a reply authorises the teardown.
pub fn is_confirmed(reply: &str) -> bool {
    reply.trim() == CONFIRMATION_TOKEN
}

/// Interactive confirmation on the terminal.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl StdinConfirm {
    pub fn new() -> Self {
        Self
    }
}

/// The prompt shown before a destructive run.
pub fn render_prompt(project: &str, stacks: &[String]) -> String {
    let mut prompt = format!("This will permanently destroy project '{}':\n", project);
    if stacks.is_empty() {
        prompt.push_str("  (no stacks found; only local artifacts will be removed)\n");
    } else {
        for stack in stacks {
            prompt.push_str(&format!("  - {}\n", stack));
        }
    }
    prompt.push_str(&format!("Type {} to continue: ", CONFIRMATION_TOKEN));
    prompt
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn request(&self, project: &str, stacks: &[String]) -> std::io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(render_prompt(project, stacks).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exact_token_confirms() {
        assert!(is_confirmed("DELETE"));
        assert!(is_confirmed("DELETE\n"));
        assert!(is_confirmed("  DELETE  "));

        for reply in ["", "delete", "Delete", "DELETE!", "yes", "y", "DEL ETE", "\n"] {
            assert!(!is_confirmed(reply), "{reply:?} must not confirm");
        }
    }

    #[test]
    fn test_prompt_lists_stacks() {
        let prompt = render_prompt(
            "demo",
            &["demo-compute".to_string(), "demo-networking".to_string()],
        );
        assert!(prompt.contains("demo-compute"));
        assert!(prompt.contains("demo-networking"));
        assert!(prompt.ends_with("Type DELETE to continue: "));
    }

    #[test]
    fn test_prompt_without_stacks() {
        let prompt = render_prompt("demo", &[]);
        assert!(prompt.contains("no stacks found"));
    }
}
