//! In-memory fakes for the provider and confirmation seams (testing only)
//!
//! `MemoryStackProvider` keeps stack state in a map and records every call
//! so tests can assert on ordering; failures are scripted with builder
//! methods. `ScriptedConfirm` answers the confirmation prompt with a fixed
//! reply.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::confirm::Confirm;
use crate::provider::{ProviderError, ProviderResult, StackProvider};
use crate::stack::{project_stacks, LingeringResources, StackRole, StackStatus};

// ---------------------------------------------------------------------------
// MemoryStackProvider
// ---------------------------------------------------------------------------

/// One recorded call against [`MemoryStackProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Preflight,
    Status(String),
    Outputs(String),
    DestroyAll(Vec<String>),
    Destroy(String),
    Lingering(String),
}

/// How a scripted per-stack destroy fails.
#[derive(Debug, Clone, Copy)]
enum DestroyFailure {
    Times(u32),
    Always,
}

#[derive(Debug, Default)]
struct ProviderState {
    stacks: BTreeMap<String, StackStatus>,
    outputs: HashMap<String, BTreeMap<String, String>>,
    lingering: HashMap<String, LingeringResources>,

    preflight_error: Option<PreflightFailure>,
    bulk_fails: bool,
    destroy_failures: HashMap<String, DestroyFailure>,
    status_failures: HashSet<String>,

    /// Status checks each stack keeps reporting `InProgress` after deletion.
    deletion_lag: HashMap<String, u32>,
    /// Remaining lag for stacks currently being deleted.
    deleting: HashMap<String, u32>,

    calls: Vec<ProviderCall>,
}

#[derive(Debug, Clone)]
enum PreflightFailure {
    MissingTool(String),
    Credentials(String),
}

impl ProviderState {
    fn mark_deleted(&mut self, stack: &str) {
        if !self.stacks.contains_key(stack) {
            return;
        }
        match self.deletion_lag.get(stack).copied() {
            Some(lag) if lag > 0 => {
                self.stacks
                    .insert(stack.to_string(), StackStatus::InProgress);
                self.deleting.insert(stack.to_string(), lag);
            }
            _ => {
                self.stacks.remove(stack);
            }
        }
    }
}

/// In-memory stack provider with scriptable failures.
#[derive(Debug, Default)]
pub struct MemoryStackProvider {
    state: Mutex<ProviderState>,
}

impl MemoryStackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut ProviderState {
        self.state.get_mut().unwrap()
    }

    /// Add a stack with the given status.
    pub fn with_stack(mut self, stack: &str, status: StackStatus) -> Self {
        self.state_mut().stacks.insert(stack.to_string(), status);
        self
    }

    /// Add every stack of a deployed project.
    pub fn with_project(mut self, project: &str, database: bool) -> Self {
        for stack in project_stacks(project) {
            if stack.role == StackRole::Database && !database {
                continue;
            }
            self.state_mut()
                .stacks
                .insert(stack.name, StackStatus::Created);
        }
        self
    }

    pub fn with_outputs(mut self, stack: &str, outputs: &[(&str, &str)]) -> Self {
        let map = outputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state_mut().outputs.insert(stack.to_string(), map);
        self
    }

    /// Resources reported by the lingering-resource probe for `stack`.
    pub fn with_lingering(mut self, stack: &str, resources: LingeringResources) -> Self {
        self.state_mut()
            .lingering
            .insert(stack.to_string(), resources);
        self
    }

    /// Keep reporting `stack` as in progress for `polls` status checks after
    /// it was destroyed.
    pub fn with_deletion_lag(mut self, stack: &str, polls: u32) -> Self {
        self.state_mut()
            .deletion_lag
            .insert(stack.to_string(), polls);
        self
    }

    pub fn fail_preflight_missing_tool(mut self, tool: &str) -> Self {
        self.state_mut().preflight_error = Some(PreflightFailure::MissingTool(tool.to_string()));
        self
    }

    pub fn fail_preflight_credentials(mut self, message: &str) -> Self {
        self.state_mut().preflight_error =
            Some(PreflightFailure::Credentials(message.to_string()));
        self
    }

    pub fn fail_bulk_destroy(mut self) -> Self {
        self.state_mut().bulk_fails = true;
        self
    }

    /// Fail the first `times` per-stack destroys of `stack`.
    pub fn fail_destroy(mut self, stack: &str, times: u32) -> Self {
        self.state_mut()
            .destroy_failures
            .insert(stack.to_string(), DestroyFailure::Times(times));
        self
    }

    pub fn fail_destroy_always(mut self, stack: &str) -> Self {
        self.state_mut()
            .destroy_failures
            .insert(stack.to_string(), DestroyFailure::Always);
        self
    }

    /// Make every status lookup of `stack` fail.
    pub fn fail_status_lookup(mut self, stack: &str) -> Self {
        self.state_mut().status_failures.insert(stack.to_string());
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Stacks passed to per-stack destroy, in call order.
    pub fn destroy_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Destroy(stack) => Some(stack),
                _ => None,
            })
            .collect()
    }

    /// Stack lists passed to bulk destroy, in call order.
    pub fn destroy_all_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::DestroyAll(stacks) => Some(stacks),
                _ => None,
            })
            .collect()
    }

    /// Number of status lookups made for `stack`.
    pub fn status_calls(&self, stack: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Status(s) if s == stack))
            .count()
    }

    /// Stacks that currently exist.
    pub fn existing_stacks(&self) -> Vec<String> {
        self.state.lock().unwrap().stacks.keys().cloned().collect()
    }
}

#[async_trait]
impl StackProvider for MemoryStackProvider {
    async fn preflight(&self) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Preflight);
        match state.preflight_error.clone() {
            None => Ok(()),
            Some(PreflightFailure::MissingTool(tool)) => Err(ProviderError::CommandNotFound(tool)),
            Some(PreflightFailure::Credentials(msg)) => Err(ProviderError::Credentials(msg)),
        }
    }

    async fn stack_status(&self, stack: &str) -> ProviderResult<StackStatus> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Status(stack.to_string()));

        if state.status_failures.contains(stack) {
            return Err(ProviderError::CommandFailed {
                command: format!("describe-stacks {}", stack),
                code: Some(255),
                stderr: "throttled".to_string(),
            });
        }

        if let Some(remaining) = state.deleting.get_mut(stack) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(StackStatus::InProgress);
            }
            state.deleting.remove(stack);
            state.stacks.remove(stack);
            return Ok(StackStatus::Absent);
        }

        Ok(state
            .stacks
            .get(stack)
            .copied()
            .unwrap_or(StackStatus::Absent))
    }

    async fn stack_outputs(&self, stack: &str) -> ProviderResult<BTreeMap<String, String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Outputs(stack.to_string()));
        if !state.stacks.contains_key(stack) {
            return Err(ProviderError::StackNotFound(stack.to_string()));
        }
        Ok(state.outputs.get(stack).cloned().unwrap_or_default())
    }

    async fn destroy_all(&self, stacks: &[String]) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::DestroyAll(stacks.to_vec()));
        if state.bulk_fails {
            return Err(ProviderError::CommandFailed {
                command: "cdk destroy --all".to_string(),
                code: Some(1),
                stderr: "stack deletion failed".to_string(),
            });
        }
        for stack in stacks {
            state.mark_deleted(stack);
        }
        Ok(())
    }

    async fn destroy_stack(&self, stack: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Destroy(stack.to_string()));

        let fail = match state.destroy_failures.get_mut(stack) {
            Some(DestroyFailure::Always) => true,
            Some(DestroyFailure::Times(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if fail {
            return Err(ProviderError::CommandFailed {
                command: format!("delete-stack {}", stack),
                code: Some(255),
                stderr: "resource has a dependent object".to_string(),
            });
        }

        state.mark_deleted(stack);
        Ok(())
    }

    async fn lingering_resources(&self, stack: &str) -> ProviderResult<LingeringResources> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Lingering(stack.to_string()));
        Ok(state.lingering.get(stack).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// ScriptedConfirm
// ---------------------------------------------------------------------------

/// Confirmation source that always answers with the same reply.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    reply: String,
    prompts: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedConfirm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(project, stacks)` for each prompt shown.
    pub fn prompts(&self) -> Vec<(String, Vec<String>)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn request(&self, project: &str, stacks: &[String]) -> std::io::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((project.to_string(), stacks.to_vec()));
        Ok(self.reply.clone())
    }
}
