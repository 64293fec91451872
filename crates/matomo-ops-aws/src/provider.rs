//! `StackProvider` backed by the `aws` and `cdk` command-line tools.

use std::collections::BTreeMap;

use async_trait::async_trait;
use matomo_ops_core::stack::UnknownStackStatus;
use matomo_ops_core::{
    LingeringResources, ProviderError, ProviderResult, StackProvider, StackStatus,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::config::AwsConfig;
use crate::responses::{
    CallerIdentity, DescribeInstancesResponse, DescribeNetworkInterfacesResponse,
    DescribeStackResourcesResponse, DescribeStacksResponse, StackDescription,
};

/// Stack output holding the VPC id.
pub const VPC_ID_OUTPUT: &str = "VpcId";

const VPC_RESOURCE_TYPE: &str = "AWS::EC2::VPC";

/// Instance states that still hold network interfaces in the VPC.
const LIVE_INSTANCE_STATES: &str = "pending,running,shutting-down,stopping,stopped";

/// Stack provider that shells out to the AWS CLI and the CDK CLI.
pub struct AwsCliProvider<R: CommandRunner = ProcessRunner> {
    config: AwsConfig,
    runner: R,
}

impl AwsCliProvider<ProcessRunner> {
    pub fn new(config: AwsConfig) -> Self {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R: CommandRunner> AwsCliProvider<R> {
    pub fn with_runner(config: AwsConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &AwsConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn aws<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
        CommandSpec::new(
            "aws",
            &self.config.project_dir,
            self.config.command_timeout,
        )
        .args(args)
        .args(["--output", "json"])
        .args(self.config.aws_flags())
    }

    fn cdk<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandSpec {
        let mut spec = CommandSpec::new(
            "cdk",
            &self.config.project_dir,
            self.config.destroy_timeout,
        )
        .args(args)
        .envs(self.config.cdk_env());
        if let Some(profile) = &self.config.profile {
            spec = spec.args(["--profile", profile.as_str()]);
        }
        spec
    }

    /// Run a command and require a zero exit code.
    async fn exec(&self, spec: &CommandSpec) -> ProviderResult<CommandOutput> {
        let output = self.runner.run(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProviderError::CommandFailed {
                command: spec.display(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    async fn json<T: DeserializeOwned>(&self, spec: &CommandSpec) -> ProviderResult<T> {
        let output = self.exec(spec).await?;
        serde_json::from_str(&output.stdout).map_err(|err| ProviderError::Parse {
            command: spec.display(),
            message: err.to_string(),
        })
    }

    /// Describe one stack; `None` if CloudFormation reports it missing.
    async fn describe_stack(
        &self,
        stack: &str,
    ) -> ProviderResult<Option<StackDescription>> {
        let spec = self.aws(["cloudformation", "describe-stacks", "--stack-name", stack]);
        match self.json::<DescribeStacksResponse>(&spec).await {
            Ok(response) => Ok(response.stacks.into_iter().next()),
            Err(ProviderError::CommandFailed { ref stderr, .. }) if is_missing_stack(stderr) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve the stack's VPC id from its outputs, then from its resources.
    async fn vpc_id(&self, stack: &str) -> ProviderResult<Option<String>> {
        match self.stack_outputs(stack).await {
            Ok(outputs) => {
                if let Some(vpc) = outputs.get(VPC_ID_OUTPUT) {
                    return Ok(Some(vpc.clone()));
                }
            }
            Err(err) => debug!(stack = %stack, error = %err, "outputs unavailable, checking resources"),
        }

        let spec = self.aws([
            "cloudformation",
            "describe-stack-resources",
            "--stack-name",
            stack,
        ]);
        let resources: DescribeStackResourcesResponse = self.json(&spec).await?;
        Ok(resources
            .stack_resources
            .into_iter()
            .find(|r| r.resource_type == VPC_RESOURCE_TYPE)
            .and_then(|r| r.physical_resource_id))
    }
}

/// CloudFormation's error text for a stack that does not exist.
fn is_missing_stack(stderr: &str) -> bool {
    stderr.contains("does not exist")
}

#[async_trait]
impl<R: CommandRunner> StackProvider for AwsCliProvider<R> {
    async fn preflight(&self) -> ProviderResult<()> {
        for tool in ["aws", "cdk"] {
            let spec = CommandSpec::new(
                tool,
                &self.config.project_dir,
                self.config.command_timeout,
            )
            .args(["--version"]);
            let output = self.exec(&spec).await?;
            debug!(tool = tool, version = %output.stdout.trim(), "tool available");
        }

        let spec = self.aws(["sts", "get-caller-identity"]);
        match self.json::<CallerIdentity>(&spec).await {
            Ok(identity) => {
                info!(account = %identity.account, arn = %identity.arn, "credentials valid");
                Ok(())
            }
            Err(ProviderError::CommandFailed { stderr, .. }) => {
                Err(ProviderError::Credentials(stderr))
            }
            Err(err) => Err(err),
        }
    }

    async fn stack_status(&self, stack: &str) -> ProviderResult<StackStatus> {
        let Some(description) = self.describe_stack(stack).await? else {
            return Ok(StackStatus::Absent);
        };
        description
            .stack_status
            .parse()
            .map_err(|err: UnknownStackStatus| ProviderError::Parse {
                command: "aws cloudformation describe-stacks".to_string(),
                message: err.to_string(),
            })
    }

    async fn stack_outputs(&self, stack: &str) -> ProviderResult<BTreeMap<String, String>> {
        let description = self
            .describe_stack(stack)
            .await?
            .ok_or_else(|| ProviderError::StackNotFound(stack.to_string()))?;
        Ok(description
            .outputs
            .into_iter()
            .map(|o| (o.output_key, o.output_value))
            .collect())
    }

    async fn destroy_all(&self, stacks: &[String]) -> ProviderResult<()> {
        let mut args = vec!["destroy", "--force"];
        args.extend(stacks.iter().map(String::as_str));
        let spec = self.cdk(args);

        info!(stacks = ?stacks, "running bulk destroy");
        self.exec(&spec).await?;
        Ok(())
    }

    async fn destroy_stack(&self, stack: &str) -> ProviderResult<()> {
        let delete = self.aws(["cloudformation", "delete-stack", "--stack-name", stack]);
        self.exec(&delete).await?;

        let mut wait = self.aws([
            "cloudformation",
            "wait",
            "stack-delete-complete",
            "--stack-name",
            stack,
        ]);
        wait.timeout = self.config.destroy_timeout;
        match self.exec(&wait).await {
            Ok(_) => Ok(()),
            // Already gone by the time the waiter looked.
            Err(ProviderError::CommandFailed { ref stderr, .. }) if is_missing_stack(stderr) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn lingering_resources(&self, stack: &str) -> ProviderResult<LingeringResources> {
        let Some(vpc_id) = self.vpc_id(stack).await? else {
            warn!(stack = %stack, "no VPC found for stack");
            return Ok(LingeringResources::default());
        };
        let vpc_filter = format!("Name=vpc-id,Values={}", vpc_id);
        let state_filter = format!("Name=instance-state-name,Values={}", LIVE_INSTANCE_STATES);

        let instances: DescribeInstancesResponse = self
            .json(&self.aws([
                "ec2",
                "describe-instances",
                "--filters",
                vpc_filter.as_str(),
                state_filter.as_str(),
            ]))
            .await?;
        let interfaces: DescribeNetworkInterfacesResponse = self
            .json(&self.aws([
                "ec2",
                "describe-network-interfaces",
                "--filters",
                vpc_filter.as_str(),
            ]))
            .await?;

        Ok(LingeringResources {
            instance_ids: instances
                .reservations
                .into_iter()
                .flat_map(|r| r.instances)
                .filter(|i| i.state.name != "terminated")
                .map(|i| i.instance_id)
                .collect(),
            network_interface_ids: interfaces
                .network_interfaces
                .into_iter()
                .map(|n| n.network_interface_id)
                .collect(),
            vpc_id: Some(vpc_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stack_detection() {
        assert!(is_missing_stack(
            "An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id demo-compute does not exist"
        ));
        assert!(!is_missing_stack("Rate exceeded"));
    }

    #[test]
    fn test_aws_spec_appends_output_and_flags() {
        let config = AwsConfig::new("/srv/matomo").with_region(Some("us-east-1".to_string()));
        let provider = AwsCliProvider::new(config);
        let spec = provider.aws(["sts", "get-caller-identity"]);
        assert_eq!(
            spec.display(),
            "aws sts get-caller-identity --output json --region us-east-1"
        );
    }

    #[test]
    fn test_cdk_spec_carries_region_env_and_profile() {
        let config = AwsConfig::new("/srv/matomo")
            .with_region(Some("us-east-1".to_string()))
            .with_profile(Some("ops".to_string()));
        let provider = AwsCliProvider::new(config);
        let spec = provider.cdk(["destroy", "--force", "demo-compute"]);
        assert_eq!(spec.display(), "cdk destroy --force demo-compute --profile ops");
        assert!(spec
            .envs
            .contains(&("AWS_REGION".to_string(), "us-east-1".to_string())));
    }
}
