//! Typed views of the AWS CLI's JSON output.
//!
//! Only the fields the provider reads are modelled; everything else in the
//! responses is ignored.

use serde::Deserialize;

/// `aws cloudformation describe-stacks`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStacksResponse {
    #[serde(default)]
    pub stacks: Vec<StackDescription>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub stack_name: String,
    pub stack_status: String,

    #[serde(default)]
    pub stack_status_reason: Option<String>,

    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    pub output_key: String,
    pub output_value: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// `aws cloudformation describe-stack-resources`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStackResourcesResponse {
    #[serde(default)]
    pub stack_resources: Vec<StackResource>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StackResource {
    pub logical_resource_id: String,

    #[serde(default)]
    pub physical_resource_id: Option<String>,

    pub resource_type: String,
    pub resource_status: String,
}

/// `aws ec2 describe-instances`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesResponse {
    #[serde(default)]
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub instance_id: String,
    pub state: InstanceState,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub name: String,
}

/// `aws ec2 describe-network-interfaces`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeNetworkInterfacesResponse {
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkInterface {
    pub network_interface_id: String,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// `aws sts get-caller-identity`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,

    #[serde(default)]
    pub user_id: Option<String>,
}
