//! Control-plane backend that shells out to the `aws` command-line client.
//!
//! Credential resolution is left entirely to the client: we only forward
//! `--profile` when a named profile was selected.

use std::ffi::OsString;
use std::process::Command;

use anyhow::Context;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ControlPlane;
use crate::config::Provider;
use crate::types::{
    CapacityBounds, ContainerInstance, GroupMembership, HealthStatus, InstanceRecord,
    InstanceStatus, Page,
};

/// Runs `aws <service> <operation> ... --output json` and parses the result.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: OsString,
    leading_args: Vec<OsString>,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(provider: &Provider) -> Self {
        Self {
            program: OsString::from("aws"),
            leading_args: Vec::new(),
            profile: provider.profile().map(str::to_string),
        }
    }

    /// Use a different launcher, e.g. a pinned binary path or `sh <script>`.
    pub fn with_launcher<I, S>(mut self, program: impl Into<OsString>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    /// Profiles configured for the client (`aws configure list-profiles`).
    pub fn available_profiles(&self) -> anyhow::Result<Vec<String>> {
        let mut cmd = self.base_command();
        cmd.args(["configure", "list-profiles"]);
        let stdout = run(cmd, "aws configure list-profiles")?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd
    }

    fn command(&self, service: &str, operation: &str) -> Command {
        let mut cmd = self.base_command();
        cmd.arg(service).arg(operation);
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }
        cmd.args(["--output", "json"]);
        cmd
    }

    fn fetch<T: DeserializeOwned>(&self, cmd: Command, operation: &str) -> anyhow::Result<T> {
        let stdout = run(cmd, operation)?;
        serde_json::from_slice(&stdout)
            .with_context(|| format!("Failed to parse output of {}", operation))
    }
}

fn run(mut cmd: Command, operation: &str) -> anyhow::Result<Vec<u8>> {
    debug!(operation, "invoking aws cli");
    let output = cmd
        .output()
        .with_context(|| format!("Failed to invoke {}", operation))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed ({}): {}", operation, output.status, stderr.trim());
    }
    Ok(output.stdout)
}

fn with_starting_token(cmd: &mut Command, next_token: Option<&str>) {
    if let Some(token) = next_token {
        cmd.arg("--starting-token").arg(token);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListClustersOutput {
    #[serde(default)]
    cluster_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListContainerInstancesOutput {
    #[serde(default)]
    container_instance_arns: Vec<String>,
    #[serde(default, alias = "NextToken")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeContainerInstancesOutput {
    #[serde(default)]
    container_instances: Vec<EcsContainerInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsContainerInstance {
    ec2_instance_id: String,
    container_instance_arn: String,
    status: String,
    #[serde(default)]
    running_tasks_count: u32,
    #[serde(default)]
    pending_tasks_count: u32,
    #[serde(default)]
    agent_connected: bool,
}

impl From<EcsContainerInstance> for ContainerInstance {
    fn from(value: EcsContainerInstance) -> Self {
        ContainerInstance {
            record: InstanceRecord {
                compute_id: value.ec2_instance_id,
                scheduler_id: value.container_instance_arn,
                status: InstanceStatus::from(value.status),
                running_task_count: value.running_tasks_count,
                pending_task_count: value.pending_tasks_count,
            },
            agent_connected: value.agent_connected,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksOutput {
    #[serde(default)]
    task_arns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstanceStatusOutput {
    #[serde(default)]
    instance_statuses: Vec<Ec2InstanceStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2InstanceStatus {
    instance_status: Ec2StatusSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2StatusSummary {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAutoScalingGroupsOutput {
    #[serde(default)]
    auto_scaling_groups: Vec<AutoScalingGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AutoScalingGroup {
    min_size: i64,
    max_size: i64,
    desired_capacity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAutoScalingInstancesOutput {
    #[serde(default)]
    auto_scaling_instances: Vec<AutoScalingInstance>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AutoScalingInstance {
    instance_id: String,
    auto_scaling_group_name: String,
}

impl ControlPlane for AwsCli {
    fn list_clusters(&self) -> anyhow::Result<Vec<String>> {
        let cmd = self.command("ecs", "list-clusters");
        let output: ListClustersOutput = self.fetch(cmd, "ecs list-clusters")?;
        Ok(output.cluster_arns)
    }

    fn list_container_instances(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<String>> {
        let mut cmd = self.command("ecs", "list-container-instances");
        cmd.arg("--cluster").arg(cluster);
        with_starting_token(&mut cmd, next_token);
        let output: ListContainerInstancesOutput =
            self.fetch(cmd, "ecs list-container-instances")?;
        Ok(Page {
            items: output.container_instance_arns,
            next_token: output.next_token,
        })
    }

    fn describe_container_instance(
        &self,
        cluster: &str,
        scheduler_id: &str,
    ) -> anyhow::Result<Option<ContainerInstance>> {
        let mut cmd = self.command("ecs", "describe-container-instances");
        cmd.arg("--cluster")
            .arg(cluster)
            .arg("--container-instances")
            .arg(scheduler_id);
        let output: DescribeContainerInstancesOutput =
            self.fetch(cmd, "ecs describe-container-instances")?;
        Ok(output
            .container_instances
            .into_iter()
            .next()
            .map(ContainerInstance::from))
    }

    fn set_container_instance_status(
        &self,
        cluster: &str,
        scheduler_id: &str,
        status: &InstanceStatus,
    ) -> anyhow::Result<()> {
        if matches!(status, InstanceStatus::Other(_)) {
            anyhow::bail!("Refusing to set container instance status to {}", status);
        }
        let mut cmd = self.command("ecs", "update-container-instances-state");
        cmd.arg("--cluster")
            .arg(cluster)
            .arg("--container-instances")
            .arg(scheduler_id)
            .arg("--status")
            .arg(status.as_str());
        run(cmd, "ecs update-container-instances-state").map(|_| ())
    }

    fn list_running_tasks(
        &self,
        cluster: &str,
        scheduler_id: &str,
    ) -> anyhow::Result<Vec<String>> {
        let mut cmd = self.command("ecs", "list-tasks");
        cmd.arg("--cluster")
            .arg(cluster)
            .arg("--container-instance")
            .arg(scheduler_id)
            .args(["--desired-status", "RUNNING"]);
        let output: ListTasksOutput = self.fetch(cmd, "ecs list-tasks")?;
        Ok(output.task_arns)
    }

    fn terminate_instance(&self, compute_id: &str) -> anyhow::Result<()> {
        let mut cmd = self.command("ec2", "terminate-instances");
        cmd.arg("--instance-ids").arg(compute_id);
        run(cmd, "ec2 terminate-instances").map(|_| ())
    }

    fn reboot_instance(&self, compute_id: &str) -> anyhow::Result<()> {
        let mut cmd = self.command("ec2", "reboot-instances");
        cmd.arg("--instance-ids").arg(compute_id);
        run(cmd, "ec2 reboot-instances").map(|_| ())
    }

    fn instance_health(&self, compute_id: &str) -> anyhow::Result<HealthStatus> {
        let mut cmd = self.command("ec2", "describe-instance-status");
        cmd.arg("--instance-ids")
            .arg(compute_id)
            .arg("--include-all-instances");
        let output: DescribeInstanceStatusOutput =
            self.fetch(cmd, "ec2 describe-instance-status")?;
        Ok(output
            .instance_statuses
            .first()
            .map(|s| HealthStatus::parse(&s.instance_status.status))
            .unwrap_or(HealthStatus::Unavailable))
    }

    fn describe_capacity_group(&self, group: &str) -> anyhow::Result<CapacityBounds> {
        let mut cmd = self.command("autoscaling", "describe-auto-scaling-groups");
        cmd.arg("--auto-scaling-group-names").arg(group);
        let output: DescribeAutoScalingGroupsOutput =
            self.fetch(cmd, "autoscaling describe-auto-scaling-groups")?;
        let asg = output
            .auto_scaling_groups
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Auto scaling group '{}' not found", group))?;
        Ok(CapacityBounds::new(
            asg.min_size,
            asg.max_size,
            asg.desired_capacity,
        ))
    }

    fn update_capacity_group(&self, group: &str, bounds: CapacityBounds) -> anyhow::Result<()> {
        let mut cmd = self.command("autoscaling", "update-auto-scaling-group");
        cmd.arg("--auto-scaling-group-name")
            .arg(group)
            .arg("--min-size")
            .arg(bounds.min.to_string())
            .arg("--max-size")
            .arg(bounds.max.to_string())
            .arg("--desired-capacity")
            .arg(bounds.desired.to_string());
        run(cmd, "autoscaling update-auto-scaling-group").map(|_| ())
    }

    fn set_scale_in_protection(
        &self,
        group: &str,
        compute_ids: &[String],
        protected: bool,
    ) -> anyhow::Result<()> {
        if compute_ids.is_empty() {
            return Ok(());
        }
        let mut cmd = self.command("autoscaling", "set-instance-protection");
        cmd.arg("--auto-scaling-group-name")
            .arg(group)
            .arg("--instance-ids")
            .args(compute_ids)
            .arg(if protected {
                "--protected-from-scale-in"
            } else {
                "--no-protected-from-scale-in"
            });
        run(cmd, "autoscaling set-instance-protection").map(|_| ())
    }

    fn list_group_memberships(
        &self,
        next_token: Option<&str>,
    ) -> anyhow::Result<Page<GroupMembership>> {
        let mut cmd = self.command("autoscaling", "describe-auto-scaling-instances");
        with_starting_token(&mut cmd, next_token);
        let output: DescribeAutoScalingInstancesOutput =
            self.fetch(cmd, "autoscaling describe-auto-scaling-instances")?;
        Ok(Page {
            items: output
                .auto_scaling_instances
                .into_iter()
                .map(|asi| GroupMembership {
                    compute_id: asi.instance_id,
                    group: asi.auto_scaling_group_name,
                })
                .collect(),
            next_token: output.next_token,
        })
    }
}
