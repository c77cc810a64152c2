//! Exec-backed capability implementations.
//!
//! Operators describe each capability call as an argv template in a
//! small TOML file; the backends substitute `{placeholder}` arguments
//! and run the command with `tokio::process`. In production the
//! templates are thin wrappers around the provider CLI, e.g.
//!
//! ```toml
//! [orchestrator]
//! desired_count     = ["scripts/desired-count.sh"]
//! set_desired_count = ["aws", "ecs", "update-service", "--cluster", "game",
//!                      "--service", "mc", "--desired-count", "{count}"]
//! running_instances = ["scripts/task-ips.sh"]
//!
//! [dns]
//! upsert_record = ["scripts/upsert-record.sh", "{zone}", "{name}", "{address}", "{ttl}"]
//!
//! [publisher]
//! publish = ["aws", "sns", "publish", "--topic-arn", "{topic}", "--message", "{message}"]
//! ```
//!
//! Query commands report through stdout: `desired_count` prints one
//! integer, `running_instances` prints whitespace-separated addresses.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::api::{DnsApi, Orchestrator, Publisher};
use crate::error::CloudError;

/// Parsed backend command file.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendFile {
    pub orchestrator: OrchestratorCommands,
    pub dns: DnsCommands,
    pub publisher: Option<PublisherCommands>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorCommands {
    pub desired_count: Vec<String>,
    pub set_desired_count: Vec<String>,
    pub running_instances: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsCommands {
    pub upsert_record: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherCommands {
    #[serde(default)]
    pub publish: Vec<String>,
}

impl BackendFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Substitute `{key}` placeholders in an argv template.
fn substitute(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            let mut arg = arg.clone();
            for (key, value) in vars {
                arg = arg.replace(&format!("{{{key}}}"), value);
            }
            arg
        })
        .collect()
}

/// Run an argv, returning stdout on success.
async fn run(argv: &[String]) -> Result<String, CloudError> {
    let (program, args) = argv
        .split_first()
        .ok_or(CloudError::NotConfigured("backend command"))?;

    debug!(command = %program, ?args, "running backend command");
    let output = Command::new(program).args(args).output().await?;

    if !output.status.success() {
        return Err(CloudError::Command {
            command: program.clone(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Orchestration API driven by command templates.
#[derive(Debug, Clone)]
pub struct ExecOrchestrator {
    commands: OrchestratorCommands,
}

impl ExecOrchestrator {
    pub fn new(commands: OrchestratorCommands) -> Self {
        Self { commands }
    }
}

impl Orchestrator for ExecOrchestrator {
    async fn desired_count(&self) -> Result<u32, CloudError> {
        let out = run(&self.commands.desired_count).await?;
        out.trim()
            .parse()
            .map_err(|_| CloudError::Parse(format!("expected integer desired count, got {out:?}")))
    }

    async fn set_desired_count(&self, count: u32) -> Result<(), CloudError> {
        let argv = substitute(
            &self.commands.set_desired_count,
            &[("count", &count.to_string())],
        );
        run(&argv).await.map(drop)
    }

    async fn running_instances(&self) -> Result<Vec<String>, CloudError> {
        let out = run(&self.commands.running_instances).await?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }
}

/// DNS API driven by a command template.
#[derive(Debug, Clone)]
pub struct ExecDns {
    commands: DnsCommands,
}

impl ExecDns {
    pub fn new(commands: DnsCommands) -> Self {
        Self { commands }
    }
}

impl DnsApi for ExecDns {
    async fn upsert_record(
        &self,
        zone: &str,
        name: &str,
        address: &str,
        ttl_secs: u32,
    ) -> Result<(), CloudError> {
        let argv = substitute(
            &self.commands.upsert_record,
            &[
                ("zone", zone),
                ("name", name),
                ("address", address),
                ("ttl", &ttl_secs.to_string()),
            ],
        );
        run(&argv).await.map(drop)
    }
}

/// Pub/sub publish driven by a command template.
#[derive(Debug, Clone, Default)]
pub struct ExecPublisher {
    commands: PublisherCommands,
}

impl ExecPublisher {
    pub fn new(commands: PublisherCommands) -> Self {
        Self { commands }
    }
}

impl Publisher for ExecPublisher {
    async fn publish(&self, topic: &str, message: &str) -> Result<(), CloudError> {
        if self.commands.publish.is_empty() {
            return Err(CloudError::NotConfigured("publisher.publish"));
        }
        let argv = substitute(
            &self.commands.publish,
            &[("topic", topic), ("message", message)],
        );
        run(&argv).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn substitute_replaces_placeholders() {
        let template = argv(&["dns-up", "{zone}", "{name}.", "ttl={ttl}"]);
        let out = substitute(
            &template,
            &[("zone", "Z1"), ("name", "mc.example.com"), ("ttl", "30")],
        );
        assert_eq!(out, argv(&["dns-up", "Z1", "mc.example.com.", "ttl=30"]));
    }

    #[test]
    fn parse_backend_file() {
        let file: BackendFile = toml::from_str(
            r#"
            [orchestrator]
            desired_count = ["echo", "0"]
            set_desired_count = ["true", "{count}"]
            running_instances = ["echo"]

            [dns]
            upsert_record = ["true", "{zone}", "{name}", "{address}", "{ttl}"]
            "#,
        )
        .unwrap();
        assert_eq!(file.orchestrator.desired_count[0], "echo");
        assert!(file.publisher.is_none());
    }

    #[tokio::test]
    async fn desired_count_parses_stdout() {
        let orchestrator = ExecOrchestrator::new(OrchestratorCommands {
            desired_count: argv(&["echo", "1"]),
            set_desired_count: argv(&["true"]),
            running_instances: argv(&["echo"]),
        });
        assert_eq!(orchestrator.desired_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn desired_count_rejects_garbage() {
        let orchestrator = ExecOrchestrator::new(OrchestratorCommands {
            desired_count: argv(&["echo", "pending"]),
            set_desired_count: argv(&["true"]),
            running_instances: argv(&["echo"]),
        });
        assert!(matches!(
            orchestrator.desired_count().await,
            Err(CloudError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn running_instances_splits_whitespace() {
        let orchestrator = ExecOrchestrator::new(OrchestratorCommands {
            desired_count: argv(&["echo", "1"]),
            set_desired_count: argv(&["true"]),
            running_instances: argv(&["echo", "10.0.0.7", "10.0.0.8"]),
        });
        let instances = orchestrator.running_instances().await.unwrap();
        assert_eq!(instances, vec!["10.0.0.7", "10.0.0.8"]);
    }

    #[tokio::test]
    async fn failing_command_surfaces_status() {
        let orchestrator = ExecOrchestrator::new(OrchestratorCommands {
            desired_count: argv(&["sh", "-c", "echo throttled >&2; exit 3"]),
            set_desired_count: argv(&["true"]),
            running_instances: argv(&["echo"]),
        });
        match orchestrator.desired_count().await {
            Err(CloudError::Command { status, stderr, .. }) => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "throttled");
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publisher_without_template_is_not_configured() {
        let publisher = ExecPublisher::default();
        assert!(matches!(
            publisher.publish("topic", "msg").await,
            Err(CloudError::NotConfigured(_))
        ));
    }
}
