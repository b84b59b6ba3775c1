//! Docker Compose invocation.
//!
//! Resolves which compose flavour is installed and builds the argument
//! vectors for scaling a service and listing a project's services.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::callbacks::{CommandExecutor, CommandOutput};
use crate::error::{AutoscalerError, AutoscalerResult};

/// A resolved compose command, e.g. `docker compose` or `docker-compose`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCommand {
    program: String,
    prefix: Vec<String>,
}

impl ComposeCommand {
    /// Compose v2, the `docker compose` plugin
    pub fn plugin() -> Self {
        Self::parse("docker compose")
    }

    /// Compose v1, the standalone `docker-compose` binary
    pub fn standalone() -> Self {
        Self::parse("docker-compose")
    }

    /// Split a whitespace-separated command line into program and prefix args
    pub fn parse(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            prefix: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments that scale `service` of `project` to exactly `replicas`
    ///
    /// The service is named explicitly so compose leaves other services alone.
    pub fn scale_args(&self, project: &str, service: &str, replicas: usize) -> Vec<String> {
        let mut args = self.prefix.clone();
        args.extend([
            "-p".to_string(),
            project.to_string(),
            "up".to_string(),
            "-d".to_string(),
            "--scale".to_string(),
            format!("{}={}", service, replicas),
            "--no-recreate".to_string(),
            service.to_string(),
        ]);
        args
    }

    /// Arguments that list the services defined in `project`
    pub fn services_args(&self, project: &str) -> Vec<String> {
        let mut args = self.prefix.clone();
        args.extend([
            "-p".to_string(),
            project.to_string(),
            "config".to_string(),
            "--services".to_string(),
        ]);
        args
    }

    fn version_args(&self) -> Vec<String> {
        let mut args = self.prefix.clone();
        args.push("version".to_string());
        args
    }

    /// Find an installed compose, preferring v2
    pub async fn discover(executor: &dyn CommandExecutor) -> AutoscalerResult<Self> {
        for candidate in [Self::plugin(), Self::standalone()] {
            match executor.run(&candidate.program, &candidate.version_args()).await {
                Ok(output) if output.success() => return Ok(candidate),
                Ok(output) => debug!("'{}' unavailable: exit {}", candidate, output.status()),
                Err(e) => debug!("'{}' unavailable: {}", candidate, e),
            }
        }
        Err(AutoscalerError::ComposeNotFound)
    }

    /// Ensure `service` is defined in `project`
    pub async fn validate_service(
        &self,
        executor: &dyn CommandExecutor,
        project: &str,
        service: &str,
    ) -> AutoscalerResult<()> {
        let output = executor
            .run(&self.program, &self.services_args(project))
            .await?
            .into_result(&self.to_string())?;

        let services: Vec<&str> = output
            .combined_output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if services.contains(&service) {
            Ok(())
        } else {
            Err(AutoscalerError::ServiceNotFound {
                project: project.to_string(),
                service: service.to_string(),
                available: services.join("\n  "),
            })
        }
    }
}

impl fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.prefix {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs commands as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> AutoscalerResult<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut combined_output = String::from_utf8_lossy(&output.stdout).into_owned();
        combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            exit_code: output.status.code(),
            combined_output,
        })
    }
}
