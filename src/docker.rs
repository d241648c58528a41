use crate::error::{CommandError, Error, Result};
use crate::secret_string::SecretString;
use std::future::Future;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Image transfer operations against a registry. Each call is one complete
/// invocation of the underlying tool; nothing is kept open between calls.
pub trait TransferTool: Send + Sync {
    fn status(&self) -> impl Future<Output = Result<()>> + Send;
    fn pull(&self, reference: &str) -> impl Future<Output = Result<()>> + Send;
    fn login(
        &self,
        username: &str,
        password: &SecretString,
        host: &str,
    ) -> impl Future<Output = Result<()>> + Send;
    fn tag(&self, source: &str, target: &str) -> impl Future<Output = Result<()>> + Send;
    fn push(&self, reference: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Drives the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::with_program("docker")
    }
}

impl DockerCli {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command);

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::transport(command.clone(), e))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| Error::transport(command.clone(), e))?;
            // closing stdin lets --password-stdin finish reading
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::transport(command.clone(), e))?;

        if !output.status.success() {
            return Err(Error::transport(
                command.clone(),
                CommandError {
                    command,
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                },
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TransferTool for DockerCli {
    async fn status(&self) -> Result<()> {
        let version = self
            .run(&["info", "--format", "{{.ServerVersion}}"], None)
            .await?;
        debug!("Docker daemon version {}", version.trim());
        Ok(())
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        self.run(&["pull", reference], None).await.map(|_| ())
    }

    async fn login(&self, username: &str, password: &SecretString, host: &str) -> Result<()> {
        self.run(
            &["login", "--username", username, "--password-stdin", host],
            Some(password.expose_secret()),
        )
        .await
        .map(|_| ())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.run(&["tag", source, target], None).await.map(|_| ())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        self.run(&["push", reference], None).await.map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let docker = DockerCli::with_program("true");
        assert!(docker.pull("harbor.local/smoketest/nginx:latest").await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_command_is_transport_error() {
        let docker = DockerCli::with_program("false");
        let err = docker
            .push("harbor.local/smoketest/nginx:latest")
            .await
            .expect_err("false always fails");
        assert!(err.is_transport());
        let message = err.to_string();
        assert!(message.starts_with("false push harbor.local/smoketest/nginx:latest failed: exited with"));
        assert_eq!(message.matches("false push").count(), 1);
    }

    #[tokio::test]
    async fn test_missing_program_is_transport_error() {
        let docker = DockerCli::with_program("/nonexistent/docker");
        let err = docker.status().await.expect_err("program does not exist");
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let docker = DockerCli::with_program("cat");
        let output = docker
            .run(&["-"], Some("Harbor12345"))
            .await
            .expect("cat should succeed");
        assert_eq!(output, "Harbor12345");
    }
}
