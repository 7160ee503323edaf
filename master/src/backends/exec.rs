// master/src/backends/exec.rs

use async_trait::async_trait;
use common::error::{Error, Result};
use common::services::RemoteExecChannel;
use common::worker::WorkerConnection;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Corre comandos con `ssh` (o `sh -c` para el endpoint `local`).
#[derive(Debug, Clone, Default)]
pub struct ShellExecChannel {
    /// Opciones extra para ssh, ej: ["-o", "BatchMode=yes"].
    pub ssh_options: Vec<String>,
}

impl ShellExecChannel {
    pub fn new() -> Self {
        Self {
            ssh_options: vec!["-o".into(), "BatchMode=yes".into()],
        }
    }

    fn command_for(&self, connection: &WorkerConnection, command: &str) -> Command {
        if connection.is_local() {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("ssh");
            cmd.args(&self.ssh_options)
                .arg(&connection.endpoint)
                .arg(command);
            cmd
        }
    }
}

#[async_trait]
impl RemoteExecChannel for ShellExecChannel {
    async fn run_command(
        &self,
        connection: &WorkerConnection,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let exec_err = |message: String| Error::Exec {
            connection: connection.name.clone(),
            message,
        };

        info!("[{}] {}", connection.name, command);
        let mut cmd = self.command_for(connection, command);
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(res) => res.map_err(|e| exec_err(format!("no se pudo lanzar: {e}")))?,
            Err(_) => {
                warn!("[{}] timeout después de {:?}", connection.name, timeout);
                return Err(exec_err(format!("timeout después de {:?}", timeout)));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exec_err(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }
        debug!("[{}] salida: {} bytes", connection.name, stdout.len());
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> WorkerConnection {
        WorkerConnection::new(0, "local")
    }

    #[tokio::test]
    async fn comando_local_devuelve_stdout() {
        let out = ShellExecChannel::new()
            .run_command(&local(), "echo hola", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hola");
    }

    #[tokio::test]
    async fn codigo_distinto_de_cero_es_exec() {
        let err = ShellExecChannel::new()
            .run_command(&local(), "echo ups >&2; exit 3", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            Error::Exec { connection, message } => {
                assert_eq!(connection, "ssh_0");
                assert!(message.contains("ups"));
            }
            other => panic!("error inesperado: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_es_exec() {
        let err = ShellExecChannel::new()
            .run_command(&local(), "sleep 5", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "Exec");
    }
}
