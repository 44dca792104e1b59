use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Options shared by every SSH invocation.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub port: Option<u16>,
    /// Extra `-o Key=Value` options, passed through verbatim.
    pub extra_opts: Vec<String>,
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: None,
            extra_opts: vec![
                "BatchMode=yes".to_string(),
                "StrictHostKeyChecking=accept-new".to_string(),
            ],
            command_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes commands on a remote host via the system `ssh` binary.
pub struct SshTransport {
    opts: SshOptions,
}

impl SshTransport {
    pub fn new(opts: SshOptions) -> Self {
        Self { opts }
    }

    /// Minimal connectivity test: `ssh ... true`.
    pub async fn probe(&self, host: &str, user: &str) -> Result<()> {
        self.run(host, user, "true").await.map(|_| ())
    }

    /// Executes `cmd` verbatim on `host`. The caller is responsible for all
    /// quoting of embedded arguments (e.g. via [`crate::render_conninfo`]).
    pub async fn run(&self, host: &str, user: &str, cmd: &str) -> Result<CommandOutput> {
        let mut args: Vec<String> = Vec::new();
        for opt in &self.opts.extra_opts {
            args.push("-o".to_string());
            args.push(opt.clone());
        }
        args.push("-o".to_string());
        args.push(format!(
            "ConnectTimeout={}",
            self.opts.connect_timeout.as_secs()
        ));
        if let Some(port) = self.opts.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(format!("{user}@{host}"));
        args.push(cmd.to_string());

        debug!(host, user, cmd, "running remote command");

        let mut child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                host: host.to_string(),
                source,
            })?;

        let mut stdout_pipe = child.stdout.take().expect("stdout piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr piped");

        let run = async {
            let mut stdout = String::new();
            let mut stderr = String::new();
            let (_, _, status) = tokio::try_join!(
                stdout_pipe.read_to_string(&mut stdout),
                stderr_pipe.read_to_string(&mut stderr),
                child.wait(),
            )?;
            Ok::<_, std::io::Error>((stdout, stderr, status))
        };

        let (stdout, stderr, status) = match timeout(self.opts.command_timeout, run).await {
            Ok(Ok(v)) => v,
            Ok(Err(source)) => {
                return Err(Error::Spawn {
                    host: host.to_string(),
                    source,
                });
            }
            Err(_) => {
                warn!(host, "ssh command timed out, killing child");
                let _ = child.start_kill();
                return Err(Error::TimedOut {
                    host: host.to_string(),
                    timeout_secs: self.opts.command_timeout.as_secs(),
                });
            }
        };

        let exit_code = match status.code() {
            Some(code) => code,
            None => return Err(Error::Signalled { host: host.to_string() }),
        };

        if exit_code != 0 {
            debug!(host, exit_code, stderr = %stderr, "remote command exited non-zero");
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Like [`Self::run`] but turns a non-zero exit into [`Error::NonZeroExit`].
    pub async fn run_checked(&self, host: &str, user: &str, cmd: &str) -> Result<CommandOutput> {
        let out = self.run(host, user, cmd).await?;
        if !out.success() {
            return Err(Error::NonZeroExit {
                host: host.to_string(),
                status: out.exit_code,
                stderr: out.stderr,
            });
        }
        Ok(out)
    }
}
