use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ssh to {host} timed out after {timeout_secs}s")]
    TimedOut { host: String, timeout_secs: u64 },

    #[error("failed to spawn ssh to {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh to {host} exited with status {status}: {stderr}")]
    NonZeroExit {
        host: String,
        status: i32,
        stderr: String,
    },

    #[error("ssh to {host} was killed by a signal")]
    Signalled { host: String },
}

pub type Result<T> = std::result::Result<T, Error>;
