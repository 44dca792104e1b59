use repctl_db::DbConn;
use repctl_recovery::Features;
use repctl_transport::SshTransport;
use std::collections::HashMap;
use tempfile::TempDir;
use tokio::sync::Mutex;

/// Whether an operation is narrating what it *would* do or what it *is*
/// doing — dry-run vs live, interpolated into the same log templates so
/// the two modes read as close to identically as the verb tense allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voice {
    WouldDo,
    Doing,
}

impl Voice {
    pub fn is_dry_run(self) -> bool {
        matches!(self, Voice::WouldDo)
    }

    /// Picks between two present-tense fragments, e.g. `voice.verb("stopping
    /// the database", "would stop the database")`.
    pub fn verb<'a>(self, doing: &'a str, would_do: &'a str) -> &'a str {
        match self {
            Voice::Doing => doing,
            Voice::WouldDo => would_do,
        }
    }
}

/// Everything a subsystem function needs, threaded by reference through
/// every call instead of reached for via global/thread-local state: open
/// database connections (one per node under consideration, opened lazily
/// and kept for the duration of the operation), the resolved version
/// [`Features`] table, the shared SSH transport, scratch directories that
/// get cleaned up when the context is dropped, and the dry-run/live
/// [`Voice`].
///
/// Built once in `repctl-cli`'s command dispatch and never stored in a
/// `static`; this is the explicit redesign away from the ambient-global
/// pattern.
pub struct Context {
    pub voice: Voice,
    pub transport: SshTransport,
    connections: Mutex<HashMap<i32, Box<dyn DbConn>>>,
    scratch_dirs: Mutex<Vec<TempDir>>,
    features: Mutex<Option<Features>>,
}

impl Context {
    pub fn new(voice: Voice, transport: SshTransport) -> Self {
        Self {
            voice,
            transport,
            connections: Mutex::new(HashMap::new()),
            scratch_dirs: Mutex::new(Vec::new()),
            features: Mutex::new(None),
        }
    }

    /// Registers an already-open connection for `node_id`, replacing any
    /// prior connection under the same id.
    pub async fn put_connection(&self, node_id: i32, conn: Box<dyn DbConn>) {
        self.connections.lock().await.insert(node_id, conn);
    }

    pub async fn has_connection(&self, node_id: i32) -> bool {
        self.connections.lock().await.contains_key(&node_id)
    }

    /// Runs `f` against the connection for `node_id`. Returns `None` if no
    /// connection has been registered for that node.
    pub async fn with_connection<F, R>(&self, node_id: i32, f: F) -> Option<R>
    where
        F: FnOnce(&dyn DbConn) -> R,
    {
        let guard = self.connections.lock().await;
        guard.get(&node_id).map(|c| f(c.as_ref()))
    }

    /// Creates a new temp directory tracked for cleanup when the context
    /// is dropped (used for staging catalog-backup reconstructions).
    pub async fn new_scratch_dir(&self) -> std::io::Result<std::path::PathBuf> {
        let dir = TempDir::new()?;
        let path = dir.path().to_path_buf();
        self.scratch_dirs.lock().await.push(dir);
        Ok(path)
    }

    pub async fn set_features(&self, features: Features) {
        *self.features.lock().await = Some(features);
    }

    pub async fn features(&self) -> Option<Features> {
        *self.features.lock().await
    }
}
