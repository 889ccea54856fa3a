use std::path::PathBuf;

/// Boxed error returned by an [`Action`](super::Action).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can end a [`FileTriggerRunner`](super::FileTriggerRunner) run.
///
/// All variants are fatal: the runner never retries internally. Callers that want retry
/// semantics wrap the whole `start` call in their own loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The target could not be made absolute.
    #[error("cannot resolve {path}: {source}")]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The target could not be classified as file or directory (usually: it does not exist).
    #[error("cannot stat {path}: {source}")]
    PathStat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registering the native watch failed (resource limits, unsupported filesystem, ...).
    #[error("cannot watch {path}: {source}")]
    WatchSetup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// An event path could not be expressed relative to the watch root.
    #[error("event path {path} is not below watch root {root}")]
    RelativePath { path: PathBuf, root: PathBuf },

    /// The native watcher reported an error on its event stream.
    #[error("watch error: {0}")]
    EventStream(#[source] notify::Error),

    /// The native watcher went away while the loop was still waiting on it.
    #[error("watcher event channel closed")]
    WatcherClosed,

    /// `start` was called on a runner that has already been started.
    #[error("runner was already started")]
    AlreadyStarted,

    /// The action returned an error. Displayed verbatim.
    #[error(transparent)]
    Action(BoxError),
}

impl RunnerError {
    /// The action's own error, if that is what ended the run.
    pub fn as_action_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Action(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
