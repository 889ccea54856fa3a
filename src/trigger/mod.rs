//! Run an action whenever something changes below a watched path.
//!
//! [`FileTriggerRunner`] registers a native watch, drops events for hidden paths (or, for a
//! single-file target, for every name but the file's), debounces bursts and calls the action
//! once per burst. The action also runs once right after the watch is set up.

pub mod error;
pub mod event;
pub mod filter;

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace};

pub use error::{BoxError, RunnerError};
pub use event::{Trigger, TriggerKind};
pub use filter::FilterStrategy;

/// Quiet period after an accepted event before the action runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Capacity of the raw event queue between the native watcher and the run loop.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// The user callback. Any error ends the run and is returned from [`FileTriggerRunner::start`].
pub type Action = Box<dyn FnMut(&Trigger) -> Result<(), BoxError> + Send>;

type RawEvent = notify::Result<notify::Event>;

/// Lifecycle of a runner: `Created -> Running -> Stopped | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Created = 0,
    Running = 1,
    /// `start` returned `Ok` after a stop request.
    Stopped = 2,
    /// `start` returned an error.
    Failed = 3,
}

impl RunnerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Failed,
        }
    }
}

/// Cloneable, thread-safe way to stop a running [`FileTriggerRunner`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<AtomicU8>,
    stop_tx: Sender<()>,
}

impl StopHandle {
    /// Ask the run loop to exit. Never blocks.
    ///
    /// No-op unless the runner is running; repeated calls are swallowed. A stop requested while
    /// the action executes takes effect once the action returns.
    pub fn stop(&self) {
        if self.state() != RunnerState::Running {
            debug!(state = ?self.state(), "stop ignored, runner is not running");
            return;
        }
        match self.stop_tx.try_send(()) {
            Ok(()) => debug!("stop requested"),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Watches a file or directory and re-runs an action on change.
pub struct FileTriggerRunner {
    target: PathBuf,
    recursive: bool,
    action: Action,
    debounce: Duration,
    queue_depth: usize,
    watch_root: Option<PathBuf>,
    state: Arc<AtomicU8>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl FileTriggerRunner {
    /// Record the configuration. Nothing touches the filesystem until [`start`](Self::start).
    ///
    /// `recursive` only matters for directory targets; a file target always watches its parent
    /// directory non-recursively.
    pub fn new<F>(target: impl Into<PathBuf>, recursive: bool, action: F) -> Self
    where
        F: FnMut(&Trigger) -> Result<(), BoxError> + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        Self {
            target: target.into(),
            recursive,
            action: Box::new(action),
            debounce: DEFAULT_DEBOUNCE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            watch_root: None,
            state: Arc::new(AtomicU8::new(RunnerState::Created as u8)),
            stop_tx,
            stop_rx,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Raw events arriving while the queue is full are dropped. Clamped to at least 1.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Same as [`StopHandle::stop`].
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Directory registered with the native watcher. `None` until `start` has resolved it.
    pub fn watch_root(&self) -> Option<&Path> {
        self.watch_root.as_deref()
    }

    /// Watch, run the action once, then re-run it per debounced change until stopped.
    ///
    /// Blocks the calling thread. Returns `Ok(())` after [`stop`](Self::stop), or the first
    /// fatal error. The native watch is released before returning on every path.
    pub fn start(&mut self) -> Result<(), RunnerError> {
        let claimed = self.state.compare_exchange(
            RunnerState::Created as u8,
            RunnerState::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if claimed.is_err() {
            return Err(RunnerError::AlreadyStarted);
        }

        let result = self.run();
        let end = match &result {
            Ok(()) => RunnerState::Stopped,
            Err(_) => RunnerState::Failed,
        };
        self.state.store(end as u8, Ordering::SeqCst);
        result
    }

    fn run(&mut self) -> Result<(), RunnerError> {
        let session = self.open_watch()?;
        self.watch_root = Some(session.root.clone());
        info!(root = %session.root.display(), filter = ?session.filter, "watching");

        let result = invoke(
            &mut self.action,
            &Trigger::new(TriggerKind::Initial, &session.root),
        )
        .and_then(|()| self.event_loop(&session));

        drop(session);
        debug!("watch released");
        result
    }

    fn open_watch(&self) -> Result<WatchSession, RunnerError> {
        let absolute = std::path::absolute(&self.target)
            .map(|path| clean(&path))
            .map_err(|source| RunnerError::PathResolution {
                path: self.target.clone(),
                source,
            })?;
        let metadata = std::fs::metadata(&absolute).map_err(|source| RunnerError::PathStat {
            path: absolute.clone(),
            source,
        })?;

        let (root, filter, mode) = if metadata.is_dir() {
            let mode = if self.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            (absolute, FilterStrategy::HiddenPath, mode)
        } else {
            // Watch the parent so delete+recreate and rename-over saves stay visible.
            let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
                return Err(RunnerError::PathResolution {
                    path: absolute.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"),
                });
            };
            (
                parent.to_path_buf(),
                FilterStrategy::ExactName(name.to_os_string()),
                RecursiveMode::NonRecursive,
            )
        };
        let canonical_root = std::fs::canonicalize(&root).unwrap_or_else(|_| root.clone());

        let (event_tx, events) = crossbeam_channel::bounded::<RawEvent>(self.queue_depth);
        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            match event_tx.try_send(res) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!("event queue full, dropping raw event"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        })
        .map_err(|source| RunnerError::WatchSetup {
            path: root.clone(),
            source,
        })?;
        watcher
            .watch(&root, mode)
            .map_err(|source| RunnerError::WatchSetup {
                path: root.clone(),
                source,
            })?;

        Ok(WatchSession {
            _watcher: watcher,
            events,
            root,
            canonical_root,
            filter,
        })
    }

    fn event_loop(&mut self, session: &WatchSession) -> Result<(), RunnerError> {
        let debounce = self.debounce;
        loop {
            crossbeam_channel::select! {
                recv(self.stop_rx) -> _ => {
                    info!("stopped");
                    return Ok(());
                }
                recv(session.events) -> msg => {
                    on_event(&mut self.action, session, debounce, msg)?;
                }
            }
        }
    }
}

/// Handle one raw event: filter, debounce, drain, then run the action once.
fn on_event(
    action: &mut Action,
    session: &WatchSession,
    debounce: Duration,
    msg: Result<RawEvent, crossbeam_channel::RecvError>,
) -> Result<(), RunnerError> {
    let event = match msg {
        Ok(Ok(event)) => event,
        Ok(Err(err)) => return Err(RunnerError::EventStream(err)),
        Err(_) => return Err(RunnerError::WatcherClosed),
    };
    let Some(trigger) = session.accept(&event)? else {
        return Ok(());
    };
    info!(kind = %trigger.kind, path = %trigger.path.display(), "change detected");

    // Changes come in bursts: wait, then throw away whatever queued up meanwhile,
    // filtered or not, and run once.
    std::thread::sleep(debounce);
    let coalesced = session.events.try_iter().count();
    debug!(coalesced, "debounce window closed");

    invoke(action, &trigger)
}

/// Lexically drop `.` and resolve `..` against the preceding component.
///
/// Event paths are reported below the registered root, so a root spelled with `..` would
/// never match the filters.
fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                if !matches!(
                    cleaned.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

fn invoke(action: &mut Action, trigger: &Trigger) -> Result<(), RunnerError> {
    debug!(kind = %trigger.kind, path = %trigger.path.display(), "running action");
    action(trigger).map_err(RunnerError::Action)
}

/// A registered native watch. Dropping it releases the watch.
struct WatchSession {
    _watcher: RecommendedWatcher,
    events: Receiver<RawEvent>,
    root: PathBuf,
    canonical_root: PathBuf,
    filter: FilterStrategy,
}

impl WatchSession {
    /// The trigger for `event` if it is a change and one of its paths passes the filter.
    fn accept(&self, event: &notify::Event) -> Result<Option<Trigger>, RunnerError> {
        let Some(kind) = TriggerKind::from_event_kind(&event.kind) else {
            trace!(kind = ?event.kind, "ignoring non-change event");
            return Ok(None);
        };
        for path in &event.paths {
            let relative = self.relative(path)?;
            if self.filter.accepts(relative) {
                return Ok(Some(Trigger::new(kind, path)));
            }
            trace!(path = %relative.display(), "filtered");
        }
        Ok(None)
    }

    fn relative<'p>(&self, path: &'p Path) -> Result<&'p Path, RunnerError> {
        path.strip_prefix(&self.canonical_root)
            .or_else(|_| path.strip_prefix(&self.root))
            .map_err(|_| RunnerError::RelativePath {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
    }
}
