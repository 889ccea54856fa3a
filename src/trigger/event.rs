use std::fmt;
use std::path::PathBuf;

use notify::EventKind;
use notify::event::ModifyKind;
use serde::Serialize;

/// What caused an action invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// The synchronous run performed by `start` before any event is processed.
    Initial,
    Create,
    Write,
    Rename,
    Remove,
    /// Permission or other metadata change.
    Chmod,
    /// The platform could not say what happened.
    Other,
}

impl TriggerKind {
    /// Map a native event kind. Returns `None` for access notifications (open, read, close),
    /// which do not change anything on disk.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::Chmod),
            EventKind::Modify(_) => Some(Self::Write),
            EventKind::Any | EventKind::Other => Some(Self::Other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Create => "create",
            Self::Write => "write",
            Self::Rename => "rename",
            Self::Remove => "remove",
            Self::Chmod => "chmod",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(kind, path)` pair handed to the action.
///
/// For the initial run `path` is the watch root; otherwise it is the absolute path of the
/// event that opened the debounce window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub path: PathBuf,
}

impl Trigger {
    pub fn new(kind: TriggerKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}
