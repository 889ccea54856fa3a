use std::ffi::OsString;
use std::path::{Component, Path};

/// Decides which event paths, relative to the watch root, may trigger the action.
///
/// Chosen once in `start`: directory targets get [`FilterStrategy::HiddenPath`], file targets get
/// [`FilterStrategy::ExactName`] with the file's base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Reject any path with a component starting with `.` (`a/.git/config` is hidden).
    HiddenPath,
    /// Accept only the single relative path equal to this name.
    ExactName(OsString),
}

impl FilterStrategy {
    pub fn accepts(&self, relative: &Path) -> bool {
        // The watch root itself: relative path is empty.
        if relative.as_os_str().is_empty() {
            return false;
        }
        match self {
            Self::HiddenPath => !is_hidden(relative),
            Self::ExactName(name) => relative.as_os_str() == name.as_os_str(),
        }
    }
}

/// True when any component of `path` starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => part.as_encoded_bytes().first() == Some(&b'.'),
        Component::CurDir | Component::ParentDir => true,
        Component::RootDir | Component::Prefix(_) => false,
    })
}
