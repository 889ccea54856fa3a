use std::fmt;

use crate::trigger::BoxError;

/// Collects errors from a sequence of fallible steps so they can be checked once at the end.
///
/// ```
/// use filetrigger::ErrorCollector;
///
/// let mut errors = ErrorCollector::new();
/// let n = errors.check("42".parse::<i32>());
/// errors.check("nope".parse::<i32>());
/// assert_eq!(n, Some(42));
/// assert_eq!(errors.len(), 1);
/// assert!(errors.into_result().is_err());
/// ```
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<BoxError>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err`. Always returns `true`, so it reads well in `if` chains.
    pub fn add(&mut self, err: impl Into<BoxError>) -> bool {
        self.errors.push(err.into());
        true
    }

    /// Record the error of `result`, if any, and hand back the success value.
    pub fn check<T, E: Into<BoxError>>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.add(err);
                None
            }
        }
    }

    pub fn has(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first(&self) -> Option<&BoxError> {
        self.errors.first()
    }

    pub fn last(&self) -> Option<&BoxError> {
        self.errors.last()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// `Ok(())` when empty, otherwise the collector itself as the error.
    pub fn into_result(self) -> Result<(), Self> {
        if self.has() { Err(self) } else { Ok(()) }
    }

    /// A new collector holding the errors of `a` followed by those of `b`.
    pub fn merge(a: Self, b: Self) -> Self {
        let mut merged = a;
        merged.extend(b.errors);
        merged
    }
}

impl Extend<BoxError> for ErrorCollector {
    fn extend<I: IntoIterator<Item = BoxError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl fmt::Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str(
                "empty error collector; check has() or into_result() before treating it as an error",
            );
        }
        f.write_str(&self.messages().join("\n"))
    }
}

impl std::error::Error for ErrorCollector {}
