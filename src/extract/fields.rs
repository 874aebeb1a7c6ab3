//! Per-field extraction results

/// Outcome of looking up one field on a page
///
/// A missing field is an ordinary result, never an error: the record keeps
/// an empty value for that field and extraction continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted<T> {
    Found(T),
    NotFound,
}

impl<T> Extracted<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Tries `alternate` only when this lookup found nothing
    pub fn or_else(self, alternate: impl FnOnce() -> Extracted<T>) -> Extracted<T> {
        match self {
            Self::Found(value) => Self::Found(value),
            Self::NotFound => alternate(),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

impl<T: Default> Extracted<T> {
    pub fn unwrap_or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for Extracted<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Found(value),
            None => Self::NotFound,
        }
    }
}
