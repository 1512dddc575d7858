use std::collections::BTreeMap;

/// Where a field error came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised by the form's own validation rules.
    Schema,
    /// Set explicitly, e.g. a duplicate VIN or a backend conflict.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Errors of one record, keyed by field. Iteration follows the field order of `F`, so the first
/// entry is the first invalid field as laid out on the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors<F: Ord> {
    errors: BTreeMap<F, FieldError>,
}

impl<F: Ord> Default for FieldErrors<F> {
    fn default() -> Self {
        Self {
            errors: BTreeMap::new(),
        }
    }
}

impl<F: Ord + Copy> FieldErrors<F> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error. A field keeps only its most recent error.
    pub fn insert(&mut self, field: F, kind: ErrorKind, message: impl Into<String>) {
        self.errors.insert(
            field,
            FieldError {
                kind,
                message: message.into(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, field: F) -> Option<&FieldError> {
        self.errors.get(&field)
    }

    /// First invalid field in form order.
    #[must_use]
    pub fn first(&self) -> Option<(F, &FieldError)> {
        self.errors.iter().next().map(|(field, error)| (*field, error))
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, &FieldError)> {
        self.errors.iter().map(|(field, error)| (*field, error))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
