//! All-or-nothing application of multi-item commands.
//!
//! Every batch is validated in full before any of it is applied, so a batch
//! that fails leaves no trace and no rollback is ever needed.

use crate::model::errors::{LedgerError, LedgerResult};

/// Entry point for the two-phase batch pattern.
pub struct BatchCoordinator;

impl BatchCoordinator {
    /// Check every item, stopping at the first failure. An empty batch is
    /// refused outright.
    pub fn validate<T, F>(items: Vec<T>, mut check: F) -> LedgerResult<ValidatedBatch<T>>
    where
        F: FnMut(&T) -> LedgerResult<()>,
    {
        if items.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        for item in &items {
            check(item)?;
        }
        Ok(ValidatedBatch { items })
    }
}

/// A batch whose every item has passed validation. Applying it cannot fail.
#[derive(Debug)]
pub struct ValidatedBatch<T> {
    items: Vec<T>,
}

impl<T> ValidatedBatch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn apply<F>(self, mut apply: F)
    where
        F: FnMut(T),
    {
        for item in self.items {
            apply(item);
        }
    }
}
