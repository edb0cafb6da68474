//! Mock upload destination for testing.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::upload::{Destination, Submission, UploadError};

/// Mock implementation of the [`Destination`] trait.
///
/// Records every accepted submission. A configured error fails the next
/// upload only; persistent failures fail every upload until cleared.
#[derive(Debug, Default)]
pub struct MockDestination {
    submissions: Mutex<Vec<Submission>>,
    next_error: Mutex<Option<UploadError>>,
    reject_all: Mutex<Option<String>>,
    attempts: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted submissions, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }

    /// Every upload call, accepted or not.
    pub fn attempts(&self) -> usize {
        *lock(&self.attempts)
    }

    pub fn set_next_error(&self, error: UploadError) {
        *lock(&self.next_error) = Some(error);
    }

    /// Reject every upload with `message` until cleared with `None`.
    pub fn set_reject_all(&self, message: Option<&str>) {
        *lock(&self.reject_all) = message.map(str::to_string);
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn upload(&self, submission: Submission) -> Result<(), UploadError> {
        *lock(&self.attempts) += 1;
        if let Some(error) = lock(&self.next_error).take() {
            return Err(error);
        }
        if let Some(message) = lock(&self.reject_all).clone() {
            return Err(UploadError::Rejected(message));
        }
        lock(&self.submissions).push(submission);
        Ok(())
    }
}
