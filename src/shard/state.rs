//! Shard provisioning state
//!
//! Tracks, per target, whether the provisioning sequence has been attempted.
//! Each target moves `NotAttempted -> Attempting -> Attempted` exactly once;
//! there is no way back, so a failed attempt is never retried.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Once, OnceState};

use crate::error::{Error, Result};

/// Something the provisioner shards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShardTarget {
    /// A database, keyed by normalized descriptor
    Database(String),
    /// A collection within a database
    Collection {
        descriptor: String,
        collection: String,
    },
}

impl ShardTarget {
    /// Target for a database
    pub fn database(descriptor: impl Into<String>) -> Self {
        Self::Database(descriptor.into())
    }

    /// Target for a collection
    pub fn collection(descriptor: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::Collection {
            descriptor: descriptor.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for ShardTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(descriptor) => write!(f, "{}", descriptor),
            Self::Collection { descriptor, collection } => {
                write!(f, "{}#{}", descriptor, collection)
            }
        }
    }
}

/// Attempt state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    NotAttempted,
    Attempting,
    Attempted,
}

/// Registry of attempted targets, safe to share across threads
#[derive(Default)]
pub struct ShardState {
    attempts: DashMap<ShardTarget, Arc<Once>>,
}

impl ShardState {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `provision` for `target` unless it was already attempted.
    ///
    /// Exactly one caller per target runs `provision`; callers racing with it
    /// wait for it to finish and then skip. Returns `Ok(true)` for the caller
    /// that ran it and succeeded, `Ok(false)` for callers that skipped, and
    /// the error for the caller that ran it and failed. A panic inside
    /// `provision` is reported as a provisioning error and still counts as
    /// an attempt.
    pub fn attempt<F>(&self, target: &ShardTarget, provision: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        // Clone out of the map so no shard lock is held while provisioning
        let once = self
            .attempts
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Once::new()))
            .clone();

        let mut outcome = None;
        once.call_once_force(|_| {
            outcome = Some(
                panic::catch_unwind(AssertUnwindSafe(provision)).unwrap_or_else(|payload| {
                    Err(Error::provisioning(
                        target.to_string(),
                        format!("provisioning panicked: {}", panic_message(&*payload)),
                    ))
                }),
            );
        });

        match outcome {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }

    /// Current state of a target
    pub fn state(&self, target: &ShardTarget) -> AttemptState {
        match self.attempts.get(target).map(|once| once.state()) {
            None | Some(OnceState::New) => AttemptState::NotAttempted,
            Some(OnceState::InProgress) => AttemptState::Attempting,
            Some(OnceState::Done) | Some(OnceState::Poisoned) => AttemptState::Attempted,
        }
    }

    /// Number of targets that have been attempted or are in progress
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Whether nothing has been attempted
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl fmt::Debug for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardState")
            .field("targets", &self.attempts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_attempt_runs_once() -> Result<()> {
        let state = ShardState::new();
        let target = ShardTarget::database("mongodb://localhost:27017/app");
        assert_eq!(state.state(&target), AttemptState::NotAttempted);

        assert!(state.attempt(&target, || Ok(()))?);
        assert!(!state.attempt(&target, || panic!("must not run again"))?);
        assert_eq!(state.state(&target), AttemptState::Attempted);
        Ok(())
    }

    #[test]
    fn test_failed_attempt_is_not_retried() {
        let state = ShardState::new();
        let target = ShardTarget::collection("d", "logs");

        let err = state
            .attempt(&target, || Err(Error::provisioning("d#logs", "not sharded")))
            .unwrap_err();
        assert!(err.is_provisioning_error());

        assert!(!state.attempt(&target, || Ok(())).unwrap());
        assert_eq!(state.state(&target), AttemptState::Attempted);
    }

    #[test]
    fn test_panicking_attempt_is_not_retried() {
        let state = ShardState::new();
        let target = ShardTarget::collection("d", "logs");

        let err = state
            .attempt(&target, || panic!("driver bug"))
            .unwrap_err();
        assert!(err.is_provisioning_error());
        assert!(err.message().contains("driver bug"));
        assert_eq!(state.state(&target), AttemptState::Attempted);

        // Later callers skip instead of panicking
        assert!(!state.attempt(&target, || Ok(())).unwrap());
        assert!(!state.attempt(&target, || Ok(())).unwrap());
    }

    #[test]
    fn test_targets_are_independent() -> Result<()> {
        let state = ShardState::new();
        assert!(state.attempt(&ShardTarget::collection("d", "a"), || Ok(()))?);
        assert!(state.attempt(&ShardTarget::collection("d", "b"), || Ok(()))?);
        assert!(state.attempt(&ShardTarget::database("d"), || Ok(()))?);
        assert_eq!(state.len(), 3);
        Ok(())
    }

    #[test]
    fn test_concurrent_attempts() {
        let state = Arc::new(ShardState::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));
        let target = ShardTarget::database("d");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let (state, runs, barrier, target) =
                    (state.clone(), runs.clone(), barrier.clone(), target.clone());
                thread::spawn(move || {
                    barrier.wait();
                    state
                        .attempt(&target, || {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(())
                        })
                        .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ran| *ran)
            .count();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_target_display() {
        assert_eq!(ShardTarget::collection("d", "logs").to_string(), "d#logs");
    }
}
