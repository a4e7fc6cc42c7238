use thiserror::Error;

/// Rejection reason used when a deferred value would be settled with itself.
///
/// Reason types must implement [`From<ChainingCycle>`] so that the cycle can be reported through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
#[error("chaining cycle detected for deferred value")]
pub struct ChainingCycle;

/// Returned synchronously by [`Deferred::try_new`](`crate::Deferred::try_new`) without an executor.
///
/// This is never delivered as a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
#[error("deferred value executor is not callable")]
pub struct NotCallable;

/// Produced by [`Settled`](`crate::Settled`) if the awaited deferred value was dropped while still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
#[error("deferred value was dropped before it settled")]
pub struct Abandoned;

impl From<ChainingCycle> for String {
	fn from(value: ChainingCycle) -> Self {
		value.to_string()
	}
}

impl From<Abandoned> for String {
	fn from(value: Abandoned) -> Self {
		value.to_string()
	}
}
