//! `Deferred` => `Future` adapter.

use std::{
	fmt::{self, Debug, Formatter},
	future::Future,
	pin::Pin,
	task::{Context, Poll},
};

use futures_channel::oneshot;
use futures_lite::ready;
use pin_project::pin_project;

use crate::Abandoned;

/// A [`Future`] that completes with a [`Deferred`](`crate::Deferred`)'s settlement.
///
/// Created by [`Deferred::settled`](`crate::Deferred::settled`) or by awaiting a [`Deferred`](`crate::Deferred`) directly.
///
/// This future does not drive any scheduler. Reactions that lead to the awaited settlement still
/// only run when their scheduler runs.
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Settled<T, E> {
	#[pin]
	receiver: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Debug for Settled<T, E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Settled").finish_non_exhaustive()
	}
}

impl<T, E> Settled<T, E> {
	pub(crate) fn new(receiver: oneshot::Receiver<Result<T, E>>) -> Self {
		Self { receiver }
	}
}

impl<T, E: From<Abandoned>> Future for Settled<T, E> {
	type Output = Result<T, E>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let settlement = ready!(self.project().receiver.poll(cx));
		Poll::Ready(settlement.unwrap_or_else(|oneshot::Canceled| Err(Abandoned.into())))
	}
}
