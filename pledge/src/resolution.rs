//! The resolution procedure: unwrapping settlement candidates into a final state.

use std::{
	cell::Cell,
	fmt::{self, Debug, Formatter},
	rc::Rc,
};

use pledge_scheduler::runtime::SchedulerRef;
use scopeguard::guard;
use tracing::{debug, trace};

use crate::{work_stack::Link, ChainingCycle, Deferred};

/// A candidate to settle a [`Deferred`] with.
///
/// Plain values settle directly. [`Deferred`]s and [`Thenable`]s are adopted: the target settles
/// the same way they eventually do, recursively.
pub enum Resolution<T, E, SR: SchedulerRef> {
	/// Fulfills the target with this value.
	Value(T),
	/// Makes the target follow this instance.
	///
	/// Resolving an instance with itself rejects it with [`ChainingCycle`].
	Deferred(Deferred<T, E, SR>),
	/// Makes the target follow this thenable.
	Thenable(Box<dyn Thenable<T, E, SR>>),
}

impl<T, E, SR: SchedulerRef> Resolution<T, E, SR> {
	/// Wraps `thenable` as [`Resolution::Thenable`].
	pub fn thenable(thenable: impl 'static + Thenable<T, E, SR>) -> Self {
		Self::Thenable(Box::new(thenable))
	}

	/// Creates a [`Resolution::Thenable`] whose [`then`](`Thenable::then`) is `then`.
	pub fn from_fn<F>(then: F) -> Self
	where
		F: 'static + FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), Resolution<T, E, SR>>,
	{
		Self::thenable(FnThenable(then))
	}
}

impl<T, E, SR: SchedulerRef> From<Deferred<T, E, SR>> for Resolution<T, E, SR> {
	fn from(value: Deferred<T, E, SR>) -> Self {
		Self::Deferred(value)
	}
}

impl<T: Debug, E: Debug, SR: SchedulerRef + Debug> Debug for Resolution<T, E, SR> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
			Self::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
			Self::Thenable(_) => f.debug_tuple("Thenable").finish_non_exhaustive(),
		}
	}
}

/// Anything that can be adopted by a [`Deferred`] by registering a resolver and a rejecter.
///
/// # Logic
///
/// Only the first call across the [`Resolver`] and [`Rejecter`] (and their clones) has an effect.
///
/// Returning `Err(candidate)` signals a synchronous failure. If neither function was called yet,
/// `candidate` is then adopted as if passed to [`Resolver::adopt`]. (This is **not** a rejection.
/// Return a rejected [`Deferred`] to reject.)
pub trait Thenable<T, E, SR: SchedulerRef> {
	/// Registers `resolve` and `reject` with this thenable.
	///
	/// # Errors
	///
	/// A synchronous failure, carrying a candidate to adopt instead.
	fn then(
		self: Box<Self>,
		resolve: Resolver<T, E, SR>,
		reject: Rejecter<T, E, SR>,
	) -> Result<(), Resolution<T, E, SR>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adoption {
	Unsettled,
	Settling,
	Settled,
}

/// Shared by one [`Resolver`]/[`Rejecter`] pair.
#[derive(Debug)]
struct AdoptionGuard(Cell<Adoption>);

impl AdoptionGuard {
	fn new() -> Self {
		Self(Cell::new(Adoption::Unsettled))
	}

	/// **Returns** a guard iff this is the first call. The state becomes [`Adoption::Settled`] when it drops.
	fn enter(&self) -> Option<impl '_ + Sized> {
		match self.0.get() {
			Adoption::Unsettled => {
				self.0.set(Adoption::Settling);
				Some(guard(&self.0, |state| state.set(Adoption::Settled)))
			}
			adoption @ (Adoption::Settling | Adoption::Settled) => {
				trace!(?adoption, "ignored repeated settlement of an adoption");
				None
			}
		}
	}

	fn is_spent(&self) -> bool {
		self.0.get() != Adoption::Unsettled
	}
}

/// The resolving function handed to executors and [`Thenable`]s.
pub struct Resolver<T, E, SR: SchedulerRef> {
	target: Deferred<T, E, SR>,
	guard: Rc<AdoptionGuard>,
}

/// The rejecting function handed to executors and [`Thenable`]s.
pub struct Rejecter<T, E, SR: SchedulerRef> {
	target: Deferred<T, E, SR>,
	guard: Rc<AdoptionGuard>,
}

impl<T, E, SR: SchedulerRef> Clone for Resolver<T, E, SR> {
	fn clone(&self) -> Self {
		Self {
			target: self.target.clone(),
			guard: Rc::clone(&self.guard),
		}
	}
}

impl<T, E, SR: SchedulerRef> Clone for Rejecter<T, E, SR> {
	fn clone(&self) -> Self {
		Self {
			target: self.target.clone(),
			guard: Rc::clone(&self.guard),
		}
	}
}

impl<T: Debug, E: Debug, SR: SchedulerRef + Debug> Debug for Resolver<T, E, SR> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolver")
			.field("target", &self.target)
			.field("guard", &self.guard)
			.finish()
	}
}

impl<T: Debug, E: Debug, SR: SchedulerRef + Debug> Debug for Rejecter<T, E, SR> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Rejecter")
			.field("target", &self.target)
			.field("guard", &self.guard)
			.finish()
	}
}

impl<T, E, SR> Resolver<T, E, SR>
where
	T: 'static + Clone,
	E: 'static + Clone + From<ChainingCycle>,
	SR: 'static + SchedulerRef,
{
	/// Fulfills the target with `value`, iff this pair wasn't used yet.
	pub fn resolve(&self, value: T) {
		self.adopt(Resolution::Value(value));
	}

	/// Resolves the target with `candidate`, iff this pair wasn't used yet.
	pub fn adopt(&self, candidate: Resolution<T, E, SR>) {
		if let Some(_settling) = self.guard.enter() {
			resolve(&self.target, candidate, Dispatch::Scheduled);
		}
	}

	/// Whether this pair was used already.
	#[must_use]
	pub fn is_spent(&self) -> bool {
		self.guard.is_spent()
	}
}

impl<T, E, SR> Rejecter<T, E, SR>
where
	T: 'static + Clone,
	E: 'static + Clone,
	SR: 'static + SchedulerRef,
{
	/// Rejects the target with `reason`, iff this pair wasn't used yet.
	pub fn reject(&self, reason: E) {
		if let Some(_settling) = self.guard.enter() {
			self.target.reject(reason);
		}
	}

	/// Whether this pair was used already.
	#[must_use]
	pub fn is_spent(&self) -> bool {
		self.guard.is_spent()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
	/// Calls into thenables on a later turn.
	Scheduled,
	/// Calls into thenables inline. Only used for executors.
	Immediate,
}

/// Drives `target` towards settlement according to the shape of `candidate`.
pub(crate) fn resolve<T, E, SR>(
	target: &Deferred<T, E, SR>,
	candidate: Resolution<T, E, SR>,
	dispatch: Dispatch,
) where
	T: 'static + Clone,
	E: 'static + Clone + From<ChainingCycle>,
	SR: 'static + SchedulerRef,
{
	match candidate {
		Resolution::Deferred(candidate) if candidate.ptr_eq(target) => {
			debug!("chaining cycle detected for deferred value");
			target.reject(ChainingCycle.into());
		}
		Resolution::Deferred(candidate) => follow(target, &candidate),
		Resolution::Thenable(thenable) => adopt(target, thenable, dispatch),
		Resolution::Value(value) => target.resolve(value),
	}
}

fn follow<T, E, SR>(target: &Deferred<T, E, SR>, candidate: &Deferred<T, E, SR>)
where
	T: 'static + Clone,
	E: 'static + Clone,
	SR: 'static + SchedulerRef,
{
	let target = target.clone();
	match candidate.peek() {
		Some(settlement) => {
			let scheduler = target.scheduler().clone();
			scheduler.schedule(move || target.settle(settlement));
		}
		// Runs after `candidate`'s own reactions.
		None => {
			let target = Link::new(target);
			candidate.listen(move |settlement| target.get().settle(settlement));
		}
	}
}

fn adopt<T, E, SR>(
	target: &Deferred<T, E, SR>,
	thenable: Box<dyn Thenable<T, E, SR>>,
	dispatch: Dispatch,
) where
	T: 'static + Clone,
	E: 'static + Clone + From<ChainingCycle>,
	SR: 'static + SchedulerRef,
{
	let guard = Rc::new(AdoptionGuard::new());
	let resolver = Resolver {
		target: target.clone(),
		guard: Rc::clone(&guard),
	};
	let rejecter = Rejecter {
		target: target.clone(),
		guard,
	};

	let call = move || {
		if let Err(thrown) = thenable.then(resolver.clone(), rejecter) {
			trace!("thenable failed synchronously");
			resolver.adopt(thrown);
		}
	};
	match dispatch {
		Dispatch::Scheduled => target.scheduler().schedule(call),
		Dispatch::Immediate => call(),
	}
}

/// Adapts an executor to [`Thenable`]. An executor's `Err` is a rejection.
pub(crate) struct Executor<X>(pub(crate) X);

impl<T, E, SR, X> Thenable<T, E, SR> for Executor<X>
where
	T: 'static + Clone,
	E: 'static + Clone,
	SR: 'static + SchedulerRef,
	X: FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), E>,
{
	fn then(
		self: Box<Self>,
		resolve: Resolver<T, E, SR>,
		reject: Rejecter<T, E, SR>,
	) -> Result<(), Resolution<T, E, SR>> {
		let Self(executor) = *self;
		if let Err(reason) = executor(resolve, reject.clone()) {
			trace!("executor failed");
			reject.reject(reason);
		}
		Ok(())
	}
}

struct FnThenable<F>(F);

impl<T, E, SR, F> Thenable<T, E, SR> for FnThenable<F>
where
	SR: SchedulerRef,
	F: FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), Resolution<T, E, SR>>,
{
	fn then(
		self: Box<Self>,
		resolve: Resolver<T, E, SR>,
		reject: Rejecter<T, E, SR>,
	) -> Result<(), Resolution<T, E, SR>> {
		let Self(then) = *self;
		then(resolve, reject)
	}
}
