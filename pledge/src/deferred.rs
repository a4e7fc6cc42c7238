use std::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	future::IntoFuture,
	mem,
	rc::Rc,
};

use futures_channel::oneshot;
use pledge_scheduler::runtime::SchedulerRef;
use tap::Tap;
use tracing::trace;

use crate::{
	resolution::{self, Dispatch, Executor},
	work_stack::{self, Job, Link},
	Abandoned, ChainingCycle, NotCallable, Rejecter, Resolution, Resolver, Settled,
};

type Reaction<P> = Box<dyn FnOnce(P)>;
type Listener<T, E> = Box<dyn FnOnce(Result<T, E>)>;

/// The settlement state of a [`Deferred`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeferredState {
	/// Not settled yet.
	Pending,
	/// Settled with a value.
	Fulfilled,
	/// Settled with a reason.
	Rejected,
}

#[derive(Debug)]
enum State<T, E> {
	Pending,
	Fulfilled(T),
	Rejected(E),
}

struct Core<T, E> {
	state: State<T, E>,
	fulfill_reactions: Vec<Reaction<T>>,
	reject_reactions: Vec<Reaction<E>>,
	/// Secondary settlement listeners, notified after the matching reaction queue.
	listeners: Vec<Listener<T, E>>,
}

struct Shared<T, E, SR> {
	scheduler: SR,
	core: RefCell<Core<T, E>>,
}

/// A single-assignment container that is settled exactly once, to a value `T` or a reason `E`.
///
/// [`Deferred`] is a cheap handle: clones refer to the same instance.
///
/// Reactions registered through [`then`](`Deferred::then`), [`and_then`](`Deferred::and_then`)
/// and [`catch`](`Deferred::catch`) run in registration order and never run synchronously from
/// the registering call. If the instance is already settled, the reaction is dispatched through
/// the instance's [`SchedulerRef`] instead.
///
/// # Logic
///
/// Once settled, the state never changes again. Later [`resolve`](`Deferred::resolve`) and
/// [`reject`](`Deferred::reject`) calls are ignored.
pub struct Deferred<T, E, SR: SchedulerRef> {
	shared: Rc<Shared<T, E, SR>>,
}

impl<T, E, SR: SchedulerRef> Clone for Deferred<T, E, SR> {
	fn clone(&self) -> Self {
		Self {
			shared: Rc::clone(&self.shared),
		}
	}
}

impl<T: Debug, E: Debug, SR: SchedulerRef + Debug> Debug for Deferred<T, E, SR> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let core = self.shared.core.borrow();
		f.debug_struct("Deferred")
			.field("state", &core.state)
			.field("fulfill_reactions", &core.fulfill_reactions.len())
			.field("reject_reactions", &core.reject_reactions.len())
			.field("listeners", &core.listeners.len())
			.field("scheduler", &self.shared.scheduler)
			.finish()
	}
}

impl<T, E, SR: SchedulerRef> Deferred<T, E, SR> {
	pub(crate) fn pending(scheduler: SR) -> Self {
		Self {
			shared: Rc::new(Shared {
				scheduler,
				core: RefCell::new(Core {
					state: State::Pending,
					fulfill_reactions: Vec::new(),
					reject_reactions: Vec::new(),
					listeners: Vec::new(),
				}),
			}),
		}
	}

	/// The scheduler this instance dispatches reactions through.
	pub fn scheduler(&self) -> &SR {
		&self.shared.scheduler
	}

	/// Whether `self` and `other` are handles to the same instance.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.shared, &other.shared)
	}

	/// The current settlement state.
	#[must_use]
	pub fn state(&self) -> DeferredState {
		match self.shared.core.borrow().state {
			State::Pending => DeferredState::Pending,
			State::Fulfilled(_) => DeferredState::Fulfilled,
			State::Rejected(_) => DeferredState::Rejected,
		}
	}

	/// Clones out the settlement, if any.
	///
	/// This is an inspection aid. Prefer reactions to observe the outcome.
	#[must_use]
	pub fn peek(&self) -> Option<Result<T, E>>
	where
		T: Clone,
		E: Clone,
	{
		match &self.shared.core.borrow().state {
			State::Pending => None,
			State::Fulfilled(value) => Some(Ok(value.clone())),
			State::Rejected(reason) => Some(Err(reason.clone())),
		}
	}

	/// Fulfills this instance with `value`, unless it is already settled.
	///
	/// Queued fulfillment reactions run synchronously, in registration order, before this method returns.
	/// Queued rejection reactions are discarded.
	///
	/// If this is called from inside a reaction, the reactions queued here instead run right after
	/// that reaction returns, ahead of its later siblings.
	pub fn resolve(&self, value: T)
	where
		T: 'static + Clone,
		E: 'static,
	{
		let (reactions, listeners, discarded) = {
			let mut core = self.shared.core.borrow_mut();
			let core = &mut *core;
			if !matches!(core.state, State::Pending) {
				trace!("ignored resolve of a settled deferred value");
				return;
			}
			core.state = State::Fulfilled(value.clone());
			(
				mem::take(&mut core.fulfill_reactions),
				mem::take(&mut core.listeners),
				mem::take(&mut core.reject_reactions),
			)
		};
		drop(discarded);

		trace!(
			reactions = reactions.len(),
			listeners = listeners.len(),
			"fulfilled deferred value"
		);
		work_stack::run(
			reactions
				.into_iter()
				.map(|reaction| -> Job {
					let value = value.clone();
					Box::new(move || reaction(value))
				})
				.chain(listeners.into_iter().map(|listener| -> Job {
					let value = value.clone();
					Box::new(move || listener(Ok(value)))
				}))
				.collect(),
		);
	}

	/// Rejects this instance with `reason`, unless it is already settled.
	///
	/// Queued rejection reactions run synchronously, in registration order, before this method returns.
	/// Queued fulfillment reactions are discarded.
	///
	/// Nested calls are deferred the same way as for [`resolve`](`Deferred::resolve`).
	pub fn reject(&self, reason: E)
	where
		T: 'static,
		E: 'static + Clone,
	{
		let (reactions, listeners, discarded) = {
			let mut core = self.shared.core.borrow_mut();
			let core = &mut *core;
			if !matches!(core.state, State::Pending) {
				trace!("ignored reject of a settled deferred value");
				return;
			}
			core.state = State::Rejected(reason.clone());
			(
				mem::take(&mut core.reject_reactions),
				mem::take(&mut core.listeners),
				mem::take(&mut core.fulfill_reactions),
			)
		};
		drop(discarded);

		trace!(
			reactions = reactions.len(),
			listeners = listeners.len(),
			"rejected deferred value"
		);
		work_stack::run(
			reactions
				.into_iter()
				.map(|reaction| -> Job {
					let reason = reason.clone();
					Box::new(move || reaction(reason))
				})
				.chain(listeners.into_iter().map(|listener| -> Job {
					let reason = reason.clone();
					Box::new(move || listener(Err(reason)))
				}))
				.collect(),
		);
	}

	pub(crate) fn settle(&self, settlement: Result<T, E>)
	where
		T: 'static + Clone,
		E: 'static + Clone,
	{
		match settlement {
			Ok(value) => self.resolve(value),
			Err(reason) => self.reject(reason),
		}
	}

	/// Attaches a secondary settlement listener.
	///
	/// If this instance is already settled, `listener` runs immediately instead.
	pub(crate) fn listen(&self, listener: impl 'static + FnOnce(Result<T, E>))
	where
		T: 'static + Clone,
		E: 'static + Clone,
	{
		let settlement = {
			let mut core = self.shared.core.borrow_mut();
			let core = &mut *core;
			match &core.state {
				State::Pending => {
					core.listeners.push(Box::new(listener));
					return;
				}
				State::Fulfilled(value) => Ok(value.clone()),
				State::Rejected(reason) => Err(reason.clone()),
			}
		};
		listener(settlement);
	}

	/// A [`Future`](`std::future::Future`) that completes with this instance's settlement.
	///
	/// If every handle to a pending instance is dropped, the future completes with [`Abandoned`] instead.
	pub fn settled(&self) -> Settled<T, E>
	where
		T: 'static + Clone,
		E: 'static + Clone + From<Abandoned>,
	{
		let (sender, receiver) = oneshot::channel();
		self.listen(move |settlement| {
			sender.send(settlement).ok();
		});
		Settled::new(receiver)
	}
}

impl<T, E, SR> Deferred<T, E, SR>
where
	T: 'static + Clone,
	E: 'static + Clone + From<ChainingCycle>,
	SR: 'static + SchedulerRef,
{
	/// Creates a new [`Deferred`] and immediately runs `executor` with its resolving functions.
	///
	/// See [`with_scheduler`](`Deferred::with_scheduler`).
	pub fn new<X>(executor: X) -> Self
	where
		SR: Default,
		X: 'static + FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), E>,
	{
		Self::with_scheduler(executor, SR::default())
	}

	/// Creates a new [`Deferred`] with the given `scheduler` and immediately runs `executor` with its resolving functions.
	///
	/// Settling through the [`Resolver`] or [`Rejecter`] inside `executor` takes effect before this function returns.
	/// If `executor` returns [`Err`], that reason rejects the instance, unless it was already settled by then.
	pub fn with_scheduler<X>(executor: X, scheduler: SR) -> Self
	where
		X: 'static + FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), E>,
	{
		Self::pending(scheduler).tap(|this| {
			resolution::resolve(
				this,
				Resolution::thenable(Executor(executor)),
				Dispatch::Immediate,
			);
		})
	}

	/// Like [`new`](`Deferred::new`), but with an optional executor.
	///
	/// # Errors
	///
	/// Iff `executor` is [`None`], [`NotCallable`] is returned. Nothing is scheduled in that case.
	pub fn try_new<X>(executor: Option<X>) -> Result<Self, NotCallable>
	where
		SR: Default,
		X: 'static + FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), E>,
	{
		Self::try_with_scheduler(executor, SR::default())
	}

	/// Like [`with_scheduler`](`Deferred::with_scheduler`), but with an optional executor.
	///
	/// # Errors
	///
	/// Iff `executor` is [`None`], [`NotCallable`] is returned. Nothing is scheduled in that case.
	pub fn try_with_scheduler<X>(executor: Option<X>, scheduler: SR) -> Result<Self, NotCallable>
	where
		X: 'static + FnOnce(Resolver<T, E, SR>, Rejecter<T, E, SR>) -> Result<(), E>,
	{
		let executor = executor.ok_or(NotCallable)?;
		Ok(Self::with_scheduler(executor, scheduler))
	}

	/// Creates an instance that is already fulfilled with `value`.
	pub fn resolved_with(value: T) -> Self
	where
		SR: Default,
	{
		Self::resolved_with_scheduler(value, SR::default())
	}

	/// Creates an instance with the given `scheduler` that is already fulfilled with `value`.
	pub fn resolved_with_scheduler(value: T, scheduler: SR) -> Self {
		Self::with_scheduler(
			move |resolve, _| {
				resolve.resolve(value);
				Ok(())
			},
			scheduler,
		)
	}

	/// Creates an instance that is already rejected with `reason`.
	pub fn rejected_with(reason: E) -> Self
	where
		SR: Default,
	{
		Self::rejected_with_scheduler(reason, SR::default())
	}

	/// Creates an instance with the given `scheduler` that is already rejected with `reason`.
	pub fn rejected_with_scheduler(reason: E, scheduler: SR) -> Self {
		Self::with_scheduler(
			move |_, reject| {
				reject.reject(reason);
				Ok(())
			},
			scheduler,
		)
	}

	/// Registers reactions to this instance's settlement.
	///
	/// **Returns** a new pending instance that settles according to whichever handler runs:
	///
	/// - `Ok(candidate)` resolves it with `candidate`, unwrapping nested [`Deferred`]s and [`Thenable`](`crate::Thenable`)s.
	/// - `Err(reason)` rejects it with `reason`.
	///
	/// # Logic
	///
	/// Neither handler is called before this method returns.
	/// If this instance is pending, the matching handler runs when it settles.
	/// Otherwise it runs in a task scheduled on this instance's scheduler.
	pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U, E, SR>
	where
		U: 'static + Clone,
		F: 'static + FnOnce(T) -> Result<Resolution<U, E, SR>, E>,
		R: 'static + FnOnce(E) -> Result<Resolution<U, E, SR>, E>,
	{
		let derived = Deferred::pending(self.shared.scheduler.clone());

		let settlement = {
			let mut core = self.shared.core.borrow_mut();
			let core = &mut *core;
			match &core.state {
				State::Pending => {
					core.fulfill_reactions.push(Box::new({
						let derived = Link::new(derived.clone());
						move |value| forward(derived.get(), on_fulfilled(value))
					}));
					core.reject_reactions.push(Box::new({
						let derived = Link::new(derived.clone());
						move |reason| forward(derived.get(), on_rejected(reason))
					}));
					trace!("queued reactions on pending deferred value");
					return derived;
				}
				State::Fulfilled(value) => Ok(value.clone()),
				State::Rejected(reason) => Err(reason.clone()),
			}
		};

		trace!("scheduled reaction to settled deferred value");
		self.shared.scheduler.schedule({
			let derived = derived.clone();
			move || match settlement {
				Ok(value) => forward(&derived, on_fulfilled(value)),
				Err(reason) => forward(&derived, on_rejected(reason)),
			}
		});
		derived
	}

	/// Registers a fulfillment reaction. Rejections pass through unchanged.
	pub fn and_then<U, F>(&self, on_fulfilled: F) -> Deferred<U, E, SR>
	where
		U: 'static + Clone,
		F: 'static + FnOnce(T) -> Result<Resolution<U, E, SR>, E>,
	{
		self.then(on_fulfilled, Err)
	}

	/// Registers a rejection reaction. Values pass through unchanged.
	///
	/// Returning `Ok(…)` from `on_rejected` recovers the chain.
	pub fn catch<R>(&self, on_rejected: R) -> Self
	where
		R: 'static + FnOnce(E) -> Result<Resolution<T, E, SR>, E>,
	{
		self.then(|value| Ok(Resolution::Value(value)), on_rejected)
	}
}

fn forward<U, E, SR>(derived: &Deferred<U, E, SR>, outcome: Result<Resolution<U, E, SR>, E>)
where
	U: 'static + Clone,
	E: 'static + Clone + From<ChainingCycle>,
	SR: 'static + SchedulerRef,
{
	match outcome {
		Ok(candidate) => resolution::resolve(derived, candidate, Dispatch::Scheduled),
		Err(reason) => derived.reject(reason),
	}
}

impl<T, E, SR> IntoFuture for Deferred<T, E, SR>
where
	T: 'static + Clone,
	E: 'static + Clone + From<Abandoned>,
	SR: SchedulerRef,
{
	type Output = Result<T, E>;
	type IntoFuture = Settled<T, E>;

	fn into_future(self) -> Self::IntoFuture {
		self.settled()
	}
}
