use std::{cell::RefCell, rc::Rc};

use pledge::{Deferred, DeferredState, QueueScheduler, Rejecter, Resolution, Resolver, Thenable};
use _validator::Validator;

type D = Deferred<i32, String, QueueScheduler>;
type R = Resolution<i32, String, QueueScheduler>;

fn pending(scheduler: &QueueScheduler) -> D {
	D::with_scheduler(|_, _| Ok(()), scheduler.clone())
}

fn adopting(candidate: R, scheduler: &QueueScheduler) -> D {
	D::with_scheduler(
		move |resolve, _| {
			resolve.adopt(candidate);
			Ok(())
		},
		scheduler.clone(),
	)
}

#[test]
fn returning_the_derived_instance_is_a_cycle() {
	let scheduler = QueueScheduler::new();
	let d = pending(&scheduler);
	let slot: Rc<RefCell<Option<D>>> = Rc::default();

	let derived = d.and_then({
		let slot = Rc::clone(&slot);
		move |_| {
			let derived = slot.borrow().clone().expect("derived instance stored");
			Ok(Resolution::Deferred(derived))
		}
	});
	*slot.borrow_mut() = Some(derived.clone());

	d.resolve(1);
	assert_eq!(
		derived.peek(),
		Some(Err("chaining cycle detected for deferred value".to_owned()))
	);
	slot.borrow_mut().take();
}

#[test]
fn returning_the_receiver_adopts_it() {
	let scheduler = QueueScheduler::new();
	let d = D::resolved_with_scheduler(5, scheduler.clone());

	let derived = d.and_then({
		let d = d.clone();
		move |_| Ok(Resolution::Deferred(d))
	});
	scheduler.run();
	assert_eq!(derived.peek(), Some(Ok(5)));
}

#[test]
fn nested_deferreds_unwrap() {
	let scheduler = QueueScheduler::new();
	let inner = pending(&scheduler);
	let middle = adopting(inner.clone().into(), &scheduler);
	let outer = adopting(middle.clone().into(), &scheduler);
	assert_eq!(outer.state(), DeferredState::Pending);

	inner.resolve(42);
	assert_eq!(middle.peek(), Some(Ok(42)));
	assert_eq!(outer.peek(), Some(Ok(42)));
	assert!(scheduler.is_empty());
}

#[test]
fn settled_candidates_take_one_turn() {
	let scheduler = QueueScheduler::new();
	let inner = D::resolved_with_scheduler(42, scheduler.clone());
	let middle = adopting(inner.into(), &scheduler);
	let outer = adopting(middle.clone().into(), &scheduler);

	assert_eq!(outer.state(), DeferredState::Pending);
	assert!(scheduler.run_once());
	assert_eq!(middle.peek(), Some(Ok(42)));
	assert_eq!(outer.peek(), Some(Ok(42)));

	let rejected = D::rejected_with_scheduler("no".to_owned(), scheduler.clone());
	let follower = adopting(rejected.into(), &scheduler);
	assert_eq!(follower.state(), DeferredState::Pending);
	scheduler.run();
	assert_eq!(follower.peek(), Some(Err("no".to_owned())));
}

#[test]
fn followers_settle_after_the_candidates_own_reactions() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();
	let candidate = pending(&scheduler);
	let follower = adopting(candidate.clone().into(), &scheduler);

	let _ = follower.and_then({
		let v = v.clone();
		move |value| {
			v.push("follower");
			Ok(Resolution::Value(value))
		}
	});
	let _ = candidate.and_then({
		let v = v.clone();
		move |value| {
			v.push("candidate");
			Ok(Resolution::Value(value))
		}
	});

	candidate.resolve(1);
	v.expect(["candidate", "follower"]);
}

struct Eventually(i32);

impl Thenable<i32, String, QueueScheduler> for Eventually {
	fn then(
		self: Box<Self>,
		resolve: Resolver<i32, String, QueueScheduler>,
		_: Rejecter<i32, String, QueueScheduler>,
	) -> Result<(), R> {
		resolve.resolve(self.0);
		Ok(())
	}
}

#[test]
fn thenables_are_called_on_a_later_turn() {
	let scheduler = QueueScheduler::new();
	let d = pending(&scheduler);
	let derived = d.and_then(|_| Ok(Resolution::thenable(Eventually(5))));

	d.resolve(0);
	assert_eq!(derived.state(), DeferredState::Pending);
	assert!(scheduler.run_once());
	assert_eq!(derived.peek(), Some(Ok(5)));
}

#[test]
fn only_the_first_thenable_callback_counts() {
	let scheduler = QueueScheduler::new();

	let d = adopting(
		Resolution::from_fn(|resolve, reject| {
			resolve.resolve(1);
			reject.reject("x".to_owned());
			resolve.resolve(2);
			Ok(())
		}),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.peek(), Some(Ok(1)));

	let d = adopting(
		Resolution::from_fn(|resolve, reject| {
			reject.reject("x".to_owned());
			resolve.resolve(1);
			Ok(())
		}),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.peek(), Some(Err("x".to_owned())));
}

#[test]
fn adopting_a_pending_candidate_spends_the_guard() {
	let scheduler = QueueScheduler::new();
	let candidate = pending(&scheduler);

	let d = adopting(
		Resolution::from_fn({
			let candidate = candidate.clone();
			move |resolve, reject| {
				resolve.adopt(candidate.into());
				assert!(reject.is_spent());
				reject.reject("late".to_owned());
				resolve.resolve(2);
				Ok(())
			}
		}),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.state(), DeferredState::Pending);

	candidate.resolve(1);
	assert_eq!(d.peek(), Some(Ok(1)));
}

#[test]
fn thenable_failures_are_adopted() {
	let scheduler = QueueScheduler::new();

	let d = adopting(Resolution::from_fn(|_, _| Err(Resolution::Value(9))), &scheduler);
	scheduler.run();
	assert_eq!(d.peek(), Some(Ok(9)));

	let rejected = D::rejected_with_scheduler("thrown".to_owned(), scheduler.clone());
	let d = adopting(
		Resolution::from_fn(move |_, _| Err(Resolution::Deferred(rejected))),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.peek(), Some(Err("thrown".to_owned())));

	let d = adopting(
		Resolution::from_fn(|_, _| Err(Resolution::thenable(Eventually(3)))),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.peek(), Some(Ok(3)));
}

#[test]
fn thenable_failures_after_settling_are_ignored() {
	let scheduler = QueueScheduler::new();

	let d = adopting(
		Resolution::from_fn(|resolve, _| {
			resolve.resolve(1);
			Err(Resolution::Value(9))
		}),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.peek(), Some(Ok(1)));
}

#[test]
fn thenables_may_settle_later() {
	let scheduler = QueueScheduler::new();
	let slot = Rc::new(RefCell::new(None));

	let d = adopting(
		Resolution::from_fn({
			let slot = Rc::clone(&slot);
			move |resolve, _| {
				*slot.borrow_mut() = Some(resolve);
				Ok(())
			}
		}),
		&scheduler,
	);
	scheduler.run();
	assert_eq!(d.state(), DeferredState::Pending);

	let resolve = slot.borrow_mut().take().expect("thenable was called");
	resolve.adopt(Resolution::thenable(Eventually(4)));
	scheduler.run();
	assert_eq!(d.peek(), Some(Ok(4)));
}
