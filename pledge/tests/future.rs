use futures_lite::future::{block_on, poll_once};
use pledge::{Abandoned, Deferred, QueueScheduler, Resolution};

type D = Deferred<i32, String, QueueScheduler>;

#[test]
fn settled_completes_once_the_scheduler_ran() {
	let scheduler = QueueScheduler::new();
	let d = D::resolved_with_scheduler(1, scheduler.clone()).and_then(|value| Ok(Resolution::Value(value * 2)));

	let mut settled = d.settled();
	assert_eq!(block_on(poll_once(&mut settled)), None);

	scheduler.run();
	assert_eq!(block_on(poll_once(&mut settled)), Some(Ok(2)));
}

#[test]
fn deferreds_can_be_awaited() {
	let scheduler = QueueScheduler::new();
	let fulfilled = D::resolved_with_scheduler(1, scheduler.clone());
	let rejected = D::rejected_with_scheduler("no".to_owned(), scheduler.clone());

	assert_eq!(block_on(async { fulfilled.await }), Ok(1));
	assert_eq!(block_on(async { rejected.await }), Err("no".to_owned()));
}

#[test]
fn dropping_a_pending_deferred_abandons_its_futures() {
	let scheduler = QueueScheduler::new();
	let d = D::with_scheduler(|_, _| Ok(()), scheduler.clone());

	let settled = d.settled();
	drop(d);
	assert_eq!(block_on(settled), Err(Abandoned.to_string()));
}
