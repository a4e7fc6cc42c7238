use std::panic::{catch_unwind, AssertUnwindSafe};

use pledge_scheduler::runtime::{QueueScheduler, SchedulerRef};
mod _validator;
use _validator::Validator;

#[test]
fn runs_in_scheduling_order() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();

	for i in 1..=3 {
		let v = v.clone();
		scheduler.schedule(move || v.push(i));
	}
	v.expect([]);
	assert_eq!(scheduler.len(), 3);

	assert_eq!(scheduler.run(), 3);
	v.expect([1, 2, 3]);
	assert!(scheduler.is_empty());
}

#[test]
fn tasks_scheduled_while_draining_run_after_earlier_ones() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();

	scheduler.schedule({
		let (v, scheduler) = (v.clone(), scheduler.clone());
		move || {
			v.push("a");
			scheduler.schedule({
				let v = v.clone();
				move || v.push("c")
			});
			v.push("a'");
		}
	});
	scheduler.schedule({
		let v = v.clone();
		move || v.push("b")
	});

	assert_eq!(scheduler.run(), 3);
	v.expect(["a", "a'", "b", "c"]);
}

#[test]
fn nested_run_is_refused() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();

	scheduler.schedule({
		let (v, scheduler) = (v.clone(), scheduler.clone());
		move || {
			v.push("outer");
			assert_eq!(scheduler.run(), 0);
			assert!(!scheduler.run_once());
			v.push("outer done");
		}
	});
	scheduler.schedule({
		let v = v.clone();
		move || v.push("second")
	});

	assert_eq!(scheduler.run(), 2);
	v.expect(["outer", "outer done", "second"]);
}

#[test]
fn run_once_takes_a_single_turn() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();

	for i in 0..2 {
		let v = v.clone();
		scheduler.schedule(move || v.push(i));
	}

	assert!(scheduler.run_once());
	v.expect([0]);
	assert!(scheduler.run_once());
	v.expect([1]);
	assert!(!scheduler.run_once());
}

#[test]
fn panicking_task_leaves_the_queue_usable() {
	let v = Validator::new();
	let scheduler = QueueScheduler::new();

	scheduler.schedule(|| panic!("task failed"));
	scheduler.schedule({
		let v = v.clone();
		move || v.push("after")
	});

	assert!(catch_unwind(AssertUnwindSafe(|| scheduler.run())).is_err());
	v.expect([]);
	assert_eq!(scheduler.len(), 1);

	assert_eq!(scheduler.run(), 1);
	v.expect(["after"]);
}

#[test]
fn clones_share_one_queue() {
	let a = QueueScheduler::new();
	let b = a.clone();
	let c = QueueScheduler::new();
	assert!(a.ptr_eq(&b));
	assert!(!a.ptr_eq(&c));

	b.schedule(|| ());
	assert_eq!(a.len(), 1);
	assert_eq!(c.len(), 0);
}
