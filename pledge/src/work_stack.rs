//! A per-thread stack of settlement steps, so that long chains settle and drop without native recursion.

use std::{
	cell::{Cell, RefCell},
	iter, mem,
};

use tracing::trace;
use unwind_safe::try_eval;

pub(crate) type Job = Box<dyn 'static + FnOnce()>;

struct WorkStack {
	/// The next job is at the end.
	jobs: RefCell<Vec<Job>>,
	draining: Cell<bool>,
}

thread_local! {
	static WORK_STACK: WorkStack = const {
		WorkStack {
			jobs: RefCell::new(Vec::new()),
			draining: Cell::new(false),
		}
	};
}

impl WorkStack {
	fn push(&self, jobs: impl DoubleEndedIterator<Item = Job>) {
		self.jobs.borrow_mut().extend(jobs.rev());
	}

	fn pop(&self) -> Option<Job> {
		// The borrow must end before the job runs, since jobs push more jobs.
		self.jobs.borrow_mut().pop()
	}

	fn drain(&self) {
		if self.draining.replace(true) {
			return;
		}

		try_eval(|| {
			while let Some(job) = self.pop() {
				job();
			}
		})
		.finally(|()| {
			self.draining.set(false);
			let abandoned = mem::take(&mut *self.jobs.borrow_mut());
			if !abandoned.is_empty() {
				trace!(abandoned = abandoned.len(), "dropped settlement steps after a panic");
			}
		});
	}
}

/// Runs `jobs` in order, ahead of every job that is already waiting.
///
/// Outside of a job, this returns only once the stack is empty again.
/// Inside of a job, `jobs` instead run right after the current job returns.
/// That is the order plain recursion would produce, with bounded stack use.
pub(crate) fn run(jobs: Vec<Job>) {
	if jobs.is_empty() {
		return;
	}
	WORK_STACK.with(|stack| {
		stack.push(jobs.into_iter());
		stack.drain();
	});
}

/// Like [`run`] with a single job. Runs `job` inline if the thread is already shutting down.
fn run_one(job: Job) {
	let mut job = Some(job);
	let running = WORK_STACK.try_with(|stack| {
		if let Some(job) = job.take() {
			stack.push(iter::once(job));
			stack.drain();
		}
	});
	if let (Err(_), Some(job)) = (running, job) {
		job();
	}
}

/// Owns an `X` whose drop is deferred to the work stack.
///
/// Reactions and listeners capture the instance they settle as a [`Link`],
/// which keeps dropping a long pending chain from recursing once per link.
pub(crate) struct Link<X: 'static>(Option<X>);

impl<X: 'static> Link<X> {
	pub(crate) fn new(inner: X) -> Self {
		Self(Some(inner))
	}

	pub(crate) fn get(&self) -> &X {
		match &self.0 {
			Some(inner) => inner,
			// Only taken in `drop`.
			None => unreachable!(),
		}
	}
}

impl<X: 'static> Drop for Link<X> {
	fn drop(&mut self) {
		if let Some(inner) = self.0.take() {
			run_one(Box::new(move || drop(inner)));
		}
	}
}
