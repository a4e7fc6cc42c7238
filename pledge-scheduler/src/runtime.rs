//! The [`SchedulerRef`] scheduling hook, as well as functional [`QueueScheduler`] and `LocalScheduler` implementations.

use std::{
	fmt::{self, Debug, Formatter},
	rc::Rc,
};

mod task_queue;

pub(crate) use task_queue::TaskQueue;

/// Trait for handles that let deferred values refer to a specific scheduler (instance).
///
/// [`QueueScheduler`] provides a usable default, and `LocalScheduler` a shared one
/// when the `local_scheduler` feature is enabled.
///
/// # Logic
///
/// A task passed to [`.schedule(task)`](`SchedulerRef::schedule`) **must not** run before that call returns.
/// Tasks scheduled through clones of the same handle **must** run in the order they were scheduled.
/// Tasks scheduled while another task runs **must** run after that task returns.
///
/// Callers **must not** depend on the latency between scheduling and running a task, only on the ordering.
pub trait SchedulerRef: Clone {
	/// Submits `task` to run on a later turn.
	fn schedule(&self, task: impl 'static + FnOnce());
}

/// An owned FIFO task queue. Clones refer to the same queue.
///
/// Nothing runs until [`.run()`](`QueueScheduler::run`) or [`.run_once()`](`QueueScheduler::run_once`)
/// is called outside of a task.
#[derive(Clone, Default)]
pub struct QueueScheduler {
	queue: Rc<TaskQueue>,
}

impl Debug for QueueScheduler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("QueueScheduler")
			.field("queue", &self.queue)
			.finish()
	}
}

impl QueueScheduler {
	/// Creates a new, empty [`QueueScheduler`].
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs scheduled tasks until the queue is empty, including tasks scheduled by those tasks.
	///
	/// **Returns** the number of tasks that ran.
	///
	/// Calling this from inside a task has no effect and returns `0`.
	/// The outer call keeps draining instead.
	pub fn run(&self) -> usize {
		self.queue.run()
	}

	/// Runs the single oldest scheduled task, if any.
	///
	/// **Returns** whether a task ran.
	///
	/// Calling this from inside a task has no effect and returns `false`.
	pub fn run_once(&self) -> bool {
		self.queue.run_once()
	}

	/// The number of tasks that are scheduled but didn't run yet.
	#[must_use]
	pub fn len(&self) -> usize {
		self.queue.len()
	}

	/// Whether no tasks are waiting.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Whether `self` and `other` refer to the same queue.
	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.queue, &other.queue)
	}
}

impl SchedulerRef for QueueScheduler {
	fn schedule(&self, task: impl 'static + FnOnce()) {
		self.queue.push(Box::new(task));
	}
}

#[cfg(feature = "local_scheduler")]
thread_local! {
	static LOCAL_TASK_QUEUE: TaskQueue = const { TaskQueue::new() };
}

/// A plain [`SchedulerRef`] implementation that represents the current thread's task queue.
///
/// Each thread has its own queue, which behaves exactly like a [`QueueScheduler`].
/// Drive it with [`LocalScheduler::run`].
#[cfg(feature = "local_scheduler")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalScheduler;

#[cfg(feature = "local_scheduler")]
impl LocalScheduler {
	/// Runs this thread's scheduled tasks until the queue is empty.
	///
	/// See [`QueueScheduler::run`].
	pub fn run(self) -> usize {
		LOCAL_TASK_QUEUE.with(TaskQueue::run)
	}

	/// Runs the single oldest task scheduled on this thread, if any.
	///
	/// See [`QueueScheduler::run_once`].
	pub fn run_once(self) -> bool {
		LOCAL_TASK_QUEUE.with(TaskQueue::run_once)
	}

	/// The number of tasks scheduled on this thread that didn't run yet.
	#[must_use]
	pub fn len(self) -> usize {
		LOCAL_TASK_QUEUE.with(TaskQueue::len)
	}

	/// Whether no tasks are waiting on this thread.
	#[must_use]
	pub fn is_empty(self) -> bool {
		self.len() == 0
	}
}

#[cfg(feature = "local_scheduler")]
impl SchedulerRef for LocalScheduler {
	fn schedule(&self, task: impl 'static + FnOnce()) {
		LOCAL_TASK_QUEUE.with(|queue| queue.push(Box::new(task)));
	}
}
