use std::{
	cell::{Cell, RefCell},
	collections::VecDeque,
	fmt::{self, Debug, Formatter},
};

use tracing::{debug, trace};
use unwind_safe::try_eval;

type Task = Box<dyn 'static + FnOnce()>;

pub(crate) struct TaskQueue {
	tasks: RefCell<VecDeque<Task>>,
	draining: Cell<bool>,
}

impl Debug for TaskQueue {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskQueue")
			.field("pending", &self.len())
			.field("draining", &self.draining.get())
			.finish_non_exhaustive()
	}
}

impl Default for TaskQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl TaskQueue {
	pub(crate) const fn new() -> Self {
		Self {
			tasks: RefCell::new(VecDeque::new()),
			draining: Cell::new(false),
		}
	}

	pub(crate) fn push(&self, task: Task) {
		let mut tasks = self.tasks.borrow_mut();
		tasks.push_back(task);
		trace!(pending = tasks.len(), "scheduled task");
	}

	pub(crate) fn len(&self) -> usize {
		self.tasks.borrow().len()
	}

	fn pop(&self) -> Option<Task> {
		// The borrow must end before the task runs, since tasks schedule more tasks.
		self.tasks.borrow_mut().pop_front()
	}

	pub(crate) fn run(&self) -> usize {
		if self.draining.replace(true) {
			debug!("refused nested drain of a task queue");
			return 0;
		}

		try_eval(|| {
			let mut ran = 0;
			while let Some(task) = self.pop() {
				task();
				ran += 1;
			}
			trace!(ran, "drained task queue");
			ran
		})
		.finally(|()| self.draining.set(false))
	}

	pub(crate) fn run_once(&self) -> bool {
		if self.draining.replace(true) {
			debug!("refused nested turn of a task queue");
			return false;
		}

		try_eval(|| match self.pop() {
			Some(task) => {
				task();
				true
			}
			None => false,
		})
		.finally(|()| self.draining.set(false))
	}
}
