use std::{cell::RefCell, collections::VecDeque, fmt::Debug, rc::Rc};

/// A shared event log. Clones append to the same log.
pub struct Validator<T>(Rc<RefCell<VecDeque<T>>>);

impl<T> Clone for Validator<T> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<T> Validator<T> {
	pub fn new() -> Self {
		Self(Rc::new(RefCell::new(VecDeque::new())))
	}

	pub fn push(&self, value: T) {
		self.0.borrow_mut().push_back(value);
	}

	#[track_caller]
	pub fn expect(&self, expected: impl IntoIterator<Item = T>)
	where
		T: Debug + Eq,
	{
		let mut binding = self.0.borrow_mut();
		let mut a = binding.drain(..);
		let mut b = expected.into_iter();
		loop {
			match (a.next(), b.next()) {
				(None, None) => break,
				(a, b) => assert_eq!(a, b),
			}
		}
	}
}
