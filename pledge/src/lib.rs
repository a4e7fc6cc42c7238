#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! [`Deferred`] and its resolving functions are `!Send`. Every callback runs on the thread that owns the scheduler.

mod deferred;
mod error;
mod resolution;
mod settled;
mod work_stack;

pub use deferred::{Deferred, DeferredState};
pub use error::{Abandoned, ChainingCycle, NotCallable};
pub use resolution::{Rejecter, Resolution, Resolver, Thenable};
pub use settled::Settled;

pub use pledge_scheduler::runtime::{QueueScheduler, SchedulerRef};

#[cfg(feature = "local_scheduler")]
pub use pledge_scheduler::runtime::LocalScheduler;
