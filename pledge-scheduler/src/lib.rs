#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Everything in this crate is single-threaded. Schedulers are `!Send` and tasks never cross threads.

#[cfg(all(feature = "local_scheduler", feature = "forbid_local_scheduler"))]
compile_error!("A dependent enabled the `local_scheduler` feature, but another forbids it with the `forbid_local_scheduler` feature. Please do not enable `local_scheduler` in libraries.");

pub mod runtime;
