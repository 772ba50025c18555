//! Sequence module
//!
//! Atomic allocation of human-facing pledge numbers.

mod repository;

pub use repository::{format_pledge_number, PledgeNumberSequence, SequenceError};
