//! Core domain types
//!
//! These types describe one generation job over its whole lifetime: the
//! parameters it was submitted with, the provider's view of it while it runs,
//! and the durable record kept on disk once it settles.

pub mod job;
pub mod outcome;
pub mod record;
