//! Data Transfer Objects
//!
//! Values handed back to front ends by the orchestrator's two public
//! operations. They are plain serializable views; nothing here is persisted.

pub mod job;
