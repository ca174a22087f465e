//! Clipjob Core
//!
//! Core types shared by the provider client, the orchestrator and the CLI.
//!
//! This crate contains:
//! - Domain types: jobs, persisted job records and poll outcomes
//! - DTOs: the values returned to front ends (receipts and snapshots)
//! - The static model catalog and per-model input shaping
//! - The `ByteSource` abstraction used to stream artifacts into storage

pub mod catalog;
pub mod domain;
pub mod dto;
pub mod source;
