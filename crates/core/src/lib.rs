//! Laboratory report validation workflow engine.
//!
//! Domain logic with no transport or storage dependencies:
//!
//! - [`validation`] runs bots of rules against a report and applies
//!   auto-fixes.
//! - [`workflow`] plans the review steps for a report and moves a workflow
//!   through them.
//! - [`signature`] validates signer credentials and issues hashed
//!   signatures.
//! - [`finalizer`] commits a report to `final`.
//!
//! Collaborators (report store, audit sink, credential validator, identity
//! directory, workflow repository) are traits with in-memory
//! implementations.

pub mod actor;
pub mod audit;
pub mod config;
pub mod directory;
pub mod error;
pub mod finalizer;
pub mod hashing;
pub mod report;
pub mod roles;
pub mod signature;
pub mod store;
pub mod types;
pub mod validation;
pub mod workflow;
