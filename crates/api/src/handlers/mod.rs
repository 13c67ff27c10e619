pub mod bots;
pub mod report;
pub mod workflow;
