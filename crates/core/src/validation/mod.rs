//! Bot-based report validation.
//!
//! Rules and bots are plain data; evaluators and fixes are looked up by id
//! in registries built once when the [`engine::BotEngine`] is constructed.

pub mod bots;
pub mod engine;
pub mod evaluator;
pub mod fixes;
pub mod rules;
