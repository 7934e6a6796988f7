//! Common functionality for the expanse capacity-expansion model.
#![warn(missing_docs)]
pub mod co2;
pub mod commands;
pub mod derive;
pub mod generator;
pub mod heat;
pub mod hydrogen;
pub mod id;
pub mod industry;
pub mod input;
pub mod lifecycle;
pub mod log;
pub mod model;
pub mod natural_gas;
pub mod output;
pub mod problem;
pub mod sampler;
pub mod settings;
pub mod storage;
pub mod time;
pub mod topology;
pub mod transmission;

#[cfg(test)]
mod fixture;
