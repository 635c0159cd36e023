//! personabot: a social media agent that learns an account's voice from its
//! history and engages with its timeline and mentions in that voice.
//!
//! The pipeline is collect, profile, decide, generate, execute:
//!
//! - [`collector`] pulls the account's posts and likes into the local store
//! - [`profiler`] turns them into a seven-dimension [`profile::PersonalityProfile`]
//! - [`decision`] scores incoming posts and picks actions
//! - [`generator`] writes replies through the [`llm`] provider
//! - [`agent`] runs the passes on a schedule against a [`platform`]

pub mod agent;
pub mod cli;
pub mod collector;
pub mod config;
pub mod db;
pub mod decision;
pub mod error;
pub mod generator;
pub mod llm;
pub mod platform;
pub mod profile;
pub mod profiler;
pub mod ratelimit;
pub mod retry;
pub mod safety;
pub mod settings;
pub mod util;

#[cfg(test)]
mod testing;
