//! The agent: wires collection, profiling, decisions and replies to the
//! platform, and drives them on a schedule.
//!
//! - `agent_loop` - `Agent`, `AgentDeps`, startup and the run loop
//! - `executor` - timeline and mention passes, action execution

mod agent_loop;
mod executor;

pub use agent_loop::{Agent, AgentDeps};
pub use executor::CycleReport;
