//! `supportflow-agents` — the agent roster as an event producer.
//!
//! Agents are the platform's support staff. This crate owns their record,
//! their projections (`webhook_data`, `push_event_data`), and the
//! representative **dispatch call site**: the directory persists an agent in
//! its roster and only then constructs and dispatches the lifecycle event.
//! Event production is an explicit call at the boundary of the roster's own
//! persistence, not an ORM callback.

pub mod agent;
pub mod directory;

pub use agent::{Agent, AgentRole};
pub use directory::{AgentDirectory, AgentStore, InMemoryAgentRoster};
