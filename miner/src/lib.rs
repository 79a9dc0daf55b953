//! # Mining dispatch.
//!
//! The dispatch core of a block production pipeline. An [`Agent`] accepts
//! units of [`Work`] and drives an external [`SealEngine`] over them,
//! keeping at most one seal attempt active at a time: submitting new work
//! cancels whatever attempt is currently running before the new one starts.
//!
//! The agent knows nothing about what sealing actually computes, how blocks
//! are built, or where they go afterwards. Those live behind the capability
//! traits in this crate; block construction and result consumption belong to
//! the owner.
//!
//! ## Cycle of the agent
//!
//! The owner constructs the agent over a chain handle and an engine,
//! configures a result sink, and starts it. Starting spawns a single
//! supervisor task that waits for work or a stop signal. Each arriving work
//! item closes the cancellation token of the attempt in flight, installs a
//! fresh token, and spawns a new seal task; each seal task invokes the
//! engine once and pushes its outcome onto the sink, [`SealResult`] on
//! success or an explicit absent marker otherwise. Stopping closes the
//! current token, drains the mailbox and terminates the supervisor; the
//! agent can then be started again.
//!
//! Cancellation is cooperative throughout: the engine is expected to watch
//! the token it was handed and return promptly once it fires. Nothing is
//! forcibly terminated, and no timeouts are enforced here.

#![warn(missing_docs)]

mod agent;
mod engine;
pub mod memory;
mod work;

pub use crate::agent::{Agent, ResultSink, SealOutcome};
pub use crate::engine::{HashrateMeter, SealEngine, SealError};
pub use crate::work::{SealResult, Work};
