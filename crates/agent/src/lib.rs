//! The conversation runtime: the loop at the heart of ThreadClaw.
//!
//! One run on a thread follows an **Ask → Act → Decide** cycle:
//!
//! 1. **Ask** the LLM client what should happen next, given the full thread state
//! 2. **Act** on the first proposed call through the [`ToolExecutor`], which
//!    normalizes its arguments and runs each distinct call at most once
//! 3. **Decide** whether the run is over (terminal tool, nothing proposed,
//!    a posted message after the first iteration, or the iteration cap)
//!
//! Failures get exactly one recovery round before the run stops. The
//! [`ThreadDispatcher`] maps inbound events onto runs, one at a time per thread.

pub mod dispatcher;
pub mod executor;
pub mod loop_runner;
pub mod normalize;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::{Dispatch, ThreadDispatcher};
pub use executor::{Execution, ToolExecutor};
pub use loop_runner::{ConversationLoop, LoopOutcome, LoopPhase, StopReason, MAX_ITERATIONS};
pub use normalize::{NormalizedArgs, normalize};
