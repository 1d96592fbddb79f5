//! Memory for agents.
//!
//! - [`WorkingMemory`]: bounded FIFO of recent results, owned by one agent and
//!   shown to workers as context
//! - [`PlanStore`]: previous plans keyed by task, injected into the planning
//!   worker so repeated tasks can reuse earlier plans

mod plans;
mod working;

pub use plans::{InMemoryPlanStore, PlanStore};
pub use working::{WorkingMemory, DEFAULT_WORKING_MEMORY_SIZE};
