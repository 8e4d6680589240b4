//! Study loop orchestration: persistence, remote tracking and statistics
//! around the core `StudySession` state machine.

mod events;
mod workflow;

pub use events::{StudyEvent, StudyEventKind};
pub use workflow::{CompletionReport, StepOutcome, StudyContext, StudyLoopService};
