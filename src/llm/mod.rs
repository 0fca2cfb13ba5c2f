//! Backend integration for answering questions.
//!
//! ```text
//! FallbackOrchestrator → AnswerBackend (ProjectAgent | RestAgent | ChatCompletion)
//!                              ↓
//!                   RunPoller → RunSource (project client | REST session)
//!                              ↓
//!                   extractor → MessageRecord (typed message | raw JSON)
//! ```
//!
//! # Key Types
//!
//! - [`AnswerBackend`] - one link of the fallback chain
//! - [`InvokeOutcome`] - answered, failed with a reply, or hand over to the next link
//! - [`RunPoller`] - waits for an agent run under a deadline or attempt budget
//! - [`MessageRecord`] - role, text and timestamp of a thread message

pub mod extractor;
pub mod poller;
pub mod providers;
pub mod traits;

pub use poller::{Clock, ManualClock, PollBudget, PollConclusion, PollPolicy, RunPoller, RunSource, TokioClock};
pub use traits::{
    AnswerBackend, BackendKind, ConversationHandle, InvokeOutcome, MessageRecord, RunSnapshot,
    RunStatus,
};
