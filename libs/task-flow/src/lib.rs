//! The compensating-transaction engine ("task flow", spec §4.C) and the
//! bounded-time poller (spec §4.D) that volume orchestrators are built on.

pub mod clock;
pub mod flow;
pub mod poller;

pub use clock::{Clock, FakeClock, TokioClock};
pub use flow::{ClosureStep, FlowState, Step, TaskFlow, Transaction};
pub use poller::{PollOutcome, Poller};
