pub mod transcript_flow;
pub mod unit_ctx;

pub use transcript_flow::{TranscriptFlow, UnitOutcome};
pub use unit_ctx::UnitCtx;
