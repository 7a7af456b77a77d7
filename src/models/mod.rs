pub mod extraction;
pub mod ledger;
pub mod transcript;

pub use extraction::{
    ExtractionColumns, ExtractionRecord, ExtractionRow, FinancialImpact, Scores,
    StructuredSummary, Tags,
};
pub use ledger::{LedgerEntry, RunStatus};
pub use transcript::{DateWindow, RawModelOutput, Transcript};
