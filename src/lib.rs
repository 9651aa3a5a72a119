//! Matched molecular pair discovery: rows of molecules are fragmented (in parallel) into key / value records, which
//! are then grouped by key and paired up into transforms

pub mod config;
pub mod orchestrator;
pub mod records;
pub mod sink;

pub use config::RunConfig;
pub use orchestrator::{
    FailedRowPolicy, FailureReason, InputRow, Orchestrator, ProcessedRow, RowFailure, RowOutcome, RunError,
    RunSettings, RunSummary,
};
pub use records::{RecordError, RecordLineError, parse_record, read_records};
pub use sink::{CollectingSink, RowSink, TsvSink};
