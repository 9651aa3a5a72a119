// Standard Library Imports
use std::{
    collections::{BTreeMap, BTreeSet},
    io, thread,
};

// External Crate Imports
use crossbeam_channel::{Receiver, bounded};
use frag2pair::PairError;
use fragmenter::{
    CancellationToken, FactoryError, FragmentationEngine, FragmentationRecord, IncomingMoleculeError,
};
use miette::Diagnostic;
use molkit::MoleculeToolkit;
use thiserror::Error;
use tracing::{debug, info, warn};

// Local Crate Imports
use crate::sink::RowSink;

// Public API ==========================================================================================================

/// One molecule to fragment, as supplied by the host
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct InputRow {
    pub index: usize,
    pub id: Option<String>,
    pub molecule: Option<String>,
}

impl InputRow {
    pub fn new(index: usize, id: impl Into<String>, molecule: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            molecule: Some(molecule.into()),
        }
    }

    /// Reads a `molecule<TAB>id` line. Blank columns are missing, but an empty line is still a (missing) molecule
    #[must_use]
    pub fn from_line(index: usize, line: &str) -> Self {
        let mut columns = line.trim_end_matches(['\r', '\n']).split('\t');
        let mut column = || columns.next().map(str::trim).filter(|c| !c.is_empty()).map(str::to_owned);
        let molecule = column();
        let id = column();
        Self { index, id, molecule }
    }
}

/// Why a row gave no records
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum FailureReason {
    #[error("Missing incoming molecule")]
    MissingMolecule,
    #[error("Missing ID")]
    MissingId,
    #[error("Empty molecule")]
    NoStructure,
    #[error("Multi-component molecule")]
    MultiComponent,
    #[error("No cuttable bonds found")]
    NoCuttableBonds,
    #[error("No fragmentations passed the filters")]
    NoFragmentations,
    #[error("{0}")]
    Toolkit(String),
    #[error("Fragmentation factory used after being closed")]
    ClosedFactory,
}

/// What happens to rows that couldn't be fragmented
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum FailedRowPolicy {
    /// Sent, with their reason, to the sink's failure output
    #[default]
    Route,
    /// Forwarded to the primary output without any records, and without a reason
    Drop,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct RunSettings {
    pub threads: usize,
    /// Rows (and results) allowed to wait between threads before the reader blocks
    pub queue_size: usize,
    /// Hand rows to the sink in input order, rather than as soon as they're finished
    pub keep_order: bool,
    pub failed_rows: FailedRowPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        let threads = thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            threads,
            queue_size: 4 * threads,
            keep_order: true,
            failed_rows: FailedRowPolicy::default(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ProcessedRow {
    pub row: InputRow,
    pub outcome: RowOutcome,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum RowOutcome {
    Fragmented(BTreeSet<FragmentationRecord>),
    Failed(FailureReason),
    Cancelled,
}

/// A row that gave no records, with everything needed to find it again
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RowFailure {
    pub row: InputRow,
    pub reason: FailureReason,
}

/// Tallies of a run, so far or in total
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct RunSummary {
    pub rows: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: usize,
}

#[derive(Debug, Diagnostic, Error)]
pub enum RunError {
    #[error("the run was cancelled")]
    Cancelled,

    #[error("failed to write results")]
    Io(#[from] io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pairing(#[from] PairError),
}

/// Fragments rows one molecule at a time, on as many threads as the settings allow
pub struct Orchestrator<T: MoleculeToolkit> {
    engine: FragmentationEngine<T>,
    settings: RunSettings,
}

impl<T: MoleculeToolkit> Orchestrator<T> {
    pub const fn new(engine: FragmentationEngine<T>, settings: RunSettings) -> Self {
        Self { engine, settings }
    }

    #[must_use]
    pub const fn engine(&self) -> &FragmentationEngine<T> {
        &self.engine
    }

    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Fragments a single row. Nothing the toolkit builds for this row outlives the call
    pub fn process_row(&self, row: InputRow, cancellation: &CancellationToken) -> ProcessedRow {
        let outcome = self.fragment_row(&row, cancellation);
        match &outcome {
            RowOutcome::Fragmented(records) => {
                debug!(index = row.index, records = records.len(), "fragmented row");
            }
            RowOutcome::Failed(reason) => debug!(index = row.index, %reason, "failed to fragment row"),
            RowOutcome::Cancelled => debug!(index = row.index, "cancelled row"),
        }
        ProcessedRow { row, outcome }
    }

    /// Reads `rows` on one thread, fragments them on `threads` more, and hands the results to `sink` on this one.
    /// `progress` is called with the running tallies after every row
    pub fn run<I>(
        &self,
        rows: I,
        sink: &mut impl RowSink,
        cancellation: &CancellationToken,
        progress: impl FnMut(&RunSummary),
    ) -> Result<RunSummary, RunError>
    where
        I: IntoIterator<Item = InputRow>,
        I::IntoIter: Send,
    {
        let RunSettings {
            threads,
            queue_size,
            ..
        } = self.settings;
        let threads = threads.max(1);
        info!(threads, queue_size, "starting fragmentation run");

        let summary = thread::scope(|scope| {
            let (row_sender, row_receiver) = bounded::<(usize, InputRow)>(queue_size);
            let (result_sender, result_receiver) = bounded::<(usize, ProcessedRow)>(queue_size);

            let rows = rows.into_iter();
            scope.spawn(move || {
                for (sequence, row) in rows.enumerate() {
                    // NOTE: Once cancelled, rows already queued are still drained by the workers
                    if cancellation.is_cancelled() || row_sender.send((sequence, row)).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..threads {
                let row_receiver = row_receiver.clone();
                let result_sender = result_sender.clone();
                scope.spawn(move || {
                    for (sequence, row) in row_receiver {
                        let processed = if cancellation.is_cancelled() {
                            ProcessedRow {
                                row,
                                outcome: RowOutcome::Cancelled,
                            }
                        } else {
                            self.process_row(row, cancellation)
                        };
                        if result_sender.send((sequence, processed)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(row_receiver);
            drop(result_sender);

            self.collect(result_receiver, sink, progress)
        })?;

        if cancellation.is_cancelled() {
            warn!(rows = summary.rows, "fragmentation run cancelled");
            return Err(RunError::Cancelled);
        }
        info!(
            rows = summary.rows,
            succeeded = summary.succeeded,
            failed = summary.failed,
            records = summary.records,
            "finished fragmentation run"
        );
        Ok(summary)
    }
}

// Private Helper Functions ============================================================================================

impl<T: MoleculeToolkit> Orchestrator<T> {
    fn fragment_row(&self, row: &InputRow, cancellation: &CancellationToken) -> RowOutcome {
        let Some(molecule) = &row.molecule else {
            return RowOutcome::Failed(FailureReason::MissingMolecule);
        };
        let Some(id) = &row.id else {
            return RowOutcome::Failed(FailureReason::MissingId);
        };
        if cancellation.is_cancelled() {
            return RowOutcome::Cancelled;
        }

        let molecule = match self.engine.toolkit().parse(molecule) {
            Ok(molecule) => molecule,
            Err(error) => return RowOutcome::Failed(FailureReason::Toolkit(error.to_string())),
        };

        let settings = self.engine.settings();
        // NOTE: The factory (and every molecule it holds) is dropped on every path out of this block
        let result = self.engine.factory(id.as_str(), molecule, cancellation).and_then(|mut factory| {
            if !factory.can_cut_n_times(settings.cut_count, settings.allows_bond_as_value())? {
                return Ok(None);
            }
            let records = factory.fragment()?;
            factory.close();
            Ok(Some(records))
        });

        match result {
            Ok(Some(records)) if records.is_empty() => RowOutcome::Failed(FailureReason::NoFragmentations),
            Ok(Some(records)) => RowOutcome::Fragmented(records),
            Ok(None) => RowOutcome::Failed(FailureReason::NoCuttableBonds),
            Err(FactoryError::Cancelled) => RowOutcome::Cancelled,
            Err(error) => RowOutcome::Failed(error.into()),
        }
    }

    fn collect(
        &self,
        results: Receiver<(usize, ProcessedRow)>,
        sink: &mut impl RowSink,
        mut progress: impl FnMut(&RunSummary),
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();
        let mut emit = |processed: ProcessedRow| -> Result<(), RunError> {
            self.emit(processed, sink, &mut summary)?;
            progress(&summary);
            Ok(())
        };

        if self.settings.keep_order {
            let mut waiting = BTreeMap::new();
            let mut next = 0;
            for (sequence, processed) in results {
                waiting.insert(sequence, processed);
                while let Some(processed) = waiting.remove(&next) {
                    emit(processed)?;
                    next += 1;
                }
            }
        } else {
            for (_, processed) in results {
                emit(processed)?;
            }
        }

        Ok(summary)
    }

    fn emit(
        &self,
        processed: ProcessedRow,
        sink: &mut impl RowSink,
        summary: &mut RunSummary,
    ) -> Result<(), RunError> {
        let ProcessedRow { row, outcome } = processed;
        match outcome {
            RowOutcome::Fragmented(records) => {
                summary.succeeded += 1;
                summary.records += records.len();
                sink.fragmented(&row, &records)?;
            }
            RowOutcome::Failed(reason) => {
                summary.failed += 1;
                match self.settings.failed_rows {
                    FailedRowPolicy::Route => {
                        warn!(index = row.index, id = row.id.as_deref(), %reason, "routing failed row");
                        sink.failed(&RowFailure { row, reason })?;
                    }
                    FailedRowPolicy::Drop => sink.fragmented(&row, &BTreeSet::new())?,
                }
            }
            RowOutcome::Cancelled => return Ok(()),
        }
        summary.rows += 1;
        Ok(())
    }
}

impl From<FactoryError> for FailureReason {
    fn from(error: FactoryError) -> Self {
        match error {
            FactoryError::IncomingMolecule(IncomingMoleculeError::NoStructure) => Self::NoStructure,
            FactoryError::IncomingMolecule(IncomingMoleculeError::MultiComponent) => Self::MultiComponent,
            FactoryError::Closed => Self::ClosedFactory,
            error @ (FactoryError::Toolkit(_) | FactoryError::Cancelled) => Self::Toolkit(error.to_string()),
        }
    }
}

// Module Tests ========================================================================================================
