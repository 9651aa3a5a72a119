// Standard Library Imports
use std::{
    collections::BTreeSet,
    io::{self, Write},
};

// External Crate Imports
use fragmenter::FragmentationRecord;

// Local Crate Imports
use crate::orchestrator::{InputRow, RowFailure};

/// Column names for [`FragmentationRecord`]'s `Display` output
pub const RECORD_HEADER: &str = "key\tvalue\tid\tcuts\tchanging_heavy_atoms\tunchanging_heavy_atoms";
pub const FAILURE_HEADER: &str = "index\tid\tmolecule\treason";

// Public API ==========================================================================================================

/// Where the results of a run end up. Rows arrive one at a time, on the thread that called
/// [`crate::Orchestrator::run()`]
pub trait RowSink {
    /// Every record cut from `row`. `records` is empty for failed rows when their reasons are being dropped
    fn fragmented(&mut self, row: &InputRow, records: &BTreeSet<FragmentationRecord>) -> io::Result<()>;

    fn failed(&mut self, failure: &RowFailure) -> io::Result<()>;
}

/// Keeps everything in memory
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CollectingSink {
    pub rows: Vec<(InputRow, BTreeSet<FragmentationRecord>)>,
    pub failures: Vec<RowFailure>,
}

impl CollectingSink {
    pub fn records(&self) -> impl Iterator<Item = &FragmentationRecord> {
        self.rows.iter().flat_map(|(_, records)| records)
    }

    /// Every record from every row, in key order
    #[must_use]
    pub fn into_records(self) -> BTreeSet<FragmentationRecord> {
        self.rows.into_iter().flat_map(|(_, records)| records).collect()
    }
}

impl RowSink for CollectingSink {
    fn fragmented(&mut self, row: &InputRow, records: &BTreeSet<FragmentationRecord>) -> io::Result<()> {
        self.rows.push((row.clone(), records.clone()));
        Ok(())
    }

    fn failed(&mut self, failure: &RowFailure) -> io::Result<()> {
        self.failures.push(failure.clone());
        Ok(())
    }
}

/// Writes one tab-separated line per record, and one per failed row if there's somewhere to put them
pub struct TsvSink<R, F> {
    records: R,
    failures: Option<F>,
}

impl<R: Write, F: Write> TsvSink<R, F> {
    pub fn new(mut records: R, failures: Option<F>, header: bool) -> io::Result<Self> {
        let mut failures = failures;
        if header {
            writeln!(records, "{RECORD_HEADER}")?;
            if let Some(failures) = &mut failures {
                writeln!(failures, "{FAILURE_HEADER}")?;
            }
        }
        Ok(Self { records, failures })
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.records.flush()?;
        self.failures.as_mut().map_or(Ok(()), Write::flush)
    }
}

impl<R: Write, F: Write> RowSink for TsvSink<R, F> {
    fn fragmented(&mut self, _row: &InputRow, records: &BTreeSet<FragmentationRecord>) -> io::Result<()> {
        for record in records {
            writeln!(self.records, "{record}")?;
        }
        Ok(())
    }

    fn failed(&mut self, failure: &RowFailure) -> io::Result<()> {
        let Some(failures) = &mut self.failures else {
            return Ok(());
        };
        let InputRow {
            index,
            id,
            molecule,
        } = &failure.row;
        writeln!(
            failures,
            "{index}\t{}\t{}\t{}",
            id.as_deref().unwrap_or_default(),
            molecule.as_deref().unwrap_or_default(),
            failure.reason
        )
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use fragmenter::{FragmentKey, FragmentValue, HeavyAtoms};
    use indoc::indoc;
    use insta::assert_snapshot;

    use super::*;
    use crate::orchestrator::FailureReason;

    fn records() -> BTreeSet<FragmentationRecord> {
        let value = |smiles, changing| {
            FragmentValue::new(smiles, "ethanol", HeavyAtoms { changing, unchanging: 3 - changing })
        };
        BTreeSet::from([
            FragmentationRecord::new(FragmentKey::new("[*:1]C", 1), value("[*:1]CO", 2)),
            FragmentationRecord::new(FragmentKey::new("[*:1]O", 1), value("[*:1]CC", 2)),
        ])
    }

    #[test]
    fn tab_separated_output() {
        let mut records_out = Vec::new();
        let mut failures_out = Vec::new();
        let mut sink = TsvSink::new(&mut records_out, Some(&mut failures_out), true).unwrap();

        let row = InputRow::new(0, "ethanol", "CCO");
        sink.fragmented(&row, &records()).unwrap();
        let failure = RowFailure {
            row: InputRow {
                index: 1,
                id: None,
                molecule: Some("CC.O".to_owned()),
            },
            reason: FailureReason::MissingId,
        };
        sink.failed(&failure).unwrap();
        sink.flush().unwrap();

        let records_out = String::from_utf8(records_out).unwrap().replace('\t', " | ");
        assert_snapshot!(records_out, @r"
        key | value | id | cuts | changing_heavy_atoms | unchanging_heavy_atoms
        [*:1]C | [*:1]CO | ethanol | 1 | 2 | 1
        [*:1]O | [*:1]CC | ethanol | 1 | 2 | 1
        ");
        let failures_out = String::from_utf8(failures_out).unwrap().replace('\t', " | ");
        assert_eq!(
            failures_out,
            indoc! {"
                index | id | molecule | reason
                1 |  | CC.O | Missing ID
            "}
        );
    }

    #[test]
    fn failures_without_an_output_are_dropped() {
        let mut records_out = Vec::new();
        let mut sink = TsvSink::new(&mut records_out, None::<Vec<u8>>, false).unwrap();
        let failure = RowFailure {
            row: InputRow::new(0, "methane", "C"),
            reason: FailureReason::NoCuttableBonds,
        };
        sink.failed(&failure).unwrap();
        sink.fragmented(&failure.row, &BTreeSet::new()).unwrap();
        assert!(records_out.is_empty());
    }

    #[test]
    fn collecting() {
        let mut sink = CollectingSink::default();
        sink.fragmented(&InputRow::new(0, "ethanol", "CCO"), &records()).unwrap();
        sink.fragmented(&InputRow::new(1, "ethanol", "CCO"), &records()).unwrap();
        assert_eq!(sink.records().count(), 4);
        assert_eq!(sink.into_records().len(), 2);
    }
}
