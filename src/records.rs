// Standard Library Imports
use std::io::BufRead;

// External Crate Imports
use fragmenter::{Fingerprint, FragmentKey, FragmentValue, FragmentationRecord, HeavyAtoms};
use miette::Diagnostic;
use thiserror::Error;

// Local Crate Imports
use crate::sink::RECORD_HEADER;

// Public API ==========================================================================================================

/// Reads back lines written by [`crate::TsvSink`], skipping the header and any blank lines
pub fn read_records(input: impl BufRead) -> impl Iterator<Item = Result<FragmentationRecord, RecordError>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line_number = index + 1;
            let line = match line {
                Ok(line) => line,
                Err(error) => return Some(Err(RecordError::Io(error))),
            };
            if line.trim().is_empty() || line.starts_with(RECORD_HEADER) {
                return None;
            }
            Some(parse_record(&line).map_err(|kind| RecordError::Line { line_number, kind }))
        })
}

/// Parses one tab-separated record line
pub fn parse_record(line: &str) -> Result<FragmentationRecord, RecordLineError> {
    let columns: Vec<_> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let [key, value, id, cuts, changing, unchanging, rest @ ..] = columns.as_slice() else {
        return Err(RecordLineError::MissingColumns(columns.len()));
    };

    let number = |column: &'static str, text: &str| {
        text.parse::<usize>()
            .map_err(|_| RecordLineError::NotANumber(column, text.to_owned()))
    };
    let cut_count = number("cuts", cuts)?;
    let heavy_atoms = HeavyAtoms {
        changing: number("changing_heavy_atoms", changing)?,
        unchanging: number("unchanging_heavy_atoms", unchanging)?,
    };
    let fingerprints = match rest.first() {
        Some(fingerprints) if !fingerprints.is_empty() => fingerprints
            .split(',')
            .map(parse_fingerprint)
            .collect::<Result<_, _>>()?,
        _ => Vec::new(),
    };

    let mut value = FragmentValue::new(*value, *id, heavy_atoms);
    value.fingerprints = fingerprints;
    Ok(FragmentationRecord::new(FragmentKey::new(*key, cut_count), value))
}

#[derive(Debug, Diagnostic, Error)]
pub enum RecordError {
    #[error("failed to read records")]
    Io(#[from] std::io::Error),

    #[error("line {line_number} isn't a valid fragmentation record")]
    Line {
        line_number: usize,
        #[source]
        #[diagnostic_source]
        kind: RecordLineError,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Diagnostic, Error)]
pub enum RecordLineError {
    #[diagnostic(help("records need a key, value, ID, cut count, and two heavy atom counts, separated by tabs"))]
    #[error("expected at least 6 columns, but found {0}")]
    MissingColumns(usize),

    #[error("the {0} column should be a whole number, but was {1:?}")]
    NotANumber(&'static str, String),

    #[error("{0:?} isn't a hexadecimal fingerprint")]
    Fingerprint(String),
}

// Private Helper Functions ============================================================================================

fn parse_fingerprint(hex: &str) -> Result<Fingerprint, RecordLineError> {
    let invalid = || RecordLineError::Fingerprint(hex.to_owned());
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(invalid());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()
        .map(Fingerprint::from)
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn records_survive_a_round_trip() {
        let mut value = FragmentValue::new("[*:1]O", "phenol", HeavyAtoms { changing: 1, unchanging: 6 });
        value.fingerprints = vec![Fingerprint::from(vec![0x0a, 0xf0]), Fingerprint::from(vec![0x01])];
        let record = FragmentationRecord::new(FragmentKey::new("[*:1]c1ccccc1", 1), value);
        let parsed = parse_record(&record.to_string()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.value.heavy_atoms, record.value.heavy_atoms);
        assert_eq!(parsed.value.fingerprints, record.value.fingerprints);
    }

    #[test]
    fn reading_files() {
        let file = indoc! {"
            key\tvalue\tid\tcuts\tchanging_heavy_atoms\tunchanging_heavy_atoms
            [*:1]C\t[*:1]CO\tethanol\t1\t2\t1

            [*:1]O\t[*:1]CC\tethanol\t1\t2\t1
        "};
        let records: Vec<_> = read_records(file.as_bytes()).collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].key.smiles, "[*:1]O");
        assert!(records[1].value.fingerprints.is_empty());

        let broken = "[*:1]C\t[*:1]CO\tethanol\t1\t2\t1\n[*:1]C\t[*:1]O\n";
        let error = read_records(broken.as_bytes()).find_map(Result::err).unwrap();
        assert!(matches!(
            error,
            RecordError::Line {
                line_number: 2,
                kind: RecordLineError::MissingColumns(2)
            }
        ));
    }

    #[test]
    fn invalid_columns() {
        assert_eq!(
            parse_record("K\tV\tid\tone\t2\t1"),
            Err(RecordLineError::NotANumber("cuts", "one".to_owned()))
        );
        assert_eq!(
            parse_record("K\tV\tid\t1\t2\t1\t0g"),
            Err(RecordLineError::Fingerprint("0g".to_owned()))
        );
        assert_eq!(
            parse_record("K\tV\tid\t1\t2\t1\tabc"),
            Err(RecordLineError::Fingerprint("abc".to_owned()))
        );
    }
}
