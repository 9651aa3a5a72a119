// Standard Library Imports
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::OnceLock,
};

// External Crate Imports
use clap::{Parser, Subcommand};
use frag2pair::{BatchPairer, PairSettings, StreamingPairer, TransformPair};
use fragmenter::{CancellationToken, CutRules, FragmentationEngine, FragmentationRecord};
use miette::{IntoDiagnostic, Result, WrapErr};
use mmpfinder::{CollectingSink, InputRow, Orchestrator, RecordError, RowSink, RunConfig, TsvSink, read_records};
use molkit::SmilesToolkit;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Find matched molecular pairs: fragment molecules into keys and values, then pair up values that share a key
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// A KDL run configuration (defaults are used for anything it leaves out)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log level, used when `RUST_LOG` isn't set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fragment a file of tab-separated `molecule<TAB>id` lines into records
    Fragment {
        input: PathBuf,
        /// Where records are written (standard output if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Where rows that couldn't be fragmented are written
        #[arg(short, long)]
        failures: Option<PathBuf>,
    },
    /// Pair up records written by `fragment`
    Pair {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Records are already sorted by key, so only one group needs to be held in memory at a time
        #[arg(long, default_value_t = false)]
        sorted: bool,
    },
    /// Fragment and pair in one go, without writing out the records
    Mmp {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        failures: Option<PathBuf>,
    },
    /// List the named cut rules that can be used in a configuration
    Rules,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let rules = CutRules::bundled()?;
    let config = match &args.config {
        Some(path) => {
            let kdl = fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            RunConfig::new(&rules, path.display().to_string(), kdl)?
        }
        None => RunConfig::with_defaults(&rules)?,
    };

    match args.command {
        Command::Fragment {
            input,
            output,
            failures,
        } => {
            let orchestrator = orchestrator(&config)?;
            let mut sink = TsvSink::new(writer(output.as_deref())?, failures.map(create).transpose()?, true)
                .into_diagnostic()?;
            fragment_rows(&orchestrator, BufReader::new(open(&input)?), &mut sink)?;
            sink.flush().into_diagnostic()
        }
        Command::Pair {
            input,
            output,
            sorted,
        } => {
            let records = BufReader::new(open(&input)?);
            let mut output = writer(output.as_deref())?;
            writeln!(output, "{}", TransformPair::header(&config.pairing)).into_diagnostic()?;
            if sorted {
                pair_sorted(config.pairing, read_records(records), &mut output)?;
            } else {
                let records = read_records(records).collect::<Result<Vec<_>, _>>()?;
                pair_all(config.pairing, records, &mut output)?;
            }
            output.flush().into_diagnostic()
        }
        Command::Mmp {
            input,
            output,
            failures,
        } => {
            let orchestrator = orchestrator(&config)?;
            let mut sink = CollectingSink::default();
            fragment_rows(&orchestrator, BufReader::new(open(&input)?), &mut sink)?;

            if let Some(path) = failures {
                let mut failures = TsvSink::new(io::sink(), Some(create(path)?), true).into_diagnostic()?;
                for failure in &sink.failures {
                    failures.failed(failure).into_diagnostic()?;
                }
                failures.flush().into_diagnostic()?;
            }

            let mut output = writer(output.as_deref())?;
            writeln!(output, "{}", TransformPair::header(&config.pairing)).into_diagnostic()?;
            pair_all(config.pairing, sink.into_records(), &mut output)?;
            output.flush().into_diagnostic()
        }
        Command::Rules => {
            for rule in rules.iter() {
                println!("{}\t{}\t{}", rule.name, rule.pattern, rule.description);
            }
            Ok(())
        }
    }
}

fn orchestrator(config: &RunConfig) -> Result<Orchestrator<SmilesToolkit>> {
    let engine = FragmentationEngine::new(SmilesToolkit, &config.pattern, config.fragmentation.clone())?;
    Ok(Orchestrator::new(engine, config.run))
}

fn pair_sorted(
    settings: PairSettings,
    records: impl Iterator<Item = Result<FragmentationRecord, RecordError>>,
    output: &mut impl Write,
) -> Result<()> {
    let mut pairer = StreamingPairer::new(settings, SmilesToolkit);
    for record in records {
        write_pairs(output, pairer.push(record?)?)?;
    }
    write_pairs(output, pairer.finish()?)
}

fn pair_all(
    settings: PairSettings,
    records: impl IntoIterator<Item = FragmentationRecord>,
    output: &mut impl Write,
) -> Result<()> {
    let mut pairer = BatchPairer::new(settings, SmilesToolkit);
    pairer.extend(records);
    info!(groups = pairer.len(), "pairing records");
    write_pairs(output, pairer.finish_parallel()?)
}

fn write_pairs(output: &mut impl Write, pairs: Vec<TransformPair>) -> Result<()> {
    for pair in pairs {
        writeln!(output, "{pair}").into_diagnostic()?;
    }
    Ok(())
}

// NOTE: The run stops at the first line that can't be read, and that error is returned once it's wound down
fn fragment_rows(
    orchestrator: &Orchestrator<SmilesToolkit>,
    input: impl BufRead + Send,
    sink: &mut impl RowSink,
) -> Result<()> {
    let unreadable = OnceLock::new();
    let rows = input.lines().enumerate().map_while(|(index, line)| match line {
        Ok(line) => Some(InputRow::from_line(index, &line)),
        Err(error) => {
            let _ = unreadable.set(error);
            None
        }
    });
    orchestrator.run(rows, sink, &CancellationToken::new(), |_| ())?;

    match unreadable.into_inner() {
        Some(error) => Err(error).into_diagnostic().wrap_err("failed to read input rows"),
        None => Ok(()),
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to open {}", path.display()))
}

fn create(path: PathBuf) -> Result<BufWriter<File>> {
    File::create(&path)
        .map(BufWriter::new)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create {}", path.display()))
}

fn writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(create(path.to_owned())?),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

#[cfg(test)]
mod tests {
    use mmpfinder::FailureReason;

    use super::*;

    #[test]
    fn unreadable_lines_stop_the_run() {
        let config = RunConfig::with_defaults(&CutRules::bundled().unwrap()).unwrap();
        let orchestrator = orchestrator(&config).unwrap();

        let mut sink = CollectingSink::default();
        let error = fragment_rows(&orchestrator, &b"CCO\tethanol\n\xff\tbroken\nCCN\tethylamine\n"[..], &mut sink)
            .unwrap_err();
        assert_eq!(error.to_string(), "failed to read input rows");
        assert!(sink.failures.iter().all(|f| f.reason != FailureReason::MissingMolecule));
        assert!(sink.rows.iter().all(|(row, _)| row.index == 0));

        // Blank lines can still be read, so they're reported as rows without a molecule
        let mut sink = CollectingSink::default();
        fragment_rows(&orchestrator, &b"\n"[..], &mut sink).unwrap();
        assert_eq!(sink.failures.len(), 1);
        assert_eq!(sink.failures[0].reason, FailureReason::MissingMolecule);
    }
}
