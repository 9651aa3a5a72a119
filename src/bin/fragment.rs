use fragmenter::{CancellationToken, CutRules, FactoryError, FragmentationEngine, FragmentationSettings};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use molkit::{MoleculeToolkit, SmilesToolkit};
use once_cell::sync::Lazy;
use rustyline::DefaultEditor;
use std::fmt::Write;

static RULES: Lazy<CutRules> = Lazy::new(|| CutRules::bundled().unwrap());

static ENGINES: Lazy<Vec<FragmentationEngine<SmilesToolkit>>> = Lazy::new(|| {
    let pattern = &RULES.get("non-ring-single").unwrap().pattern;
    (1..=3)
        .map(|cut_count| {
            let settings = FragmentationSettings {
                cut_count,
                ..FragmentationSettings::default()
            };
            FragmentationEngine::new(SmilesToolkit, pattern, settings).unwrap()
        })
        .collect()
});

// NOTE: Type a SMILES string, optionally followed by a space and the number of cuts (1, 2 or 3)
fn main() {
    let mut rl = DefaultEditor::new().unwrap();
    while let Ok(line) = rl.readline("Molecule: ") {
        rl.add_history_entry(&line).unwrap();
        let (smiles, cut_count) = match line.split_once(' ') {
            Some((smiles, cuts)) => (smiles, cuts.trim().parse().unwrap_or(1)),
            None => (line.as_str(), 1),
        };
        match fragment_info(smiles, cut_count) {
            Ok(info) => print!("{info}"),
            Err(diagnostic) => render_error(diagnostic),
        }
    }
}

fn fragment_info(smiles: &str, cut_count: usize) -> Result<String, FactoryError> {
    let engine = &ENGINES[cut_count.clamp(1, ENGINES.len()) - 1];
    let molecule = SmilesToolkit.parse(smiles.trim())?;
    let cancellation = CancellationToken::new();
    let mut factory = engine.factory("repl", molecule, &cancellation)?;

    let mut buf = String::new();
    let cuttable = factory.can_cut_n_times(engine.settings().cut_count, false)?;
    writeln!(buf, "Cuttable {} Time(s): {cuttable}", engine.settings().cut_count).unwrap();
    let records = factory.fragment()?;
    for record in &records {
        writeln!(buf, "{}  |  {}  ({} changing)", record.key, record.value, record.value.heavy_atoms.changing).unwrap();
    }
    if let Some((hits, misses)) = factory.cache_statistics() {
        writeln!(buf, "Records: {}, Cache Hits: {hits}, Cache Misses: {misses}", records.len()).unwrap();
    }
    writeln!(buf).unwrap();

    Ok(buf)
}

fn render_error(diagnostic: impl Into<Box<dyn Diagnostic + 'static>>) {
    let mut buf = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode())
        .render_report(&mut buf, diagnostic.into().as_ref())
        .unwrap();
    println!("{buf}");
}
