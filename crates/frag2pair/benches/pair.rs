use divan::black_box;
use frag2pair::{BatchPairer, PairSettings, StreamingPairer};
use fragmenter::{FragmentKey, FragmentValue, FragmentationRecord, HeavyAtoms};
use molkit::SmilesToolkit;

const SUBSTITUENTS: [&str; 8] = [
    "[*:1]C", "[*:1]O", "[*:1]N", "[*:1]F", "[*:1]Cl", "[*:1]CC", "[*:1]OC", "[*:1]C#N",
];

fn main() {
    divan::main();
}

fn records(keys: usize) -> Vec<FragmentationRecord> {
    let mut records = Vec::new();
    for key in 0..keys {
        let key_smiles = format!("[*:1]{}", "C".repeat(key + 1));
        for (id, value) in SUBSTITUENTS.iter().enumerate() {
            let heavy_atoms = HeavyAtoms {
                changing: value.len() - 5,
                unchanging: key + 1,
            };
            let value = FragmentValue::new(*value, id.to_string(), heavy_atoms);
            records.push(FragmentationRecord::new(FragmentKey::new(&key_smiles, 1), value));
        }
    }
    records.sort();
    records
}

#[divan::bench(args = [10, 100])]
fn streaming(bencher: divan::Bencher, keys: usize) {
    let records = records(keys);
    bencher.bench(|| {
        let mut pairer = StreamingPairer::new(PairSettings::default(), SmilesToolkit);
        let mut pairs = Vec::new();
        for record in records.iter().cloned() {
            pairs.extend(pairer.push(record).unwrap());
        }
        pairs.extend(pairer.finish().unwrap());
        black_box(pairs)
    });
}

#[divan::bench(args = [false, true])]
fn batch(bencher: divan::Bencher, parallel: bool) {
    let records = records(100);
    let settings = PairSettings {
        include_reaction_pattern: true,
        ..PairSettings::default()
    };
    bencher.bench(|| {
        let mut pairer = BatchPairer::new(settings, SmilesToolkit);
        pairer.extend(records.iter().cloned());
        let pairs = if parallel {
            pairer.finish_parallel()
        } else {
            pairer.finish()
        };
        black_box(pairs.unwrap())
    });
}
