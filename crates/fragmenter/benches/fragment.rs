use divan::black_box;
use fragmenter::{CancellationToken, FragmentationEngine, FragmentationSettings};
use molkit::{MoleculeToolkit, SmilesToolkit};

const PATTERN: &str = "[!#1]!@!=!#[!#1]";
const MOLECULES: [&str; 3] = [
    "CC(=O)Nc1ccc(O)cc1",
    "CC(C)Cc1ccc(cc1)[C@@H](C)C(=O)O",
    "COc1ccc2nc(S(=O)Cc3ncc(C)c(OC)c3C)[nH]c2c1",
];

fn main() {
    divan::main();
}

#[divan::bench(args = [1, 2, 3])]
fn fragment(bencher: divan::Bencher, cut_count: usize) {
    let settings = FragmentationSettings {
        cut_count,
        ..FragmentationSettings::default()
    };
    let engine = FragmentationEngine::new(SmilesToolkit, PATTERN, settings).unwrap();
    let cancellation = CancellationToken::new();
    bencher.bench(|| {
        for smiles in MOLECULES {
            let molecule = SmilesToolkit.parse(smiles).unwrap();
            let mut factory = engine.factory(smiles, molecule, &cancellation).unwrap();
            black_box(factory.fragment().unwrap());
        }
    });
}

#[divan::bench(args = [0, 50])]
fn leaf_cache(bencher: divan::Bencher, leaf_cache_size: usize) {
    let settings = FragmentationSettings {
        cut_count: 2,
        leaf_cache_size,
        ..FragmentationSettings::default()
    };
    let engine = FragmentationEngine::new(SmilesToolkit, PATTERN, settings).unwrap();
    let cancellation = CancellationToken::new();
    bencher.bench(|| {
        let molecule = SmilesToolkit.parse(MOLECULES[2]).unwrap();
        let mut factory = engine.factory("omeprazole", molecule, &cancellation).unwrap();
        black_box(factory.fragment().unwrap());
    });
}
