use divan::black_box;
use molkit::{CanonicalOptions, MoleculeToolkit, SmilesToolkit};

const MOLECULES: [&str; 5] = [
    "CC(=O)Nc1ccc(O)cc1",
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
    "CC(C)Cc1ccc(cc1)[C@@H](C)C(=O)O",
    "C1CC2CCC1C2",
    "c1ccc2c(c1)c1ccccc1c1ccccc21",
];

fn main() {
    divan::main();
}

#[divan::bench]
fn parse() {
    for smiles in MOLECULES {
        black_box(SmilesToolkit.parse(smiles).unwrap());
    }
}

#[divan::bench]
fn canonicalize(bencher: divan::Bencher) {
    let molecules: Vec<_> = MOLECULES
        .iter()
        .map(|smiles| SmilesToolkit.parse(smiles).unwrap())
        .collect();
    bencher.bench(|| {
        for molecule in &molecules {
            black_box(
                SmilesToolkit
                    .canonicalize(molecule, CanonicalOptions::default())
                    .unwrap(),
            );
        }
    });
}
