use std::collections::HashMap;

use na_seq::{AaIdent, AminoAcid};

use AminoAcid::*;

const AMINO_ACIDS: [AminoAcid; 21] = [
    Ala, Arg, Asn, Asp, Cys, Glu, Gln, Gly, His, Ile, Leu,
    Lys, Met, Phe, Pro, Ser, Thr, Trp, Tyr, Val, Sec,
];

lazy_static! {
    static ref THREE_TO_ONE: HashMap<String, char> =
        AMINO_ACIDS.iter()
        .filter_map(|aa| {
            let one = aa.to_str(AaIdent::OneLetter).chars().next()?;
            Some((aa.to_str(AaIdent::ThreeLetters).to_ascii_uppercase(), one))
        })
        .collect();
}

// case-insensitive, M-CSA uses "Ser", PDB files use "SER"
pub fn three_to_one(code: &str) -> Option<char> {
    THREE_TO_ONE.get(&code.trim().to_ascii_uppercase()).copied()
}

#[test]
fn test_amino_acid_codes() {
    assert_eq!(three_to_one("Lys"), Some('K'));
    assert_eq!(three_to_one("SER"), Some('S'));
    assert_eq!(three_to_one("his"), Some('H'));
    assert_eq!(three_to_one("Xyz"), None);
    assert_eq!(three_to_one(""), None);
}
