//! MDL reaction blocks ($RXN, V2000).
//!
//! [`parse_rxn_block`] reads the block strictly and does not keep molecule
//! titles.  [`scan_rxn_block`] splits the text on the `$MOL` markers and
//! reads each title from the first non-blank line of its molecule block,
//! along with the heavy atoms and bonds.  The titled reaction comes from
//! [`parse_rxn_block_with_titles`], which checks that both readings agree
//! on every molecule.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use na_seq::Element;
use regex::Regex;

use crate::chem::ChemError;
use crate::chem::diagnostics::DiagnosticLog;
use crate::chem::molfile::{Molecule, element_of, parse_counts, parse_mol_lines};
use crate::chem::smiles::reaction_smiles;

lazy_static! {
    static ref MOL_SEPARATOR_RE: Regex = Regex::new(r"(?m)M  END(\n+)(\s+)\$MOL").unwrap();
}

const RXN_HEADER_LINES: usize = 4;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reaction {
    pub reactants: Vec<Molecule>,
    pub products: Vec<Molecule>,
}

impl Reaction {
    pub fn molecules(&self) -> impl Iterator<Item = &Molecule> {
        self.reactants.iter().chain(self.products.iter())
    }

    pub fn molecule_titles(&self) -> HashSet<&str> {
        self.molecules()
            .filter_map(|molecule| molecule.title.as_deref())
            .collect()
    }

    // "reactants>>products"
    pub fn to_smiles(&self) -> String {
        reaction_smiles(&self.reactants, &self.products)
    }
}

// Strict reading: the header, the counts line and then each "$MOL" line
// directly followed by a molecule block ending in "M  END"
pub fn parse_rxn_block(text: &str, log: &DiagnosticLog) -> Result<Reaction, ChemError> {
    let lines: Vec<&str> = text.lines().collect();

    let first_line = lines.first().map(|line| line.trim_end()).unwrap_or_default();
    if first_line != "$RXN" {
        if first_line.starts_with("$RXN") {
            return Err(ChemError::Unsupported(first_line.to_owned()));
        }
        return Err(ChemError::syntax(0, "reaction block must start with $RXN"));
    }

    let counts_line = lines.get(RXN_HEADER_LINES)
        .ok_or_else(|| ChemError::syntax(RXN_HEADER_LINES, "missing reaction counts line"))?;
    let (reactant_count, product_count) = parse_counts(counts_line)
        .ok_or_else(|| ChemError::syntax(RXN_HEADER_LINES,
                                         format!("invalid reaction counts line: {:?}",
                                                 counts_line)))?;

    let molecule_count = reactant_count + product_count;
    let mut molecules = Vec::with_capacity(molecule_count);
    let mut line_no = RXN_HEADER_LINES + 1;

    for _ in 0..molecule_count {
        match lines.get(line_no) {
            Some(line) if line.trim_end() == "$MOL" => (),
            Some(line) => {
                return Err(ChemError::syntax(line_no, format!("expected $MOL, found {:?}", line)));
            },
            None => {
                return Err(ChemError::MoleculeCount {
                    declared: molecule_count,
                    found: molecules.len(),
                });
            }
        }

        let mol_lines = &lines[line_no + 1..];
        let (molecule, end_index) = parse_mol_lines(mol_lines, log)
            .map_err(|err| match err {
                ChemError::Syntax { line, message } =>
                    ChemError::Syntax { line: line + line_no + 1, message },
                err => err,
            })?;

        molecules.push(molecule);
        line_no += end_index + 2;
    }

    if let Some(line) = lines.get(line_no) && !line.trim().is_empty() {
        return Err(ChemError::syntax(line_no,
                                     format!("unexpected text after the last molecule: {:?}",
                                             line)));
    }

    let products = molecules.split_off(reactant_count);

    Ok(Reaction {
        reactants: molecules,
        products,
    })
}

// Some blocks have blank lines, or leading whitespace, between "M  END" and
// the next "$MOL"
pub fn clean_mol_separators(text: &str) -> String {
    MOL_SEPARATOR_RE.replace_all(text, "M  END\n$$MOL").into_owned()
}

pub fn parse_rxn_block_with_cleaning(text: &str, log: &DiagnosticLog)
    -> Result<Reaction, ChemError>
{
    match parse_rxn_block(text, log) {
        Ok(reaction) => Ok(reaction),
        Err(ChemError::Syntax { .. }) | Err(ChemError::MoleculeCount { .. }) => {
            parse_rxn_block(&clean_mol_separators(text), log)
        },
        Err(err) => Err(err),
    }
}

/// What the title scan reads from one molecule block: the title and a
/// summary of the structure that doesn't depend on hydrogen folding
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScannedMolecule {
    pub title: Option<String>,
    // element symbol to count, hydrogens excluded
    pub heavy_atoms: BTreeMap<String, usize>,
    // bonds with no hydrogen at either end, counted by their pair of
    // element symbols
    pub heavy_bonds: BTreeMap<(String, String), usize>,
}

fn add_bond(heavy_bonds: &mut BTreeMap<(String, String), usize>, symbol1: &str, symbol2: &str) {
    let key =
        if symbol1 <= symbol2 {
            (symbol1.to_owned(), symbol2.to_owned())
        } else {
            (symbol2.to_owned(), symbol1.to_owned())
        };
    *heavy_bonds.entry(key).or_insert(0) += 1;
}

impl ScannedMolecule {
    fn from_molecule(molecule: &Molecule) -> ScannedMolecule {
        let mut heavy_atoms = BTreeMap::new();
        for atom in molecule.atoms.iter().filter(|atom| !atom.is_hydrogen()) {
            *heavy_atoms.entry(atom.symbol.clone()).or_insert(0) += 1;
        }

        let mut heavy_bonds = BTreeMap::new();
        for bond in &molecule.bonds {
            let (atom1, atom2) = (&molecule.atoms[bond.atom1], &molecule.atoms[bond.atom2]);
            if !atom1.is_hydrogen() && !atom2.is_hydrogen() {
                add_bond(&mut heavy_bonds, &atom1.symbol, &atom2.symbol);
            }
        }

        ScannedMolecule {
            title: molecule.title.clone(),
            heavy_atoms,
            heavy_bonds,
        }
    }

    pub fn bond_count(&self) -> usize {
        self.heavy_bonds.values().sum()
    }

    fn same_structure(&self, other: &ScannedMolecule) -> bool {
        self.heavy_atoms == other.heavy_atoms && self.heavy_bonds == other.heavy_bonds
    }

    // eg. "C2O2, 3 bonds"
    fn summary(&self) -> String {
        let formula = self.heavy_atoms.iter()
            .map(|(symbol, count)| format!("{}{}", symbol, count))
            .join("");
        format!("{}, {} bonds", formula, self.bond_count())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScannedReaction {
    pub reactants: Vec<ScannedMolecule>,
    pub products: Vec<ScannedMolecule>,
}

fn is_hydrogen(symbol: &str) -> bool {
    element_of(symbol) == Some(Element::Hydrogen)
}

fn fixed_count(line: &str, start: usize, end: usize) -> Option<usize> {
    line.get(start..end.min(line.len()))?.trim().parse().ok()
}

// Read one molecule, ending at its own "M  END".  The counts line is found
// by its "V2000" tag and atom symbols are the fourth field of the atom lines.
fn scan_molecule(block: &str, line_offset: usize) -> Result<ScannedMolecule, ChemError> {
    let Some(end) = block.find("M  END")
    else {
        return Err(ChemError::MissingEnd);
    };
    let lines: Vec<&str> = block[..end].lines().collect();

    let counts_index = lines.iter()
        .position(|line| line.trim_end().ends_with("V2000"))
        .ok_or_else(|| ChemError::syntax(line_offset, "no V2000 counts line in molecule"))?;
    let counts_line = lines[counts_index];

    let counts = (fixed_count(counts_line, 0, 3), fixed_count(counts_line, 3, 6));
    let (Some(atom_count), Some(bond_count)) = counts
    else {
        return Err(ChemError::syntax(line_offset + counts_index,
                                     format!("invalid counts line: {:?}", counts_line)));
    };

    // the first non-blank header line
    let title = lines[..counts_index].iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(String::from);

    let atom_lines = lines.get(counts_index + 1..counts_index + 1 + atom_count)
        .ok_or_else(|| ChemError::syntax(line_offset + counts_index, "missing atom lines"))?;
    let symbols = atom_lines.iter().enumerate()
        .map(|(index, line)| {
            line.split_whitespace().nth(3)
                .ok_or_else(|| ChemError::syntax(line_offset + counts_index + 1 + index,
                                                 "missing atom symbol"))
        })
        .collect::<Result<Vec<&str>, _>>()?;

    let first_bond_index = counts_index + 1 + atom_count;
    let bond_lines = lines.get(first_bond_index..first_bond_index + bond_count)
        .ok_or_else(|| ChemError::syntax(line_offset + first_bond_index, "missing bond lines"))?;

    let mut heavy_bonds = BTreeMap::new();
    for (index, line) in bond_lines.iter().enumerate() {
        let ends = (fixed_count(line, 0, 3), fixed_count(line, 3, 6));
        let (Some(atom1), Some(atom2)) = ends
        else {
            return Err(ChemError::syntax(line_offset + first_bond_index + index,
                                         format!("invalid bond line: {:?}", line)));
        };
        let (Some(symbol1), Some(symbol2)) =
            (symbols.get(atom1.wrapping_sub(1)), symbols.get(atom2.wrapping_sub(1)))
        else {
            return Err(ChemError::syntax(line_offset + first_bond_index + index,
                                         format!("bond between invalid atoms: {:?}", line)));
        };
        if !is_hydrogen(symbol1) && !is_hydrogen(symbol2) {
            add_bond(&mut heavy_bonds, symbol1, symbol2);
        }
    }

    let mut heavy_atoms = BTreeMap::new();
    for symbol in symbols.into_iter().filter(|symbol| !is_hydrogen(symbol)) {
        *heavy_atoms.entry(symbol.to_owned()).or_insert(0) += 1;
    }

    Ok(ScannedMolecule {
        title,
        heavy_atoms,
        heavy_bonds,
    })
}

// Read the molecules by splitting on the "$MOL" markers, independently of
// the strict reader.  The counts come from the last line of the header.
pub fn scan_rxn_block(text: &str) -> Result<ScannedReaction, ChemError> {
    let mut parts = text.split("$MOL");
    let header = parts.next().unwrap_or_default();

    let counts: Vec<usize> = header.trim()
        .lines()
        .last()
        .unwrap_or_default()
        .split_whitespace()
        .map(|field| field.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| ChemError::syntax(RXN_HEADER_LINES, "invalid reaction counts line"))?;

    let [reactant_count, product_count] = counts.as_slice()
    else {
        return Err(ChemError::syntax(RXN_HEADER_LINES, "unexpected reaction counts line"));
    };

    let mut reaction = ScannedReaction::default();
    let mut line_offset = header.lines().count();

    for block in parts {
        let molecule = scan_molecule(block, line_offset)?;
        line_offset += block.lines().count();

        if reaction.reactants.len() < *reactant_count {
            reaction.reactants.push(molecule);
        } else {
            reaction.products.push(molecule);
        }
    }

    let declared = reactant_count + product_count;
    let found = reaction.reactants.len() + reaction.products.len();
    if declared != found {
        return Err(ChemError::MoleculeCount { declared, found });
    }

    Ok(reaction)
}

fn copy_titles(parsed: &mut [Molecule], scanned: Vec<ScannedMolecule>, offset: usize)
    -> Result<(), ChemError>
{
    if parsed.len() != scanned.len() {
        return Err(ChemError::MoleculeCount {
            declared: parsed.len(),
            found: scanned.len(),
        });
    }

    for (index, (parsed_molecule, scanned_molecule)) in parsed.iter_mut().zip(scanned).enumerate() {
        let parsed_summary = ScannedMolecule::from_molecule(parsed_molecule);

        if !parsed_summary.same_structure(&scanned_molecule) {
            return Err(ChemError::TitleMismatch {
                position: offset + index + 1,
                parsed: parsed_summary.summary(),
                scanned: scanned_molecule.summary(),
            });
        }

        parsed_molecule.title = scanned_molecule.title;
    }

    Ok(())
}

pub fn parse_rxn_block_with_titles(text: &str, log: &DiagnosticLog)
    -> Result<Reaction, ChemError>
{
    let mut reaction = parse_rxn_block_with_cleaning(text, log)?;
    let scanned = scan_rxn_block(text)?;

    let reactant_count = reaction.reactants.len();
    copy_titles(&mut reaction.reactants, scanned.reactants, 0)?;
    copy_titles(&mut reaction.products, scanned.products, reactant_count)?;

    Ok(reaction)
}

#[cfg(test)]
pub(crate) fn test_rxn_block(separator: &str) -> String {
    use crate::chem::molfile::{ACETATE_MOL, WATER_MOL};

    format!("$RXN

      RHEA      1108061731

  1  1
$MOL
{}{}$MOL
{}", WATER_MOL, separator, ACETATE_MOL)
}

#[test]
fn test_parse_rxn_block() {
    let log = DiagnosticLog::new();
    let reaction = parse_rxn_block(&test_rxn_block(""), &log).unwrap();
    assert_eq!(reaction.reactants.len(), 1);
    assert_eq!(reaction.products.len(), 1);
    assert!(reaction.molecule_titles().is_empty());
    assert_eq!(reaction.to_smiles(), "O>>CC([O-])=O");
}

#[test]
fn test_titles() {
    let log = DiagnosticLog::new();
    let reaction = parse_rxn_block_with_titles(&test_rxn_block(""), &log).unwrap();
    assert_eq!(reaction.reactants[0].title.as_deref(), Some("CHEBI:15377"));
    assert_eq!(reaction.products[0].title.as_deref(), Some("CHEBI:30089"));
    assert_eq!(reaction.molecule_titles(),
               HashSet::from(["CHEBI:15377", "CHEBI:30089"]));
}

#[test]
fn test_separator_cleaning() {
    let log = DiagnosticLog::new();
    let text = test_rxn_block("\n\n  ");

    assert!(parse_rxn_block(&text, &log).is_err());
    assert_eq!(clean_mol_separators(&text), test_rxn_block(""));

    let reaction = parse_rxn_block_with_titles(&text, &log).unwrap();
    assert_eq!(reaction.products[0].title.as_deref(), Some("CHEBI:30089"));
}

#[test]
fn test_scan_counts() {
    let log = DiagnosticLog::new();
    let text = test_rxn_block("").replace("  1  1\n$MOL", "  1\n$MOL");
    assert!(scan_rxn_block(&text).is_err());

    let text = test_rxn_block("").replace("  1  1\n$MOL", "  2  1\n$MOL");
    assert!(matches!(scan_rxn_block(&text),
                     Err(ChemError::MoleculeCount { declared: 3, found: 2 })));
    assert!(parse_rxn_block_with_titles(&text, &log).is_err());
}

#[test]
fn test_scan_structure() {
    let scanned = scan_rxn_block(&test_rxn_block("")).unwrap();
    let water = &scanned.reactants[0];
    assert_eq!(water.heavy_atoms, BTreeMap::from([("O".to_owned(), 1)]));
    assert_eq!(water.bond_count(), 0);
    assert_eq!(scanned.products[0].summary(), "C2O2, 3 bonds");
    assert_eq!(scanned.products[0].heavy_bonds,
               BTreeMap::from([(("C".to_owned(), "C".to_owned()), 1),
                               (("C".to_owned(), "O".to_owned()), 2)]));
}

#[test]
fn test_title_after_blank_lines() {
    let text = test_rxn_block("").replace("$MOL\nCHEBI:30089", "$MOL\n\n\nCHEBI:30089");
    let scanned = scan_rxn_block(&text).unwrap();
    assert_eq!(scanned.products[0].title.as_deref(), Some("CHEBI:30089"));
    assert_eq!(scanned.products[0].bond_count(), 3);
}

#[test]
fn test_readers_disagree() {
    let log = DiagnosticLog::new();

    // the strict reader takes the symbol from columns 32 to 34, which miss
    // the "C" of a symbol written one column early
    let text = test_rxn_block("").replace(
        "    1.2375    0.7145    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0",
        "   1.2375    0.7145    0.0000 Cl  0  0  0  0  0  0  0  0  0  0  0  0");
    assert!(parse_rxn_block(&text, &log).is_ok());

    match parse_rxn_block_with_titles(&text, &log) {
        Err(ChemError::TitleMismatch { position, parsed, scanned }) => {
            assert_eq!(position, 2);
            assert_eq!(parsed, "C2O1l1, 3 bonds");
            assert_eq!(scanned, "C2Cl1O1, 3 bonds");
        },
        result => panic!("unexpected result: {:?}", result),
    }
}

#[test]
fn test_swapped_molecules() {
    let log = DiagnosticLog::new();
    let mut parsed = parse_rxn_block(&test_rxn_block(""), &log).unwrap();
    let scanned = scan_rxn_block(&test_rxn_block("")).unwrap();

    assert!(matches!(copy_titles(&mut parsed.reactants, scanned.products, 0),
                     Err(ChemError::TitleMismatch { position: 1, .. })));
}
