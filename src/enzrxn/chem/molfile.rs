//! MDL molfile (V2000) molecule blocks.
//!
//! Only the connection table is kept: atoms with their element, charge,
//! isotope and atom-map number, and bonds with their order and stereo flag.
//! Explicit hydrogens are folded into the hydrogen count of their heavy atom
//! and the remaining hydrogens are derived from the default valences.

use std::collections::BTreeSet;

use na_seq::Element;

use crate::chem::ChemError;
use crate::chem::diagnostics::DiagnosticLog;
use crate::chem::smiles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
    // query bond types 5 to 8
    Any,
}

impl BondOrder {
    pub fn from_code(code: u32) -> Option<BondOrder> {
        match code {
            1 => Some(BondOrder::Single),
            2 => Some(BondOrder::Double),
            3 => Some(BondOrder::Triple),
            4 => Some(BondOrder::Aromatic),
            5..=8 => Some(BondOrder::Any),
            _ => None,
        }
    }

    // twice the valence contribution, aromatic bonds count 1.5
    pub fn doubled_valence(&self) -> u32 {
        match self {
            BondOrder::Single | BondOrder::Any => 2,
            BondOrder::Double => 4,
            BondOrder::Triple => 6,
            BondOrder::Aromatic => 3,
        }
    }

    pub fn smiles_symbol(&self) -> &'static str {
        match self {
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic => ":",
            BondOrder::Any => "~",
        }
    }
}

// bond stereo flags from the bond block
pub const STEREO_WEDGE: u32 = 1;
pub const STEREO_EITHER_DOUBLE: u32 = 3;
pub const STEREO_HASH: u32 = 6;

/// Handedness of a stereo centre relative to its reference neighbour order:
/// the implicit hydrogen (or lone pair) of a three-connected centre first,
/// then the neighbours by atom index.  Seen from the first neighbour, the
/// other three turn clockwise ("@@") or anticlockwise ("@").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chirality {
    Clockwise,
    Anticlockwise,
}

impl Chirality {
    pub fn inverted(self) -> Chirality {
        match self {
            Chirality::Clockwise => Chirality::Anticlockwise,
            Chirality::Anticlockwise => Chirality::Clockwise,
        }
    }

    pub fn smiles_symbol(&self) -> &'static str {
        match self {
            Chirality::Clockwise => "@@",
            Chirality::Anticlockwise => "@",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub charge: i32,
    pub isotope: Option<u32>,
    pub map_number: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    // attached hydrogens, set when the molecule is sanitised
    pub hydrogen_count: u32,
    // set from wedge and hash bonds when the molecule is sanitised
    pub chirality: Option<Chirality>,
}

impl Atom {
    pub fn is_dummy(&self) -> bool {
        is_dummy_symbol(&self.symbol)
    }

    pub fn is_hydrogen(&self) -> bool {
        element_of(&self.symbol) == Some(Element::Hydrogen)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    // zero-based atom indices
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub stereo: u32,
}

impl Bond {
    pub fn other(&self, atom: usize) -> Option<usize> {
        if self.atom1 == atom {
            Some(self.atom2)
        } else if self.atom2 == atom {
            Some(self.atom1)
        } else {
            None
        }
    }

    pub fn is_wedged(&self) -> bool {
        self.order == BondOrder::Single &&
            (self.stereo == STEREO_WEDGE || self.stereo == STEREO_HASH)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Molecule {
    pub title: Option<String>,
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    pub fn neighbours(&self, atom: usize) -> impl Iterator<Item = (usize, &Bond)> + '_ {
        self.bonds.iter()
            .filter_map(move |bond| bond.other(atom).map(|other| (other, bond)))
    }

    pub fn adjacency(&self) -> Vec<Vec<(usize, BondOrder)>> {
        let mut adjacency = vec![vec![]; self.atoms.len()];
        for bond in &self.bonds {
            adjacency[bond.atom1].push((bond.atom2, bond.order));
            adjacency[bond.atom2].push((bond.atom1, bond.order));
        }
        adjacency
    }

    // the valence used by bonds, rounding up partial aromatic contributions
    pub fn bond_valence(&self, atom: usize) -> u32 {
        let doubled: u32 = self.neighbours(atom)
            .map(|(_, bond)| bond.order.doubled_valence())
            .sum();
        doubled.div_ceil(2)
    }

    pub fn to_smiles(&self) -> String {
        smiles::canonical_smiles(self)
    }
}

pub fn is_dummy_symbol(symbol: &str) -> bool {
    matches!(symbol, "*" | "R" | "R#" | "A" | "Q" | "L")
}

struct ValenceRules {
    outer_electrons: i32,
    // elements of period 3 and below can expand their octet
    expands_octet: bool,
}

// None for dummy atoms and for symbols na_seq doesn't know
pub fn element_of(symbol: &str) -> Option<Element> {
    if is_dummy_symbol(symbol) {
        return None;
    }
    Element::from_letter(symbol).ok()
}

fn valence_rules(symbol: &str) -> Option<ValenceRules> {
    // boron is missing from na_seq's elements
    if symbol == "B" {
        return Some(ValenceRules { outer_electrons: 3, expands_octet: false });
    }

    let (outer_electrons, expands_octet) =
        match element_of(symbol)? {
            Element::Carbon => (4, false),
            Element::Nitrogen => (5, false),
            Element::Oxygen => (6, false),
            Element::Fluorine => (7, false),
            Element::Phosphorus => (5, true),
            Element::Sulfur | Element::Selenium => (6, true),
            Element::Chlorine | Element::Bromine | Element::Iodine => (7, true),
            _ => return None,
        };
    Some(ValenceRules { outer_electrons, expands_octet })
}

// Allowed valences, in increasing order, of an element with the given charge.
// None for elements without valence rules (metals, dummy atoms).
pub fn allowed_valences(symbol: &str, charge: i32) -> Option<Vec<u32>> {
    if element_of(symbol) == Some(Element::Hydrogen) {
        return Some(if charge == 0 { vec![1] } else { vec![0] });
    }

    let rules = valence_rules(symbol)?;
    let electrons = rules.outer_electrons - charge;
    if !(0..=8).contains(&electrons) {
        return None;
    }

    let base = if electrons <= 4 { electrons } else { 8 - electrons };
    let mut valences = vec![base as u32];

    if rules.expands_octet && electrons > 4 {
        let mut valence = base + 2;
        while valence <= electrons {
            valences.push(valence as u32);
            valence += 2;
        }
    }

    Some(valences)
}

// The number of hydrogens a reader would attach to an atom with the given
// bond valence and no explicit hydrogen count
pub fn default_hydrogen_count(symbol: &str, charge: i32, bond_valence: u32) -> Option<u32> {
    let valences = allowed_valences(symbol, charge)?;
    Some(valences.iter()
         .find(|valence| **valence >= bond_valence)
         .map(|valence| valence - bond_valence)
         .unwrap_or(0))
}

// mass number of the most abundant isotope, used for the mass difference
// column of the atom block
fn nominal_mass(symbol: &str) -> Option<u32> {
    if symbol == "B" {
        return Some(11);
    }

    let mass =
        match element_of(symbol)? {
            Element::Hydrogen => 1,
            Element::Carbon => 12,
            Element::Nitrogen => 14,
            Element::Oxygen => 16,
            Element::Fluorine => 19,
            Element::Phosphorus => 31,
            Element::Sulfur => 32,
            Element::Chlorine => 35,
            Element::Selenium => 80,
            Element::Bromine => 79,
            Element::Iodine => 127,
            _ => return None,
        };
    Some(mass)
}

fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("").trim()
}

fn parse_column<T: std::str::FromStr>(line: &str, line_no: usize, start: usize, end: usize,
                                      what: &str)
    -> Result<T, ChemError>
{
    column(line, start, end).parse::<T>()
        .map_err(|_| ChemError::syntax(line_no, format!("invalid {}: {:?}", what, line)))
}

fn parse_optional_column<T>(line: &str, line_no: usize, start: usize, end: usize, what: &str)
    -> Result<T, ChemError>
    where T: std::str::FromStr + Default
{
    if column(line, start, end).is_empty() {
        Ok(T::default())
    } else {
        parse_column(line, line_no, start, end, what)
    }
}

// "aaabbblllfffcccsssxxxrrrpppiiimmmvvvvvv", the first two fields are read as
// whitespace separated numbers unless they run together
pub(crate) fn parse_counts(line: &str) -> Option<(usize, usize)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() >= 2 && fields[0].len() <= 3 && fields[1].len() <= 3 {
        let atom_count = fields[0].parse().ok()?;
        let bond_count = fields[1].parse().ok()?;
        return Some((atom_count, bond_count));
    }

    let atom_count = column(line, 0, 3).parse().ok()?;
    let bond_count = column(line, 3, 6).parse().ok()?;
    Some((atom_count, bond_count))
}

// charge field codes of the atom block, 4 is a doublet radical
fn charge_from_code(code: i32) -> i32 {
    match code {
        1 => 3,
        2 => 2,
        3 => 1,
        5 => -1,
        6 => -2,
        7 => -3,
        _ => 0,
    }
}

fn parse_property_pairs(line: &str, line_no: usize) -> Result<Vec<(usize, i32)>, ChemError> {
    let invalid = || ChemError::syntax(line_no, format!("invalid property line: {:?}", line));

    let fields: Vec<i64> = line.get(6..).unwrap_or("")
        .split_whitespace()
        .map(|field| field.parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    let Some((count, values)) = fields.split_first()
    else {
        return Err(invalid());
    };

    if *count < 0 || values.len() != 2 * (*count as usize) {
        return Err(invalid());
    }

    values.chunks(2)
        .map(|pair| {
            if pair[0] < 1 {
                Err(invalid())
            } else {
                Ok((pair[0] as usize, pair[1] as i32))
            }
        })
        .collect()
}

// Read the connection table starting at the counts line, returning the
// molecule and the index of the "M  END" line
pub(crate) fn parse_ctab(lines: &[&str], counts_index: usize)
    -> Result<(Molecule, usize), ChemError>
{
    let counts_line = lines.get(counts_index)
        .ok_or_else(|| ChemError::syntax(counts_index, "missing counts line"))?;

    if counts_line.contains("V3000") {
        return Err(ChemError::Unsupported("V3000 connection table".into()));
    }

    let (atom_count, bond_count) = parse_counts(counts_line)
        .ok_or_else(|| ChemError::syntax(counts_index,
                                         format!("invalid counts line: {:?}", counts_line)))?;

    let mut atoms = Vec::with_capacity(atom_count);
    let mut mass_differences = Vec::with_capacity(atom_count);

    for line_no in counts_index + 1..counts_index + 1 + atom_count {
        let line = lines.get(line_no)
            .ok_or_else(|| ChemError::syntax(line_no, "missing atom line"))?;

        let symbol = column(line, 31, 34);
        if symbol.is_empty() {
            return Err(ChemError::syntax(line_no, "missing atom symbol"));
        }

        let charge_code: i32 = parse_optional_column(line, line_no, 36, 39, "charge")?;
        mass_differences.push(parse_optional_column::<i32>(line, line_no, 34, 36,
                                                           "mass difference")?);

        atoms.push(Atom {
            symbol: symbol.to_owned(),
            charge: charge_from_code(charge_code),
            isotope: None,
            map_number: parse_optional_column(line, line_no, 60, 63, "atom-atom mapping")?,
            x: parse_column(line, line_no, 0, 10, "x coordinate")?,
            y: parse_column(line, line_no, 10, 20, "y coordinate")?,
            z: parse_column(line, line_no, 20, 30, "z coordinate")?,
            hydrogen_count: 0,
            chirality: None,
        });
    }

    for (atom, mass_difference) in atoms.iter_mut().zip(mass_differences) {
        if mass_difference == 0 {
            continue;
        }
        if let Some(mass) = nominal_mass(&atom.symbol) {
            atom.isotope = Some((mass as i32 + mass_difference).max(0) as u32);
        }
    }

    let first_bond_line = counts_index + 1 + atom_count;
    let mut bonds = Vec::with_capacity(bond_count);

    for line_no in first_bond_line..first_bond_line + bond_count {
        let line = lines.get(line_no)
            .ok_or_else(|| ChemError::syntax(line_no, "missing bond line"))?;

        let atom1: usize = parse_column(line, line_no, 0, 3, "bond atom")?;
        let atom2: usize = parse_column(line, line_no, 3, 6, "bond atom")?;
        if atom1 == 0 || atom2 == 0 || atom1 > atom_count || atom2 > atom_count || atom1 == atom2 {
            return Err(ChemError::syntax(line_no, format!("bond between invalid atoms: {:?}", line)));
        }
        let type_code: u32 = parse_column(line, line_no, 6, 9, "bond type")?;
        let order = BondOrder::from_code(type_code)
            .ok_or_else(|| ChemError::syntax(line_no, format!("unknown bond type {}", type_code)))?;

        bonds.push(Bond {
            atom1: atom1 - 1,
            atom2: atom2 - 1,
            order,
            stereo: parse_optional_column(line, line_no, 9, 12, "bond stereo")?,
        });
    }

    let mut charges_reset = false;
    let mut line_no = first_bond_line + bond_count;

    loop {
        let Some(line) = lines.get(line_no)
        else {
            return Err(ChemError::MissingEnd);
        };

        if line.starts_with("M  END") {
            break;
        }

        if line.starts_with("M  CHG") || line.starts_with("M  RAD") {
            // these lines supersede every charge in the atom block
            if !charges_reset {
                for atom in atoms.iter_mut() {
                    atom.charge = 0;
                }
                charges_reset = true;
            }
        }

        if line.starts_with("M  CHG") || line.starts_with("M  ISO") {
            for (atom_no, value) in parse_property_pairs(line, line_no)? {
                let atom = atoms.get_mut(atom_no - 1)
                    .ok_or_else(|| ChemError::syntax(line_no,
                                                     format!("no atom {}", atom_no)))?;
                if line.starts_with("M  CHG") {
                    atom.charge = value;
                } else {
                    atom.isotope = Some(value.max(0) as u32);
                }
            }
        } else if line.starts_with("A  ") {
            // the alias text is on the next line
            line_no += 1;
        }

        line_no += 1;
    }

    let molecule = Molecule {
        title: None,
        atoms,
        bonds,
    };

    Ok((molecule, line_no))
}

fn check_dimension(molecule: &Molecule, dimension_code: &str, log: &DiagnosticLog) {
    if dimension_code == "3D" &&
        molecule.atoms.iter().all(|atom| atom.z == 0.0) &&
        molecule.bonds.iter().any(Bond::is_wedged)
    {
        log.emit("Warning: molecule is tagged as 3D, but all Z coords are zero and 2D stereo markers have been found, marking the mol as 2D.");
    }
}

fn check_stereo(molecule: &Molecule, log: &DiagnosticLog) {
    let mut checked_centres = vec![];

    for bond in molecule.bonds.iter().filter(|bond| bond.is_wedged()) {
        let centre = bond.atom1;
        if checked_centres.contains(&centre) {
            continue;
        }
        checked_centres.push(centre);

        let centre_atom = &molecule.atoms[centre];
        let vectors: Vec<(f64, f64)> = molecule.neighbours(centre)
            .map(|(other, _)| {
                let other_atom = &molecule.atoms[other];
                (other_atom.x - centre_atom.x, other_atom.y - centre_atom.y)
            })
            .collect();

        if vectors.iter().any(|(dx, dy)| dx.hypot(*dy) < 1e-4) {
            log.emit("Warning: ambiguous stereochemistry - overlapping neighbors");
            continue;
        }

        if vectors.len() != 3 {
            continue;
        }

        let linear = (0..3).any(|i| {
            ((i + 1)..3).any(|j| {
                let (ax, ay) = vectors[i];
                let (bx, by) = vectors[j];
                let cross = ax * by - ay * bx;
                let dot = ax * bx + ay * by;
                cross.abs() < 1e-3 * ax.hypot(ay) * bx.hypot(by) && dot < 0.0
            })
        });

        if linear {
            log.emit("Warning: ambiguous stereochemistry - linear bond arrangement");
        }
    }

    if molecule.bonds.iter()
        .any(|bond| bond.order == BondOrder::Double && bond.stereo == STEREO_EITHER_DOUBLE)
    {
        log.emit("WARNING: Omitted undefined stereo");
    }
}

type Vector3 = (f64, f64, f64);

fn sub(a: Vector3, b: Vector3) -> Vector3 {
    (a.0 - b.0, a.1 - b.1, a.2 - b.2)
}

fn determinant(a: Vector3, b: Vector3, c: Vector3) -> f64 {
    a.0 * (b.1 * c.2 - b.2 * c.1) - a.1 * (b.0 * c.2 - b.2 * c.0) + a.2 * (b.0 * c.1 - b.1 * c.0)
}

// Direction from a stereo centre to a neighbour: the 2D bond as a unit
// vector, raised towards the viewer by a wedge and away by a hash
fn neighbour_vector(molecule: &Molecule, centre: usize, other: usize, bond: &Bond)
    -> Option<Vector3>
{
    let centre_atom = &molecule.atoms[centre];
    let other_atom = &molecule.atoms[other];
    let (dx, dy) = (other_atom.x - centre_atom.x, other_atom.y - centre_atom.y);
    let length = dx.hypot(dy);
    if length < 1e-4 {
        return None;
    }

    let dz =
        match bond.stereo {
            STEREO_WEDGE if bond.atom1 == centre => 1.0,
            STEREO_HASH if bond.atom1 == centre => -1.0,
            _ => 0.0,
        };
    Some((dx / length, dy / length, dz))
}

fn centre_chirality(molecule: &Molecule, centre: usize, removed: &[bool]) -> Option<Chirality> {
    let mut kept = vec![];
    let mut folded = vec![];

    for (other, bond) in molecule.neighbours(centre) {
        let vector = neighbour_vector(molecule, centre, other, bond)?;
        if removed[other] {
            folded.push(vector);
        } else {
            kept.push((other, vector));
        }
    }
    kept.sort_by_key(|(other, _)| *other);

    let mut vectors: Vec<Vector3> =
        match (kept.len(), folded.as_slice()) {
            (4, []) => vec![],
            (3, [hydrogen]) => vec![*hydrogen],
            (3, []) => {
                // the implicit hydrogen or lone pair points away from the rest
                let sum = kept.iter()
                    .fold((0.0, 0.0, 0.0), |acc, (_, v)| (acc.0 + v.0, acc.1 + v.1, acc.2 + v.2));
                vec![(-sum.0, -sum.1, -sum.2)]
            },
            _ => return None,
        };
    vectors.extend(kept.into_iter().map(|(_, vector)| vector));

    let [first, second, third, fourth] = vectors.as_slice()
    else {
        return None;
    };

    let volume = determinant(sub(*second, *first), sub(*third, *first), sub(*fourth, *first));
    if volume.abs() < 1e-3 {
        None
    } else if volume > 0.0 {
        Some(Chirality::Clockwise)
    } else {
        Some(Chirality::Anticlockwise)
    }
}

// Set the chirality of the centres at the narrow end of wedge and hash
// bonds, before the hydrogens marked in removed are folded away
fn assign_chirality(molecule: &mut Molecule, removed: &[bool]) {
    let centres: BTreeSet<usize> = molecule.bonds.iter()
        .filter(|bond| bond.is_wedged() && !removed[bond.atom1])
        .map(|bond| bond.atom1)
        .collect();

    for centre in centres {
        molecule.atoms[centre].chirality = centre_chirality(molecule, centre, removed);
    }
}

// Remove explicit hydrogens that only carry a single bond to a heavy atom,
// returning the number of hydrogens folded into each remaining atom
fn fold_hydrogens(molecule: &mut Molecule, log: &DiagnosticLog) -> Vec<u32> {
    let atom_count = molecule.atoms.len();
    let mut removed = vec![false; atom_count];
    let mut folded = vec![0u32; atom_count];

    for (index, atom) in molecule.atoms.iter().enumerate() {
        if !atom.is_hydrogen() {
            continue;
        }

        let neighbours: Vec<(usize, &Bond)> = molecule.neighbours(index).collect();

        if neighbours.is_empty() {
            // a lone proton is kept as it is
            if atom.charge == 0 && atom.isotope.is_none() {
                log.emit("WARNING: not removing hydrogen atom without neighbors");
            }
            continue;
        }

        if neighbours.iter().any(|(other, _)| molecule.atoms[*other].is_dummy()) {
            log.emit("WARNING: not removing hydrogen atom with dummy atom neighbors");
            continue;
        }

        let [(heavy, bond)] = neighbours.as_slice()
        else {
            continue;
        };

        if atom.charge != 0 || atom.isotope.is_some() || atom.map_number != 0 ||
            bond.order != BondOrder::Single || molecule.atoms[*heavy].is_hydrogen()
        {
            continue;
        }

        removed[index] = true;
        folded[*heavy] += 1;
    }

    assign_chirality(molecule, &removed);

    if !removed.contains(&true) {
        return folded;
    }

    let mut new_indices = vec![None; atom_count];
    let mut next_index = 0;
    for (index, is_removed) in removed.iter().enumerate() {
        if !is_removed {
            new_indices[index] = Some(next_index);
            next_index += 1;
        }
    }

    let atoms = std::mem::take(&mut molecule.atoms);
    molecule.atoms = atoms.into_iter()
        .zip(removed.iter())
        .filter(|(_, is_removed)| !**is_removed)
        .map(|(atom, _)| atom)
        .collect();

    let bonds = std::mem::take(&mut molecule.bonds);
    molecule.bonds = bonds.into_iter()
        .filter_map(|bond| {
            let atom1 = new_indices[bond.atom1]?;
            let atom2 = new_indices[bond.atom2]?;
            Some(Bond { atom1, atom2, ..bond })
        })
        .collect();

    folded.into_iter()
        .zip(removed)
        .filter(|(_, is_removed)| !is_removed)
        .map(|(count, _)| count)
        .collect()
}

fn assign_hydrogens(molecule: &mut Molecule, folded: &[u32]) -> Result<(), ChemError> {
    for index in 0..molecule.atoms.len() {
        let bond_valence = molecule.bond_valence(index);
        let explicit_hydrogens = folded[index];
        let atom = &molecule.atoms[index];

        let Some(valences) = allowed_valences(&atom.symbol, atom.charge)
        else {
            molecule.atoms[index].hydrogen_count = explicit_hydrogens;
            continue;
        };

        let valence = bond_valence + explicit_hydrogens;
        let Some(target) = valences.iter().find(|allowed| **allowed >= valence)
        else {
            return Err(ChemError::Valence {
                atom: index + 1,
                symbol: atom.symbol.clone(),
                valence,
            });
        };

        molecule.atoms[index].hydrogen_count = explicit_hydrogens + target - valence;
    }

    Ok(())
}

// Run the checks that report diagnostics, then fold the hydrogens and check
// the valences
pub(crate) fn sanitize(molecule: &mut Molecule, dimension_code: &str, log: &DiagnosticLog)
    -> Result<(), ChemError>
{
    check_dimension(molecule, dimension_code, log);
    check_stereo(molecule, log);
    let folded = fold_hydrogens(molecule, log);
    assign_hydrogens(molecule, &folded)
}

// Parse the lines of a molecule block, the first line being the title line.
// Returns the molecule (without its title) and the index of "M  END".
pub(crate) fn parse_mol_lines(lines: &[&str], log: &DiagnosticLog)
    -> Result<(Molecule, usize), ChemError>
{
    if lines.len() < 4 {
        return Err(ChemError::syntax(lines.len(), "molecule header is incomplete"));
    }

    let dimension_code = column(lines[1], 20, 22).to_owned();
    let (mut molecule, end_index) = parse_ctab(lines, 3)?;
    sanitize(&mut molecule, &dimension_code, log)?;

    Ok((molecule, end_index))
}

pub fn parse_mol_block(text: &str, log: &DiagnosticLog) -> Result<Molecule, ChemError> {
    let lines: Vec<&str> = text.lines().collect();
    let (mut molecule, _) = parse_mol_lines(&lines, log)?;

    let title = lines[0].trim();
    if !title.is_empty() {
        molecule.title = Some(title.to_owned());
    }

    Ok(molecule)
}

#[cfg(test)]
pub(crate) const WATER_MOL: &str = "CHEBI:15377
  Marvin  01010100002D

  3  2  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    0.9000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.9000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  1  3  1  0  0  0  0
M  END
";

#[cfg(test)]
pub(crate) const ACETATE_MOL: &str = "CHEBI:30089
  Marvin  01010100002D

  4  3  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.8250    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2375    0.7145    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    1.2375   -0.7145    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  2  3  2  0  0  0  0
  2  4  1  0  0  0  0
M  CHG  1   4  -1
M  END
";

#[test]
fn test_parse_water() {
    let log = DiagnosticLog::new();
    let molecule = parse_mol_block(WATER_MOL, &log).unwrap();
    assert_eq!(molecule.title.as_deref(), Some("CHEBI:15377"));
    assert_eq!(molecule.atoms.len(), 1);
    assert!(molecule.bonds.is_empty());
    assert_eq!(molecule.atoms[0].hydrogen_count, 2);
}

#[test]
fn test_parse_charge_lines() {
    let log = DiagnosticLog::new();
    let molecule = parse_mol_block(ACETATE_MOL, &log).unwrap();
    assert_eq!(molecule.atoms.len(), 4);
    assert_eq!(molecule.atoms[3].charge, -1);
    assert_eq!(molecule.atoms[3].hydrogen_count, 0);
    assert_eq!(molecule.atoms[0].hydrogen_count, 3);
}

#[test]
fn test_counts_line() {
    assert_eq!(parse_counts("  3  2  0  0  0  0            999 V2000"), Some((3, 2)));
    assert_eq!(parse_counts("100101  0  0  0  0            999 V2000"), Some((100, 101)));
    assert_eq!(parse_counts(" 93 123  0  0  0  0            999 V2000"), Some((93, 123)));
    assert_eq!(parse_counts("  x  2"), None);
}

#[test]
fn test_missing_end() {
    let log = DiagnosticLog::new();
    let text = WATER_MOL.replace("M  END\n", "");
    assert!(matches!(parse_mol_block(&text, &log), Err(ChemError::MissingEnd)));
}

#[test]
fn test_valence_error() {
    let text = "
  test

  5  4  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
   -1.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    1.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000   -1.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  1  3  1  0  0  0  0
  1  4  1  0  0  0  0
  1  5  1  0  0  0  0
M  END
";
    let log = DiagnosticLog::new();
    assert!(matches!(parse_mol_block(text, &log),
                     Err(ChemError::Valence { atom: 1, valence: 4, .. })));
}

#[test]
fn test_allowed_valences() {
    assert_eq!(allowed_valences("C", 0), Some(vec![4]));
    assert_eq!(allowed_valences("N", 1), Some(vec![4]));
    assert_eq!(allowed_valences("O", -1), Some(vec![1]));
    assert_eq!(allowed_valences("P", 0), Some(vec![3, 5]));
    assert_eq!(allowed_valences("S", 0), Some(vec![2, 4, 6]));
    assert_eq!(allowed_valences("Fe", 2), None);
    assert_eq!(allowed_valences("B", 0), Some(vec![3]));
    assert_eq!(allowed_valences("Br", 0), Some(vec![1, 3, 5, 7]));
    assert_eq!(allowed_valences("R#", 0), None);
    assert_eq!(default_hydrogen_count("N", 0, 1), Some(2));
}

#[test]
fn test_element_of() {
    assert_eq!(element_of("Cl"), Some(Element::Chlorine));
    assert_eq!(element_of("H"), Some(Element::Hydrogen));
    assert_eq!(element_of("*"), None);
    assert_eq!(element_of("Xx"), None);
    assert_eq!(nominal_mass("C"), Some(12));
    assert_eq!(nominal_mass("Fe"), None);
}

#[test]
fn test_flat_3d_with_wedges() {
    let text = "
  test    01010100003D

  4  3  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
   -0.5000    0.8660    0.0000 N   0  0  0  0  0  0  0  0  0  0  0  0
   -0.5000   -0.8660    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  1  0  0  0
  1  3  1  0  0  0  0
  1  4  1  0  0  0  0
M  END
";
    let log = DiagnosticLog::new();
    let capture = log.begin_capture().unwrap();
    parse_mol_block(text, &log).unwrap();
    let messages = capture.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("marking the mol as 2D"));
}

#[test]
fn test_linear_wedge_centre() {
    let text = "
  test    01010100002D

  4  3  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
   -1.0000    0.0000    0.0000 N   0  0  0  0  0  0  0  0  0  0  0  0
    0.0000    1.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  1  0  0  0
  1  3  1  0  0  0  0
  1  4  1  0  0  0  0
M  END
";
    let log = DiagnosticLog::new();
    let capture = log.begin_capture().unwrap();
    parse_mol_block(text, &log).unwrap();
    assert_eq!(capture.messages(),
               vec!["Warning: ambiguous stereochemistry - linear bond arrangement".to_owned()]);
}

#[test]
fn test_lone_hydrogen() {
    let text = "
  test

  1  0  0  0  0  0            999 V2000
    0.0000    0.0000    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
M  END
";
    let log = DiagnosticLog::new();
    let capture = log.begin_capture().unwrap();
    let molecule = parse_mol_block(text, &log).unwrap();
    assert_eq!(molecule.atoms.len(), 1);
    assert_eq!(capture.messages().len(), 1);

    let proton = text.replace("H   0  0  0", "H   0  3  0");
    let capture2_log = DiagnosticLog::new();
    let capture2 = capture2_log.begin_capture().unwrap();
    let molecule = parse_mol_block(&proton, &capture2_log).unwrap();
    assert_eq!(molecule.atoms[0].charge, 1);
    assert!(capture2.messages().is_empty());
}
