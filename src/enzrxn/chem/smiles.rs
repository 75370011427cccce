//! Canonical linear text for molecules and reactions.
//!
//! Atoms are ranked from their invariants and the ranks refined from the
//! neighbour ranks until stable, remaining ties are broken on the lowest
//! atom index.  The writer walks each component depth first from its
//! lowest ranked terminal atom, visiting neighbours in rank order.
//!
//! Stereo centres are written with "@"/"@@" relative to the order their
//! neighbours are written in.  Double bonds outside rings get "/" and "\"
//! on their single bonds when the 2D coordinates place the substituents on
//! either side.

use std::collections::{BTreeSet, HashMap};

use crate::chem::molfile::{BondOrder, Chirality, Molecule, STEREO_EITHER_DOUBLE,
                           default_hydrogen_count};

const ORGANIC_SUBSET: [&str; 10] = ["B", "C", "N", "O", "P", "S", "F", "Cl", "Br", "I"];

type Adjacency = Vec<Vec<(usize, BondOrder)>>;

fn dense_ranks<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut sorted: Vec<&T> = keys.iter().collect();
    sorted.sort();
    sorted.dedup();

    keys.iter()
        .map(|key| sorted.binary_search(&key).unwrap_or_default())
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().collect::<BTreeSet<_>>().len()
}

fn refine(mut ranks: Vec<usize>, adjacency: &Adjacency) -> Vec<usize> {
    loop {
        let keys: Vec<(usize, Vec<(usize, BondOrder)>)> =
            adjacency.iter().enumerate()
            .map(|(index, neighbours)| {
                let mut neighbour_ranks: Vec<(usize, BondOrder)> =
                    neighbours.iter().map(|(other, order)| (ranks[*other], *order)).collect();
                neighbour_ranks.sort();
                (ranks[index], neighbour_ranks)
            })
            .collect();

        let new_ranks = dense_ranks(&keys);
        if class_count(&new_ranks) == class_count(&ranks) {
            return new_ranks;
        }
        ranks = new_ranks;
    }
}

pub fn canonical_ranks(molecule: &Molecule, adjacency: &Adjacency) -> Vec<usize> {
    let invariants: Vec<_> =
        molecule.atoms.iter().enumerate()
        .map(|(index, atom)| {
            (atom.symbol.as_str(), atom.charge, atom.isotope.unwrap_or(0),
             atom.hydrogen_count, adjacency[index].len(), atom.map_number)
        })
        .collect();

    let mut ranks = refine(dense_ranks(&invariants), adjacency);

    while class_count(&ranks) < ranks.len() {
        let tied = (0..ranks.len())
            .filter(|index| ranks.iter().filter(|rank| **rank == ranks[*index]).count() > 1)
            .min_by_key(|index| (ranks[*index], *index));

        let Some(chosen) = tied
        else {
            break;
        };

        let keys: Vec<(usize, bool)> =
            (0..ranks.len()).map(|index| (ranks[index], index != chosen)).collect();
        ranks = refine(dense_ranks(&keys), adjacency);
    }

    ranks
}

fn charge_text(charge: i32) -> String {
    match charge {
        0 => String::new(),
        1 => "+".into(),
        -1 => "-".into(),
        charge if charge > 0 => format!("+{}", charge),
        charge => format!("{}", charge),
    }
}

fn atom_text(molecule: &Molecule, index: usize, chirality: Option<Chirality>) -> String {
    let atom = &molecule.atoms[index];
    let map_text =
        if atom.map_number == 0 {
            String::new()
        } else {
            format!(":{}", atom.map_number)
        };

    if atom.is_dummy() {
        if atom.charge == 0 && atom.map_number == 0 {
            return "*".into();
        }
        return format!("[*{}{}]", charge_text(atom.charge), map_text);
    }

    let bare_hydrogen_count =
        default_hydrogen_count(&atom.symbol, 0, molecule.bond_valence(index));

    if ORGANIC_SUBSET.contains(&atom.symbol.as_str()) && atom.charge == 0 &&
        atom.isotope.is_none() && atom.map_number == 0 && chirality.is_none() &&
        bare_hydrogen_count == Some(atom.hydrogen_count)
    {
        return atom.symbol.clone();
    }

    let mut text = String::from("[");
    if let Some(isotope) = atom.isotope {
        text += &isotope.to_string();
    }
    text += &atom.symbol;
    if let Some(chirality) = chirality {
        text += chirality.smiles_symbol();
    }
    match atom.hydrogen_count {
        0 => (),
        1 => text.push('H'),
        count => text += &format!("H{}", count),
    }
    text += &charge_text(atom.charge);
    text += &map_text;
    text.push(']');

    text
}

fn push_ring_digit(digit: usize, out: &mut String) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{}", digit));
    }
}

fn bond_key(atom1: usize, atom2: usize) -> (usize, usize) {
    (atom1.min(atom2), atom1.max(atom2))
}

// The number of swaps that turn order into reference is odd
fn is_odd_permutation(order: &[Option<usize>], reference: &[Option<usize>]) -> bool {
    let positions: Vec<usize> = order.iter()
        .filter_map(|item| reference.iter().position(|other| other == item))
        .collect();

    let mut inversions = 0;
    for i in 0..positions.len() {
        for j in i + 1..positions.len() {
            if positions[i] > positions[j] {
                inversions += 1;
            }
        }
    }
    inversions % 2 == 1
}

struct SmilesWriter<'a> {
    molecule: &'a Molecule,
    // neighbours in rank order
    adjacency: Adjacency,
    ranks: Vec<usize>,
    start_order: Vec<usize>,
    ring_partners: Vec<Vec<usize>>,
    // the depth first tree, shared by the ring search and the writer
    parents: Vec<Option<usize>>,
    visit_order: Vec<usize>,
    ring_bonds: BTreeSet<(usize, usize)>,
    // "/" or "\" for single bonds next to a stereo double bond, for the
    // bond written from the lower to the higher visited atom
    bond_marks: HashMap<(usize, usize), char>,
    visited: Vec<bool>,
    open_rings: HashMap<(usize, usize), usize>,
    used_digits: BTreeSet<usize>,
}

impl<'a> SmilesWriter<'a> {
    fn new(molecule: &'a Molecule) -> SmilesWriter<'a> {
        let mut adjacency = molecule.adjacency();
        let ranks = canonical_ranks(molecule, &adjacency);

        for neighbours in adjacency.iter_mut() {
            neighbours.sort_by_key(|(other, _)| ranks[*other]);
        }

        // components start from their lowest ranked atom of lowest degree
        let mut start_order: Vec<usize> = (0..molecule.atoms.len()).collect();
        start_order.sort_by_key(|index| (adjacency[*index].len(), ranks[*index]));

        let atom_count = molecule.atoms.len();

        SmilesWriter {
            molecule,
            adjacency,
            ranks,
            start_order,
            ring_partners: vec![vec![]; atom_count],
            parents: vec![None; atom_count],
            visit_order: vec![0; atom_count],
            ring_bonds: BTreeSet::new(),
            bond_marks: HashMap::new(),
            visited: vec![false; atom_count],
            open_rings: HashMap::new(),
            used_digits: BTreeSet::new(),
        }
    }

    fn collect_ring_bonds(&mut self, atom: usize, parent: Option<usize>, in_stack: &mut Vec<bool>,
                          next_visit: &mut usize) {
        self.visited[atom] = true;
        self.parents[atom] = parent;
        self.visit_order[atom] = *next_visit;
        *next_visit += 1;
        in_stack[atom] = true;

        for neighbour_index in 0..self.adjacency[atom].len() {
            let (other, _) = self.adjacency[atom][neighbour_index];
            if Some(other) == parent {
                continue;
            }
            if in_stack[other] {
                if !self.ring_partners[atom].contains(&other) {
                    self.ring_partners[atom].push(other);
                    self.ring_partners[other].push(atom);
                }
            } else if !self.visited[other] {
                self.collect_ring_bonds(other, Some(atom), in_stack, next_visit);
            }
        }

        in_stack[atom] = false;
    }

    // the ring closures must follow the same traversal as the writer
    fn find_ring_bonds(&mut self) {
        let mut in_stack = vec![false; self.molecule.atoms.len()];
        let mut next_visit = 0;

        for start in self.start_order.clone() {
            if !self.visited[start] {
                self.collect_ring_bonds(start, None, &mut in_stack, &mut next_visit);
            }
        }

        for partners in self.ring_partners.iter_mut() {
            partners.sort_by_key(|other| self.ranks[*other]);
        }

        // every tree bond on the path closed by a ring bond is in that ring
        for atom in 0..self.ring_partners.len() {
            for &other in &self.ring_partners[atom] {
                self.ring_bonds.insert(bond_key(atom, other));
                if self.visit_order[other] > self.visit_order[atom] {
                    continue;
                }
                let mut current = atom;
                while current != other {
                    let Some(parent) = self.parents[current]
                    else {
                        break;
                    };
                    self.ring_bonds.insert(bond_key(current, parent));
                    current = parent;
                }
            }
        }

        self.visited.iter_mut().for_each(|visited| *visited = false);
    }

    // Which side of the double bond first -> second a neighbour of end is
    // on, None when it is on the axis
    fn side(&self, first: usize, second: usize, end: usize, neighbour: usize) -> Option<bool> {
        let atoms = &self.molecule.atoms;
        let (ax, ay) = (atoms[second].x - atoms[first].x, atoms[second].y - atoms[first].y);
        let (bx, by) = (atoms[neighbour].x - atoms[end].x, atoms[neighbour].y - atoms[end].y);
        let cross = ax * by - ay * bx;
        if cross.abs() < 1e-3 * ax.hypot(ay) * bx.hypot(by) || cross.abs() < 1e-8 {
            None
        } else {
            Some(cross > 0.0)
        }
    }

    // The marks for the single bonds around the double bond between atom1
    // and atom2, or None if the bond has no usable stereo
    fn double_bond_marks(&self, atom1: usize, atom2: usize) -> Option<Vec<((usize, usize), char)>> {
        let (first, second) =
            if self.visit_order[atom1] < self.visit_order[atom2] {
                (atom1, atom2)
            } else {
                (atom2, atom1)
            };

        let mut marks = vec![];

        for end in [first, second] {
            let others: Vec<(usize, BondOrder)> = self.adjacency[end].iter().copied()
                .filter(|(other, _)| *other != first && *other != second)
                .collect();

            if others.is_empty() || others.len() > 2 ||
                others.iter().any(|(_, order)| *order != BondOrder::Single)
            {
                return None;
            }
            if let [(a, _), (b, _)] = others.as_slice() && self.ranks[*a] == self.ranks[*b] {
                return None;
            }

            let mut end_marks = vec![];
            for (neighbour, _) in others {
                let key = bond_key(end, neighbour);
                if self.ring_partners[end].contains(&neighbour) {
                    continue;
                }
                let up = self.side(first, second, end, neighbour)?;
                let written_before = self.visit_order[neighbour] < self.visit_order[end];
                let mark = if up == written_before { '/' } else { '\\' };
                end_marks.push((key, mark));
            }
            if end_marks.is_empty() {
                return None;
            }
            marks.extend(end_marks);
        }

        Some(marks)
    }

    fn find_double_bond_marks(&mut self) {
        let mut double_bonds: Vec<(usize, usize)> = self.molecule.bonds.iter()
            .filter(|bond| bond.order == BondOrder::Double && bond.stereo != STEREO_EITHER_DOUBLE)
            .map(|bond| bond_key(bond.atom1, bond.atom2))
            .filter(|key| !self.ring_bonds.contains(key))
            .collect();
        double_bonds.sort_by_key(|(atom1, atom2)| bond_key(self.ranks[*atom1], self.ranks[*atom2]));

        for (atom1, atom2) in double_bonds {
            let Some(marks) = self.double_bond_marks(atom1, atom2)
            else {
                continue;
            };

            let (agree, conflict): (Vec<_>, Vec<_>) = marks.iter()
                .filter_map(|(key, mark)| self.bond_marks.get(key).map(|seen| seen == mark))
                .partition(|same| *same);

            // flipping every mark of one double bond keeps its meaning
            let flip =
                match (agree.is_empty(), conflict.is_empty()) {
                    (_, true) => false,
                    (true, false) => true,
                    (false, false) => continue,
                };

            for (key, mark) in marks {
                let mark = match (flip, mark) {
                    (true, '/') => '\\',
                    (true, _) => '/',
                    (false, mark) => mark,
                };
                self.bond_marks.insert(key, mark);
            }
        }
    }

    fn output_chirality(&self, atom: usize, parent: Option<usize>, children: &[(usize, BondOrder)])
        -> Option<Chirality>
    {
        let chirality = self.molecule.atoms[atom].chirality?;
        let degree = self.adjacency[atom].len();

        // the implicit neighbour is None
        let mut reference: Vec<Option<usize>> = vec![];
        let mut order: Vec<Option<usize>> = parent.into_iter().map(Some).collect();
        if degree == 3 {
            reference.push(None);
            order.push(None);
        }
        let mut by_index: Vec<usize> = self.adjacency[atom].iter().map(|(other, _)| *other).collect();
        by_index.sort();
        reference.extend(by_index.into_iter().map(Some));

        order.extend(self.ring_partners[atom].iter().copied().map(Some));
        order.extend(children.iter().map(|(other, _)| Some(*other)));

        if order.len() != reference.len() {
            return None;
        }

        if is_odd_permutation(&order, &reference) {
            Some(chirality.inverted())
        } else {
            Some(chirality)
        }
    }

    fn bond_text(&self, atom: usize, other: usize, order: BondOrder) -> String {
        if order == BondOrder::Single &&
            let Some(mark) = self.bond_marks.get(&bond_key(atom, other))
        {
            return mark.to_string();
        }
        order.smiles_symbol().to_owned()
    }

    fn bond_order(&self, atom: usize, other: usize) -> BondOrder {
        self.adjacency[atom].iter()
            .find(|(neighbour, _)| *neighbour == other)
            .map(|(_, order)| *order)
            .unwrap_or(BondOrder::Single)
    }

    fn write_atom(&mut self, atom: usize, parent: Option<usize>, out: &mut String) {
        self.visited[atom] = true;

        let children: Vec<(usize, BondOrder)> =
            self.adjacency[atom].iter().copied()
            .filter(|(other, _)| !self.visited[*other] &&
                    !self.ring_partners[atom].contains(other))
            .collect();

        let chirality = self.output_chirality(atom, parent, &children);
        out.push_str(&atom_text(self.molecule, atom, chirality));

        for other in self.ring_partners[atom].clone() {
            let key = (atom.min(other), atom.max(other));
            if let Some(digit) = self.open_rings.remove(&key) {
                self.used_digits.remove(&digit);
                push_ring_digit(digit, out);
            } else {
                let mut digit = 1;
                while self.used_digits.contains(&digit) {
                    digit += 1;
                }
                self.used_digits.insert(digit);
                self.open_rings.insert(key, digit);
                out.push_str(self.bond_order(atom, other).smiles_symbol());
                push_ring_digit(digit, out);
            }
        }

        let last_child = children.len().saturating_sub(1);

        for (child_index, (other, order)) in children.into_iter().enumerate() {
            let is_branch = child_index != last_child;
            if is_branch {
                out.push('(');
            }
            out.push_str(&self.bond_text(atom, other, order));
            self.write_atom(other, Some(atom), out);
            if is_branch {
                out.push(')');
            }
        }
    }

    fn write(mut self) -> String {
        self.find_ring_bonds();
        self.find_double_bond_marks();

        let mut components = vec![];

        for start in self.start_order.clone() {
            if !self.visited[start] {
                let mut component = String::new();
                self.write_atom(start, None, &mut component);
                components.push(component);
            }
        }

        components.sort();
        components.join(".")
    }
}

pub fn canonical_smiles(molecule: &Molecule) -> String {
    if molecule.atoms.is_empty() {
        return String::new();
    }

    SmilesWriter::new(molecule).write()
}

pub fn reaction_smiles(reactants: &[Molecule], products: &[Molecule]) -> String {
    let side = |molecules: &[Molecule]| {
        molecules.iter()
            .map(canonical_smiles)
            .collect::<Vec<_>>()
            .join(".")
    };

    format!("{}>>{}", side(reactants), side(products))
}

#[cfg(test)]
fn test_atom(symbol: &str, charge: i32, hydrogen_count: u32) -> crate::chem::Atom {
    crate::chem::Atom {
        symbol: symbol.into(),
        charge,
        isotope: None,
        map_number: 0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        hydrogen_count,
        chirality: None,
    }
}

#[cfg(test)]
fn test_bond(atom1: usize, atom2: usize, order: BondOrder) -> crate::chem::Bond {
    crate::chem::Bond { atom1, atom2, order, stereo: 0 }
}

#[test]
fn test_chain_smiles() {
    let ethanol = Molecule {
        title: None,
        atoms: vec![test_atom("C", 0, 3), test_atom("C", 0, 2), test_atom("O", 0, 1)],
        bonds: vec![test_bond(0, 1, BondOrder::Single), test_bond(1, 2, BondOrder::Single)],
    };
    assert_eq!(canonical_smiles(&ethanol), "CCO");

    let reordered = Molecule {
        title: None,
        atoms: vec![test_atom("O", 0, 1), test_atom("C", 0, 3), test_atom("C", 0, 2)],
        bonds: vec![test_bond(2, 1, BondOrder::Single), test_bond(0, 2, BondOrder::Single)],
    };
    assert_eq!(canonical_smiles(&reordered), "CCO");
}

#[test]
fn test_branch_and_charge() {
    let log = crate::chem::DiagnosticLog::new();
    let acetate = crate::chem::molfile::parse_mol_block(crate::chem::molfile::ACETATE_MOL, &log)
        .unwrap();
    assert_eq!(canonical_smiles(&acetate), "CC([O-])=O");
}

#[test]
fn test_ring_smiles() {
    let cyclopropane = Molecule {
        title: None,
        atoms: vec![test_atom("C", 0, 2), test_atom("C", 0, 2), test_atom("C", 0, 2)],
        bonds: vec![test_bond(0, 1, BondOrder::Single), test_bond(1, 2, BondOrder::Single),
                    test_bond(2, 0, BondOrder::Single)],
    };
    assert_eq!(canonical_smiles(&cyclopropane), "C1CC1");
}

#[test]
fn test_components_sorted() {
    let salt = Molecule {
        title: None,
        atoms: vec![test_atom("Na", 1, 0), test_atom("Cl", -1, 0)],
        bonds: vec![],
    };
    assert_eq!(canonical_smiles(&salt), "[Cl-].[Na+]");
}

#[test]
fn test_reaction_smiles() {
    let water = Molecule {
        title: None,
        atoms: vec![test_atom("O", 0, 2)],
        bonds: vec![],
    };
    let proton = Molecule {
        title: None,
        atoms: vec![test_atom("H", 1, 0)],
        bonds: vec![],
    };
    let hydroxide = Molecule {
        title: None,
        atoms: vec![test_atom("O", -1, 1)],
        bonds: vec![],
    };
    assert_eq!(reaction_smiles(&[water], &[proton, hydroxide]), "O>>[H+].[OH-]");
}

// a 2D molfile from (symbol, x, y) atoms and (atom1, atom2, type, stereo)
// bonds, numbered from 1
#[cfg(test)]
fn test_molfile(atoms: &[(&str, f64, f64)], bonds: &[(usize, usize, u32, u32)]) -> Molecule {
    let mut text = format!("test\n  Marvin  01010100002D\n\n{:>3}{:>3}  0  0  0  0            999 V2000\n",
                           atoms.len(), bonds.len());
    for (symbol, x, y) in atoms {
        text += &format!("{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0\n",
                         x, y, 0.0, symbol);
    }
    for (atom1, atom2, order, stereo) in bonds {
        text += &format!("{:>3}{:>3}{:>3}{:>3}\n", atom1, atom2, order, stereo);
    }
    text += "M  END\n";

    let log = crate::chem::DiagnosticLog::new();
    crate::chem::molfile::parse_mol_block(&text, &log).unwrap()
}

#[cfg(test)]
fn test_alanine(stereo: u32) -> Molecule {
    test_molfile(&[("C", 0.0, 0.0), ("N", -0.866, 0.5), ("C", 0.0, -1.0),
                   ("C", 0.866, 0.5), ("O", 0.866, 1.5), ("O", 1.732, 0.0)],
                 &[(1, 2, 1, stereo), (1, 3, 1, 0), (1, 4, 1, 0), (4, 5, 2, 0), (4, 6, 1, 0)])
}

#[test]
fn test_tetrahedral_centres() {
    // amino group towards the viewer is D-alanine
    let d_alanine = canonical_smiles(&test_alanine(1));
    let l_alanine = canonical_smiles(&test_alanine(6));

    assert_eq!(d_alanine, "C[C@H](C(=O)O)N");
    assert_eq!(l_alanine, "C[C@@H](C(=O)O)N");
    assert_eq!(reaction_smiles(&[test_alanine(6)], &[test_alanine(1)]),
               "C[C@@H](C(=O)O)N>>C[C@H](C(=O)O)N");

    // no wedge, no centre
    assert_eq!(canonical_smiles(&test_alanine(0)), "CC(C(=O)O)N");
}

#[test]
fn test_double_bond_directions() {
    let butene = |end: (f64, f64), stereo: u32| {
        test_molfile(&[("C", 0.0, 0.0), ("C", 0.866, 0.5), ("C", 1.732, 0.0), ("C", end.0, end.1)],
                     &[(1, 2, 1, 0), (2, 3, 2, stereo), (3, 4, 1, 0)])
    };

    assert_eq!(canonical_smiles(&butene((2.598, 0.5), 0)), "C\\C=C\\C");
    assert_eq!(canonical_smiles(&butene((1.732, -1.0), 0)), "C\\C=C/C");
    // either
    assert_eq!(canonical_smiles(&butene((2.598, 0.5), 3)), "CC=CC");
}
