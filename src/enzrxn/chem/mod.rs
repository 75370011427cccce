//! Reading MDL reaction and molecule blocks and writing them as canonical
//! linear text.

use thiserror::Error;

pub mod diagnostics;
pub mod molfile;
pub mod rxn;
pub mod smiles;

pub use self::diagnostics::{DiagnosticCategory, DiagnosticError, DiagnosticLog};
pub use self::molfile::{Atom, Bond, BondOrder, Molecule};
pub use self::rxn::Reaction;

/// Errors from parsing and normalising chemical structure text
#[derive(Debug, Error)]
pub enum ChemError {
    /// A line that could not be read at the expected columns
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Formats other than V2000
    #[error("unsupported format: {0}")]
    Unsupported(String),

    /// The molecule block has no "M  END" line
    #[error("molecule block is not terminated by \"M  END\"")]
    MissingEnd,

    /// An atom with more bonds than any allowed valence of its element
    #[error("explicit valence {valence} for atom {atom} ({symbol}) is greater than permitted")]
    Valence { atom: usize, symbol: String, valence: u32 },

    /// The header counts don't agree with the molecule blocks present
    #[error("reaction declares {declared} molecules but {found} were found")]
    MoleculeCount { declared: usize, found: usize },

    /// The title scan and the structure parser disagree about a molecule
    #[error("molecule {position} differs between block parsers: {parsed} vs {scanned}")]
    TitleMismatch { position: usize, parsed: String, scanned: String },

    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),
}

impl ChemError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> ChemError {
        ChemError::Syntax { line: line + 1, message: message.into() }
    }

    // a failure in the Rhea data that the caller may skip
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChemError::TitleMismatch { .. } => false,
            ChemError::Diagnostic(err) => err.is_recoverable(),
            _ => true,
        }
    }
}
