use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use flexstr::SharedStr as FlexStr;
use tracing::warn;

use crate::amino_acid::three_to_one;
use crate::constants::MCSA_STALE_SEQUENCE_YEAR;
use crate::types::{Accession, McsaId};
use crate::uniprot::ProteinEntry;
use crate::utils::{get_single, open_data_file};

// a residue position in a PDB structure
#[derive(Debug, Clone, Deserialize)]
pub struct ResidueChain {
    #[serde(default)]
    pub chain_name: FlexStr,
    #[serde(default)]
    pub pdb_id: FlexStr,
    #[serde(default)]
    pub code: FlexStr,
    #[serde(default)]
    pub resid: Option<i64>,
    #[serde(default)]
    pub is_reference: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawResidueSequence {
    #[serde(default)]
    uniprot_id: Option<String>,
    code: FlexStr,
    is_reference: bool,
    resid: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct RawResidue {
    #[serde(default)]
    residue_chains: Vec<ResidueChain>,
    residue_sequences: Vec<RawResidueSequence>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMcsaEntry {
    mcsa_id: McsaId,
    #[serde(default)]
    enzyme_name: FlexStr,
    is_reference_uniprot_id: bool,
    #[serde(default)]
    reference_uniprot_id: Option<String>,
    #[serde(default)]
    residues: Vec<RawResidue>,
}

#[derive(Debug, Deserialize)]
struct McsaFile {
    results: Vec<RawMcsaEntry>,
}

// A catalytic residue of a UniProtKB sequence, according to M-CSA
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct McsaResidueSequence {
    pub mcsa_id: McsaId,
    // some residues aren't linked to UniProtKB
    pub uniprot_id: Option<Accession>,
    // three letter code, eg. "Asp"
    pub code: FlexStr,
    pub is_reference: bool,
    // 1-based
    pub resid: usize,
}

impl McsaResidueSequence {
    fn matches_sequence(&self, sequence: &str) -> bool {
        if self.resid == 0 {
            return false;
        }
        let Some(residue) = sequence.as_bytes().get(self.resid - 1)
        else {
            return false;
        };
        three_to_one(&self.code) == Some(*residue as char)
    }
}

fn residue_sequence(mcsa_id: McsaId, raw: &RawResidue) -> Result<McsaResidueSequence> {
    let sequence = get_single(raw.residue_sequences.iter().collect(), "residue sequence")
        .with_context(|| format!("in M-CSA entry {}", mcsa_id))?;

    if raw.residue_chains.len() > 1 {
        bail!("M-CSA entry {}: {} residue chains for one residue",
              mcsa_id, raw.residue_chains.len());
    }

    let uniprot_id = sequence.uniprot_id.as_deref().map(str::trim).unwrap_or_default();

    if !uniprot_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("M-CSA entry {}: unexpected UniProtKB ID \"{}\"", mcsa_id, uniprot_id);
    }

    Ok(McsaResidueSequence {
        mcsa_id,
        uniprot_id: if uniprot_id.is_empty() { None } else { Some(uniprot_id.into()) },
        code: sequence.code.clone(),
        is_reference: sequence.is_reference,
        resid: sequence.resid,
    })
}

fn find_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let dir_entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;

    for dir_entry in dir_entries {
        let path = dir_entry?.path();
        if path.is_dir() {
            find_json_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }

    Ok(())
}

// Catalytic residues from M-CSA JSON exports, by UniProtKB accession
#[derive(Debug)]
pub struct McsaSource {
    residues_by_accession: HashMap<Accession, Vec<McsaResidueSequence>>,
}

impl McsaSource {
    pub fn read(mcsa_dir: &Path) -> Result<McsaSource> {
        let mut files = vec![];
        find_json_files(mcsa_dir, &mut files)?;
        files.sort();

        let mut entries = vec![];

        for file in &files {
            let reader = open_data_file(file)?;
            let mcsa_file: McsaFile = serde_json::from_reader(reader)
                .with_context(|| format!("failed to parse M-CSA file {}", file.display()))?;
            entries.extend(mcsa_file.results);
        }

        entries.sort_by_key(|entry| entry.mcsa_id);

        McsaSource::from_entries(entries)
    }

    fn from_entries(entries: Vec<RawMcsaEntry>) -> Result<McsaSource> {
        let mut residues_by_accession: HashMap<Accession, Vec<McsaResidueSequence>> =
            HashMap::new();

        for entry in &entries {
            let has_reference_id = entry.reference_uniprot_id.as_ref()
                .is_some_and(|id| !id.is_empty());
            if !entry.is_reference_uniprot_id || !has_reference_id {
                bail!("M-CSA entry {} ({}) has no reference UniProtKB ID",
                      entry.mcsa_id, entry.enzyme_name);
            }

            for raw_residue in &entry.residues {
                let residue = residue_sequence(entry.mcsa_id, raw_residue)?;

                // the reference ID of an entry can be a list, so use the
                // residue's own ID
                if let Some(ref accession) = residue.uniprot_id {
                    residues_by_accession.entry(accession.clone()).or_default().push(residue);
                }
            }
        }

        Ok(McsaSource {
            residues_by_accession,
        })
    }

    // All or nothing: if any residue doesn't match the sequence of the entry
    // the M-CSA data is probably for an older sequence, return no residues
    pub fn residues_for_entry(&self, entry: &ProteinEntry) -> BTreeSet<McsaResidueSequence> {
        let entry_residues: Vec<&Vec<McsaResidueSequence>> = entry.all_accessions()
            .filter_map(|accession| self.residues_by_accession.get(accession))
            .collect();

        if entry_residues.is_empty() {
            return BTreeSet::new();
        }

        if entry.last_sequence_update_date.year() >= MCSA_STALE_SEQUENCE_YEAR {
            warn!("{}: sequence updated on {}, M-CSA residue numbering may be out of date",
                  entry.primary_accession, entry.last_sequence_update_date);
        }

        let mut result = BTreeSet::new();

        for residues in entry_residues {
            for residue in residues {
                if !residue.matches_sequence(&entry.sequence) {
                    warn!("{}: M-CSA entry {} residue {}{} doesn't match the sequence, \
                           ignoring all M-CSA residues", entry.primary_accession,
                          residue.mcsa_id, residue.code, residue.resid);
                    return BTreeSet::new();
                }
            }

            result.extend(residues.iter().cloned());
        }

        result
    }

    pub fn accession_count(&self) -> usize {
        self.residues_by_accession.len()
    }
}

#[cfg(test)]
fn test_source() -> McsaSource {
    let json = r#"{"results": [
      {
        "mcsa_id": 7,
        "enzyme_name": "test hydrolase",
        "is_reference_uniprot_id": true,
        "reference_uniprot_id": "P00001",
        "residues": [
          {
            "roles": [{"group_function": "", "function_type": "", "function": "", "emo": ""}],
            "residue_chains": [],
            "residue_sequences": [{"uniprot_id": "P00001", "code": "Lys", "is_reference": true, "resid": 2}]
          },
          {
            "residue_chains": [],
            "residue_sequences": [{"uniprot_id": " Q00001 ", "code": "Tyr", "is_reference": true, "resid": 4}]
          },
          {
            "residue_chains": [],
            "residue_sequences": [{"uniprot_id": "", "code": "Ala", "is_reference": true, "resid": 1}]
          }
        ]
      }
    ]}"#;
    let file: McsaFile = serde_json::from_str(json).unwrap();
    McsaSource::from_entries(file.results).unwrap()
}

#[cfg(test)]
fn test_entry(sequence: &str) -> ProteinEntry {
    let json = serde_json::json!({
        "primaryAccession": "P00001",
        "secondaryAccessions": ["Q00001"],
        "uniProtkbId": "TEST_HUMAN",
        "proteinExistence": "1: Evidence at protein level",
        "entryAudit": { "lastSequenceUpdateDate": "2010-01-01" },
        "sequence": { "value": sequence },
        "comments": [{ "commentType": "CATALYTIC ACTIVITY", "reaction": { "name": "A = B" } }]
    });
    ProteinEntry::from_json_value(json).unwrap()
}

#[test]
fn test_residues_for_entry() {
    let source = test_source();
    assert_eq!(source.accession_count(), 2);

    let residues = source.residues_for_entry(&test_entry("MKTYIA"));
    let resids: Vec<usize> = residues.iter().map(|residue| residue.resid).collect();
    assert_eq!(resids, vec![2, 4]);
}

#[test]
fn test_mismatch_discards_everything() {
    let source = test_source();
    // Tyr at 4 no longer matches
    assert!(source.residues_for_entry(&test_entry("MKTAIA")).is_empty());
    // too short
    assert!(source.residues_for_entry(&test_entry("MK")).is_empty());
}

#[test]
fn test_invalid_entries() {
    let json = r#"{"results": [{
        "mcsa_id": 8, "is_reference_uniprot_id": false, "reference_uniprot_id": "P1",
        "residues": []
    }]}"#;
    let file: McsaFile = serde_json::from_str(json).unwrap();
    assert!(McsaSource::from_entries(file.results).is_err());

    let json = r#"{"results": [{
        "mcsa_id": 9, "is_reference_uniprot_id": true, "reference_uniprot_id": "P1",
        "residues": [{"residue_chains": [], "residue_sequences": [
            {"uniprot_id": "P1,P2", "code": "Lys", "is_reference": true, "resid": 2}
        ]}]
    }]}"#;
    let file: McsaFile = serde_json::from_str(json).unwrap();
    assert!(McsaSource::from_entries(file.results).is_err());

    let json = r#"{"results": [{
        "mcsa_id": 10, "is_reference_uniprot_id": true, "reference_uniprot_id": "P1",
        "residues": [{"residue_chains": [], "residue_sequences": [
            {"uniprot_id": "P1", "code": "Lys", "is_reference": true, "resid": 2},
            {"uniprot_id": "P1", "code": "Lys", "is_reference": false, "resid": 2}
        ]}]
    }]}"#;
    let file: McsaFile = serde_json::from_str(json).unwrap();
    let err = McsaSource::from_entries(file.results).unwrap_err();
    assert!(format!("{:#}", err).contains("in M-CSA entry 10"));
    assert!(format!("{:#}", err).contains("expected exactly one residue sequence, found 2"));
}
