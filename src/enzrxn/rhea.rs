use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use flexstr::SharedStr as FlexStr;
use tracing::{debug, warn};

use crate::chem::rxn::parse_rxn_block_with_titles;
use crate::chem::{DiagnosticCategory, DiagnosticLog, Reaction};
use crate::direction::RheaDirectionName;
use crate::types::{MetaCycId, RheaIdNumber};
use crate::utils::{get_single, tsv_reader};

// (Rhea ID, text, replacement) for reaction files that can't be read as
// distributed
const RXN_FILE_PATCHES: [(&str, &str, &str); 1] = [
    // two atom counts run together on one line
    ("55541", "93123", "93 123"),
];

// A row of rhea-directions.tsv
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RheaDirectionIds {
    #[serde(rename = "RHEA_ID_MASTER")]
    pub master: RheaIdNumber,
    #[serde(rename = "RHEA_ID_LR")]
    pub left_to_right: RheaIdNumber,
    #[serde(rename = "RHEA_ID_RL")]
    pub right_to_left: RheaIdNumber,
    #[serde(rename = "RHEA_ID_BI")]
    pub bidirectional: RheaIdNumber,
}

impl RheaDirectionIds {
    pub fn id(&self, direction_name: RheaDirectionName) -> &RheaIdNumber {
        match direction_name {
            RheaDirectionName::Master => &self.master,
            RheaDirectionName::LeftToRight => &self.left_to_right,
            RheaDirectionName::RightToLeft => &self.right_to_left,
            RheaDirectionName::Bidirectional => &self.bidirectional,
        }
    }
}

// A row of rhea2metacyc.tsv
#[derive(Debug, Clone, Deserialize)]
pub struct RheaMetaCycLink {
    #[serde(rename = "RHEA_ID")]
    pub rhea_id: RheaIdNumber,
    #[serde(rename = "DIRECTION")]
    pub direction: FlexStr,
    #[serde(rename = "MASTER_ID")]
    pub master_id: RheaIdNumber,
    #[serde(rename = "ID")]
    pub metacyc_id: MetaCycId,
}

// A parsed Rhea reaction with its linear text computed once
#[derive(Debug, Clone)]
pub struct RheaReaction {
    pub rhea_id: RheaIdNumber,
    pub reaction: Reaction,
    pub smiles: FlexStr,
}

impl RheaReaction {
    pub fn has_molecule(&self, chebi_id: &str) -> bool {
        self.reaction.molecules()
            .any(|molecule| molecule.title.as_deref() == Some(chebi_id))
    }
}

enum ReactionLoad {
    Loaded(RheaReaction),
    NotFound,
    // a reaction that can't be used, with the reason
    Skipped(String),
}

fn patch_rxn_text(rhea_id: &str, text: String) -> String {
    RXN_FILE_PATCHES.iter()
        .filter(|(patch_id, _, _)| *patch_id == rhea_id)
        .fold(text, |text, (_, from, to)| text.replace(from, to))
}

fn load_reaction(rxn_dir: &Path, rhea_id: &RheaIdNumber, log: &DiagnosticLog,
                 tolerated: &[DiagnosticCategory])
    -> Result<ReactionLoad>
{
    let path = rxn_dir.join(format!("{}.rxn", rhea_id));

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ReactionLoad::NotFound),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let text = patch_rxn_text(rhea_id, text);

    let capture = log.begin_capture()?;
    let parse_result = parse_rxn_block_with_titles(&text, log);
    let diagnostics_result = capture.finish(tolerated);

    if let Err(err) = diagnostics_result {
        if !err.is_recoverable() {
            return Err(err).with_context(|| format!("while reading {}", path.display()));
        }
        return Ok(ReactionLoad::Skipped(err.to_string()));
    }

    match parse_result {
        Ok(reaction) => {
            let smiles = reaction.to_smiles().into();
            Ok(ReactionLoad::Loaded(RheaReaction {
                rhea_id: rhea_id.clone(),
                reaction,
                smiles,
            }))
        },
        Err(err) if err.is_recoverable() => Ok(ReactionLoad::Skipped(err.to_string())),
        Err(err) => Err(err).with_context(|| format!("while reading {}", path.display())),
    }
}

// Reaction structures and ID tables from a Rhea release
pub struct RheaSource {
    rxn_dir: PathBuf,
    directions_by_master: HashMap<RheaIdNumber, Vec<RheaDirectionIds>>,
    metacyc_ids_by_master: HashMap<RheaIdNumber, BTreeSet<MetaCycId>>,
    tolerated_diagnostics: Vec<DiagnosticCategory>,
    log: DiagnosticLog,
    reaction_cache: HashMap<RheaIdNumber, Option<Rc<RheaReaction>>>,
    warned_ids: BTreeSet<RheaIdNumber>,
}

impl RheaSource {
    pub fn new(rxn_dir: &Path, direction_ids: Vec<RheaDirectionIds>,
               metacyc_links: Vec<RheaMetaCycLink>,
               tolerated_diagnostics: &[DiagnosticCategory])
        -> RheaSource
    {
        let mut directions_by_master: HashMap<RheaIdNumber, Vec<RheaDirectionIds>> =
            HashMap::new();
        for ids in direction_ids {
            directions_by_master.entry(ids.master.clone()).or_default().push(ids);
        }

        let mut metacyc_ids_by_master: HashMap<RheaIdNumber, BTreeSet<MetaCycId>> =
            HashMap::new();
        for link in metacyc_links {
            metacyc_ids_by_master.entry(link.master_id.trim().into())
                .or_default()
                .insert(link.metacyc_id.trim().into());
        }

        RheaSource {
            rxn_dir: rxn_dir.to_owned(),
            directions_by_master,
            metacyc_ids_by_master,
            tolerated_diagnostics: tolerated_diagnostics.to_vec(),
            log: DiagnosticLog::new(),
            reaction_cache: HashMap::new(),
            warned_ids: BTreeSet::new(),
        }
    }

    pub fn read(rxn_dir: &Path, directions_tsv: &Path, rhea2metacyc_tsv: Option<&Path>,
                tolerated_diagnostics: &[DiagnosticCategory])
        -> Result<RheaSource>
    {
        let direction_ids = read_tsv_rows(directions_tsv)?;
        let metacyc_links =
            match rhea2metacyc_tsv {
                Some(path) => read_tsv_rows(path)?,
                None => vec![],
            };

        Ok(RheaSource::new(rxn_dir, direction_ids, metacyc_links, tolerated_diagnostics))
    }

    pub fn is_master_id(&self, rhea_id: &str) -> bool {
        self.directions_by_master.contains_key(rhea_id)
    }

    pub fn map_master_id_to_direction_id(&self, master_id: &str,
                                         direction_name: RheaDirectionName)
        -> Result<RheaIdNumber>
    {
        let Some(rows) = self.directions_by_master.get(master_id)
        else {
            bail!("Rhea ID {} is not a master ID, it may be a directional ID", master_id);
        };

        let ids = get_single(rows.iter().collect(), "row")
            .with_context(|| format!("Rhea ID {} is in the {} column more than once",
                                     master_id, RheaDirectionName::Master.column_name()))?;
        Ok(ids.id(direction_name).clone())
    }

    // the MetaCyc reactions linked to a Rhea master reaction, empty if
    // there are none
    pub fn map_master_id_to_pathway_ids(&self, master_id: &str) -> BTreeSet<MetaCycId> {
        if !self.is_master_id(master_id) {
            warn!("expected a master ID, not Rhea ID {}", master_id);
            return BTreeSet::new();
        }

        self.metacyc_ids_by_master.get(master_id).cloned().unwrap_or_default()
    }

    // Read and parse <rhea_id>.rxn.  Returns None, with a warning, if there
    // is no file or the reaction can't be used.
    pub fn get_single_reaction(&mut self, rhea_id: &RheaIdNumber) -> Result<Option<RheaReaction>> {
        let load = load_reaction(&self.rxn_dir, rhea_id, &self.log,
                                 &self.tolerated_diagnostics)?;

        match load {
            ReactionLoad::Loaded(reaction) => Ok(Some(reaction)),
            ReactionLoad::NotFound => {
                // usually a ChEBI compound without a structure
                warn!("no reaction file for Rhea ID {}, it won't be used", rhea_id);
                Ok(None)
            },
            ReactionLoad::Skipped(reason) => {
                warn!("Rhea ID {} won't be used: {}", rhea_id, reason);
                self.warned_ids.insert(rhea_id.clone());
                Ok(None)
            },
        }
    }

    pub fn get_single_reaction_with_cache(&mut self, rhea_id: &RheaIdNumber)
        -> Result<Option<Rc<RheaReaction>>>
    {
        if let Some(cached) = self.reaction_cache.get(rhea_id) {
            return Ok(cached.clone());
        }

        debug!("reading Rhea reaction {}", rhea_id);

        let reaction = self.get_single_reaction(rhea_id)?.map(Rc::new);
        self.reaction_cache.insert(rhea_id.clone(), reaction.clone());

        Ok(reaction)
    }

    // IDs of reactions that couldn't be parsed or had disallowed diagnostics
    pub fn warned_ids(&self) -> &BTreeSet<RheaIdNumber> {
        &self.warned_ids
    }

    pub fn cached_reaction_count(&self) -> usize {
        self.reaction_cache.len()
    }
}

fn read_tsv_rows<T>(path: &Path) -> Result<Vec<T>>
    where T: serde::de::DeserializeOwned
{
    let mut reader = tsv_reader(path)?;
    let mut rows = vec![];

    for result in reader.deserialize() {
        let row: T = result
            .with_context(|| format!("failed to read a row of {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

// Parse every .rxn file in a directory, returning the IDs of the reactions
// that can't be used and why
pub fn check_all_reactions(rxn_dir: &Path, tolerated_diagnostics: &[DiagnosticCategory])
    -> Result<BTreeMap<RheaIdNumber, String>>
{
    let log = DiagnosticLog::new();
    let mut failures = BTreeMap::new();

    let mut rhea_ids = vec![];
    for dir_entry in fs::read_dir(rxn_dir)
        .with_context(|| format!("failed to read directory {}", rxn_dir.display()))?
    {
        let path = dir_entry?.path();
        if path.extension().is_some_and(|ext| ext == "rxn") &&
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
        {
            rhea_ids.push(RheaIdNumber::from(stem));
        }
    }
    rhea_ids.sort();

    for rhea_id in rhea_ids {
        if let ReactionLoad::Skipped(reason) =
            load_reaction(rxn_dir, &rhea_id, &log, tolerated_diagnostics)?
        {
            failures.insert(rhea_id, reason);
        }
    }

    Ok(failures)
}

#[cfg(test)]
fn test_direction_ids(master: &str) -> RheaDirectionIds {
    let master_number: u32 = master.parse().unwrap();
    RheaDirectionIds {
        master: master.into(),
        left_to_right: (master_number + 1).to_string().into(),
        right_to_left: (master_number + 2).to_string().into(),
        bidirectional: (master_number + 3).to_string().into(),
    }
}

#[cfg(test)]
fn test_source(rxn_dir: &Path) -> RheaSource {
    let links = vec![
        RheaMetaCycLink {
            rhea_id: "10000".into(),
            direction: "UN".into(),
            master_id: "10000".into(),
            metacyc_id: " RXN-1 ".into(),
        },
    ];

    RheaSource::new(rxn_dir, vec![test_direction_ids("10000"), test_direction_ids("20000"),
                                  test_direction_ids("20000")],
                    links, &[DiagnosticCategory::AmbiguousStereochemistry])
}

#[test]
fn test_direction_ids_lookup() {
    let source = test_source(Path::new("/nonexistent"));

    assert_eq!(source.map_master_id_to_direction_id("10000", RheaDirectionName::RightToLeft)
               .unwrap().as_str(), "10002");
    assert_eq!(source.map_master_id_to_direction_id("10000", RheaDirectionName::Master)
               .unwrap().as_str(), "10000");
    // duplicated master
    let err = source.map_master_id_to_direction_id("20000", RheaDirectionName::LeftToRight)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("RHEA_ID_MASTER column more than once"));
    assert!(format!("{:#}", err).contains("found 2"));
    // not a master
    assert!(source.map_master_id_to_direction_id("10001", RheaDirectionName::LeftToRight)
            .is_err());
}

#[test]
fn test_pathway_ids() {
    let source = test_source(Path::new("/nonexistent"));

    assert_eq!(source.map_master_id_to_pathway_ids("10000"),
               BTreeSet::from([MetaCycId::from("RXN-1")]));
    assert!(source.map_master_id_to_pathway_ids("20000").is_empty());
    assert!(source.map_master_id_to_pathway_ids("10001").is_empty());
}

#[test]
fn test_reaction_cache() {
    use crate::chem::rxn::test_rxn_block;

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("10001.rxn"), test_rxn_block("")).unwrap();
    fs::write(dir.path().join("10002.rxn"), "not a reaction").unwrap();

    let mut source = test_source(dir.path());

    let reaction = source.get_single_reaction_with_cache(&"10001".into()).unwrap().unwrap();
    assert_eq!(reaction.smiles.as_str(), "O>>CC([O-])=O");
    assert!(reaction.has_molecule("CHEBI:15377"));
    assert!(!reaction.has_molecule("CHEBI:1"));

    // a broken file is skipped and remembered
    assert!(source.get_single_reaction_with_cache(&"10002".into()).unwrap().is_none());
    // a missing file is skipped without a mark
    assert!(source.get_single_reaction_with_cache(&"10003".into()).unwrap().is_none());

    assert_eq!(source.cached_reaction_count(), 3);
    assert_eq!(source.warned_ids(), &BTreeSet::from([RheaIdNumber::from("10002")]));

    // served from the cache
    fs::remove_file(dir.path().join("10001.rxn")).unwrap();
    assert!(source.get_single_reaction_with_cache(&"10001".into()).unwrap().is_some());

    let failures = check_all_reactions(dir.path(), &[]).unwrap();
    assert_eq!(failures.keys().map(|id| id.as_str()).collect::<Vec<_>>(), vec!["10002"]);
}

#[test]
fn test_patch_rxn_text() {
    assert_eq!(patch_rxn_text("55541", "  93123  0".to_owned()), "  93 123  0");
    assert_eq!(patch_rxn_text("10000", "  93123  0".to_owned()), "  93123  0");
}
