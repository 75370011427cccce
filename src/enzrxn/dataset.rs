use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use anyhow::{Result, bail};
use flexstr::{SharedStr as FlexStr, shared_fmt as flex_fmt};
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::constants::{NO_ISOFORM_PLACEHOLDER, PROGRESS_LOG_INTERVAL};
use crate::direction::{ReactionDirection, check_direction_set};
use crate::eco::EcoCode;
use crate::isoform_mapping::IsoformIdMapping;
use crate::mcsa::{McsaResidueSequence, McsaSource};
use crate::metacyc::MetaCycDirectionMapper;
use crate::rhea::{RheaReaction, RheaSource};
use crate::types::{Accession, IsoformId, RheaIdNumber, Sequence};
use crate::uniprot::{self, CatalyticActivity, PhysiologicalReaction, ProteinEntry};
use crate::utils::join;

// Where the direction of a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectionSource {
    #[serde(rename = "UniProt_Physiological_Reaction")]
    UniProt,
    #[serde(rename = "MetaCyc")]
    MetaCyc,
    // unverified, only used when asked for
    #[serde(rename = "Force_left-to-right")]
    ForcedLeftToRight,
}

impl DirectionSource {
    pub fn label(&self) -> &'static str {
        match self {
            DirectionSource::UniProt => "UniProt_Physiological_Reaction",
            DirectionSource::MetaCyc => "MetaCyc",
            DirectionSource::ForcedLeftToRight => "Force_left-to-right",
        }
    }
}

impl Display for DirectionSource {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActivityDiscardReason {
    #[serde(rename = "No experimental evidence")]
    NoExpEvidence,
    #[serde(rename = "Rhea ID to RXN mapping failed")]
    NoRheaReference,
    #[serde(rename = "Direction could not be defined")]
    NoDirection,
    #[serde(rename = "Isoform could not be resolved")]
    UnresolvedIsoform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectionDiscardReason {
    #[serde(rename = "Failed to map rhea id to reaction")]
    ReactionMappingFailed,
    #[serde(rename = "Data id already used by another chain")]
    DuplicateDataId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedActivity {
    pub accession: Accession,
    pub reaction: FlexStr,
    pub reason: ActivityDiscardReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDirection {
    pub accession: Accession,
    pub reaction: FlexStr,
    pub rhea_id: RheaIdNumber,
    pub direction: FlexStr,
    pub reason: DirectionDiscardReason,
}

// One row of the dataset: a protein sequence with one direction of a Rhea
// reaction.  The field order is the column order of the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRow {
    pub data_id: FlexStr,
    pub primary_accession: Accession,
    pub isoform_id: Option<IsoformId>,
    pub ptm_key: Option<FlexStr>,
    pub sequence: Sequence,
    pub ec_number: Option<FlexStr>,
    pub has_physiological_rxn: bool,
    pub physiological_rxn_has_exp_evidence: Option<bool>,
    pub rxn_has_exp_evidence: bool,
    pub rhea_master_id: RheaIdNumber,
    pub rhea_id: RheaIdNumber,
    pub rxn: FlexStr,
    pub binding_site_all: FlexStr,
    pub binding_site_exp: FlexStr,
    pub mcsa_residues: Option<FlexStr>,
    pub direction_source: DirectionSource,
    pub rxn_evidence: Option<FlexStr>,
    pub phy_rxn_evidence: Option<FlexStr>,
}

#[derive(Debug, Default)]
pub struct Dataset {
    pub rows: Vec<DatasetRow>,
    pub skipped_activities: Vec<SkippedActivity>,
    pub skipped_directions: Vec<SkippedDirection>,
}

// The sequence a row is about: the canonical sequence, an isoform or the
// chain named by the activity
#[derive(Debug, Clone, PartialEq)]
struct SequenceVariant {
    isoform_id: Option<IsoformId>,
    ptm_key: Option<FlexStr>,
    sequence: Sequence,
}

// A direction to emit, with the physiological reaction it came from if any
struct DirectionRequest<'a> {
    direction: ReactionDirection,
    physiological_reaction: Option<&'a PhysiologicalReaction>,
}

pub fn make_data_id(primary_accession: &str, isoform_id: Option<&str>, rhea_master_id: &str,
                    direction: ReactionDirection)
    -> FlexStr
{
    flex_fmt!("{}_{}_{}_{}", primary_accession,
              isoform_id.unwrap_or(NO_ISOFORM_PLACEHOLDER), rhea_master_id,
              direction.short_name())
}

// sorted, "|" separated codes, None if there are no codes
fn evidence_text(codes: impl IntoIterator<Item = EcoCode>) -> Option<FlexStr> {
    let codes: BTreeSet<&'static str> = codes.into_iter().map(|code| code.code()).collect();
    if codes.is_empty() {
        None
    } else {
        Some(itertools::join(codes, "|").into())
    }
}

fn mcsa_residue_text(residues: &BTreeSet<McsaResidueSequence>) -> FlexStr {
    let resids: BTreeSet<usize> = residues.iter().map(|residue| residue.resid).collect();
    itertools::join(resids, "|").into()
}

// locations of the binding sites whose ligand is one of the molecules of
// the reaction
fn binding_site_text(entry: &ProteinEntry, reaction: &RheaReaction, only_exp: bool) -> FlexStr {
    let mut locations: Vec<FlexStr> = entry.binding_sites.iter()
        .filter(|site| !only_exp || site.has_exp_evidence())
        .filter(|site| {
            site.ligand.chebi_id.as_ref()
                .is_some_and(|chebi_id| reaction.has_molecule(chebi_id))
        })
        .map(|site| site.location.string_notation())
        .collect();

    locations.sort();

    join(&locations, "|")
}

pub struct DatasetBuilder {
    rhea: RheaSource,
    isoform_mapping: Option<IsoformIdMapping>,
    mcsa: Option<McsaSource>,
    metacyc: Option<MetaCycDirectionMapper>,
    use_undefined_direction_rxn: bool,
    allow_non_exp_evidence: bool,

    dataset: Dataset,
    // the PTM key of the row that first used each data ID
    seen_data_ids: HashMap<FlexStr, Option<FlexStr>>,
    entry_count: usize,
}

impl DatasetBuilder {
    pub fn new(rhea: RheaSource, isoform_mapping: Option<IsoformIdMapping>,
               mcsa: Option<McsaSource>, metacyc: Option<MetaCycDirectionMapper>,
               use_undefined_direction_rxn: bool, allow_non_exp_evidence: bool)
        -> DatasetBuilder
    {
        DatasetBuilder {
            rhea,
            isoform_mapping,
            mcsa,
            metacyc,
            use_undefined_direction_rxn,
            allow_non_exp_evidence,
            dataset: Dataset::default(),
            seen_data_ids: HashMap::new(),
            entry_count: 0,
        }
    }

    // Read every source named in the configuration
    pub fn from_config(config: &BuildConfig) -> Result<DatasetBuilder> {
        let rhea = RheaSource::read(&config.rhea_rxn_dir, &config.rhea_directions_tsv,
                                    config.rhea2metacyc_tsv.as_deref(),
                                    &config.tolerated_diagnostics)?;
        info!("read Rhea ID tables");

        let isoform_mapping = config.isoform_mapping_json.as_deref()
            .map(IsoformIdMapping::read)
            .transpose()?;

        let mcsa = config.mcsa_dir.as_deref()
            .map(McsaSource::read)
            .transpose()?;
        if let Some(ref mcsa) = mcsa {
            info!("read M-CSA residues for {} accessions", mcsa.accession_count());
        }

        let metacyc =
            match (config.use_metacyc(), &config.metacyc_reactions_dat) {
                (true, Some(reactions_dat)) => {
                    let mapper = MetaCycDirectionMapper::read(reactions_dat)?;
                    info!("read {} MetaCyc reactions", mapper.len());
                    Some(mapper)
                },
                _ => None,
            };

        Ok(DatasetBuilder::new(rhea, isoform_mapping, mcsa, metacyc,
                               config.use_undefined_direction_rxn,
                               config.allow_non_exp_evidence))
    }

    fn skip_activity(&mut self, entry: &ProteinEntry, activity: &CatalyticActivity,
                     reason: ActivityDiscardReason) {
        self.dataset.skipped_activities.push(SkippedActivity {
            accession: entry.primary_accession.clone(),
            reaction: activity.reaction.name.clone(),
            reason,
        });
    }

    fn resolve_variant(&self, entry: &ProteinEntry, activity: &CatalyticActivity)
        -> Result<Option<SequenceVariant>>
    {
        if activity.has_isoform_molecule() {
            let Some(ref isoform_mapping) = self.isoform_mapping
            else {
                warn!("{}: activity on {} but no isoform mapping was configured",
                      entry.primary_accession,
                      activity.molecule.as_deref().unwrap_or_default());
                return Ok(None);
            };

            let variant = isoform_mapping.resolve_isoform(entry, activity)?
                .map(|isoform| SequenceVariant {
                    isoform_id: Some(isoform.isoform_id),
                    ptm_key: None,
                    sequence: isoform.sequence,
                });
            return Ok(variant);
        }

        if activity.has_non_isoform_molecule() {
            // an inexact chain location falls back to the canonical sequence
            let sequence = entry.ptm_sequence(activity)
                .unwrap_or_else(|| entry.sequence.clone());
            return Ok(Some(SequenceVariant {
                isoform_id: None,
                ptm_key: activity.molecule.clone(),
                sequence,
            }));
        }

        Ok(Some(SequenceVariant {
            isoform_id: None,
            ptm_key: None,
            sequence: entry.sequence.clone(),
        }))
    }

    fn metacyc_directions(&self, rhea_master_id: &str) -> Result<BTreeSet<ReactionDirection>> {
        let Some(ref metacyc) = self.metacyc
        else {
            return Ok(BTreeSet::new());
        };

        let mut directions = BTreeSet::new();

        for metacyc_id in self.rhea.map_master_id_to_pathway_ids(rhea_master_id) {
            if let Some(metacyc_direction) = metacyc.metacyc_id_to_direction(&metacyc_id)? {
                directions.extend(metacyc_direction.to_reaction_directions());
            }
        }

        if !directions.is_empty() {
            check_direction_set(&directions)?;
        }

        Ok(directions)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_rows(&mut self, entry: &ProteinEntry, activity: &CatalyticActivity,
                 variant: &SequenceVariant, rhea_master_id: &RheaIdNumber,
                 requests: &[DirectionRequest], direction_source: DirectionSource,
                 mcsa_residues: &Option<FlexStr>)
        -> Result<()>
    {
        for request in requests {
            let rhea_id = self.rhea.map_master_id_to_direction_id(
                rhea_master_id, request.direction.rhea_direction_name())?;

            let Some(reaction) = self.rhea.get_single_reaction_with_cache(&rhea_id)?
            else {
                self.dataset.skipped_directions.push(SkippedDirection {
                    accession: entry.primary_accession.clone(),
                    reaction: activity.reaction.name.clone(),
                    rhea_id,
                    direction: request.direction.short_name().into(),
                    reason: DirectionDiscardReason::ReactionMappingFailed,
                });
                continue;
            };

            let data_id = make_data_id(&entry.primary_accession,
                                       variant.isoform_id.as_deref(),
                                       rhea_master_id, request.direction);

            // chains of one entry share the data ID of their reaction, the
            // first chain keeps it
            match self.seen_data_ids.get(&data_id) {
                Some(seen_ptm_key) if *seen_ptm_key == variant.ptm_key => {
                    bail!("duplicate dataset row: {}", data_id);
                },
                Some(seen_ptm_key) => {
                    warn!("{}: data ID {} of {} is already used by {}, skipping",
                          entry.primary_accession, data_id,
                          variant.ptm_key.as_deref().unwrap_or("the full sequence"),
                          seen_ptm_key.as_deref().unwrap_or("the full sequence"));
                    self.dataset.skipped_directions.push(SkippedDirection {
                        accession: entry.primary_accession.clone(),
                        reaction: activity.reaction.name.clone(),
                        rhea_id,
                        direction: request.direction.short_name().into(),
                        reason: DirectionDiscardReason::DuplicateDataId,
                    });
                    continue;
                },
                None => {
                    self.seen_data_ids.insert(data_id.clone(), variant.ptm_key.clone());
                },
            }

            let physiological_reaction = request.physiological_reaction;

            self.dataset.rows.push(DatasetRow {
                data_id,
                primary_accession: entry.primary_accession.clone(),
                isoform_id: variant.isoform_id.clone(),
                ptm_key: variant.ptm_key.clone(),
                sequence: variant.sequence.clone(),
                ec_number: activity.reaction.ec_number.clone(),
                has_physiological_rxn: physiological_reaction.is_some(),
                physiological_rxn_has_exp_evidence:
                    physiological_reaction.map(PhysiologicalReaction::has_exp_evidence),
                rxn_has_exp_evidence: activity.reaction.has_exp_evidence(),
                rhea_master_id: rhea_master_id.clone(),
                rhea_id,
                rxn: reaction.smiles.clone(),
                binding_site_all: binding_site_text(entry, &reaction, false),
                binding_site_exp: binding_site_text(entry, &reaction, true),
                mcsa_residues: mcsa_residues.clone(),
                direction_source,
                rxn_evidence: evidence_text(activity.reaction.evidence_codes()),
                phy_rxn_evidence: physiological_reaction
                    .and_then(|phy| evidence_text(phy.evidence_codes())),
            });
        }

        Ok(())
    }

    fn process_activity(&mut self, entry: &ProteinEntry, activity: &CatalyticActivity,
                        mcsa_residues: &Option<FlexStr>)
        -> Result<()>
    {
        let reaction = &activity.reaction;

        let verified_phys: Vec<&PhysiologicalReaction> =
            activity.physiological_reactions.iter()
            .filter(|phy| {
                self.allow_non_exp_evidence || phy.has_exp_evidence() ||
                    reaction.has_exp_evidence()
            })
            .collect();

        if !verified_phys.is_empty() {
            let Some(rhea_master_id) = reaction.rhea_main_reference()?.cloned()
            else {
                self.skip_activity(entry, activity, ActivityDiscardReason::NoRheaReference);
                return Ok(());
            };

            let Some(variant) = self.resolve_variant(entry, activity)?
            else {
                self.skip_activity(entry, activity, ActivityDiscardReason::UnresolvedIsoform);
                return Ok(());
            };

            let requests: Vec<DirectionRequest> = verified_phys.iter()
                .map(|phy| DirectionRequest {
                    direction: phy.direction,
                    physiological_reaction: Some(*phy),
                })
                .collect();

            return self.emit_rows(entry, activity, &variant, &rhea_master_id, &requests,
                                  DirectionSource::UniProt, mcsa_residues);
        }

        if !reaction.has_exp_evidence() && !self.allow_non_exp_evidence {
            self.skip_activity(entry, activity, ActivityDiscardReason::NoExpEvidence);
            return Ok(());
        }

        let Some(rhea_master_id) = reaction.rhea_main_reference()?.cloned()
        else {
            self.skip_activity(entry, activity, ActivityDiscardReason::NoRheaReference);
            return Ok(());
        };

        let Some(variant) = self.resolve_variant(entry, activity)?
        else {
            self.skip_activity(entry, activity, ActivityDiscardReason::UnresolvedIsoform);
            return Ok(());
        };

        let mut directions = self.metacyc_directions(&rhea_master_id)?;
        let mut direction_source = DirectionSource::MetaCyc;

        if directions.is_empty() && self.use_undefined_direction_rxn {
            directions.insert(ReactionDirection::LeftToRight);
            direction_source = DirectionSource::ForcedLeftToRight;
        }

        if directions.is_empty() {
            self.skip_activity(entry, activity, ActivityDiscardReason::NoDirection);
            return Ok(());
        }

        let requests: Vec<DirectionRequest> = directions.into_iter()
            .map(|direction| DirectionRequest {
                direction,
                physiological_reaction: None,
            })
            .collect();

        self.emit_rows(entry, activity, &variant, &rhea_master_id, &requests,
                       direction_source, mcsa_residues)
    }

    pub fn process_entry(&mut self, entry: &ProteinEntry) -> Result<()> {
        let mcsa_residues = self.mcsa.as_ref()
            .map(|mcsa| mcsa_residue_text(&mcsa.residues_for_entry(entry)));

        for activity in &entry.catalytic_activities {
            self.process_activity(entry, activity, &mcsa_residues)?;
        }

        self.entry_count += 1;
        if self.entry_count % PROGRESS_LOG_INTERVAL == 0 {
            info!("processed {} entries, {} rows so far", self.entry_count,
                  self.dataset.rows.len());
        }

        Ok(())
    }

    pub fn process_uniprot_file(&mut self, uniprot_json: &Path) -> Result<()> {
        info!("reading UniProtKB entries from {}", uniprot_json.display());
        uniprot::stream_entries(uniprot_json, |entry| self.process_entry(&entry))
    }

    pub fn finish(self) -> Dataset {
        info!("processed {} entries: {} rows, {} skipped activities, {} skipped directions",
              self.entry_count, self.dataset.rows.len(),
              self.dataset.skipped_activities.len(),
              self.dataset.skipped_directions.len());

        let warned_ids = self.rhea.warned_ids();
        if !warned_ids.is_empty() {
            info!("{} Rhea reactions were unusable: {}", warned_ids.len(),
                  itertools::join(warned_ids, ", "));
        }

        self.dataset
    }
}

pub fn build_dataset(config: &BuildConfig) -> Result<Dataset> {
    let mut builder = DatasetBuilder::from_config(config)?;
    builder.process_uniprot_file(&config.uniprot_json)?;
    Ok(builder.finish())
}

#[test]
fn test_make_data_id() {
    assert_eq!(make_data_id("P00001", None, "10000", ReactionDirection::LeftToRight).as_str(),
               "P00001_#_10000_l2r");
    assert_eq!(make_data_id("P00001", Some("P00001-2"), "10000",
                            ReactionDirection::RightToLeft).as_str(),
               "P00001_P00001-2_10000_r2l");
}

#[test]
fn test_evidence_text() {
    assert_eq!(evidence_text(vec![]), None);
    assert_eq!(evidence_text(vec![EcoCode::CuratorInference, EcoCode::Experimental,
                                  EcoCode::Experimental]).as_deref(),
               Some("ECO:0000269|ECO:0000305"));
}

#[test]
fn test_mcsa_residue_text() {
    let residue = |resid| McsaResidueSequence {
        mcsa_id: 1,
        uniprot_id: None,
        code: "Ser".into(),
        is_reference: true,
        resid,
    };
    let residues = BTreeSet::from([residue(12), residue(7), residue(100)]);
    assert_eq!(mcsa_residue_text(&residues).as_str(), "7|12|100");
    assert_eq!(mcsa_residue_text(&BTreeSet::new()).as_str(), "");
}

#[test]
fn test_direction_source_labels() {
    assert_eq!(DirectionSource::UniProt.to_string(), "UniProt_Physiological_Reaction");
    assert_eq!(DirectionSource::ForcedLeftToRight.label(), "Force_left-to-right");
}
