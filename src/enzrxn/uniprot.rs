use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use flexstr::{SharedStr as FlexStr, shared_fmt as flex_fmt};
use regex::Regex;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::constants::*;
use crate::direction::ReactionDirection;
use crate::eco::EcoCode;
use crate::types::{Accession, ChebiIdText, IsoformId, IsoformName, RheaIdNumber, Sequence};
use crate::utils::open_data_file;

lazy_static! {
    static ref RHEA_ID_RE: Regex = Regex::new(r"^RHEA:(\d+)$").unwrap();
    static ref RHEA_COMP_ID_RE: Regex = Regex::new(r"^RHEA-COMP:(\d+)$").unwrap();
    static ref CHEBI_ID_RE: Regex = Regex::new(r"^CHEBI:\d+$").unwrap();
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evidence {
    #[serde(rename = "evidenceCode")]
    pub code: EcoCode,
    #[serde(default)]
    pub source: Option<FlexStr>,
    #[serde(default)]
    pub id: Option<FlexStr>,
}

fn has_experimental(evidences: &[Evidence]) -> bool {
    evidences.iter().any(|evidence| evidence.code.is_experimental())
}

#[derive(Debug, Deserialize)]
struct RawCrossReference {
    database: String,
    id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "RawCrossReference")]
pub enum CrossReference {
    // the number of a "RHEA:nnnn" reaction ID
    Rhea(RheaIdNumber),
    // the number of a "RHEA-COMP:nnnn" compound ID
    RheaCompound(FlexStr),
    Chebi(ChebiIdText),
}

impl CrossReference {
    pub fn parse(database: &str, id: &str) -> Result<CrossReference> {
        match database {
            RHEA_DATABASE => {
                if let Some(captures) = RHEA_ID_RE.captures(id) {
                    Ok(CrossReference::Rhea(captures[1].into()))
                } else if let Some(captures) = RHEA_COMP_ID_RE.captures(id) {
                    Ok(CrossReference::RheaCompound(captures[1].into()))
                } else {
                    bail!("invalid Rhea ID: {}", id)
                }
            },
            CHEBI_DATABASE => {
                if CHEBI_ID_RE.is_match(id) {
                    Ok(CrossReference::Chebi(id.into()))
                } else {
                    bail!("invalid ChEBI ID: {}", id)
                }
            },
            _ => bail!("unexpected cross-reference database {} for {}", database, id),
        }
    }
}

impl TryFrom<RawCrossReference> for CrossReference {
    type Error = anyhow::Error;

    fn try_from(raw: RawCrossReference) -> Result<CrossReference> {
        CrossReference::parse(&raw.database, &raw.id)
    }
}

fn rhea_ids(cross_references: &[CrossReference]) -> impl Iterator<Item = &RheaIdNumber> {
    cross_references.iter()
        .filter_map(|reference| match reference {
            CrossReference::Rhea(id) => Some(id),
            _ => None,
        })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub name: FlexStr,
    #[serde(default)]
    pub ec_number: Option<FlexStr>,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    #[serde(default, rename = "reactionCrossReferences")]
    pub cross_references: Vec<CrossReference>,
}

impl Reaction {
    pub fn has_exp_evidence(&self) -> bool {
        has_experimental(&self.evidences)
    }

    pub fn has_rhea_reference(&self) -> bool {
        self.cross_references.iter()
            .any(|reference| matches!(reference, CrossReference::Rhea(_) |
                                                 CrossReference::RheaCompound(_)))
    }

    // The Rhea reaction (not compound) reference, an error if there are several
    pub fn rhea_main_reference(&self) -> Result<Option<&RheaIdNumber>> {
        let ids: Vec<&RheaIdNumber> = rhea_ids(&self.cross_references).collect();

        match ids.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(id)),
            _ => bail!("reaction \"{}\" has {} Rhea reaction references",
                       self.name, ids.len()),
        }
    }

    pub fn evidence_codes(&self) -> Vec<EcoCode> {
        self.evidences.iter().map(|evidence| evidence.code).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysiologicalReaction {
    #[serde(rename = "directionType")]
    pub direction: ReactionDirection,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    #[serde(default, rename = "reactionCrossReferences")]
    pub cross_references: Vec<CrossReference>,
}

impl PhysiologicalReaction {
    pub fn has_exp_evidence(&self) -> bool {
        has_experimental(&self.evidences)
    }

    pub fn evidence_codes(&self) -> Vec<EcoCode> {
        self.evidences.iter().map(|evidence| evidence.code).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalyticActivity {
    // an isoform ("Isoform 2") or a chain description, None if the activity
    // belongs to the whole protein
    #[serde(default)]
    pub molecule: Option<FlexStr>,
    pub reaction: Reaction,
    #[serde(default)]
    pub physiological_reactions: Vec<PhysiologicalReaction>,
}

impl CatalyticActivity {
    pub fn has_isoform_molecule(&self) -> bool {
        self.molecule.as_ref().is_some_and(|molecule| molecule.contains("Isoform"))
    }

    pub fn has_non_isoform_molecule(&self) -> bool {
        self.molecule.as_ref().is_some_and(|molecule| !molecule.contains("Isoform"))
    }

    pub fn isoform_molecule_name(&self) -> Option<IsoformName> {
        if !self.has_isoform_molecule() {
            return None;
        }
        self.molecule.as_ref()
            .map(|molecule| molecule.replace("Isoform ", "").trim().into())
    }

    fn validate(&self) -> Result<()> {
        if self.physiological_reactions.len() > 2 {
            bail!("activity \"{}\" has {} physiological reactions",
                  self.reaction.name, self.physiological_reactions.len());
        }

        let directions: HashSet<ReactionDirection> =
            self.physiological_reactions.iter().map(|phy| phy.direction).collect();
        if directions.len() != self.physiological_reactions.len() {
            bail!("activity \"{}\" has physiological reactions with the same direction",
                  self.reaction.name);
        }

        self.reaction.rhea_main_reference()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocationModifier {
    Exact,
    Outside,
    Unsure,
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationPosition {
    #[serde(default)]
    pub value: Option<usize>,
    pub modifier: LocationModifier,
}

// 1-based, inclusive
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub start: LocationPosition,
    pub end: LocationPosition,
}

fn position_text(value: Option<usize>) -> FlexStr {
    match value {
        Some(value) => flex_fmt!("{}", value),
        None => "?".into(),
    }
}

impl Location {
    pub fn is_exact(&self) -> bool {
        self.start.modifier == LocationModifier::Exact &&
            self.end.modifier == LocationModifier::Exact
    }

    // "12" for a single residue, "12-15" for a range
    pub fn string_notation(&self) -> FlexStr {
        if self.start.modifier == LocationModifier::Outside ||
            self.end.modifier == LocationModifier::Outside {
            warn!("location with OUTSIDE modifier: {:?}", self);
        }

        if self.start.value == self.end.value {
            position_text(self.start.value)
        } else {
            flex_fmt!("{}-{}", position_text(self.start.value), position_text(self.end.value))
        }
    }

    pub fn contains(&self, other: &Location) -> bool {
        match (self.start.value, self.end.value, other.start.value, other.end.value) {
            (Some(start), Some(end), Some(other_start), Some(other_end)) =>
                start <= other_start && other_end <= end,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLigand {
    name: FlexStr,
    #[serde(default)]
    id: Option<FlexStr>,
    #[serde(default)]
    label: Option<FlexStr>,
    #[serde(default)]
    note: Option<FlexStr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLigand")]
pub struct Ligand {
    pub name: FlexStr,
    // "CHEBI:57540", from a ligand ID like "ChEBI:CHEBI:57540"
    pub chebi_id: Option<ChebiIdText>,
    pub label: Option<FlexStr>,
    pub note: Option<FlexStr>,
}

impl TryFrom<RawLigand> for Ligand {
    type Error = anyhow::Error;

    fn try_from(raw: RawLigand) -> Result<Ligand> {
        let chebi_id =
            match raw.id {
                Some(ref id) => {
                    let (_, chebi_id) = id.split_once(':')
                        .ok_or_else(|| anyhow!("invalid ligand ID: {}", id))?;
                    if !CHEBI_ID_RE.is_match(chebi_id) {
                        bail!("invalid ligand ChEBI ID: {}", id);
                    }
                    Some(chebi_id.into())
                },
                None => {
                    if raw.name.as_str() != "substrate" {
                        bail!("ligand \"{}\" has no ID", raw.name);
                    }
                    None
                }
            };

        Ok(Ligand {
            name: raw.name,
            chebi_id,
            label: raw.label,
            note: raw.note,
        })
    }
}

// part of a ligand, eg. the iron of a heme
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LigandPart {
    pub name: FlexStr,
    #[serde(default)]
    pub id: Option<FlexStr>,
    #[serde(default)]
    pub label: Option<FlexStr>,
    #[serde(default)]
    pub note: Option<FlexStr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BindingSite {
    #[serde(rename = "type")]
    pub feature_type: FlexStr,
    pub location: Location,
    #[serde(default, rename = "featureCrossReferences")]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub description: FlexStr,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    pub ligand: Ligand,
    #[serde(default)]
    pub ligand_part: Option<LigandPart>,
}

impl BindingSite {
    pub fn has_exp_evidence(&self) -> bool {
        has_experimental(&self.evidences)
    }
}

// used for both "Active site" and "Site" features
#[derive(Debug, Clone, Deserialize)]
pub struct SiteFeature {
    #[serde(rename = "type")]
    pub feature_type: FlexStr,
    pub location: Location,
    #[serde(default, rename = "featureCrossReferences")]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub description: FlexStr,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
}

impl SiteFeature {
    pub fn has_exp_evidence(&self) -> bool {
        has_experimental(&self.evidences)
    }
}

pub type ActiveSite = SiteFeature;
pub type Site = SiteFeature;

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: FlexStr,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub description: FlexStr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cofactor {
    pub name: FlexStr,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    pub cofactor_cross_reference: CrossReference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteText {
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    pub value: FlexStr,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CofactorNote {
    #[serde(default)]
    texts: Vec<NoteText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CofactorData {
    #[serde(default)]
    pub cofactors: Vec<Cofactor>,
    #[serde(default)]
    note: Option<CofactorNote>,
}

impl CofactorData {
    pub fn note_texts(&self) -> &[NoteText] {
        self.note.as_ref().map(|note| note.texts.as_slice()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct IsoformNameValue {
    value: IsoformName,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Isoform {
    name: IsoformNameValue,
    pub isoform_ids: Vec<IsoformId>,
    // "Displayed" for the canonical sequence
    pub isoform_sequence_status: FlexStr,
    #[serde(default)]
    pub sequence_ids: Vec<FlexStr>,
}

impl Isoform {
    pub fn name(&self) -> &IsoformName {
        &self.name.value
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlternativeProducts {
    #[serde(default)]
    pub events: Vec<FlexStr>,
    pub isoforms: Vec<Isoform>,
}

impl AlternativeProducts {
    // the IDs of the isoform with the given name, eg. "2" from "Isoform 2"
    pub fn isoform_ids_by_name(&self, isoform_name: &str) -> Result<Option<&[IsoformId]>> {
        let hits: Vec<&Isoform> = self.isoforms.iter()
            .filter(|isoform| isoform.name().as_str() == isoform_name)
            .collect();

        match hits.as_slice() {
            [] => Ok(None),
            [isoform] => Ok(Some(isoform.isoform_ids.as_slice())),
            _ => bail!("{} isoforms are named \"{}\"", hits.len(), isoform_name),
        }
    }

    pub fn all_isoform_ids(&self) -> impl Iterator<Item = &IsoformId> {
        self.isoforms.iter().flat_map(|isoform| isoform.isoform_ids.iter())
    }
}

#[derive(Debug, Deserialize)]
struct RawSequence {
    value: Sequence,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntryAudit {
    last_sequence_update_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    primary_accession: Accession,
    #[serde(default)]
    secondary_accessions: Vec<Accession>,
    #[serde(rename = "uniProtkbId")]
    uniprot_kb_id: FlexStr,
    protein_existence: FlexStr,
    #[serde(default)]
    comments: Vec<JsonValue>,
    #[serde(default)]
    features: Vec<JsonValue>,
    sequence: RawSequence,
    entry_audit: RawEntryAudit,
}

#[derive(Debug, Clone)]
pub struct ProteinEntry {
    pub primary_accession: Accession,
    pub secondary_accessions: Vec<Accession>,
    pub uniprot_kb_id: FlexStr,
    pub protein_existence: FlexStr,
    pub catalytic_activities: Vec<CatalyticActivity>,
    pub binding_sites: Vec<BindingSite>,
    pub active_sites: Vec<ActiveSite>,
    pub sites: Vec<Site>,
    pub features: Vec<Feature>,
    pub sequence: Sequence,
    pub last_sequence_update_date: NaiveDate,
    pub cofactor_data: Vec<CofactorData>,
    pub alternative_products: Option<AlternativeProducts>,
}

fn json_str<'a>(value: &'a JsonValue, key: &str) -> Option<&'a str> {
    value.get(key).and_then(JsonValue::as_str)
}

impl ProteinEntry {
    pub fn from_json_value(value: JsonValue) -> Result<ProteinEntry> {
        let accession = json_str(&value, "primaryAccession").unwrap_or("unknown").to_owned();

        ProteinEntry::from_json_value_helper(value)
            .with_context(|| format!("failed to read UniProtKB entry {}", accession))
    }

    fn from_json_value_helper(value: JsonValue) -> Result<ProteinEntry> {
        let raw: RawEntry = serde_json::from_value(value)?;

        let mut catalytic_activities = vec![];
        let mut cofactor_data = vec![];
        let mut alternative_products = vec![];

        for comment in raw.comments {
            match json_str(&comment, "commentType") {
                Some(CATALYTIC_ACTIVITY_COMMENT) =>
                    catalytic_activities.push(serde_json::from_value(comment)?),
                Some(COFACTOR_COMMENT) =>
                    cofactor_data.push(serde_json::from_value(comment)?),
                Some(ALTERNATIVE_PRODUCTS_COMMENT) =>
                    alternative_products.push(serde_json::from_value(comment)?),
                _ => (),
            }
        }

        if alternative_products.len() > 1 {
            bail!("{} ALTERNATIVE PRODUCTS comments", alternative_products.len());
        }

        let mut binding_sites = vec![];
        let mut active_sites = vec![];
        let mut sites = vec![];
        let mut features = vec![];

        for feature in raw.features {
            match json_str(&feature, "type") {
                Some(BINDING_SITE_FEATURE) =>
                    binding_sites.push(serde_json::from_value(feature.clone())?),
                Some(ACTIVE_SITE_FEATURE) =>
                    active_sites.push(serde_json::from_value(feature.clone())?),
                Some(SITE_FEATURE) =>
                    sites.push(serde_json::from_value(feature.clone())?),
                _ => (),
            }
            features.push(serde_json::from_value(feature)?);
        }

        let last_sequence_update_date =
            NaiveDate::parse_from_str(&raw.entry_audit.last_sequence_update_date, "%Y-%m-%d")
            .with_context(|| format!("invalid lastSequenceUpdateDate: {}",
                                     raw.entry_audit.last_sequence_update_date))?;

        let entry = ProteinEntry {
            primary_accession: raw.primary_accession,
            secondary_accessions: raw.secondary_accessions,
            uniprot_kb_id: raw.uniprot_kb_id,
            protein_existence: raw.protein_existence,
            catalytic_activities,
            binding_sites,
            active_sites,
            sites,
            features,
            sequence: raw.sequence.value,
            last_sequence_update_date,
            cofactor_data,
            alternative_products: alternative_products.pop(),
        };

        entry.validate()?;

        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.catalytic_activities.is_empty() {
            bail!("no CATALYTIC ACTIVITY comments");
        }

        for activity in &self.catalytic_activities {
            activity.validate()?;

            if activity.has_isoform_molecule() {
                if self.alternative_products.is_none() {
                    bail!("activity for \"{}\" but no ALTERNATIVE PRODUCTS comment",
                          activity.molecule.as_deref().unwrap_or_default());
                }
                continue;
            }

            let Some(ref molecule) = activity.molecule
            else {
                continue;
            };

            let matches: Vec<&Feature> = self.features.iter()
                .filter(|feature| feature.description == *molecule)
                .collect();

            match matches.as_slice() {
                [] => bail!("no feature matches the activity molecule \"{}\"", molecule),
                [feature] if feature.feature_type.as_str() == CHAIN_FEATURE => (),
                _ => bail!("the activity molecule \"{}\" should match one {} feature, matched: {}",
                           molecule, CHAIN_FEATURE,
                           matches.iter().map(|f| f.feature_type.as_str())
                           .collect::<Vec<_>>().join(", ")),
            }
        }

        Ok(())
    }

    fn chain_location(&self, description: &str) -> Option<&Location> {
        self.features.iter()
            .find(|feature| feature.feature_type.as_str() == CHAIN_FEATURE &&
                  feature.description.as_str() == description)
            .and_then(|feature| feature.location.as_ref())
    }

    // The part of the sequence covered by the chain an activity names, cut
    // short at the end of the sequence.  None if the activity doesn't name a
    // chain, either end of the chain is not exact or the chain starts after
    // the sequence ends.
    pub fn ptm_sequence(&self, activity: &CatalyticActivity) -> Option<Sequence> {
        if !activity.has_non_isoform_molecule() {
            return None;
        }

        let molecule = activity.molecule.as_ref()?;
        let location = self.features.iter()
            .find(|feature| feature.description == *molecule)?
            .location.as_ref()?;

        if !location.is_exact() {
            return None;
        }

        let start = location.start.value?;
        let end = location.end.value?;
        if start == 0 {
            return None;
        }

        let sequence_len = self.sequence.len();
        if end > sequence_len {
            warn!("{}: {} ends at {}, after the end of the sequence ({})",
                  self.primary_accession, molecule, end, sequence_len);
        }
        let end = end.min(sequence_len);
        if start > end {
            return None;
        }

        self.sequence.get(start - 1..end).map(FlexStr::from)
    }

    pub fn binding_sites_in_chain(&self, description: &str) -> Vec<&BindingSite> {
        let Some(chain_location) = self.chain_location(description)
        else {
            return vec![];
        };

        self.binding_sites.iter()
            .filter(|site| chain_location.contains(&site.location))
            .collect()
    }

    pub fn active_sites_in_chain(&self, description: &str) -> Vec<&ActiveSite> {
        let Some(chain_location) = self.chain_location(description)
        else {
            return vec![];
        };

        self.active_sites.iter()
            .filter(|site| chain_location.contains(&site.location))
            .collect()
    }

    pub fn all_accessions(&self) -> impl Iterator<Item = &Accession> {
        std::iter::once(&self.primary_accession).chain(self.secondary_accessions.iter())
    }
}

struct EntryArray<'a, F> {
    callback: &'a mut F,
    failure: &'a mut Option<anyhow::Error>,
}

impl<'de, F> DeserializeSeed<'de> for EntryArray<'_, F>
    where F: FnMut(ProteinEntry) -> Result<()>
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
        where D: de::Deserializer<'de>
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for EntryArray<'_, F>
    where F: FnMut(ProteinEntry) -> Result<()>
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of UniProtKB entries")
    }

    fn visit_seq<S>(self, mut seq: S) -> Result<(), S::Error>
        where S: SeqAccess<'de>
    {
        let EntryArray { callback, failure } = self;

        while let Some(value) = seq.next_element::<JsonValue>()? {
            let result = ProteinEntry::from_json_value(value).and_then(&mut *callback);
            if let Err(err) = result {
                let message = format!("{:#}", err);
                *failure = Some(err);
                return Err(de::Error::custom(message));
            }
        }

        Ok(())
    }
}

struct ResultsObject<'a, F> {
    callback: &'a mut F,
    failure: &'a mut Option<anyhow::Error>,
}

impl<'de, F> Visitor<'de> for ResultsObject<'_, F>
    where F: FnMut(ProteinEntry) -> Result<()>
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object with a \"results\" array")
    }

    fn visit_map<M>(self, mut map: M) -> Result<(), M::Error>
        where M: MapAccess<'de>
    {
        let ResultsObject { callback, failure } = self;

        while let Some(key) = map.next_key::<String>()? {
            if key == "results" {
                map.next_value_seed(EntryArray {
                    callback: &mut *callback,
                    failure: &mut *failure,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(())
    }
}

// Read the "results" array of a UniProtKB JSON export one entry at a time,
// passing each entry to the callback.  Stops at the first error.
pub fn stream_entries<F>(path: &Path, mut callback: F) -> Result<()>
    where F: FnMut(ProteinEntry) -> Result<()>
{
    let reader = open_data_file(path)?;
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let mut failure = None;

    let result = de::Deserializer::deserialize_map(&mut deserializer, ResultsObject {
        callback: &mut callback,
        failure: &mut failure,
    });

    if let Some(err) = failure {
        return Err(err.context(format!("while reading {}", path.display())));
    }

    result.with_context(|| format!("failed to parse {}", path.display()))?;
    deserializer.end()
        .with_context(|| format!("trailing data in {}", path.display()))?;

    Ok(())
}

pub fn read_entries(path: &Path) -> Result<Vec<ProteinEntry>> {
    let mut entries = vec![];
    stream_entries(path, |entry| {
        entries.push(entry);
        Ok(())
    })?;
    Ok(entries)
}

// The isoform IDs of every entry that has an activity limited to a
// molecule, these are the IDs to submit to the UniParc ID mapping service
pub fn all_isoform_ids(path: &Path) -> Result<BTreeSet<IsoformId>> {
    let mut isoform_ids = BTreeSet::new();

    stream_entries(path, |entry| {
        let has_molecule_activity = entry.catalytic_activities.iter()
            .any(|activity| activity.molecule.is_some());

        if has_molecule_activity &&
            let Some(ref alternative_products) = entry.alternative_products {
            isoform_ids.extend(alternative_products.all_isoform_ids().cloned());
        }

        Ok(())
    })?;

    Ok(isoform_ids)
}

#[cfg(test)]
fn test_entry_json() -> JsonValue {
    serde_json::json!({
        "primaryAccession": "P00001",
        "secondaryAccessions": ["Q00001"],
        "uniProtkbId": "TEST_HUMAN",
        "proteinExistence": "1: Evidence at protein level",
        "entryAudit": { "lastSequenceUpdateDate": "2015-03-04" },
        "sequence": { "value": "MKTAYIAKQR" },
        "comments": [
            {
                "commentType": "CATALYTIC ACTIVITY",
                "reaction": {
                    "name": "A + H2O = B",
                    "ecNumber": "3.5.1.4",
                    "evidences": [{ "evidenceCode": "ECO:0000269", "source": "PubMed", "id": "1" }],
                    "reactionCrossReferences": [
                        { "database": "Rhea", "id": "RHEA:10000" },
                        { "database": "Rhea", "id": "RHEA-COMP:11111" },
                        { "database": "ChEBI", "id": "CHEBI:15377" }
                    ]
                },
                "physiologicalReactions": [
                    {
                        "directionType": "left-to-right",
                        "evidences": [{ "evidenceCode": "ECO:0000305" }],
                        "reactionCrossReferences": [{ "database": "Rhea", "id": "RHEA:10001" }]
                    }
                ]
            },
            {
                "commentType": "CATALYTIC ACTIVITY",
                "molecule": "Mature chain",
                "reaction": { "name": "C = D" }
            },
            {
                "commentType": "COFACTOR",
                "cofactors": [{
                    "name": "Zn(2+)",
                    "cofactorCrossReference": { "database": "ChEBI", "id": "CHEBI:29105" }
                }],
                "note": { "texts": [{ "value": "Binds 1 zinc ion." }] }
            },
            { "commentType": "FUNCTION", "texts": [] }
        ],
        "features": [
            {
                "type": "Chain",
                "location": { "start": { "value": 3, "modifier": "EXACT" },
                              "end": { "value": 8, "modifier": "EXACT" } },
                "description": "Mature chain"
            },
            {
                "type": "Binding site",
                "location": { "start": { "value": 4, "modifier": "EXACT" },
                              "end": { "value": 4, "modifier": "EXACT" } },
                "description": "",
                "evidences": [{ "evidenceCode": "ECO:0000269" }],
                "ligand": { "name": "Zn(2+)", "id": "ChEBI:CHEBI:29105" }
            },
            {
                "type": "Binding site",
                "location": { "start": { "value": 9, "modifier": "EXACT" },
                              "end": { "value": 10, "modifier": "EXACT" } },
                "description": "",
                "ligand": { "name": "substrate" }
            },
            {
                "type": "Active site",
                "location": { "start": { "value": 5, "modifier": "EXACT" },
                              "end": { "value": 5, "modifier": "EXACT" } },
                "description": "Nucleophile"
            }
        ]
    })
}

#[test]
fn test_parse_entry() {
    let entry = ProteinEntry::from_json_value(test_entry_json()).unwrap();

    assert_eq!(entry.primary_accession.as_str(), "P00001");
    assert_eq!(entry.uniprot_kb_id.as_str(), "TEST_HUMAN");
    assert_eq!(entry.catalytic_activities.len(), 2);
    assert_eq!(entry.binding_sites.len(), 2);
    assert_eq!(entry.active_sites.len(), 1);
    assert_eq!(entry.features.len(), 4);
    assert_eq!(entry.cofactor_data[0].note_texts()[0].value.as_str(), "Binds 1 zinc ion.");
    assert_eq!(entry.last_sequence_update_date, NaiveDate::from_ymd_opt(2015, 3, 4).unwrap());

    let activity = &entry.catalytic_activities[0];
    assert!(activity.reaction.has_exp_evidence());
    assert!(activity.reaction.has_rhea_reference());
    assert_eq!(activity.reaction.rhea_main_reference().unwrap().map(|id| id.as_str()),
               Some("10000"));
    assert!(!activity.physiological_reactions[0].has_exp_evidence());
    assert_eq!(activity.physiological_reactions[0].direction, ReactionDirection::LeftToRight);

    assert_eq!(entry.binding_sites[0].ligand.chebi_id.as_ref().map(|id| id.as_str()),
               Some("CHEBI:29105"));
    assert!(entry.binding_sites[1].ligand.chebi_id.is_none());
}

#[test]
fn test_ptm_sequence_and_chain_sites() {
    let entry = ProteinEntry::from_json_value(test_entry_json()).unwrap();
    let chain_activity = &entry.catalytic_activities[1];

    assert!(chain_activity.has_non_isoform_molecule());
    assert_eq!(entry.ptm_sequence(chain_activity).as_deref(), Some("TAYIAK"));
    assert_eq!(entry.ptm_sequence(&entry.catalytic_activities[0]), None);

    assert_eq!(entry.binding_sites_in_chain("Mature chain").len(), 1);
    assert_eq!(entry.active_sites_in_chain("Mature chain").len(), 1);
    assert!(entry.binding_sites_in_chain("Other chain").is_empty());
}

#[test]
fn test_inexact_ptm_location() {
    let mut json = test_entry_json();
    json["features"][0]["location"]["start"]["modifier"] = "UNSURE".into();
    let entry = ProteinEntry::from_json_value(json).unwrap();
    assert_eq!(entry.ptm_sequence(&entry.catalytic_activities[1]), None);
}

#[test]
fn test_ptm_location_past_sequence_end() {
    let mut json = test_entry_json();
    json["features"][0]["location"]["end"]["value"] = 25.into();
    let entry = ProteinEntry::from_json_value(json).unwrap();
    assert_eq!(entry.ptm_sequence(&entry.catalytic_activities[1]).as_deref(),
               Some("TAYIAKQR"));

    let mut json = test_entry_json();
    json["features"][0]["location"]["start"]["value"] = 12.into();
    json["features"][0]["location"]["end"]["value"] = 15.into();
    let entry = ProteinEntry::from_json_value(json).unwrap();
    assert_eq!(entry.ptm_sequence(&entry.catalytic_activities[1]), None);
}

#[test]
fn test_invalid_entries() {
    let mut json = test_entry_json();
    json["comments"][1]["molecule"] = "Unknown chain".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["comments"][1]["molecule"] = "Isoform 2".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["comments"][0]["reaction"]["reactionCrossReferences"][2]["database"] = "KEGG".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["comments"][0]["reaction"]["evidences"][0]["evidenceCode"] = "ECO:0000000".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["features"][1]["location"]["end"]["modifier"] = "SOMEWHERE".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["features"][2]["ligand"]["name"] = "ATP".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["features"][1]["unexpected"] = "value".into();
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    let phy = json["comments"][0]["physiologicalReactions"][0].clone();
    json["comments"][0]["physiologicalReactions"].as_array_mut().unwrap().push(phy);
    assert!(ProteinEntry::from_json_value(json).is_err());

    let mut json = test_entry_json();
    json["comments"] = serde_json::json!([]);
    assert!(ProteinEntry::from_json_value(json).is_err());
}

#[test]
fn test_location_notation() {
    let entry = ProteinEntry::from_json_value(test_entry_json()).unwrap();
    assert_eq!(entry.binding_sites[0].location.string_notation().as_str(), "4");
    assert_eq!(entry.binding_sites[1].location.string_notation().as_str(), "9-10");
}

#[test]
fn test_isoform_name() {
    let activity: CatalyticActivity = serde_json::from_value(serde_json::json!({
        "molecule": "Isoform 2",
        "reaction": { "name": "A = B" }
    })).unwrap();

    assert!(activity.has_isoform_molecule());
    assert!(!activity.has_non_isoform_molecule());
    assert_eq!(activity.isoform_molecule_name().as_deref(), Some("2"));
}
