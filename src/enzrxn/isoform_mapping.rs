use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use flexstr::SharedStr as FlexStr;
use indexmap::IndexMap;
use tracing::warn;

use crate::constants::SWISS_PROT_ISOFORM_DATABASE;
use crate::types::{IsoformId, Sequence};
use crate::uniprot::{CatalyticActivity, ProteinEntry};
use crate::utils::{get_single, open_data_file};

#[derive(Debug, Deserialize)]
struct UniParcCrossReference {
    database: FlexStr,
    id: IsoformId,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct UniParcSequence {
    value: Sequence,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniParcEntry {
    sequence: UniParcSequence,
    #[serde(default)]
    uni_parc_cross_references: Vec<UniParcCrossReference>,
}

#[derive(Debug, Deserialize)]
struct MappingResult {
    from: IsoformId,
    to: UniParcEntry,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    results: Vec<MappingResult>,
}

// An isoform named by an activity, resolved to its active Swiss-Prot ID
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIsoform {
    pub isoform_id: IsoformId,
    pub sequence: Sequence,
}

// The results of a UniProtKB isoform ID to UniParc ID mapping job
#[derive(Debug)]
pub struct IsoformIdMapping {
    sequences: HashMap<IsoformId, Sequence>,
    active_ids: HashMap<IsoformId, IsoformId>,
}

// pick the active Swiss-Prot isoform cross-reference for an ID, preferring
// the reference whose ID is the query ID when there are several
fn find_active_id(result: &MappingResult) -> Result<Option<IsoformId>> {
    let mut candidates: Vec<&UniParcCrossReference> = result.to.uni_parc_cross_references.iter()
        .filter(|reference| reference.active &&
                reference.database.as_str() == SWISS_PROT_ISOFORM_DATABASE)
        .collect();

    if candidates.is_empty() {
        return Ok(None);
    }

    if candidates.len() > 1 {
        candidates.retain(|reference| reference.id == result.from);
    }

    let reference = get_single(candidates, "matching active isoform reference")
        .with_context(|| format!("can't choose an active isoform ID for {}", result.from))?;

    Ok(Some(reference.id.clone()))
}

impl IsoformIdMapping {
    pub fn read(path: &Path) -> Result<IsoformIdMapping> {
        let reader = open_data_file(path)?;
        IsoformIdMapping::from_reader(reader)
            .with_context(|| format!("failed to read isoform mapping from {}", path.display()))
    }

    pub fn from_reader(reader: impl Read) -> Result<IsoformIdMapping> {
        let mapping_file: MappingFile = serde_json::from_reader(reader)?;

        let mut sequences = HashMap::new();
        let mut active_ids = HashMap::new();

        for result in &mapping_file.results {
            if sequences.contains_key(&result.from) {
                bail!("isoform ID {} is mapped more than once", result.from);
            }

            sequences.insert(result.from.clone(), result.to.sequence.value.clone());

            if let Some(active_id) = find_active_id(result)? {
                active_ids.insert(result.from.clone(), active_id);
            }
        }

        Ok(IsoformIdMapping {
            sequences,
            active_ids,
        })
    }

    pub fn map_isoform_to_sequence(&self, isoform_id: &str) -> Option<&Sequence> {
        self.sequences.get(isoform_id)
    }

    pub fn map_isoform_to_active_id(&self, isoform_id: &str) -> Option<&IsoformId> {
        self.active_ids.get(isoform_id)
    }

    // IDs without an active ID are left out of the result
    pub fn bulk_map_isoform_to_active_id(&self, isoform_ids: &[IsoformId])
        -> IndexMap<IsoformId, IsoformId>
    {
        isoform_ids.iter()
            .filter_map(|isoform_id| {
                self.map_isoform_to_active_id(isoform_id)
                    .map(|active_id| (isoform_id.clone(), active_id.clone()))
            })
            .collect()
    }

    // Resolve the isoform named by the activity ("Isoform 2") to an active
    // isoform ID and its sequence.  Returns None, with a warning, if the
    // mapping has nothing usable for the isoform.
    pub fn resolve_isoform(&self, entry: &ProteinEntry, activity: &CatalyticActivity)
        -> Result<Option<ResolvedIsoform>>
    {
        let Some(isoform_name) = activity.isoform_molecule_name()
        else {
            return Ok(None);
        };

        let Some(ref alternative_products) = entry.alternative_products
        else {
            bail!("{}: activity on isoform {} but no alternative products",
                  entry.primary_accession, isoform_name);
        };

        let Some(isoform_ids) = alternative_products.isoform_ids_by_name(&isoform_name)
            .with_context(|| format!("failed to find isoform {} of {}", isoform_name,
                                     entry.primary_accession))?
        else {
            warn!("{}: no isoform named \"{}\"", entry.primary_accession, isoform_name);
            return Ok(None);
        };

        let active_ids: BTreeSet<IsoformId> =
            self.bulk_map_isoform_to_active_id(isoform_ids).into_values().collect();

        if active_ids.len() > 1 {
            bail!("{}: isoform IDs {:?} map to several active IDs: {:?}",
                  entry.primary_accession, isoform_ids, active_ids);
        }

        let Some(active_id) = active_ids.into_iter().next()
        else {
            warn!("{}: no active ID for isoform IDs {:?}, the isoform mapping may be \
                   from a different UniProtKB release", entry.primary_accession, isoform_ids);
            return Ok(None);
        };

        if !isoform_ids.contains(&active_id) {
            warn!("{}: active ID {} is not one of the isoform IDs {:?}",
                  entry.primary_accession, active_id, isoform_ids);
        }

        let Some(sequence) = self.map_isoform_to_sequence(&active_id)
        else {
            warn!("{}: no sequence for isoform {}", entry.primary_accession, active_id);
            return Ok(None);
        };

        if alternative_products.isoforms.len() == 1 && *sequence != entry.sequence {
            warn!("{}: the only isoform, {}, has a sequence that differs from the entry",
                  entry.primary_accession, active_id);
            return Ok(None);
        }

        Ok(Some(ResolvedIsoform {
            isoform_id: active_id,
            sequence: sequence.clone(),
        }))
    }
}

#[cfg(test)]
const TEST_MAPPING: &str = r#"{
  "results": [
    {
      "from": "P00003-2",
      "to": {
        "sequence": { "value": "MKKLLV" },
        "uniParcCrossReferences": [
          { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P00003-2", "active": true },
          { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "Q00003-4", "active": true },
          { "database": "UniProtKB/TrEMBL", "id": "A0A000", "active": true }
        ]
      }
    },
    {
      "from": "P00004-1",
      "to": {
        "sequence": { "value": "MAAAA" },
        "uniParcCrossReferences": [
          { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P00004-3", "active": true },
          { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P00004-1", "active": false }
        ]
      }
    },
    {
      "from": "P00005-2",
      "to": {
        "sequence": { "value": "MCCCC" },
        "uniParcCrossReferences": [
          { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P00005-2", "active": false }
        ]
      }
    }
  ]
}"#;

#[test]
fn test_active_ids() {
    let mapping = IsoformIdMapping::from_reader(TEST_MAPPING.as_bytes()).unwrap();

    assert_eq!(mapping.map_isoform_to_active_id("P00003-2").map(|id| id.as_str()),
               Some("P00003-2"));
    assert_eq!(mapping.map_isoform_to_active_id("P00004-1").map(|id| id.as_str()),
               Some("P00004-3"));
    assert_eq!(mapping.map_isoform_to_active_id("P00005-2"), None);
    assert_eq!(mapping.map_isoform_to_sequence("P00005-2").map(|seq| seq.as_str()),
               Some("MCCCC"));

    let ids: Vec<IsoformId> = vec!["P00004-1".into(), "P00005-2".into(), "P00009-1".into()];
    let bulk = mapping.bulk_map_isoform_to_active_id(&ids);
    assert_eq!(bulk.len(), 1);
    assert_eq!(bulk.get("P00004-1").map(|id| id.as_str()), Some("P00004-3"));

    // the same batch always gives the same answer
    assert_eq!(mapping.bulk_map_isoform_to_active_id(&ids), bulk);
}

#[test]
fn test_duplicate_from() {
    let json = r#"{"results": [
      {"from": "P1-1", "to": {"sequence": {"value": "M"}, "uniParcCrossReferences": []}},
      {"from": "P1-1", "to": {"sequence": {"value": "M"}, "uniParcCrossReferences": []}}
    ]}"#;
    assert!(IsoformIdMapping::from_reader(json.as_bytes()).is_err());
}

#[test]
fn test_ambiguous_active_ids() {
    let json = r#"{"results": [
      {"from": "P1-1", "to": {"sequence": {"value": "M"}, "uniParcCrossReferences": [
        { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P1-2", "active": true },
        { "database": "UniProtKB/Swiss-Prot protein isoforms", "id": "P1-3", "active": true }
      ]}}
    ]}"#;
    let err = IsoformIdMapping::from_reader(json.as_bytes()).unwrap_err();
    assert!(format!("{:#}", err).contains("can't choose an active isoform ID for P1-1"));
    assert!(format!("{:#}", err).contains("found 0"));
}
