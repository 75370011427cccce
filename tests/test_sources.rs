extern crate enzrxn;

mod util;

use std::fs;

use enzrxn::chem::diagnostics::DiagnosticCategory;
use enzrxn::direction::MetaCycDirection;
use enzrxn::isoform_mapping::IsoformIdMapping;
use enzrxn::metacyc::MetaCycDirectionMapper;
use enzrxn::rhea::{RheaSource, check_all_reactions};
use enzrxn::uniprot::{all_isoform_ids, read_entries, stream_entries};

use util::{data_path, test_entry, write_entries};

#[test]
fn test_read_fixture_entries() {
    let entries = read_entries(&data_path("uniprot_entries.json")).unwrap();

    let accessions: Vec<&str> =
        entries.iter().map(|entry| entry.primary_accession.as_str()).collect();
    assert_eq!(accessions, vec!["P10001", "P10002", "P10003", "P10004", "P10005",
                                "P10006", "P10007"]);

    let first = &entries[0];
    assert_eq!(first.catalytic_activities.len(), 2);
    assert_eq!(first.binding_sites.len(), 3);
    assert_eq!(first.active_sites.len(), 1);
    assert_eq!(first.cofactor_data[0].cofactors[0].name.as_str(), "Mg(2+)");

    let isoforms = entries[2].alternative_products.as_ref().unwrap();
    let ids: Vec<&str> = isoforms.isoform_ids_by_name("2").unwrap().unwrap().iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(ids, vec!["P10003-2"]);
}

#[test]
fn test_gzipped_entries() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entries.json.gz");
    let text = fs::read(data_path("uniprot_entries.json")).unwrap();

    let mut encoder = flate2::write::GzEncoder::new(fs::File::create(&path).unwrap(),
                                                    flate2::Compression::default());
    encoder.write_all(&text).unwrap();
    encoder.finish().unwrap();

    assert_eq!(read_entries(&path).unwrap().len(), 7);
}

#[test]
fn test_stream_stops_at_callback_error() {
    let mut seen = vec![];
    let result = stream_entries(&data_path("uniprot_entries.json"), |entry| {
        seen.push(entry.primary_accession.clone());
        if seen.len() == 2 {
            anyhow::bail!("stop at {}", entry.primary_accession);
        }
        Ok(())
    });

    assert_eq!(seen.len(), 2);
    assert!(format!("{:#}", result.unwrap_err()).contains("stop at P10002"));
}

#[test]
fn test_invalid_entry_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_entries(dir.path(), &[test_entry("P30001", serde_json::json!([]))]);

    let err = read_entries(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("P30001"));
}

#[test]
fn test_isoform_ids() {
    let isoform_ids = all_isoform_ids(&data_path("uniprot_entries.json")).unwrap();
    let isoform_ids: Vec<&str> = isoform_ids.iter().map(|id| id.as_str()).collect();
    assert_eq!(isoform_ids, vec!["P10003-1", "P10003-2"]);
}

#[test]
fn test_isoform_mapping_file() {
    let mapping = IsoformIdMapping::read(&data_path("isoform_uniparc_mapping.json")).unwrap();

    assert_eq!(mapping.map_isoform_to_active_id("P10003-2").map(|id| id.as_str()),
               Some("P10003-2"));
    assert_eq!(mapping.map_isoform_to_sequence("P10003-1").map(|seq| seq.as_str()),
               Some("MKVLAAGIVGLLLAQQ"));

    let entries = read_entries(&data_path("uniprot_entries.json")).unwrap();
    let entry = &entries[2];
    let resolved = mapping.resolve_isoform(entry, &entry.catalytic_activities[0])
        .unwrap().unwrap();
    assert_eq!(resolved.isoform_id.as_str(), "P10003-2");
    assert_eq!(resolved.sequence.as_str(), "MKVLAAGQQ");
}

#[test]
fn test_metacyc_file() {
    let mapper = MetaCycDirectionMapper::read(&data_path("reactions.dat")).unwrap();

    assert_eq!(mapper.len(), 1);
    assert_eq!(mapper.metacyc_id_to_direction("RXN-100").unwrap(),
               Some(MetaCycDirection::PhysiolLeftToRight));
    // no REACTION-DIRECTION
    assert_eq!(mapper.metacyc_id_to_direction("RXN-200").unwrap(), None);
}

#[test]
fn test_rhea_tables() {
    let rhea = RheaSource::read(&data_path("rxn"), &data_path("rhea-directions.tsv"),
                                Some(data_path("rhea2metacyc.tsv").as_path()), &[]).unwrap();

    assert!(rhea.is_master_id("40000"));
    assert!(!rhea.is_master_id("40001"));

    let pathway_ids: Vec<String> = rhea.map_master_id_to_pathway_ids("40000").iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(pathway_ids, vec!["RXN-100"]);
    assert!(rhea.map_master_id_to_pathway_ids("30000").is_empty());
    // a directional ID, not a master
    assert!(rhea.map_master_id_to_pathway_ids("40001").is_empty());
    assert!(rhea.map_master_id_to_pathway_ids("99999").is_empty());
}

#[test]
fn test_gzipped_rhea_tables() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rhea-directions.tsv.gz");
    let text = fs::read(data_path("rhea-directions.tsv")).unwrap();

    let mut encoder = flate2::write::GzEncoder::new(fs::File::create(&path).unwrap(),
                                                    flate2::Compression::default());
    encoder.write_all(&text).unwrap();
    encoder.finish().unwrap();

    let rhea = RheaSource::read(&data_path("rxn"), &path, None, &[]).unwrap();
    assert!(rhea.is_master_id("40000"));
    assert!(rhea.map_master_id_to_pathway_ids("40000").is_empty());
}

#[test]
fn test_check_all_reactions() {
    let failures = check_all_reactions(&data_path("rxn"),
                                       &[DiagnosticCategory::AmbiguousStereochemistry])
        .unwrap();
    assert!(failures.is_empty());

    let dir = tempfile::tempdir().unwrap();
    fs::copy(data_path("rxn/10001.rxn"), dir.path().join("10001.rxn")).unwrap();
    fs::write(dir.path().join("10009.rxn"), "$RXN V3000\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "not a reaction").unwrap();

    let failures = check_all_reactions(dir.path(), &[]).unwrap();
    let ids: Vec<&str> = failures.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["10009"]);
}
