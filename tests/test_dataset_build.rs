extern crate enzrxn;

mod util;

use std::collections::BTreeSet;

use serde_json::json;

use enzrxn::config::BuildConfig;
use enzrxn::dataset::{ActivityDiscardReason, Dataset, DatasetRow, DirectionDiscardReason,
                      DirectionSource, build_dataset};
use enzrxn::dataset_writer::{DATASET_COLUMNS, write_dataset};

use util::{data_path, read_csv_rows, test_config, test_entry, with_metacyc, write_entries};

fn exp_evidence() -> serde_json::Value {
    json!([{ "evidenceCode": "ECO:0000269", "source": "PubMed", "id": "100" }])
}

fn activity(name: &str, master_id: &str, phys: serde_json::Value,
            reaction_evidences: serde_json::Value) -> serde_json::Value {
    json!({
        "commentType": "CATALYTIC ACTIVITY",
        "reaction": {
            "name": name,
            "evidences": reaction_evidences,
            "reactionCrossReferences": [{ "database": "Rhea", "id": format!("RHEA:{}", master_id) }]
        },
        "physiologicalReactions": phys
    })
}

fn phy(direction: &str, rhea_id: &str, evidences: serde_json::Value) -> serde_json::Value {
    json!({
        "directionType": direction,
        "evidences": evidences,
        "reactionCrossReferences": [{ "database": "Rhea", "id": format!("RHEA:{}", rhea_id) }]
    })
}

fn build_from_entries(entries: &[serde_json::Value], adjust: impl FnOnce(&mut BuildConfig))
    -> Dataset
{
    let dir = tempfile::tempdir().unwrap();
    let mut config = BuildConfig::new(write_entries(dir.path(), entries), data_path("rxn"),
                                      data_path("rhea-directions.tsv"), dir.path().join("out"));
    adjust(&mut config);
    build_dataset(&config).unwrap()
}

fn data_ids(dataset: &Dataset) -> Vec<&str> {
    dataset.rows.iter().map(|row| row.data_id.as_str()).collect()
}

fn find_row<'a>(dataset: &'a Dataset, data_id: &str) -> &'a DatasetRow {
    dataset.rows.iter()
        .find(|row| row.data_id.as_str() == data_id)
        .unwrap_or_else(|| panic!("no row {}", data_id))
}

#[test]
fn test_two_activities_with_physiological_reactions() {
    let entry = test_entry("P20001", json!([
        activity("A = B", "10000", json!([phy("left-to-right", "10001", exp_evidence())]),
                 json!([])),
        activity("C = D", "20000", json!([phy("left-to-right", "20001", exp_evidence())]),
                 json!([])),
    ]));

    let dataset = build_from_entries(&[entry], |_| ());

    assert_eq!(data_ids(&dataset), vec!["P20001_#_10000_l2r", "P20001_#_20000_l2r"]);
    assert!(dataset.skipped_activities.is_empty());
    assert!(dataset.skipped_directions.is_empty());

    let row = &dataset.rows[0];
    assert_eq!(row.rhea_id.as_str(), "10001");
    assert_eq!(row.rxn.as_str(), "O>>CC([O-])=O");
    assert!(row.has_physiological_rxn);
    assert_eq!(row.physiological_rxn_has_exp_evidence, Some(true));
    assert!(!row.rxn_has_exp_evidence);
    assert_eq!(row.direction_source, DirectionSource::UniProt);
    assert_eq!(row.rxn_evidence, None);
    assert_eq!(row.phy_rxn_evidence.as_deref(), Some("ECO:0000269"));
    assert_eq!(row.mcsa_residues, None);
}

#[test]
fn test_both_physiological_directions() {
    let entry = test_entry("P20002", json!([
        activity("A = B", "10000",
                 json!([phy("left-to-right", "10001", exp_evidence()),
                        phy("right-to-left", "10002", exp_evidence())]),
                 json!([])),
    ]));

    let dataset = build_from_entries(&[entry], |_| ());

    assert_eq!(data_ids(&dataset), vec!["P20002_#_10000_l2r", "P20002_#_10000_r2l"]);

    let masters: BTreeSet<&str> =
        dataset.rows.iter().map(|row| row.rhea_master_id.as_str()).collect();
    assert_eq!(masters, BTreeSet::from(["10000"]));

    assert_eq!(dataset.rows[0].rhea_id.as_str(), "10001");
    assert_eq!(dataset.rows[1].rhea_id.as_str(), "10002");
    assert_eq!(dataset.rows[1].rxn.as_str(), "CC([O-])=O>>O");
}

#[test]
fn test_no_experimental_evidence() {
    let entry = test_entry("P20003", json!([
        activity("A = B", "10000", json!([]),
                 json!([{ "evidenceCode": "ECO:0000305" }])),
    ]));

    let dataset = build_from_entries(&[entry.clone()], |_| ());

    assert!(dataset.rows.is_empty());
    assert_eq!(dataset.skipped_activities.len(), 1);
    assert_eq!(dataset.skipped_activities[0].accession.as_str(), "P20003");
    assert_eq!(dataset.skipped_activities[0].reason, ActivityDiscardReason::NoExpEvidence);

    // allowed, but there is still no direction for the reaction
    let dataset = build_from_entries(&[entry.clone()], |config| {
        config.allow_non_exp_evidence = true;
    });
    assert!(dataset.rows.is_empty());
    assert_eq!(dataset.skipped_activities[0].reason, ActivityDiscardReason::NoDirection);

    let dataset = build_from_entries(&[entry], |config| {
        config.allow_non_exp_evidence = true;
        config.use_undefined_direction_rxn = true;
    });
    assert_eq!(data_ids(&dataset), vec!["P20003_#_10000_l2r"]);
    assert_eq!(dataset.rows[0].direction_source, DirectionSource::ForcedLeftToRight);
    assert!(!dataset.rows[0].has_physiological_rxn);
    assert_eq!(dataset.rows[0].physiological_rxn_has_exp_evidence, None);
}

#[test]
fn test_non_exp_physiological_reaction() {
    // the reaction evidence is enough to verify the physiological reaction
    let entry = test_entry("P20004", json!([
        activity("A = B", "20000",
                 json!([phy("right-to-left", "20002", json!([{ "evidenceCode": "ECO:0000250" }]))]),
                 exp_evidence()),
    ]));

    let dataset = build_from_entries(&[entry], |_| ());

    assert_eq!(data_ids(&dataset), vec!["P20004_#_20000_r2l"]);
    let row = &dataset.rows[0];
    assert_eq!(row.physiological_rxn_has_exp_evidence, Some(false));
    assert!(row.rxn_has_exp_evidence);
    assert_eq!(row.rxn_evidence.as_deref(), Some("ECO:0000269"));
    assert_eq!(row.phy_rxn_evidence.as_deref(), Some("ECO:0000250"));
}

#[test]
fn test_missing_reaction_file() {
    let entry = test_entry("P20005", json!([
        activity("A = B", "50000",
                 json!([phy("left-to-right", "50001", exp_evidence()),
                        phy("right-to-left", "50002", exp_evidence())]),
                 json!([])),
    ]));

    let dataset = build_from_entries(&[entry], |_| ());

    assert_eq!(data_ids(&dataset), vec!["P20005_#_50000_l2r"]);
    assert_eq!(dataset.skipped_directions.len(), 1);

    let skipped = &dataset.skipped_directions[0];
    assert_eq!(skipped.rhea_id.as_str(), "50002");
    assert_eq!(skipped.direction.as_str(), "r2l");
    assert_eq!(skipped.reason, DirectionDiscardReason::ReactionMappingFailed);
}

#[test]
fn test_unknown_master_id_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let entry = test_entry("P20006", json!([
        activity("A = B", "10001", json!([phy("left-to-right", "10001", exp_evidence())]),
                 json!([])),
    ]));
    let config = BuildConfig::new(write_entries(dir.path(), &[entry]), data_path("rxn"),
                                  data_path("rhea-directions.tsv"), dir.path().join("out"));

    assert!(build_dataset(&config).is_err());
}

#[test]
fn test_duplicate_rows_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let reaction = activity("A = B", "10000",
                            json!([phy("left-to-right", "10001", exp_evidence())]), json!([]));
    let entry = test_entry("P20007", json!([reaction.clone(), reaction]));
    let config = BuildConfig::new(write_entries(dir.path(), &[entry]), data_path("rxn"),
                                  data_path("rhea-directions.tsv"), dir.path().join("out"));

    assert!(build_dataset(&config).is_err());
}

fn chain(description: &str, start: usize, end: usize) -> serde_json::Value {
    json!({
        "type": "Chain",
        "location": { "start": { "value": start, "modifier": "EXACT" },
                      "end": { "value": end, "modifier": "EXACT" } },
        "description": description
    })
}

#[test]
fn test_chains_sharing_a_reaction() {
    let mut chain_a = activity("A = B", "10000",
                               json!([phy("left-to-right", "10001", exp_evidence())]), json!([]));
    chain_a["molecule"] = "Chain A".into();
    let mut chain_b = chain_a.clone();
    chain_b["molecule"] = "Chain B".into();

    let mut entry = test_entry("P20008", json!([chain_a, chain_b]));
    entry["features"] = json!([chain("Chain A", 1, 5), chain("Chain B", 6, 10)]);

    let dataset = build_from_entries(&[entry], |_| ());

    assert_eq!(data_ids(&dataset), vec!["P20008_#_10000_l2r"]);
    let row = &dataset.rows[0];
    assert_eq!(row.ptm_key.as_deref(), Some("Chain A"));
    assert_eq!(row.sequence.as_str(), "MKTAY");

    assert_eq!(dataset.skipped_directions.len(), 1);
    let skipped = &dataset.skipped_directions[0];
    assert_eq!(skipped.accession.as_str(), "P20008");
    assert_eq!(skipped.rhea_id.as_str(), "10001");
    assert_eq!(skipped.reason, DirectionDiscardReason::DuplicateDataId);
}

#[test]
fn test_fixture_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = build_dataset(&test_config(dir.path())).unwrap();

    assert_eq!(data_ids(&dataset),
               vec!["P10001_#_10000_l2r", "P10001_#_20000_l2r",
                    "P10002_#_10000_l2r", "P10002_#_10000_r2l",
                    "P10003_P10003-2_30000_l2r", "P10004_#_20000_r2l"]);

    let reasons: Vec<(&str, ActivityDiscardReason)> = dataset.skipped_activities.iter()
        .map(|skipped| (skipped.accession.as_str(), skipped.reason))
        .collect();
    assert_eq!(reasons, vec![("P10005", ActivityDiscardReason::NoExpEvidence),
                             ("P10006", ActivityDiscardReason::NoDirection)]);

    assert_eq!(dataset.skipped_directions.len(), 1);
    assert_eq!(dataset.skipped_directions[0].accession.as_str(), "P10007");

    let row = find_row(&dataset, "P10001_#_10000_l2r");
    assert_eq!(row.ec_number.as_deref(), Some("3.1.1.1"));
    assert_eq!(row.binding_site_all.as_str(), "12-14|5");
    assert_eq!(row.binding_site_exp.as_str(), "5");
    assert_eq!(row.mcsa_residues.as_deref(), Some("2|5|8"));

    // the M-CSA residues don't match the current sequence
    let row = find_row(&dataset, "P10002_#_10000_r2l");
    assert_eq!(row.binding_site_all.as_str(), "3");
    assert_eq!(row.binding_site_exp.as_str(), "");
    assert_eq!(row.mcsa_residues.as_deref(), Some(""));

    let row = find_row(&dataset, "P10003_P10003-2_30000_l2r");
    assert_eq!(row.isoform_id.as_deref(), Some("P10003-2"));
    assert_eq!(row.sequence.as_str(), "MKVLAAGQQ");
    assert_eq!(row.ptm_key, None);

    let row = find_row(&dataset, "P10004_#_20000_r2l");
    assert_eq!(row.ptm_key.as_deref(), Some("Mature enzyme"));
    assert_eq!(row.sequence.as_str(), "AGKLL");
    assert_eq!(row.binding_site_exp.as_str(), "4");
}

#[test]
fn test_fixture_dataset_with_metacyc() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = build_dataset(&with_metacyc(test_config(dir.path()))).unwrap();

    assert_eq!(dataset.rows.len(), 7);

    let row = find_row(&dataset, "P10006_#_40000_l2r");
    assert_eq!(row.direction_source, DirectionSource::MetaCyc);
    assert_eq!(row.rhea_id.as_str(), "40001");
    assert!(!row.has_physiological_rxn);

    assert_eq!(dataset.skipped_activities.len(), 1);
    assert_eq!(dataset.skipped_activities[0].reason, ActivityDiscardReason::NoExpEvidence);
}

#[test]
fn test_isoform_without_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.isoform_mapping_json = None;

    let dataset = build_dataset(&config).unwrap();

    assert_eq!(dataset.rows.len(), 5);
    assert!(dataset.skipped_activities.iter()
            .any(|skipped| skipped.accession.as_str() == "P10003" &&
                 skipped.reason == ActivityDiscardReason::UnresolvedIsoform));
}

#[test]
fn test_write_fixture_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("out"));
    let dataset = build_dataset(&config).unwrap();
    write_dataset(&dataset, &config).unwrap();

    let (header, rows) = read_csv_rows(&config.dataset_path());
    assert_eq!(header, DATASET_COLUMNS.to_vec());
    assert_eq!(rows.len(), 6);

    let first = &rows[0];
    assert_eq!(first[0], "P10001_#_10000_l2r");
    assert_eq!(first[2], "");
    assert_eq!(first[6], "true");
    assert_eq!(first[15], "UniProt_Physiological_Reaction");

    let (header, rows) = read_csv_rows(&config.skipped_activities_path());
    assert_eq!(header, vec!["accession", "reaction", "reason"]);
    assert_eq!(rows[0][2], "No experimental evidence");
    assert_eq!(rows[1][2], "Direction could not be defined");

    let (_, rows) = read_csv_rows(&config.skipped_directions_path());
    assert_eq!(rows, vec![vec!["P10007".to_owned(), "unavailable reaction".to_owned(),
                               "50002".to_owned(), "r2l".to_owned(),
                               "Failed to map rhea id to reaction".to_owned()]]);
}
