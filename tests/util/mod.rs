use std::fs;
use std::path::{Path, PathBuf};

use enzrxn::config::BuildConfig;

#[allow(dead_code)]
pub fn data_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

// all the optional sources except MetaCyc
#[allow(dead_code)]
pub fn test_config(output_dir: &Path) -> BuildConfig {
    let mut config = BuildConfig::new(data_path("uniprot_entries.json"), data_path("rxn"),
                                      data_path("rhea-directions.tsv"), output_dir.to_owned());
    config.isoform_mapping_json = Some(data_path("isoform_uniparc_mapping.json"));
    config.mcsa_dir = Some(data_path("mcsa"));
    config
}

#[allow(dead_code)]
pub fn with_metacyc(mut config: BuildConfig) -> BuildConfig {
    config.rhea2metacyc_tsv = Some(data_path("rhea2metacyc.tsv"));
    config.metacyc_reactions_dat = Some(data_path("reactions.dat"));
    config
}

#[allow(dead_code)]
pub fn write_entries(dir: &Path, entries: &[serde_json::Value]) -> PathBuf {
    let path = dir.join("entries.json");
    let json = serde_json::json!({ "results": entries });
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    path
}

#[allow(dead_code)]
pub fn test_entry(accession: &str, comments: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "primaryAccession": accession,
        "uniProtkbId": format!("{}_TEST", accession),
        "proteinExistence": "1: Evidence at protein level",
        "entryAudit": { "lastSequenceUpdateDate": "2012-06-11" },
        "sequence": { "value": "MKTAYIAKQR" },
        "comments": comments,
        "features": []
    })
}

// header and records of a written CSV file
#[allow(dead_code)]
pub fn read_csv_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader.records()
        .map(|record| record.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}
