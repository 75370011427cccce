use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::BuildConfig;
use crate::dataset::Dataset;

pub const DATASET_COLUMNS: [&str; 18] = [
    "data_id", "primary_accession", "isoform_id", "ptm_key", "sequence", "ec_number",
    "has_physiological_rxn", "physiological_rxn_has_exp_evidence", "rxn_has_exp_evidence",
    "rhea_master_id", "rhea_id", "rxn", "binding_site_all", "binding_site_exp",
    "mcsa_residues", "direction_source", "rxn_evidence", "phy_rxn_evidence",
];

pub const SKIPPED_ACTIVITY_COLUMNS: [&str; 3] = ["accession", "reaction", "reason"];

pub const SKIPPED_DIRECTION_COLUMNS: [&str; 5] =
    ["accession", "reaction", "rhea_id", "direction", "reason"];

// The header is written even when there are no records
pub fn write_records<T, W>(out: W, header: &[&str], records: &[T]) -> Result<()>
    where T: Serialize,
          W: Write
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);

    writer.write_record(header)?;

    for record in records {
        writer.serialize(record)?;
    }

    writer.flush()?;

    Ok(())
}

fn write_file<T: Serialize>(path: &Path, header: &[&str], records: &[T]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);

    write_records(writer, header, records)
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("wrote {} records to {}", records.len(), path.display());

    Ok(())
}

// Write the dataset and the two tables of skipped activities and directions
pub fn write_dataset(dataset: &Dataset, config: &BuildConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    write_file(&config.dataset_path(), &DATASET_COLUMNS, &dataset.rows)?;
    write_file(&config.skipped_activities_path(), &SKIPPED_ACTIVITY_COLUMNS,
               &dataset.skipped_activities)?;
    write_file(&config.skipped_directions_path(), &SKIPPED_DIRECTION_COLUMNS,
               &dataset.skipped_directions)?;

    Ok(())
}

#[test]
fn test_write_records() {
    use crate::dataset::{ActivityDiscardReason, SkippedActivity};

    let skipped = vec![
        SkippedActivity {
            accession: "P00005".into(),
            reaction: "A + B = C, D".into(),
            reason: ActivityDiscardReason::NoExpEvidence,
        },
    ];

    let mut out = vec![];
    write_records(&mut out, &SKIPPED_ACTIVITY_COLUMNS, &skipped).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(),
               "accession,reaction,reason\nP00005,\"A + B = C, D\",No experimental evidence\n");

    let mut out = vec![];
    write_records::<SkippedActivity, _>(&mut out, &SKIPPED_ACTIVITY_COLUMNS, &[]).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "accession,reaction,reason\n");
}

#[test]
fn test_write_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("out");
    let config = BuildConfig::new("uniprot.json".into(), "rxn".into(),
                                  "rhea-directions.tsv".into(), output_dir.clone());

    write_dataset(&Dataset::default(), &config).unwrap();

    let dataset_text = fs::read_to_string(output_dir.join("enzyme_reactions.csv")).unwrap();
    assert_eq!(dataset_text.trim_end(), DATASET_COLUMNS.join(","));
    assert!(output_dir.join("skipped_activities_enzyme_reactions.csv").exists());
    assert!(output_dir.join("skipped_directions_enzyme_reactions.csv").exists());
}
