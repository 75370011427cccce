use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::chem::diagnostics::DiagnosticCategory;
use crate::constants::{DATASET_FILE_NAME, FULL_DATASET_FILE_NAME};

fn default_tolerated_diagnostics() -> Vec<DiagnosticCategory> {
    vec![DiagnosticCategory::AmbiguousStereochemistry,
         DiagnosticCategory::Tagged3DButFlat]
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BuildConfig {
    // UniProtKB JSON export ("results" array), optionally gzipped
    pub uniprot_json: PathBuf,
    // isoform to UniParc id-mapping results
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub isoform_mapping_json: Option<PathBuf>,
    // directory of <id>.rxn files
    pub rhea_rxn_dir: PathBuf,
    pub rhea_directions_tsv: PathBuf,
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub rhea2metacyc_tsv: Option<PathBuf>,
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub metacyc_reactions_dat: Option<PathBuf>,
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub mcsa_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub use_undefined_direction_rxn: bool,
    #[serde(default)]
    pub allow_non_exp_evidence: bool,
    #[serde(default="default_tolerated_diagnostics")]
    pub tolerated_diagnostics: Vec<DiagnosticCategory>,
}

impl BuildConfig {
    pub fn new(uniprot_json: PathBuf, rhea_rxn_dir: PathBuf,
               rhea_directions_tsv: PathBuf, output_dir: PathBuf)
        -> BuildConfig
    {
        BuildConfig {
            uniprot_json,
            isoform_mapping_json: None,
            rhea_rxn_dir,
            rhea_directions_tsv,
            rhea2metacyc_tsv: None,
            metacyc_reactions_dat: None,
            mcsa_dir: None,
            output_dir,
            use_undefined_direction_rxn: false,
            allow_non_exp_evidence: false,
            tolerated_diagnostics: default_tolerated_diagnostics(),
        }
    }

    pub fn read(config_file_name: &Path) -> Result<BuildConfig> {
        let file = File::open(config_file_name)
            .with_context(|| format!("failed to read {}", config_file_name.display()))?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader)
            .with_context(|| format!("failed to parse {}", config_file_name.display()))
    }

    // the pathway-derived directions need both the crossmap and the dump
    pub fn use_metacyc(&self) -> bool {
        self.rhea2metacyc_tsv.is_some() && self.metacyc_reactions_dat.is_some()
    }

    pub fn dataset_path(&self) -> PathBuf {
        let file_name =
            if self.allow_non_exp_evidence {
                FULL_DATASET_FILE_NAME
            } else {
                DATASET_FILE_NAME
            };
        self.output_dir.join(file_name)
    }

    pub fn skipped_activities_path(&self) -> PathBuf {
        self.sibling_path("skipped_activities")
    }

    pub fn skipped_directions_path(&self) -> PathBuf {
        self.sibling_path("skipped_directions")
    }

    fn sibling_path(&self, prefix: &str) -> PathBuf {
        let dataset_path = self.dataset_path();
        let stem = dataset_path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{}_{}.csv", prefix, stem))
    }
}

#[test]
fn test_output_file_names() {
    let mut config = BuildConfig::new("uniprot.json".into(), "rxn".into(),
                                      "rhea-directions.tsv".into(), "out".into());
    assert_eq!(config.dataset_path(), PathBuf::from("out/enzyme_reactions.csv"));
    assert_eq!(config.skipped_directions_path(),
               PathBuf::from("out/skipped_directions_enzyme_reactions.csv"));

    config.allow_non_exp_evidence = true;
    assert_eq!(config.skipped_activities_path(),
               PathBuf::from("out/skipped_activities_enzyme_reactions_full.csv"));
}

#[test]
fn test_config_defaults() {
    let config: BuildConfig = serde_json::from_str(r#"{
        "uniprot_json": "uniprot.json.gz",
        "rhea_rxn_dir": "rxn",
        "rhea_directions_tsv": "rhea-directions.tsv",
        "output_dir": "out"
    }"#).unwrap();

    assert!(!config.use_undefined_direction_rxn);
    assert!(!config.use_metacyc());
    assert_eq!(config.tolerated_diagnostics, default_tolerated_diagnostics());
}
