pub const CATALYTIC_ACTIVITY_COMMENT: &str = "CATALYTIC ACTIVITY";
pub const COFACTOR_COMMENT: &str = "COFACTOR";
pub const ALTERNATIVE_PRODUCTS_COMMENT: &str = "ALTERNATIVE PRODUCTS";

pub const BINDING_SITE_FEATURE: &str = "Binding site";
pub const ACTIVE_SITE_FEATURE: &str = "Active site";
pub const SITE_FEATURE: &str = "Site";
pub const CHAIN_FEATURE: &str = "Chain";

pub const RHEA_DATABASE: &str = "Rhea";
pub const CHEBI_DATABASE: &str = "ChEBI";

pub const SWISS_PROT_ISOFORM_DATABASE: &str = "UniProtKB/Swiss-Prot protein isoforms";

// M-CSA snapshots lag behind UniProt, entries updated in or after this year
// may no longer match the residue numbering
pub const MCSA_STALE_SEQUENCE_YEAR: i32 = 2018;

pub const NO_ISOFORM_PLACEHOLDER: &str = "#";

pub const DATASET_FILE_NAME: &str = "enzyme_reactions.csv";
pub const FULL_DATASET_FILE_NAME: &str = "enzyme_reactions_full.csv";

pub const PROGRESS_LOG_INTERVAL: usize = 10_000;
