use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use anyhow::{Result, anyhow};

// Evidence and Conclusion Ontology codes used by UniProtKB
// see: https://www.uniprot.org/help/evidences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum EcoCode {
    // manual assertions only
    Experimental,
    NonTraceableAuthorStatement,
    CuratorInference,
    SequenceSimilarity,

    // manual and automatic assertions
    SequenceModelManual,
    SequenceModelAuto,
    SequenceModelAuto2,
    ImportedInfoManual,
    ImportedInfoAuto,
    CombinatorialManual,
    CombinatorialAuto,
    DeepLearningAuto,

    // GO annotation codes, ECO:0000269 doubles as GO EXP
    GoIda,
    GoIpi,
    GoImp,
    GoIgi,
    GoIep,
    GoHtp,
    GoHda,
    GoHmp,
    GoHgi,
    GoHep,
    GoIba,
    GoIbd,
    GoIkr,
    GoIrd,
}

const ECO_CODES: [(EcoCode, &str); 26] = [
    (EcoCode::Experimental, "ECO:0000269"),
    (EcoCode::NonTraceableAuthorStatement, "ECO:0000303"),
    (EcoCode::CuratorInference, "ECO:0000305"),
    (EcoCode::SequenceSimilarity, "ECO:0000250"),
    (EcoCode::SequenceModelManual, "ECO:0000255"),
    (EcoCode::SequenceModelAuto, "ECO:0000256"),
    (EcoCode::SequenceModelAuto2, "ECO:0000259"),
    (EcoCode::ImportedInfoManual, "ECO:0000312"),
    (EcoCode::ImportedInfoAuto, "ECO:0000313"),
    (EcoCode::CombinatorialManual, "ECO:0007744"),
    (EcoCode::CombinatorialAuto, "ECO:0007829"),
    (EcoCode::DeepLearningAuto, "ECO:0008006"),
    (EcoCode::GoIda, "ECO:0000314"),
    (EcoCode::GoIpi, "ECO:0000353"),
    (EcoCode::GoImp, "ECO:0000315"),
    (EcoCode::GoIgi, "ECO:0000316"),
    (EcoCode::GoIep, "ECO:0000270"),
    (EcoCode::GoHtp, "ECO:0006056"),
    (EcoCode::GoHda, "ECO:0007005"),
    (EcoCode::GoHmp, "ECO:0007001"),
    (EcoCode::GoHgi, "ECO:0007003"),
    (EcoCode::GoHep, "ECO:0007007"),
    (EcoCode::GoIba, "ECO:0000318"),
    (EcoCode::GoIbd, "ECO:0000319"),
    (EcoCode::GoIkr, "ECO:0000320"),
    (EcoCode::GoIrd, "ECO:0000321"),
];

lazy_static! {
    static ref CODE_LOOKUP: HashMap<&'static str, EcoCode> =
        ECO_CODES.iter().map(|(eco, code)| (*code, *eco)).collect();
}

impl EcoCode {
    pub fn from_code(code: &str) -> Result<EcoCode> {
        CODE_LOOKUP.get(code).copied()
            .ok_or_else(|| anyhow!("unknown evidence code: {}", code))
    }

    pub fn code(&self) -> &'static str {
        ECO_CODES.iter()
            .find(|(eco, _)| eco == self)
            .map(|(_, code)| *code)
            .unwrap_or_default()
    }

    pub fn is_experimental(&self) -> bool {
        *self == EcoCode::Experimental
    }
}

impl TryFrom<String> for EcoCode {
    type Error = anyhow::Error;

    fn try_from(code: String) -> Result<EcoCode> {
        EcoCode::from_code(&code)
    }
}

impl Display for EcoCode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[test]
fn test_eco_lookup() {
    assert_eq!(EcoCode::from_code("ECO:0000269").unwrap(), EcoCode::Experimental);
    assert!(EcoCode::from_code("ECO:0000269").unwrap().is_experimental());
    assert!(!EcoCode::from_code("ECO:0000314").unwrap().is_experimental());
    assert!(EcoCode::from_code("ECO:9999999").is_err());

    for (eco, code) in ECO_CODES {
        assert_eq!(eco.code(), code);
        assert_eq!(EcoCode::from_code(code).unwrap(), eco);
    }
}

#[test]
fn test_eco_deserialize() {
    let codes: Vec<EcoCode> =
        serde_json::from_str(r#"["ECO:0000255", "ECO:0000269"]"#).unwrap();
    assert_eq!(codes, vec![EcoCode::SequenceModelManual, EcoCode::Experimental]);

    assert!(serde_json::from_str::<EcoCode>(r#""ECO:1234567""#).is_err());
}
