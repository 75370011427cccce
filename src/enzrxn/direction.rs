use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
         Serialize, Deserialize)]
pub enum ReactionDirection {
    #[serde(rename = "left-to-right")]
    LeftToRight,
    #[serde(rename = "right-to-left")]
    RightToLeft,
}

impl ReactionDirection {
    pub fn from_text(text: &str) -> Result<ReactionDirection> {
        match text {
            "left-to-right" => Ok(ReactionDirection::LeftToRight),
            "right-to-left" => Ok(ReactionDirection::RightToLeft),
            _ => bail!("invalid reaction direction: {}", text),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionDirection::LeftToRight => "left-to-right",
            ReactionDirection::RightToLeft => "right-to-left",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            ReactionDirection::LeftToRight => "l2r",
            ReactionDirection::RightToLeft => "r2l",
        }
    }

    // the column of the Rhea directions table holding the ID of this direction
    pub fn rhea_direction_name(&self) -> RheaDirectionName {
        match self {
            ReactionDirection::LeftToRight => RheaDirectionName::LeftToRight,
            ReactionDirection::RightToLeft => RheaDirectionName::RightToLeft,
        }
    }
}

impl Display for ReactionDirection {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Column names of rhea-directions.tsv
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RheaDirectionName {
    Master,
    LeftToRight,
    RightToLeft,
    Bidirectional,
}

impl RheaDirectionName {
    pub fn column_name(&self) -> &'static str {
        match self {
            RheaDirectionName::Master => "RHEA_ID_MASTER",
            RheaDirectionName::LeftToRight => "RHEA_ID_LR",
            RheaDirectionName::RightToLeft => "RHEA_ID_RL",
            RheaDirectionName::Bidirectional => "RHEA_ID_BI",
        }
    }
}

// REACTION-DIRECTION values of the MetaCyc reactions.dat file
// see: https://biocyc.org/PGDBConceptsGuide.shtml#TAG:__tex2page_sec_4.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaCycDirection {
    Reversible,
    PhysiolLeftToRight,
    PhysiolRightToLeft,
    IrreversibleLeftToRight,
    IrreversibleRightToLeft,
    LeftToRight,
    RightToLeft,
}

impl MetaCycDirection {
    pub fn from_text(text: &str) -> Result<MetaCycDirection> {
        let direction = match text {
            "REVERSIBLE" => MetaCycDirection::Reversible,
            "PHYSIOL-LEFT-TO-RIGHT" => MetaCycDirection::PhysiolLeftToRight,
            "PHYSIOL-RIGHT-TO-LEFT" => MetaCycDirection::PhysiolRightToLeft,
            "IRREVERSIBLE-LEFT-TO-RIGHT" => MetaCycDirection::IrreversibleLeftToRight,
            "IRREVERSIBLE-RIGHT-TO-LEFT" => MetaCycDirection::IrreversibleRightToLeft,
            "LEFT-TO-RIGHT" => MetaCycDirection::LeftToRight,
            "RIGHT-TO-LEFT" => MetaCycDirection::RightToLeft,
            _ => bail!("unknown MetaCyc reaction direction: {}", text),
        };
        Ok(direction)
    }

    pub fn to_reaction_directions(&self) -> Vec<ReactionDirection> {
        use MetaCycDirection::*;

        match self {
            Reversible => vec![ReactionDirection::LeftToRight,
                               ReactionDirection::RightToLeft],
            LeftToRight | PhysiolLeftToRight | IrreversibleLeftToRight =>
                vec![ReactionDirection::LeftToRight],
            RightToLeft | PhysiolRightToLeft | IrreversibleRightToLeft =>
                vec![ReactionDirection::RightToLeft],
        }
    }
}

// A resolved direction set must be {L2R}, {R2L} or {L2R, R2L}
pub fn check_direction_set(directions: &BTreeSet<ReactionDirection>) -> Result<()> {
    if directions.is_empty() || directions.len() > 2 {
        bail!("unexpected reaction direction set: {:?}", directions);
    }
    Ok(())
}

#[test]
fn test_reaction_direction() {
    let l2r = ReactionDirection::from_text("left-to-right").unwrap();
    assert_eq!(l2r.short_name(), "l2r");
    assert_eq!(l2r.rhea_direction_name(), RheaDirectionName::LeftToRight);
    assert_eq!(ReactionDirection::RightToLeft.rhea_direction_name().column_name(),
               "RHEA_ID_RL");
    assert!(ReactionDirection::from_text("bidirectional").is_err());
}

#[test]
fn test_metacyc_direction_table() {
    use ReactionDirection::*;

    assert_eq!(MetaCycDirection::from_text("REVERSIBLE").unwrap().to_reaction_directions(),
               vec![LeftToRight, RightToLeft]);

    for text in ["LEFT-TO-RIGHT", "PHYSIOL-LEFT-TO-RIGHT", "IRREVERSIBLE-LEFT-TO-RIGHT"] {
        assert_eq!(MetaCycDirection::from_text(text).unwrap().to_reaction_directions(),
                   vec![LeftToRight]);
    }
    for text in ["RIGHT-TO-LEFT", "PHYSIOL-RIGHT-TO-LEFT", "IRREVERSIBLE-RIGHT-TO-LEFT"] {
        assert_eq!(MetaCycDirection::from_text(text).unwrap().to_reaction_directions(),
                   vec![RightToLeft]);
    }

    assert!(MetaCycDirection::from_text("SIDEWAYS").is_err());
}

#[test]
fn test_check_direction_set() {
    use ReactionDirection::*;

    assert!(check_direction_set(&BTreeSet::new()).is_err());
    assert!(check_direction_set(&BTreeSet::from([LeftToRight])).is_ok());
    assert!(check_direction_set(&BTreeSet::from([RightToLeft])).is_ok());
    assert!(check_direction_set(&BTreeSet::from([LeftToRight, RightToLeft])).is_ok());
}
