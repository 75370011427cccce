use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::direction::MetaCycDirection;
use crate::types::{MetaCycId, RheaIdNumber};
use crate::utils::{get_single, read_data_file_to_string};

const UNIQUE_ID_TAG: &str = "UNIQUE-ID";
const REACTION_DIRECTION_TAG: &str = "REACTION-DIRECTION";
const RHEA_LINK_TAG: &str = "DBLINKS - (RHEA \"";
const RECORD_START: &str = "UNIQUE-ID - ";
const RECORD_END: &str = "//";

#[derive(Debug, Clone, PartialEq)]
pub struct MetaCycReaction {
    pub unique_id: MetaCycId,
    pub direction: MetaCycDirection,
    // at most two Rhea reactions are linked from a MetaCyc reaction
    pub rhea_ids: Vec<RheaIdNumber>,
}

// "UNIQUE-ID - RXN-123" -> "RXN-123"
fn line_value(line: &str) -> Option<&str> {
    line.trim().split(" - ").nth(1)
}

fn rhea_link(line: &str) -> Option<&str> {
    let start = line.find(RHEA_LINK_TAG)? + RHEA_LINK_TAG.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn tagged_lines<'a>(lines: &[&'a str], tag: &str) -> Vec<&'a str> {
    lines.iter().filter(|line| line.contains(tag)).copied().collect()
}

fn parse_record(lines: &[&str]) -> Result<Option<MetaCycReaction>> {
    let unique_id_lines = tagged_lines(lines, UNIQUE_ID_TAG);
    let direction_lines = tagged_lines(lines, REACTION_DIRECTION_TAG);

    if unique_id_lines.is_empty() {
        // the comment header of the file
        return Ok(None);
    }

    let unique_id_line = get_single(unique_id_lines, "UNIQUE-ID line")?;
    let Some(unique_id) = line_value(unique_id_line)
    else {
        bail!("can't read the ID from: {}", unique_id_line);
    };

    if direction_lines.is_empty() {
        // no direction: the reaction can't be used
        return Ok(None);
    }

    let direction_line = get_single(direction_lines, "REACTION-DIRECTION line")
        .with_context(|| format!("in MetaCyc reaction {}", unique_id))?;

    let direction_text = line_value(direction_line)
        .with_context(|| format!("can't read the direction of {} from: {}",
                                 unique_id, direction_line))?;
    let direction = MetaCycDirection::from_text(direction_text)
        .with_context(|| format!("in MetaCyc reaction {}", unique_id))?;

    let rhea_ids = tagged_lines(lines, RHEA_LINK_TAG).into_iter()
        .map(|line| {
            rhea_link(line)
                .map(RheaIdNumber::from)
                .with_context(|| format!("can't read the Rhea ID from: {}", line))
        })
        .collect::<Result<Vec<_>>>()?;

    if rhea_ids.len() > 2 {
        bail!("MetaCyc reaction {} has {} Rhea links", unique_id, rhea_ids.len());
    }

    Ok(Some(MetaCycReaction {
        unique_id: unique_id.into(),
        direction,
        rhea_ids,
    }))
}

pub fn parse_reactions_dat(text: &str) -> Result<Vec<MetaCycReaction>> {
    let mut reactions = vec![];
    let mut record_lines = vec![];

    for line in text.lines() {
        if line.starts_with(RECORD_START) {
            record_lines.clear();
        }

        record_lines.push(line);

        if line.starts_with(RECORD_END) {
            if let Some(reaction) = parse_record(&record_lines)? {
                reactions.push(reaction);
            }
            record_lines.clear();
        }
    }

    Ok(reactions)
}

// Reaction directions from a MetaCyc reactions.dat dump
pub struct MetaCycDirectionMapper {
    reactions: HashMap<MetaCycId, Vec<MetaCycReaction>>,
}

impl MetaCycDirectionMapper {
    pub fn read(path: &Path) -> Result<MetaCycDirectionMapper> {
        let text = read_data_file_to_string(path)?;
        let reactions = parse_reactions_dat(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(MetaCycDirectionMapper::new(reactions))
    }

    pub fn new(reactions: Vec<MetaCycReaction>) -> MetaCycDirectionMapper {
        let mut by_id: HashMap<MetaCycId, Vec<MetaCycReaction>> = HashMap::new();

        for reaction in reactions {
            by_id.entry(reaction.unique_id.clone()).or_default().push(reaction);
        }

        MetaCycDirectionMapper {
            reactions: by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn reaction(&self, metacyc_id: &str) -> Result<Option<&MetaCycReaction>> {
        match self.reactions.get(metacyc_id).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([reaction]) => Ok(Some(reaction)),
            Some(reactions) =>
                bail!("{} MetaCyc reactions have the ID {}", reactions.len(), metacyc_id),
        }
    }

    // None if the reaction is unknown or has no direction
    pub fn metacyc_id_to_direction(&self, metacyc_id: &str) -> Result<Option<MetaCycDirection>> {
        Ok(self.reaction(metacyc_id)?.map(|reaction| reaction.direction))
    }
}

#[cfg(test)]
const TEST_REACTIONS_DAT: &str = "\
# header comment
//
UNIQUE-ID - RXN-100
TYPES - Small-Molecule-Reactions
DBLINKS - (RHEA \"40000\" NIL |kothari| 3780000000 NIL NIL)
REACTION-DIRECTION - PHYSIOL-LEFT-TO-RIGHT
//
UNIQUE-ID - RXN-200
TYPES - Small-Molecule-Reactions
DBLINKS - (RHEA \"20000\" NIL |kothari| 3780000000 NIL NIL)
//
UNIQUE-ID - RXN-300
DBLINKS - (RHEA \"30000\" NIL |kothari| 3780000000 NIL NIL)
DBLINKS - (RHEA \"30002\" NIL |kothari| 3780000000 NIL NIL)
REACTION-DIRECTION - REVERSIBLE
//
";

#[test]
fn test_parse_reactions_dat() {
    let reactions = parse_reactions_dat(TEST_REACTIONS_DAT).unwrap();

    assert_eq!(reactions.len(), 2);
    assert_eq!(reactions[0].unique_id.as_str(), "RXN-100");
    assert_eq!(reactions[0].direction, MetaCycDirection::PhysiolLeftToRight);
    assert_eq!(reactions[0].rhea_ids, vec![RheaIdNumber::from("40000")]);
    assert_eq!(reactions[1].rhea_ids.len(), 2);

    let mapper = MetaCycDirectionMapper::new(reactions);
    assert_eq!(mapper.metacyc_id_to_direction("RXN-300").unwrap(),
               Some(MetaCycDirection::Reversible));
    // no REACTION-DIRECTION
    assert_eq!(mapper.metacyc_id_to_direction("RXN-200").unwrap(), None);
    assert_eq!(mapper.metacyc_id_to_direction("RXN-999").unwrap(), None);
}

#[test]
fn test_too_many_rhea_links() {
    let text = "\
UNIQUE-ID - RXN-1
DBLINKS - (RHEA \"1\" NIL)
DBLINKS - (RHEA \"2\" NIL)
DBLINKS - (RHEA \"3\" NIL)
REACTION-DIRECTION - REVERSIBLE
//
";
    assert!(parse_reactions_dat(text).is_err());
}

#[test]
fn test_repeated_record_lines() {
    let text = "\
UNIQUE-ID - RXN-1
REACTION-DIRECTION - LEFT-TO-RIGHT
REACTION-DIRECTION - REVERSIBLE
//
";
    let err = parse_reactions_dat(text).unwrap_err();
    assert!(format!("{:#}", err).contains("RXN-1"));
    assert!(format!("{:#}", err).contains("found 2"));
}

#[test]
fn test_unknown_direction() {
    let text = "UNIQUE-ID - RXN-1\nREACTION-DIRECTION - SIDEWAYS\n//\n";
    assert!(parse_reactions_dat(text).is_err());
}

#[test]
fn test_duplicate_ids() {
    let text = "\
UNIQUE-ID - RXN-1
REACTION-DIRECTION - REVERSIBLE
//
UNIQUE-ID - RXN-1
REACTION-DIRECTION - LEFT-TO-RIGHT
//
";
    let mapper = MetaCycDirectionMapper::new(parse_reactions_dat(text).unwrap());
    assert!(mapper.metacyc_id_to_direction("RXN-1").is_err());
}
