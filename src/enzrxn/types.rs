use flexstr::SharedStr as FlexStr;

pub type Accession = FlexStr;
pub type IsoformId = FlexStr;
pub type IsoformName = FlexStr;

// numeric part of a Rhea ID, eg. "10001" for RHEA:10001
pub type RheaIdNumber = FlexStr;

// a MetaCyc UNIQUE-ID, eg. "PENTANAMIDASE-RXN"
pub type MetaCycId = FlexStr;

// a full ChEBI ID, eg. "CHEBI:57540"
pub type ChebiIdText = FlexStr;

// numeric M-CSA entry ID
pub type McsaId = u32;

pub type Sequence = FlexStr;
