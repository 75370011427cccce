#[macro_use] extern crate serde_derive;
#[macro_use] extern crate lazy_static;

pub mod types;
pub mod constants;
pub mod utils;
pub mod config;
pub mod amino_acid;
pub mod eco;
pub mod direction;
pub mod uniprot;
pub mod isoform_mapping;
pub mod mcsa;
pub mod metacyc;
pub mod chem;
pub mod rhea;
pub mod dataset;
pub mod dataset_writer;
