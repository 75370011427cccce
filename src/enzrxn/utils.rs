use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use flexstr::SharedStr as FlexStr;

pub fn join(v: &[FlexStr], connector: &str) -> FlexStr {
    let result = itertools::join(v.iter().map(FlexStr::as_ref), connector);
    result.into()
}

// Open a data file for reading, decompressing it if the name ends in ".gz"
pub fn open_data_file(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

pub fn read_data_file_to_string(path: &Path) -> Result<String> {
    let mut reader = open_data_file(path)?;
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {}", path.display()))?;
    // some flat files (MetaCyc) contain stray Latin-1 bytes
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn tsv_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader = open_data_file(path)?;

    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .from_reader(reader))
}

// Return the only element of items, failing if there are zero or several
pub fn get_single<T>(mut items: Vec<T>, what: &str) -> Result<T> {
    if items.len() == 1 {
        Ok(items.remove(0))
    } else {
        bail!("expected exactly one {}, found {}", what, items.len())
    }
}

#[test]
fn test_get_single() {
    assert_eq!(get_single(vec![3], "item").unwrap(), 3);
    assert!(get_single::<u8>(vec![], "item").is_err());
    assert!(get_single(vec![1, 2], "item").is_err());
}

#[test]
fn test_join() {
    let parts: Vec<FlexStr> = vec!["12".into(), "7".into()];
    assert_eq!(join(&parts, "|").as_str(), "12|7");
}

#[test]
fn test_read_gzipped_data_file() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reactions.dat.gz");
    let mut encoder = flate2::write::GzEncoder::new(File::create(&path).unwrap(),
                                                    flate2::Compression::default());
    encoder.write_all(b"UNIQUE-ID - RXN-1\n//\n").unwrap();
    encoder.finish().unwrap();

    assert_eq!(read_data_file_to_string(&path).unwrap(), "UNIQUE-ID - RXN-1\n//\n");
    assert!(read_data_file_to_string(&dir.path().join("missing.gz")).is_err());
}
