extern crate enzrxn;

use std::env;
use std::path::PathBuf;
use std::process;

use getopts::{Matches, Options};
use tracing::info;
use tracing_subscriber::EnvFilter;

use enzrxn::config::BuildConfig;
use enzrxn::dataset::build_dataset;
use enzrxn::dataset_writer::write_dataset;

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn opt_path(matches: &Matches, name: &str) -> Option<PathBuf> {
    matches.opt_str(name).map(PathBuf::from)
}

// command line options override the config file
fn make_config(matches: &Matches, program: &str, opts: &Options) -> anyhow::Result<BuildConfig> {
    let mut config =
        if let Some(config_file_name) = opt_path(matches, "config-file") {
            BuildConfig::read(&config_file_name)?
        } else {
            let mut missing = vec![];
            for name in ["uniprot-json", "rhea-rxn-dir", "rhea-directions-tsv", "output-dir"] {
                if !matches.opt_present(name) {
                    missing.push(name);
                }
            }

            if !missing.is_empty() {
                println!("no --config-file option and missing: --{}", missing.join(", --"));
                print_usage(program, opts);
                process::exit(1);
            }

            BuildConfig::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), PathBuf::new())
        };

    if let Some(path) = opt_path(matches, "uniprot-json") {
        config.uniprot_json = path;
    }
    if let Some(path) = opt_path(matches, "rhea-rxn-dir") {
        config.rhea_rxn_dir = path;
    }
    if let Some(path) = opt_path(matches, "rhea-directions-tsv") {
        config.rhea_directions_tsv = path;
    }
    if let Some(path) = opt_path(matches, "output-dir") {
        config.output_dir = path;
    }
    if let Some(path) = opt_path(matches, "isoform-mapping-json") {
        config.isoform_mapping_json = Some(path);
    }
    if let Some(path) = opt_path(matches, "rhea2metacyc-tsv") {
        config.rhea2metacyc_tsv = Some(path);
    }
    if let Some(path) = opt_path(matches, "metacyc-reactions-dat") {
        config.metacyc_reactions_dat = Some(path);
    }
    if let Some(path) = opt_path(matches, "mcsa-dir") {
        config.mcsa_dir = Some(path);
    }
    if matches.opt_present("use-undefined-direction-rxn") {
        config.use_undefined_direction_rxn = true;
    }
    if matches.opt_present("allow-non-exp-evidence") {
        config.allow_non_exp_evidence = true;
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("enzrxn=info"))?,
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("c", "config-file", "Build configuration (JSON)", "FILE");
    opts.optopt("u", "uniprot-json",
                "UniProtKB entries with catalytic activity, JSON, optionally gzipped", "FILE");
    opts.optopt("i", "isoform-mapping-json",
                "Isoform ID to UniParc mapping results", "FILE");
    opts.optopt("r", "rhea-rxn-dir", "Directory of Rhea RXN files", "DIR");
    opts.optopt("d", "rhea-directions-tsv", "Rhea rhea-directions.tsv", "FILE");
    opts.optopt("", "rhea2metacyc-tsv", "Rhea rhea2metacyc.tsv", "FILE");
    opts.optopt("", "metacyc-reactions-dat", "MetaCyc reactions.dat", "FILE");
    opts.optopt("m", "mcsa-dir", "Directory of M-CSA JSON files", "DIR");
    opts.optopt("o", "output-dir", "Destination directory for the dataset", "DIR");
    opts.optflag("", "use-undefined-direction-rxn",
                 "Use left-to-right for reactions with no known direction (unverified)");
    opts.optflag("", "allow-non-exp-evidence",
                 "Also use annotations without experimental evidence");

    let program = args[0].clone();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            print_usage(&program, &opts);
            println!("\nerror: {}", e);
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        print_usage(&program, &opts);
        process::exit(0);
    }

    info!("{} v{}", PKG_NAME, VERSION);

    let config = make_config(&matches, &program, &opts)?;

    let dataset = build_dataset(&config)?;
    write_dataset(&dataset, &config)?;

    Ok(())
}
