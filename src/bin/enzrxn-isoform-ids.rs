extern crate enzrxn;

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process;

use getopts::Options;
use tracing::info;
use tracing_subscriber::EnvFilter;

use enzrxn::uniprot::all_isoform_ids;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] uniprot_json", program);
    print!("{}", opts.usage(&brief));
}

// Write the isoform IDs of the entries with activities limited to an
// isoform or chain, one per line.  The list is the input of a UniProtKB
// to UniParc ID mapping job.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("enzrxn=info"))?,
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "print this help message");
    opts.optopt("o", "output-file", "Output file, the default is standard output", "FILE");

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

    let Some(uniprot_json) = matches.free.first()
    else {
        println!("needs a uniprot_json argument");
        print_usage(&program, &opts);
        process::exit(1);
    };

    let isoform_ids = all_isoform_ids(Path::new(uniprot_json))?;

    let out: Box<dyn Write> =
        match matches.opt_str("output-file") {
            Some(file_name) => Box::new(File::create(file_name)?),
            None => Box::new(io::stdout()),
        };
    let mut writer = BufWriter::new(out);

    for isoform_id in &isoform_ids {
        writeln!(writer, "{}", isoform_id)?;
    }
    writer.flush()?;

    info!("wrote {} isoform IDs", isoform_ids.len());

    Ok(())
}
