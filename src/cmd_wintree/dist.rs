use clap::*;
use std::io::Write;
use std::path::Path;
use wintree::libs::distance::{jukes_cantor, p_distance};
use wintree::libs::matrix::{load_matrix, write_matrix, write_phylip};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("dist")
        .about("Distance matrix from site-count and difference matrices")
        .after_help(
            r###"
Computes p-distances, `diff / nm`, and optionally corrects them with Jukes-Cantor,
`d = -3/4 * ln(1 - 4/3 * p)`.

Notes:
* Both inputs must list the same sequences in the same order
* A pair with no compared sites (nm = 0) is an error, never a distance of 0
* Jukes-Cantor is undefined for p >= 0.75; such a pair is an error
* --phylip pads names to 10 columns and prints 6 decimals, as NJ programs expect

Examples:
1. Jukes-Cantor matrix of a merged group:
   wintree dist merged/Chr1.nm.mat merged/Chr1.diff.mat

2. p-distances in phylip format:
   wintree dist merged/all_chrom.nm.mat merged/all_chrom.diff.mat --model p --phylip

"###,
        )
        .arg(
            Arg::new("nm")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Non-missing site counts"),
        )
        .arg(
            Arg::new("diff")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Difference counts"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .num_args(1)
                .value_parser(["p", "jc"])
                .default_value("jc")
                .help("Distance model"),
        )
        .arg(
            Arg::new("phylip")
                .long("phylip")
                .action(ArgAction::SetTrue)
                .help("Write a phylip distance matrix"),
        )
        .arg(super::utils::arg_outfile())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let nm = load_matrix::<i64>(Path::new(args.get_one::<String>("nm").unwrap()))?;
    let diff = load_matrix::<i64>(Path::new(args.get_one::<String>("diff").unwrap()))?;
    let model = args.get_one::<String>("model").unwrap();

    if nm.names != diff.names {
        anyhow::bail!("the two matrices list different sequences");
    }

    //----------------------------
    // Ops
    //----------------------------
    let mut dist = p_distance(&nm.matrix, &diff.matrix)?;
    if model == "jc" {
        dist = jukes_cantor(&dist)?;
    }

    //----------------------------
    // Output
    //----------------------------
    let mut writer = wintree::writer(args.get_one::<String>("outfile").unwrap())?;
    if args.get_flag("phylip") {
        write_phylip(&mut writer, &nm.names, &dist)?;
    } else {
        write_matrix(&mut writer, &nm.names, &dist)?;
    }
    writer.flush()?;

    Ok(())
}
