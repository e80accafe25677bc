use clap::*;
use std::path::Path;
use wintree::libs::partition::{index_regions, partition, read_sizes, write_region_index, PartitionOpts};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("partition")
        .about("Split chromosomes into fixed-size windows")
        .after_help(
            r###"
Writes a region index, `chrom<TAB>start<TAB>end<TAB>index`, from a chromosome-size table.

Notes:
* Input lines are `name<TAB>length`; spaces or a comma also separate the columns
* Coordinates are 1-based and inclusive
* Windows are [1, W], [W+1, 2W], ... as long as they fit in the chromosome
* The remainder shorter than W is written only with `--keep-short`
* Chromosomes shorter than `--min` are skipped
* Indices are 1-based running numbers; per-region matrices are looked up by them

Examples:
1. 100 kbp windows:
   wintree partition chr.sizes -w 100000 -o regions.tsv

2. Keep the trailing short windows and skip small scaffolds:
   wintree partition chr.sizes -w 100000 --keep-short --min 1000000

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Chromosome sizes. [stdin] for standard input"),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .short('w')
                .value_parser(value_parser!(u64))
                .num_args(1)
                .default_value("100000")
                .help("Window size"),
        )
        .arg(
            Arg::new("min")
                .long("min")
                .short('m')
                .value_parser(value_parser!(u64))
                .num_args(1)
                .default_value("1")
                .help("Skip chromosomes shorter than this"),
        )
        .arg(
            Arg::new("keep_short")
                .long("keep-short")
                .action(ArgAction::SetTrue)
                .help("Keep the trailing window shorter than --window"),
        )
        .arg(super::utils::arg_outfile())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let opts = PartitionOpts {
        window: *args.get_one::<u64>("window").unwrap(),
        min_len: *args.get_one::<u64>("min").unwrap(),
        keep_short: args.get_flag("keep_short"),
    };
    opts.validate()?;

    //----------------------------
    // Ops
    //----------------------------
    let reader = wintree::reader(infile)?;
    let sizes = read_sizes(reader, Path::new(infile))?;
    let entries = index_regions(partition(&sizes, &opts));
    log::info!("{} regions on {} chromosomes", entries.len(), sizes.len());

    //----------------------------
    // Output
    //----------------------------
    let mut writer = wintree::writer(args.get_one::<String>("outfile").unwrap())?;
    write_region_index(&entries, &mut writer)?;

    Ok(())
}
