use clap::*;
use std::path::Path;
use wintree::libs::filter::RegionFilterCatalog;
use wintree::libs::merge::{write_aggregates, DirMatrixStore, MatrixMerger};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("merge")
        .about("Sum per-region count matrices into named groups")
        .after_help(
            r###"
Reads `<index>.nm.mat` and `<index>.diff.mat` for every region of the index and
writes `<group>.nm.mat` and `<group>.diff.mat` into the output directory.

Notes:
* `nm` is the number of sites where both samples are called, `diff` the number of differences
* Matrix files start with the sequence count, then `name<TAB>v1<TAB>...<TAB>vN` rows
* `.gz` matrices are read when the plain file is absent
* Groups:
    * all_chrom - every region
    * <chrom>   - regions of one chromosome, unless --no-chrom
    * <chrom>_<start>_<end> - one group per region, with --per-window
* Every matrix must list the same sequences in the same order, and exactly <seqnum> of them
* Any mismatch, missing or malformed matrix aborts the merge; nothing is written

Examples:
1. Whole genome and per-chromosome sums:
   wintree merge matrices/ regions.tsv 25 -o merged/

2. Only the whole genome:
   wintree merge matrices/ regions.tsv 25 --no-chrom -o merged/

"###,
        )
        .arg(
            Arg::new("matdir")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Directory of per-region matrices"),
        )
        .arg(
            Arg::new("index")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Region index, `chrom start end index`"),
        )
        .arg(
            Arg::new("seqnum")
                .required(true)
                .num_args(1)
                .index(3)
                .value_parser(value_parser!(usize))
                .help("Number of sequences in every matrix"),
        )
        .arg(
            Arg::new("no_chrom")
                .long("no-chrom")
                .action(ArgAction::SetTrue)
                .help("Do not create per-chromosome groups"),
        )
        .arg(
            Arg::new("per_window")
                .long("per-window")
                .action(ArgAction::SetTrue)
                .help("Create one group per region"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value("merged")
                .help("Output directory"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let matdir = Path::new(args.get_one::<String>("matdir").unwrap());
    let index = Path::new(args.get_one::<String>("index").unwrap());
    let seqnum = super::utils::positive(*args.get_one::<usize>("seqnum").unwrap(), "seqnum")?;
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());

    if !matdir.is_dir() {
        anyhow::bail!("matrix directory {} does not exist", matdir.display());
    }
    if !index.is_file() {
        anyhow::bail!("region index {} does not exist", index.display());
    }

    //----------------------------
    // Ops
    //----------------------------
    let catalog = RegionFilterCatalog::whole_genome().scan_index(
        index,
        !args.get_flag("no_chrom"),
        args.get_flag("per_window"),
    )?;
    let store = DirMatrixStore::new(matdir);
    let merged = MatrixMerger::new(&store, &catalog, seqnum).merge(index)?;

    if merged.stats.regions_unassigned > 0 {
        log::warn!("{} regions matched no group", merged.stats.regions_unassigned);
    }
    for (group, count) in &merged.stats.regions_per_group {
        log::info!("{}: {} regions", group, count);
    }

    //----------------------------
    // Output
    //----------------------------
    write_aggregates(outdir, &merged.names, &merged.groups)?;

    Ok(())
}
