use clap::*;
use std::path::Path;
use wintree::libs::batch::{read_tree_table, PairwiseBatch, RobinsonFouldsMetric};
use wintree::libs::pipeline::PairwiseMetric;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("pairwise")
        .about("Distances between every pair of trees")
        .after_help(
            r###"
Compares each unordered pair of trees once and writes `id1<TAB>id2<TAB>distance`.

Notes:
* Input lines are `id<TAB>newick` or `id<TAB>id<TAB>newick` (the all_trees.tsv of `build`)
* N trees give N*(N-1)/2 jobs, run on --parallel worker threads
* Lines are written as jobs finish, so their order varies between runs
* The output file is appended to, never truncated
* By default the distance is the unrooted Robinson-Foulds distance
* --script runs an external program per pair instead
    * {tree1} and {tree2} are files holding the two trees
    * {id1} and {id2} are the tree ids
    * {out} is a file to write the distance into; without it, stdout is read
    * The first whitespace-separated token must be a number
* A failed job (non-zero exit, missing or non-numeric result, timeout) is logged
  and counted; other jobs go on and nothing is retried

Examples:
1. Robinson-Foulds distances between window trees:
   wintree pairwise trees/all_trees.tsv -p 8 -o rf.tsv

2. With an external script and a 60-second limit per pair:
   wintree pairwise trees/all_trees.tsv -p 8 --script "Rscript kf.R {tree1} {tree2} {out}" --timeout 60

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Tree table. [stdin] for standard input"),
        )
        .arg(super::utils::arg_script())
        .arg(super::utils::arg_timeout())
        .arg(super::utils::arg_parallel())
        .arg(super::utils::arg_outfile())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let parallel = super::utils::positive(*args.get_one::<usize>("parallel").unwrap(), "parallel")?;
    let metric = super::utils::pairwise_metric(args)?;

    let reader = wintree::reader(infile)?;
    let trees = read_tree_table(reader, Path::new(infile))?;

    //----------------------------
    // Ops
    //----------------------------
    let mut writer = wintree::append_writer(args.get_one::<String>("outfile").unwrap())?;
    let batch = PairwiseBatch::new(parallel)?;
    let summary = match &metric {
        PairwiseMetric::RobinsonFoulds => batch.run(&trees, &RobinsonFouldsMetric, &mut writer)?,
        PairwiseMetric::Script(script) => batch.run(&trees, script, &mut writer)?,
    };

    if summary.failed() > 0 {
        log::warn!("{} of {} jobs failed: {}", summary.failed(), summary.scheduled, summary);
    }

    Ok(())
}
