use clap::*;
use std::path::Path;
use wintree::libs::external::CommandTemplate;
use wintree::libs::merge::{list_groups, load_aggregates, DirMatrixStore};
use wintree::libs::treebuild::{ExternalNj, TreeBuildOrchestrator};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("build")
        .about("Build one outgroup-rooted NJ tree per merged group")
        .after_help(
            r###"
Turns the output of `wintree merge` into distance matrices and trees.

Notes:
* Groups are the `<group>.nm.mat`/`<group>.diff.mat` pairs of <indir>, all_chrom first
* For each group, <outdir> receives
    * <group>.diff.mat, <group>.nm.mat - the counts
    * <group>.p.mat, <group>.jc.mat    - p-distances and Jukes-Cantor distances
    * <group>.jc.phy                   - the phylip input of the NJ tool
    * <group>.nwk                      - the tree rerooted at <outgroup>
* all_trees.tsv collects `group<TAB>group<TAB>newick` lines; it is rewritten on each run
* Existing files are replaced
* --nj is split on whitespace; {in} is the phylip file, {out} the tree file
    * Without {out}, the tree is read from the tool's stdout
* A group with undefined distances or a failing NJ run is skipped and reported;
  the exit code is non-zero when any group failed

Examples:
1. With FastME:
   wintree build merged/ Outgroup -o trees/

2. With another NJ program printing to stdout:
   wintree build merged/ Outgroup --nj "quicktree -in m {in}" -o trees/

"###,
        )
        .arg(
            Arg::new("indir")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Directory of merged matrices"),
        )
        .arg(
            Arg::new("outgroup")
                .required(true)
                .num_args(1)
                .index(2)
                .help("Name of the outgroup sequence"),
        )
        .arg(
            Arg::new("group")
                .long("group")
                .short('g')
                .num_args(1)
                .action(ArgAction::Append)
                .help("Only build these groups"),
        )
        .arg(super::utils::arg_nj())
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value("trees")
                .help("Output directory"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let indir = Path::new(args.get_one::<String>("indir").unwrap());
    let outgroup = args.get_one::<String>("outgroup").unwrap();
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());

    let nj = CommandTemplate::parse(args.get_one::<String>("nj").unwrap())?;
    nj.locate()?;

    if !indir.is_dir() {
        anyhow::bail!("input directory {} does not exist", indir.display());
    }
    let groups: Vec<String> = match args.get_many::<String>("group") {
        Some(groups) => groups.cloned().collect(),
        None => list_groups(indir)?,
    };
    if groups.is_empty() {
        anyhow::bail!("no merged matrices in {}", indir.display());
    }

    //----------------------------
    // Ops
    //----------------------------
    let (names, aggregates) = load_aggregates(&DirMatrixStore::new(indir), &groups)?;

    let builder = ExternalNj::new(nj);
    let report = TreeBuildOrchestrator::new(&builder, outdir, outgroup.as_str())
        .build_all(&names, &aggregates)?;

    if !report.is_success() {
        for (group, reason) in &report.failed {
            eprintln!("{}: {}", group, reason);
        }
        anyhow::bail!(
            "{} of {} groups failed",
            report.failed.len(),
            aggregates.len()
        );
    }

    Ok(())
}
