use clap::*;
use std::io::Write;
use wintree::libs::phylo::Tree;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("reroot")
        .about("Reroot trees at an outgroup leaf")
        .after_help(
            r###"
Places the root at the midpoint of the outgroup's branch.

Notes:
* Leaf-to-leaf path lengths are unchanged; only the root position moves
* Support values move with the edges they belong to
* Nodes left with a single child are removed
* Every tree of the input is rerooted; a tree lacking the outgroup is an error

Examples:
1. Root NJ trees at the outgroup:
   wintree reroot tree.nwk -n Outgroup

2. Without support values, with indentation:
   wintree reroot tree.nwk -n Outgroup --plain --indent "  "

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Input filename. [stdin] for standard input"),
        )
        .arg(
            Arg::new("node")
                .long("node")
                .short('n')
                .required(true)
                .num_args(1)
                .help("Name of the outgroup leaf"),
        )
        .arg(
            Arg::new("plain")
                .long("plain")
                .action(ArgAction::SetTrue)
                .help("Omit support values"),
        )
        .arg(
            Arg::new("indent")
                .long("indent")
                .num_args(1)
                .help("Pretty-print with this indentation"),
        )
        .arg(super::utils::arg_outfile())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let outgroup = args.get_one::<String>("node").unwrap();
    let plain = args.get_flag("plain");
    let indent = args.get_one::<String>("indent");

    let mut writer = wintree::writer(args.get_one::<String>("outfile").unwrap())?;

    //----------------------------
    // Ops
    //----------------------------
    for (i, mut tree) in Tree::from_file(infile)?.into_iter().enumerate() {
        tree.reroot_at_outgroup(outgroup)
            .map_err(|e| anyhow::anyhow!("tree {}: {}", i + 1, e))?;

        let out = match (indent, plain) {
            (Some(indent), _) => tree.to_newick_with_format(indent),
            (None, true) => tree.to_newick_plain(),
            (None, false) => tree.to_newick(),
        };
        writeln!(writer, "{}", out)?;
    }
    writer.flush()?;

    Ok(())
}
