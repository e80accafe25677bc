extern crate clap;
use clap::*;

mod cmd_wintree;

fn main() -> anyhow::Result<()> {
    let app = Command::new("wintree")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`wintree` - Whole-genome and windowed trees from per-region distance matrices")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Log more; -v for progress, -vv for every job"),
        )
        .subcommand(cmd_wintree::partition::make_subcommand())
        .subcommand(cmd_wintree::merge::make_subcommand())
        .subcommand(cmd_wintree::dist::make_subcommand())
        .subcommand(cmd_wintree::reroot::make_subcommand())
        .subcommand(cmd_wintree::build::make_subcommand())
        .subcommand(cmd_wintree::pairwise::make_subcommand())
        .subcommand(cmd_wintree::run::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Regions:
    * partition - Split chromosomes into fixed-size windows

* Matrices:
    * merge - Sum per-region count matrices into groups
    * dist  - p-distance and Jukes-Cantor matrices

* Trees:
    * reroot   - Reroot trees at an outgroup leaf
    * build    - One NJ tree per merged group
    * pairwise - Distances between every pair of trees

* Pipelines:
    * run - merge, build and optionally pairwise in one go

"###,
        );

    let matches = app.get_matches();

    env_logger::Builder::new()
        .filter_level(match matches.get_count("verbose") {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    match matches.subcommand() {
        Some(("partition", sub_matches)) => cmd_wintree::partition::execute(sub_matches),
        Some(("merge", sub_matches)) => cmd_wintree::merge::execute(sub_matches),
        Some(("dist", sub_matches)) => cmd_wintree::dist::execute(sub_matches),
        Some(("reroot", sub_matches)) => cmd_wintree::reroot::execute(sub_matches),
        Some(("build", sub_matches)) => cmd_wintree::build::execute(sub_matches),
        Some(("pairwise", sub_matches)) => cmd_wintree::pairwise::execute(sub_matches),
        Some(("run", sub_matches)) => cmd_wintree::run::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
