use clap::*;
use std::time::Duration;
use wintree::libs::batch::ScriptMetric;
use wintree::libs::external::CommandTemplate;
use wintree::libs::pipeline::PairwiseMetric;

/// Template used when `--nj` is not given.
pub const DEFAULT_NJ: &str = "fastme -i {in} -o {out} -m NJ";

pub fn arg_nj() -> Arg {
    Arg::new("nj")
        .long("nj")
        .num_args(1)
        .default_value(DEFAULT_NJ)
        .help("Command line of the NJ tool, with {in} and {out}")
}

pub fn arg_script() -> Arg {
    Arg::new("script")
        .long("script")
        .num_args(1)
        .help("Command line of a tree-distance script (see Notes); default is built-in RF")
}

pub fn arg_timeout() -> Arg {
    Arg::new("timeout")
        .long("timeout")
        .value_parser(value_parser!(u64))
        .num_args(1)
        .help("Kill a script running longer than this many seconds")
}

pub fn arg_parallel() -> Arg {
    Arg::new("parallel")
        .long("parallel")
        .short('p')
        .value_parser(value_parser!(usize))
        .num_args(1)
        .default_value("1")
        .help("Number of threads")
}

pub fn arg_outfile() -> Arg {
    Arg::new("outfile")
        .long("outfile")
        .short('o')
        .num_args(1)
        .default_value("stdout")
        .help("Output filename. [stdout] for screen")
}

pub fn template(args: &ArgMatches, id: &str) -> anyhow::Result<Option<CommandTemplate>> {
    match args.get_one::<String>(id) {
        Some(s) => Ok(Some(CommandTemplate::parse(s)?)),
        None => Ok(None),
    }
}

/// `--script` and `--timeout` to a metric; the built-in RF without a script.
pub fn pairwise_metric(args: &ArgMatches) -> anyhow::Result<PairwiseMetric> {
    let timeout = args
        .get_one::<u64>("timeout")
        .map(|secs| Duration::from_secs(*secs));
    let metric = match template(args, "script")? {
        Some(script) => {
            script.locate()?;
            PairwiseMetric::Script(ScriptMetric::new(script, timeout))
        }
        None => {
            if timeout.is_some() {
                log::warn!("--timeout only applies to --script");
            }
            PairwiseMetric::RobinsonFoulds
        }
    };
    Ok(metric)
}

pub fn positive(value: usize, name: &str) -> anyhow::Result<usize> {
    if value == 0 {
        anyhow::bail!("{} must be a positive integer", name);
    }
    Ok(value)
}
