use anyhow::Result;
use clap::Parser;
use env_logger::Env;

mod cli;
mod cmd_create;
mod cmd_insert;
mod cmd_query;
mod cmd_stats;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Create {
            rel,
            nattrs,
            pages,
            depth,
            chvec,
        } => cmd_create::exec(rel, nattrs, pages, depth, chvec),

        cli::Cmd::Insert { rel } => cmd_insert::exec(rel),

        cli::Cmd::Query { args } => cmd_query::exec(args),

        cli::Cmd::Stats { rel } => cmd_stats::exec(rel),
    }
}
