use anyhow::Result;
use clap::Parser;
use whereabouts::{
    daemon::{args::DaemonArgs, config::Config, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::enable_logging,
        runtime::multi_thread_runtime,
    },
};

fn main() -> Result<()> {
    let args = DaemonArgs::parse();

    let state_dir = create_application_default_path()?;
    enable_logging(&state_dir, args.log, args.log_console)?;

    let config = Config::load(&args.config)?;
    multi_thread_runtime()?.block_on(start_daemon(config))
}
