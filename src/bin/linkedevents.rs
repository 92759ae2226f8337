use anyhow::Result;
use clap::Parser;
use linkedevents::cli::{self, Args};
use linkedevents::config::Config;
use linkedevents::context::{AppContext, StandardContext};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

fn main() -> Result<()> {
    let args = Args::parse();
    let ctx = StandardContext::new(args.root.clone());

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        // A broken config is reported by the command itself.
        Config::load_or_default(&ctx)
            .map(|c| c.log_filter())
            .unwrap_or(LevelFilter::Info)
    };
    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Debug)
        .build();
    // Logs go to stderr so that JSON output on stdout stays parseable.
    if TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto).is_err() {
        eprintln!("Failed to initialize logger");
    }

    log::debug!(
        "Using data dir {:?}",
        ctx.get_data_dir().unwrap_or_default()
    );
    cli::run(&ctx, args.command)
}
