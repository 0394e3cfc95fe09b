//! pressroom - a blog-aware static site generator.

use anyhow::Result;
use clap::Parser;
use pressroom::{
    build::build_site,
    cli::{Cli, Commands},
    config::SiteConfig,
    init::new_site,
    log, logger,
    pipeline::Pipeline,
    plugins::register_plugins,
    serve::serve_site,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::set_quiet(cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.trace {
                log!("error"; "{err:?}");
            } else {
                log!("error"; "{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::New { path } = &cli.command {
        return new_site(path);
    }

    let config = load_config(cli)?;
    let pipeline = build_pipeline(&config)?;

    match &cli.command {
        Commands::Build => build_site(&config, &pipeline).map(|_| ()),
        Commands::Serve { watch } => serve_site(&config, &pipeline, *watch),
        Commands::New { .. } => Ok(()),
    }
}

/// Load `_config.yml`, apply CLI overrides and validate.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let mut config = SiteConfig::load(&cli.source)?;
    config.update_with_cli(cli);
    config.validate()?;

    log!("config"; "source: {}", config.source.display());
    log!("config"; "destination: {}", config.destination.display());
    Ok(config)
}

/// Built-in hooks plus `_plugins` extensions, unless running safe.
fn build_pipeline(config: &SiteConfig) -> Result<Pipeline> {
    let mut pipeline = Pipeline::with_builtins();
    if config.safe {
        log!("plugins"; "safe mode, skipping {}", config.plugins_dir().display());
    } else {
        register_plugins(&mut pipeline, config)?;
    }
    Ok(pipeline)
}
