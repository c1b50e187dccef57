mod editor;
mod repl;

use anyhow::{Context, Result};
use clap::{arg, command, ArgAction};
use std::path::PathBuf;
use tdl::{Config, Evaluator, Val};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// The clap CLI interface
fn cli() -> clap::Command {
    command!()
        .arg(arg!([FILE] ... "Script files to run, in order").value_parser(clap::value_parser!(PathBuf)))
        .arg(arg!(command: -c --command <COMMAND> "If present, COMMAND is run after any FILEs"))
        .arg(
            arg!(path: -p --path <DIR> "Directory to search for modules, may be repeated")
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(arg!(interactive: -i --interactive "Start a REPL after running FILEs and COMMAND"))
}

/// Path to optional configuration file
fn config_file() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("tdl").join("config.json"))
}

/// Configuration from defaults, config file, `TDLPATH`, then command line
fn load_config(args: &clap::ArgMatches) -> Result<Config> {
    let mut config = match config_file() {
        Some(path) if path.is_file() => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        _ => Config::default(),
    };

    let mut path: Vec<PathBuf> = args
        .get_many::<PathBuf>("path")
        .map(|dirs| dirs.cloned().collect())
        .unwrap_or_default();
    if let Some(env_path) = std::env::var_os("TDLPATH") {
        path.extend(std::env::split_paths(&env_path));
    }
    path.append(&mut config.path);
    config.path = path;

    if args.get_flag("interactive") {
        config.interactive = true;
    }
    debug!("using config {:?}", config);
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = cli().get_matches();
    let config = load_config(&args)?;
    let mut ev = Evaluator::new(config);

    let files: Vec<&PathBuf> = args
        .get_many::<PathBuf>("FILE")
        .map(|f| f.collect())
        .unwrap_or_default();
    for file in &files {
        ev.load_file(file)
            .with_context(|| format!("Failed to run {}", file.display()))?;
    }

    let command = args.get_one::<String>("command");
    if let Some(cmd) = command {
        match ev.eval(cmd).context("Failed to run command")? {
            Some(Val::Nil) | None => (),
            Some(v) => println!("{v}"),
        }
    }

    if ev.config().interactive || (files.is_empty() && command.is_none()) {
        repl::run(&mut ev)?;
    }
    Ok(())
}
