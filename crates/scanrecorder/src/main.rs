//! scanrecorder command-line entry point.

use anyhow::Context;
use clap::Parser;

use scanrecorder::{
    init_logging, ArchiveInfo, Cli, Command, Config, ConfigCommand, RecordingStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());

    match cli.command {
        Command::Sessions { json } => {
            let config = Config::load_from(cli.config).context("loading configuration")?;
            list_sessions(&config, json)?;
        }
        Command::Config { command } => match command {
            ConfigCommand::Show { json } => {
                let config = Config::load_from(cli.config).context("loading configuration")?;
                show_config(&config, json)?;
            }
            ConfigCommand::Path => {
                println!("{}", Config::default_config_path().display());
            }
            ConfigCommand::Validate { file } => {
                let path = file.or(cli.config);
                let config = Config::load_from(path).context("loading configuration")?;
                config.validate().context("validating configuration")?;
                println!("configuration is valid");
            }
        },
    }

    Ok(())
}

fn list_sessions(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = RecordingStore::from_config(config);
    let archives = store.list_archives();

    if json {
        println!("{}", serde_json::to_string_pretty(&archives)?);
        return Ok(());
    }

    if archives.is_empty() {
        println!("no session archives in {}", store.base_dir().display());
        return Ok(());
    }

    for archive in &archives {
        println!("{}", format_archive(archive));
    }
    Ok(())
}

fn format_archive(archive: &ArchiveInfo) -> String {
    let modified = archive
        .modified
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    format!(
        "{:<50} {:>10} B  {}",
        archive.filename, archive.size, modified
    )
}

fn show_config(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("recordings_dir  = {}", config.recordings_dir().display());
        println!("file_prefix     = {}", config.storage.file_prefix);
        println!("archive_prefix  = {}", config.storage.archive_prefix);
        println!("auto_mode       = {}", config.capture.auto_mode);
        println!("worker_count    = {}", config.workers.count);
        println!("queue_depth     = {}", config.workers.queue_depth);
    }
    Ok(())
}
