use anyhow::{bail, Context, Result};
use bankfeed_ingest::{DirectorySource, FsDeleter, InlineSource, KeepFiles};
use bankfeed_sync::{encode_batch, prepare_batch, FileOutcome, Importer, ReqwestClient, RunReport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod home;
mod logging;

use config::{init_config, load_config, Config};

#[derive(Parser, Debug)]
#[command(
    name = "bankfeed",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BANKFEED_BUILD_SHA"), ")"),
    about = "Import bank CSV exports into a budget"
)]
struct Cli {
    /// Config file (default: ~/.bankfeed/config.toml)
    #[arg(long, global = true, env = "BANKFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides [budget].access_token
    #[arg(long, global = true, env = "BANKFEED_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// -v debug, -vv trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a commented config template
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Import every CSV in the watched folder, one file at a time
    Run {
        /// Folder to scan (default: [source].folder)
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Import a single CSV file
    Submit {
        file: PathBuf,

        /// Dispose of the file after a successful import
        #[arg(long)]
        consume: bool,
    },

    /// Print the batch a file would produce without sending it
    Preview { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose);

    let path = home::config_path(cli.config)?;

    match cli.command {
        Command::Init { force } => {
            init_config(&path, force)?;
        }

        Command::Run { folder } => {
            let cfg = load_config(&path)?;
            let Some(folder) = folder.or_else(|| cfg.source.folder.clone()) else {
                bail!("no folder to scan (pass --folder or set [source].folder)");
            };
            if !folder.is_dir() {
                bail!("folder not found: {}", folder.display());
            }

            let source = DirectorySource::new(&folder).with_extension(cfg.extension());
            let deleter = FsDeleter::new(cfg.source.disposal);
            let report = run_import(&cfg, cli.access_token, &source, &deleter)?;

            println!("Scanned {}", folder.display());
            print_report(&report);
            if !report.is_success() {
                bail!("{} of {} file(s) failed", report.failed(), report.files.len());
            }
        }

        Command::Submit { file, consume } => {
            let cfg = load_config(&path)?;
            let source = InlineSource::from_path(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let report = if consume {
                let deleter = FsDeleter::new(cfg.source.disposal);
                run_import(&cfg, cli.access_token, &source, &deleter)?
            } else {
                run_import(&cfg, cli.access_token, &source, &KeepFiles)?
            };

            print_report(&report);
            if !report.is_success() {
                bail!("import of {} failed", file.display());
            }
        }

        Command::Preview { file } => {
            let cfg = load_config(&path)?;
            let import = cfg.offline_config()?;
            let source = InlineSource::from_path(&file)
                .with_context(|| format!("reading {}", file.display()))?;

            let prepared = prepare_batch(&import, source.file())
                .with_context(|| format!("parsing {}", file.display()))?;
            let body = encode_batch(&prepared.batch, import.amount_format)?;

            println!(
                "POST {}/budgets/{}/transactions",
                import.base_url.trim_end_matches('/'),
                import.budget_id
            );
            println!("{}", String::from_utf8_lossy(&body));
            println!(
                "\n{} transaction(s), net {}",
                prepared.batch.len(),
                prepared.batch.net_amount()
            );
            for skipped in &prepared.skipped {
                println!("  skipped: {skipped}");
            }
        }
    }

    Ok(())
}

fn run_import<S, D>(
    cfg: &Config,
    token: Option<String>,
    source: &S,
    deleter: &D,
) -> Result<RunReport>
where
    S: bankfeed_ingest::FileSource,
    D: bankfeed_ingest::Deleter,
{
    let import = cfg.import_config(token)?;
    let client = ReqwestClient::new(cfg.timeout())?;
    let report = Importer::new(&import, &client).run(source, deleter)?;
    Ok(report)
}

fn print_report(report: &RunReport) {
    for file in &report.files {
        match &file.result {
            Ok(FileOutcome::Imported {
                confirmation,
                skipped,
                disposed,
            }) => {
                println!(
                    "ok      {} | sent={} created={} duplicates={} skipped={}{}",
                    file.name,
                    confirmation.submitted,
                    confirmation.transaction_ids.len(),
                    confirmation.duplicate_import_ids.len(),
                    skipped.len(),
                    if *disposed { "" } else { " (file kept: disposal failed)" }
                );
                for s in skipped {
                    println!("          skipped: {s}");
                }
            }
            Ok(FileOutcome::NothingToSubmit { skipped }) => {
                println!("empty   {} | skipped={} (file kept)", file.name, skipped.len());
                for s in skipped {
                    println!("          skipped: {s}");
                }
            }
            Err(e) => println!("failed  {} | {e} (file kept)", file.name),
        }
    }

    println!(
        "\n{} file(s): {} imported, {} failed",
        report.files.len(),
        report.imported(),
        report.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_submit() {
        let cli = Cli::try_parse_from(["bankfeed", "-vv", "submit", "jan.csv", "--consume"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Submit { file, consume } => {
                assert_eq!(file, PathBuf::from("jan.csv"));
                assert!(consume);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_with_config() {
        let cli = Cli::try_parse_from(["bankfeed", "run", "--folder", "/tmp/x", "--config", "c.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Command::Run { folder: Some(_) }));
    }
}
