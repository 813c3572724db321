use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;
use xgpsave::archive::{create_zip, short_digest, zip_file_name};
use xgpsave::extract::{ExtractError, Extractor};
use xgpsave::fs::{SaveFs, StdFs};
use xgpsave::handler::{GameEntry, HandlerRegistry};
use xgpsave::index::IndexSchema;
use xgpsave::notify::{Acknowledgement, Notifier, SyncWarning};
use xgpsave::wgs::{ReadError, UserDir};

#[derive(Parser)]
#[command(name = "xgp-save-extract", about = "Extract Xbox PC Game Pass saves into zip files")]
struct Cli {
    /// Game registry (JSON list of name, package, handler, handler_args)
    #[arg(short, long, default_value = "games.json")]
    games: PathBuf,
    /// Directory holding installed store packages [default: %LOCALAPPDATA%\Packages]
    #[arg(long)]
    packages_root: Option<PathBuf>,
    /// Indexes carry a display name field before the package name
    #[arg(long)]
    display_name_schema: bool,
    /// Continue past sync warnings without asking
    #[arg(short, long)]
    yes: bool,
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed games and the save files each user would get
    List,
    /// Show the decoded container index of every user
    Info,
    /// Write one zip per game and user
    Extract {
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();

    let packages_root = match cli.packages_root.clone() {
        Some(p) => p,
        None => dirs::data_local_dir()
            .map(|d| d.join("Packages"))
            .ok_or("cannot locate the local app data directory, pass --packages-root")?,
    };
    let registry = HandlerRegistry::from_path(&cli.games)?;
    let schema = if cli.display_name_schema { IndexSchema::WithDisplayName } else { IndexSchema::Standard };

    let fs = StdFs;
    let extractor = Extractor::new(&fs, &packages_root, &registry).with_schema(schema);
    let mut notifier = ConsoleNotifier { interactive: !cli.yes && io::stdin().is_terminal() };

    let games = extractor.installed_games();
    if games.is_empty() {
        println!("No supported games installed under {}", packages_root.display());
        std::process::exit(1);
    }
    println!("Installed supported games:");
    for game in &games {
        println!("  - {}", game.name);
    }

    let mut written = Vec::new();
    for game in games {
        println!();
        println!("── {} ─────────────────────────────────────────", game.name);
        let users = match extractor.users(game, &mut notifier) {
            Ok(u) => u,
            Err(ReadError::Aborted(_)) => return aborted(),
            Err(e) => {
                error!(game = %game.name, "failed to list users: {e}");
                continue;
            }
        };
        if users.is_empty() {
            println!("  No containers for the game, maybe the game is not installed anymore");
            continue;
        }

        for user in &users {
            let result = match &cli.command {
                Commands::Info => show_info(&extractor, user),
                Commands::List => list_user(&extractor, &fs, game, user, &mut notifier, None),
                Commands::Extract { output_dir } => {
                    list_user(&extractor, &fs, game, user, &mut notifier, Some(output_dir))
                }
            };
            match result {
                Ok(Some(path)) => written.push(path),
                Ok(None) => {}
                Err(e) if e.downcast_ref::<ExtractError>().is_some_and(ExtractError::is_aborted) => {
                    return aborted();
                }
                Err(e) => error!(game = %game.name, user = user.user_id, "{e}"),
            }
        }
    }

    if !written.is_empty() {
        println!();
        println!("Created:");
        for path in &written {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

// ── Commands ─────────────────────────────────────────────────────────────────

fn show_info(extractor: &Extractor, user: &UserDir) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let index = extractor.index(user)?;
    println!("  User           {} ({})", extractor.label(user), user.path.display());
    if let Some(name) = &index.package_display_name {
        println!("  Display name   {}", name);
    }
    println!("  Package        {}", index.store_package_name);
    println!("  Last synced    {}", index.creation_time.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Containers ({}):", index.containers.len());
    for c in &index.containers {
        println!("    {:<40} #{:<3} {}  {}",
            c.name, c.container_number, c.dir_name(), c.creation_time.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(None)
}

fn list_user(
    extractor: &Extractor,
    fs: &dyn SaveFs,
    game: &GameEntry,
    user: &UserDir,
    notifier: &mut dyn Notifier,
    output_dir: Option<&PathBuf>,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let saves = extractor.extract_user(user, notifier)?;
    println!("  {} [{}], saved {}",
        saves.label, saves.handler.strategy, saves.store.creation_time.format("%Y-%m-%d %H:%M:%S UTC"));
    if saves.artifacts.is_empty() {
        println!("    no save files");
        return Ok(None);
    }

    println!("    {:<48} {:>10}  Digest", "Name", "Size");
    for artifact in &saves.artifacts {
        let data = artifact.read(fs)?;
        println!("    {:<48} {:>10}  {}", artifact.relative_path, data.len(), short_digest(&data));
    }

    let Some(dir) = output_dir else {
        return Ok(None);
    };
    let path = dir.join(zip_file_name(&game.name, &saves.label, &chrono::Local::now()));
    create_zip(&path, &saves.artifacts, fs)?;
    Ok(Some(path))
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn aborted() -> Result<(), Box<dyn std::error::Error>> {
    println!("Aborted.");
    std::process::exit(2);
}

struct ConsoleNotifier {
    interactive: bool,
}

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, warning: &SyncWarning) -> Acknowledgement {
        eprintln!();
        eprintln!("  !! {warning} !!");
        if warning.is_sync_problem() {
            eprintln!("     Xbox cloud save syncing might not be complete, try again later.");
            eprintln!("     Extracted saves for this game might be corrupted!");
        }
        if !self.interactive {
            return Acknowledgement::Continue;
        }
        eprintln!("     Press enter to skip and continue, or type q to abort.");
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(_) if line.trim().eq_ignore_ascii_case("q") => Acknowledgement::Abort,
            _ => Acknowledgement::Continue,
        }
    }
}
