use byte_unit::{Byte, UnitType};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pypi_mirror::config::{Config, expand_home};
use pypi_mirror::models::{FileRecord, Package};
use pypi_mirror::name::canonicalize;
use pypi_mirror::simple::FileListing;
use pypi_mirror::storage::{MirrorRoot, PackageStore, SqliteStore};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BIN_NAME: &str = env!("CARGO_BIN_NAME");

#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(about = "Inspect a local PyPI mirror and its package database", long_about = None)]
#[command(version = VERSION)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Mirror root directory (overrides configuration)
    #[arg(short, long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Package database (overrides configuration)
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Color output mode (also respects NO_COLOR and FORCE_COLOR env vars)
    #[arg(
        long,
        visible_alias = "colour",
        value_enum,
        default_value = "auto",
        global = true
    )]
    color: ColorMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List mirrored projects with their serials
    List {
        /// Only show projects whose canonical name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a project's files and whether each is in the mirror
    Show {
        /// Project name (any spelling; it is canonicalized)
        name: String,
    },
    /// Check that every file in the database is present in the mirror
    Verify {
        /// Projects to check (all when omitted)
        names: Vec<String>,

        /// Also hash present files and compare against the stored SHA-256
        #[arg(long)]
        digest: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pypi_mirror=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Configure color output
    configure_colors(args.color);

    let mut config = Config::load(args.config.as_deref()).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    if let Some(root) = args.root {
        config.mirror.root = root;
    }
    if let Some(database) = args.database {
        config.mirror.database = Some(expand_home(&database));
    }

    let database = config.mirror.database_path();
    let store = match SqliteStore::open(&database) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "{} cannot open {}: {}",
                "error:".red().bold(),
                database.display(),
                e
            );
            process::exit(1);
        }
    };
    let mirror = MirrorRoot::new(config.mirror.root_path());

    let result = match args.command {
        Commands::List { filter, json } => run_list(&store, filter, json),
        Commands::Show { name } => run_show(&store, &mirror, &name),
        Commands::Verify { names, digest } => run_verify(&store, &mirror, names, digest),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn configure_colors(mode: ColorMode) {
    // Check environment variables first (they take precedence)
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
        return;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        colored::control::set_override(true);
        return;
    }

    // Apply CLI option
    match mode {
        ColorMode::Auto => {
            // Let colored crate auto-detect (default behavior)
        }
        ColorMode::Always => {
            colored::control::set_override(true);
        }
        ColorMode::Never => {
            colored::control::set_override(false);
        }
    }
}

type CmdResult = Result<bool, Box<dyn std::error::Error>>;

fn format_size(bytes: i64) -> String {
    let byte = Byte::from_u64(bytes.max(0) as u64);
    format!("{:.1}", byte.get_appropriate_unit(UnitType::Binary))
}

fn run_list(store: &SqliteStore, filter: Option<String>, json: bool) -> CmdResult {
    let mut packages = store.list_packages()?.items;
    if let Some(filter) = filter {
        let filter = canonicalize(&filter);
        packages.retain(|p| canonicalize(&p.name).contains(&filter));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(true);
    }

    print_packages_table(&packages);
    Ok(true)
}

fn print_packages_table(packages: &[Package]) {
    if packages.is_empty() {
        println!("{}", "No projects found.".yellow());
        return;
    }

    // Calculate column widths
    let name_width = packages
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:name_width$}  {:name_width$}  {:>10}",
        "NAME".cyan().bold(),
        "CANONICAL".cyan().bold(),
        "SERIAL".cyan().bold(),
    );
    println!("{}", "-".repeat(name_width * 2 + 14).bright_black());

    for pkg in packages {
        println!(
            "{:name_width$}  {:name_width$}  {:>10}",
            pkg.name.green(),
            canonicalize(&pkg.name),
            pkg.last_serial.to_string().yellow(),
        );
    }

    println!();
    println!(
        "{} {} project(s)",
        "Total:".cyan().bold(),
        packages.len().to_string().yellow()
    );
}

fn find_or_report(
    store: &SqliteStore,
    name: &str,
) -> Result<Option<Package>, Box<dyn std::error::Error>> {
    let package = store.find_package(&canonicalize(name))?;
    if package.is_none() {
        eprintln!("{} project {} not found", "error:".red().bold(), name.bold());
    }
    Ok(package)
}

fn run_show(store: &SqliteStore, mirror: &MirrorRoot, name: &str) -> CmdResult {
    let Some(package) = find_or_report(store, name)? else {
        return Ok(false);
    };
    let rows = store.list_files(&package.name)?;

    println!(
        "{} {}  {} {}",
        "Project:".cyan().bold(),
        package.name.green(),
        "Serial:".cyan().bold(),
        package.last_serial.to_string().yellow()
    );
    println!();

    let mut present = 0;
    for file in &rows.items {
        let status = match FileListing::classify(file, mirror) {
            FileListing::Present(_) => {
                present += 1;
                "present".green()
            }
            FileListing::Missing(_) => "missing".red(),
            FileListing::Malformed => "bad url".magenta(),
        };
        println!(
            "  {:8}  {:>10}  {}  {}",
            status,
            format_size(file.size).bright_black(),
            file.release.yellow(),
            file.filename
        );
    }

    println!();
    println!(
        "{} {}/{} file(s) present{}",
        "Total:".cyan().bold(),
        present.to_string().yellow(),
        rows.items.len(),
        if rows.skipped > 0 {
            format!(", {} unreadable row(s)", rows.skipped)
        } else {
            String::new()
        }
    );
    Ok(true)
}

/// Problem found with a single file row
enum Problem {
    Missing,
    Malformed,
    DigestMismatch { actual: String },
    Unreadable(std::io::Error),
}

fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn check_file(file: &FileRecord, mirror: &MirrorRoot, digest: bool) -> Option<Problem> {
    let path = match FileListing::classify(file, mirror) {
        FileListing::Present(path) => path,
        FileListing::Missing(_) => return Some(Problem::Missing),
        FileListing::Malformed => return Some(Problem::Malformed),
    };
    if !digest {
        return None;
    }

    let Some(local) = mirror.resolve(&path) else {
        return Some(Problem::Missing);
    };
    match sha256_file(&local) {
        Ok(actual) if actual.eq_ignore_ascii_case(&file.sha256_digest) => None,
        Ok(actual) => Some(Problem::DigestMismatch { actual }),
        Err(e) => Some(Problem::Unreadable(e)),
    }
}

fn run_verify(
    store: &SqliteStore,
    mirror: &MirrorRoot,
    names: Vec<String>,
    digest: bool,
) -> CmdResult {
    let packages = if names.is_empty() {
        store.list_packages()?.items
    } else {
        let mut packages = Vec::new();
        for name in &names {
            match find_or_report(store, name)? {
                Some(package) => packages.push(package),
                None => return Ok(false),
            }
        }
        packages
    };

    let progress = ProgressBar::new(packages.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut checked = 0usize;
    let mut problems = 0usize;
    for package in &packages {
        progress.set_message(package.name.clone());
        let rows = store.list_files(&package.name)?;
        problems += rows.skipped;

        for file in &rows.items {
            checked += 1;
            let Some(problem) = check_file(file, mirror, digest) else {
                continue;
            };
            problems += 1;

            let detail = match problem {
                Problem::Missing => "missing".red().to_string(),
                Problem::Malformed => format!("{} {}", "bad url".magenta(), file.url),
                Problem::DigestMismatch { actual } => format!(
                    "{} expected {} got {}",
                    "sha256 mismatch".red(),
                    file.sha256_digest,
                    actual
                ),
                Problem::Unreadable(e) => format!("{} {}", "unreadable".red(), e),
            };
            progress.println(format!("{}  {}  {}", package.name.green(), file.filename, detail));
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "{} {} file(s) in {} project(s), {} problem(s)",
        "Checked:".cyan().bold(),
        checked.to_string().yellow(),
        packages.len().to_string().yellow(),
        if problems == 0 {
            problems.to_string().green()
        } else {
            problems.to_string().red()
        }
    );

    Ok(problems == 0)
}
