//! Strata CLI - Command-line tool for browsing a layered virtual filesystem.
//!
//! This is the main entry point for the Strata command-line application.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use strata::prelude::*;

/// Strata - layered pak/directory filesystem tool
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options that build the virtual filesystem.
#[derive(Args)]
struct VfsArgs {
    /// Search path, lowest precedence first (repeatable)
    #[arg(
        short = 's',
        long = "search-path",
        env = "STRATA_SEARCH_PATH",
        value_delimiter = ',',
        required = true
    )]
    search_paths: Vec<PathBuf>,

    /// Base resource directory
    #[arg(short, long, env = "STRATA_BASE_DIR", default_value = "base")]
    base_dir: String,

    /// Mod to activate
    #[arg(short = 'm', long = "mod")]
    mod_name: Option<String>,

    /// Only read loose files whose extension is allowed
    #[arg(long)]
    pure: bool,

    /// Extension readable from loose files in pure mode (repeatable)
    #[arg(long = "allow", value_name = "EXT")]
    pure_extensions: Vec<String>,
}

impl VfsArgs {
    fn open(&self) -> Result<Vfs> {
        let mut config = VfsConfig::new().base_dir(&self.base_dir).pure(self.pure);
        for path in &self.search_paths {
            config = config.search_path(path);
        }
        for ext in &self.pure_extensions {
            config = config.pure_extension(ext);
        }
        if let Some(name) = &self.mod_name {
            config = config.start_mod(name);
        }
        Vfs::new(config).context("Failed to set up virtual filesystem")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List files in a directory
    Ls {
        #[command(flatten)]
        vfs: VfsArgs,

        /// Directory to list
        #[arg(default_value = "")]
        dir: String,

        /// Only files with this extension
        #[arg(short, long, default_value = "")]
        ext: String,

        /// Descend into subdirectories
        #[arg(short, long)]
        recurse: bool,

        /// Include directories
        #[arg(short = 'd', long)]
        dirs: bool,

        /// Leave out files
        #[arg(long)]
        no_files: bool,

        /// Skip loose directories
        #[arg(long, conflicts_with = "no_archives")]
        no_loose: bool,

        /// Skip archives
        #[arg(long)]
        no_archives: bool,

        /// Print names relative to the listed directory
        #[arg(long)]
        strip: bool,
    },

    /// Write a file to stdout
    Cat {
        #[command(flatten)]
        vfs: VfsArgs,

        /// Logical path
        path: String,
    },

    /// Show size, modification time and origin of a file
    Stat {
        #[command(flatten)]
        vfs: VfsArgs,

        /// Logical path
        path: String,
    },

    /// List available mods
    Mods {
        #[command(flatten)]
        vfs: VfsArgs,
    },

    /// List contents of a pak archive
    PakList {
        /// Path to the pak file
        pak: PathBuf,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Read every entry of a pak archive and check its CRC
    Verify {
        /// Path to the pak file
        pak: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ls {
            vfs,
            dir,
            ext,
            recurse,
            dirs,
            no_files,
            no_loose,
            no_archives,
            strip,
        } => {
            let flags = ListFlags::FILES
                .recurse(recurse)
                .include_dirs(dirs)
                .include_files(!no_files)
                .check_loose(!no_loose)
                .check_archived(!no_archives)
                .strip_prefix(strip);
            cmd_ls(&vfs.open()?, &dir, &ext, flags)?;
        }
        Commands::Cat { vfs, path } => {
            cmd_cat(&vfs.open()?, &path)?;
        }
        Commands::Stat { vfs, path } => {
            cmd_stat(&vfs.open()?, &path)?;
        }
        Commands::Mods { vfs } => {
            cmd_mods(&vfs.open()?)?;
        }
        Commands::PakList { pak, detailed } => {
            cmd_pak_list(&pak, detailed)?;
        }
        Commands::Verify { pak } => {
            cmd_verify(&pak)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "strata=debug" } else { "strata=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn cmd_ls(vfs: &Vfs, dir: &str, ext: &str, flags: ListFlags) -> Result<()> {
    let names = vfs.list_files(dir, ext, flags).context("Failed to list files")?;
    let mut out = io::stdout().lock();
    for name in &names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn cmd_cat(vfs: &Vfs, path: &str) -> Result<()> {
    let mut handle = vfs
        .open_read(path, Lookup::Layered, false)
        .with_context(|| format!("Failed to open {path}"))?;
    io::copy(&mut handle, &mut io::stdout().lock())
        .with_context(|| format!("Failed to read {path}"))?;
    handle.close()?;
    Ok(())
}

fn cmd_stat(vfs: &Vfs, path: &str) -> Result<()> {
    let meta = vfs
        .metadata(path, Lookup::Layered)
        .with_context(|| format!("Failed to stat {path}"))?;
    println!("path:     {path}");
    println!("size:     {}", meta.size);
    match meta.modified.and_then(|t| t.duration_since(UNIX_EPOCH).ok()) {
        Some(since) => println!("modified: {} (unix)", since.as_secs()),
        None => println!("modified: unknown"),
    }
    println!("origin:   {}", meta.origin);
    Ok(())
}

fn cmd_mods(vfs: &Vfs) -> Result<()> {
    let mods = vfs.list_mods();
    for info in &mods {
        println!("{:<20} {}", info.dir, info.description);
    }
    println!("\nTotal: {} mods", mods.len());
    Ok(())
}

fn cmd_pak_list(pak: &PathBuf, detailed: bool) -> Result<()> {
    let archive = PakArchive::open(pak).context("Failed to open pak archive")?;

    let mut entries: Vec<_> = archive.entries().collect();
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    for entry in &entries {
        if detailed {
            println!(
                "{:>12} {:>12} {:08x} {:?} {}{}",
                entry.compressed_size(),
                entry.uncompressed_size(),
                entry.crc32(),
                entry.compression_method(),
                entry.name(),
                if entry.is_dir() { "/" } else { "" }
            );
        } else {
            println!("{}", entry.name());
        }
    }

    println!("\nTotal: {} entries", entries.len());
    Ok(())
}

fn cmd_verify(pak: &PathBuf) -> Result<()> {
    let archive = PakArchive::open(pak).context("Failed to open pak archive")?;

    let mut names: Vec<String> = archive
        .entries()
        .filter(|e| !e.is_dir())
        .map(|e| e.name().to_string())
        .collect();
    names.sort();

    let start = Instant::now();
    let mut failed = 0;
    for name in &names {
        let mut reader = archive.open_entry(name)?;
        let copied = io::copy(&mut reader, &mut io::sink());
        match (copied, reader.crc_status()) {
            (Ok(_), CrcStatus::Verified) => {}
            (_, CrcStatus::Mismatch { expected, actual }) => {
                eprintln!("CRC mismatch in {name}: expected {expected:08x}, got {actual:08x}");
                failed += 1;
            }
            (Err(e), _) => {
                eprintln!("Error reading {name}: {e}");
                failed += 1;
            }
            (Ok(_), status) => {
                eprintln!("Unexpected CRC state for {name}: {status:?}");
                failed += 1;
            }
        }
    }

    println!(
        "Verified {} entries in {:?} ({} failed)",
        names.len(),
        start.elapsed(),
        failed
    );
    if failed > 0 {
        anyhow::bail!("{failed} entries failed verification");
    }
    Ok(())
}
