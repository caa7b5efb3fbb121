use std::{
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};

use ustar_stream::{
    open_archive, ArchiveReader, Compression, DirDestination, Padding, PathPolicy, ReaderOptions,
};

/// ustarctl
#[derive(Debug, Parser)]
#[clap(name = "ustarctl", version)]
pub struct App {
    /// the archive to read, or `-` for stdin
    archive: PathBuf,

    #[clap(long, value_enum, default_value = "auto")]
    compression: CompressionArg,

    /// pad every entry with a full block when its size is a multiple of 512
    #[clap(long)]
    legacy_padding: bool,

    /// reject headers whose checksum does not match
    #[clap(long)]
    verify_checksum: bool,

    /// allow `..` in entry names when extracting
    #[clap(long)]
    permissive_paths: bool,

    /// treat an archive that stops without its two zero blocks as complete
    #[clap(long)]
    allow_missing_terminator: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompressionArg {
    Auto,
    None,
    Gzip,
    Zstd,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Auto => Compression::Auto,
            CompressionArg::None => Compression::None,
            CompressionArg::Gzip => Compression::Gzip,
            CompressionArg::Zstd => Compression::Zstd,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the entries of the archive
    List {
        /// print the sha256 of each file's content
        #[clap(long)]
        sha256: bool,
    },
    /// Writes the content of one entry to stdout
    Cat {
        /// the entry name, as shown by `list`
        name: String,
    },
    /// Extracts every entry below a directory
    Extract { dest: PathBuf },
}

impl App {
    fn options(&self) -> ReaderOptions {
        ReaderOptions {
            padding: if self.legacy_padding {
                Padding::Legacy
            } else {
                Padding::Aligned
            },
            verify_checksum: self.verify_checksum,
            path_policy: if self.permissive_paths {
                PathPolicy::Permissive
            } else {
                PathPolicy::Strict
            },
            allow_missing_terminator: self.allow_missing_terminator,
            ..ReaderOptions::default()
        }
    }
}

fn list(reader: &mut ArchiveReader<impl Read>, sha256: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    while let Some(header) = reader.read_header()? {
        let line = format!(
            "{} {:>10} {}",
            header.entry_type().tag(),
            header.size(),
            header.name()
        );
        if header.is_dir() || !sha256 {
            reader.skip_content()?;
            writeln!(out, "{line}")?;
        } else {
            let content = reader.read_content()?;
            writeln!(out, "{line} {}", hex::encode(Sha256::digest(&content)))?;
        }
    }
    Ok(())
}

fn cat(reader: &mut ArchiveReader<impl Read>, name: &str) -> Result<()> {
    while let Some(header) = reader.read_header()? {
        if header.name() == name && !header.is_dir() {
            let content = reader.read_content()?;
            std::io::stdout().lock().write_all(&content)?;
            return Ok(());
        }
        reader.skip_content()?;
    }
    bail!("{name:?} not found in archive");
}

fn extract(reader: &mut ArchiveReader<impl Read>, dest: &Path) -> Result<()> {
    let mut dest_dir = DirDestination::open(dest)
        .with_context(|| format!("opening extraction directory {dest:?}"))?;

    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} [{elapsed}] {pos} entries {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));

    while let Some(header) = reader.read_header()? {
        let name = header.name().to_string();
        bar.set_message(name.clone());
        reader
            .extract_to_destination(&mut dest_dir)
            .with_context(|| format!("extracting {name:?}"))?;
        bar.inc(1);
    }

    bar.finish_with_message(format!("done, {} bytes read", reader.position()));
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    let input = open_archive(&args.archive, args.compression.into())
        .with_context(|| format!("opening {:?}", args.archive))?;
    let mut reader = ArchiveReader::with_options(input, args.options());

    match &args.cmd {
        Command::List { sha256 } => list(&mut reader, *sha256)?,
        Command::Cat { name } => cat(&mut reader, name)?,
        Command::Extract { dest } => extract(&mut reader, dest)?,
    }

    reader.close();
    Ok(())
}
