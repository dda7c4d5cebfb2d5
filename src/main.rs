use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imap_rs::{IMap, Insert};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "imap-rs", about = "Load u64 ids into an integer map")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert every id of a file (one per line) and report the map.
    Load {
        /// File with one unsigned id per line.
        ids: PathBuf,
        /// Print the first N ids in traversal order.
        #[arg(long, default_value_t = 10)]
        show: usize,
    },
    /// Load two id files over one object pool and merge the second into the first.
    Union {
        /// Destination ids.
        dest: PathBuf,
        /// Ids merged into the destination.
        source: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Load { ids, show } => run_load(&ids, show)?,
        Commands::Union { dest, source } => run_union(&dest, &source)?,
    }
    Ok(())
}

fn read_ids(path: &Path) -> Result<Vec<u64>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    );

    let mut ids = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line
            .parse::<u64>()
            .with_context(|| format!("{}:{}: invalid id {:?}", path.display(), idx + 1, line))?;
        ids.push(id);
    }
    Ok(ids)
}

fn run_load(path: &Path, show: usize) -> Result<()> {
    let ids = read_ids(path)?;
    let mut map = IMap::new();
    let mut overwrites = 0usize;
    for id in ids {
        if let Insert::Overwritten(_) = map.insert(id, Rc::new(id))? {
            overwrites += 1;
        }
    }
    info!(entries = map.len(), overwrites, "loaded {}", path.display());

    let mut budget = show;
    let mut first = Vec::with_capacity(show);
    map.walkn(&mut budget, |id| {
        first.push(**id);
        1
    });

    println!("entries:    {}", map.len());
    println!("overwrites: {}", overwrites);
    println!("first {} in traversal order: {:?}", first.len(), first);
    Ok(())
}

fn run_union(dest_path: &Path, source_path: &Path) -> Result<()> {
    let mut pool: HashMap<u64, Rc<u64>> = HashMap::new();
    let mut load = |path: &Path| -> Result<IMap<Rc<u64>>> {
        let mut map = IMap::new();
        for id in read_ids(path)? {
            let obj = pool.entry(id).or_insert_with(|| Rc::new(id));
            map.insert(id, Rc::clone(obj))?;
        }
        Ok(map)
    };

    let mut dest = load(dest_path)?;
    let source = load(source_path)?;
    let (before, incoming) = (dest.len(), source.len());

    dest.union_ref(source).context("union failed")?;
    info!(before, incoming, after = dest.len(), "merged maps");

    let shared = before + incoming - dest.len();
    println!("destination: {}", before);
    println!("source:      {}", incoming);
    println!("union:       {} ({} shared)", dest.len(), shared);
    Ok(())
}
