use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};

use reggie_course::area::diagnostics::{self, Issue};
use reggie_course::codec::metadata::InfoField;
use reggie_course::tileset::source::{DirTilesetSource, TilesetSource};
use reggie_course::{Level, LoadOptions, Tileset};

/// Inspect, check and rewrite unpacked course folders
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON load options
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON summary of a level
    Info {
        #[clap(required = true)]
        dir: PathBuf,
    },
    /// Report consistency problems, optionally fixing them in place
    Check {
        #[clap(required = true)]
        dir: PathBuf,
        #[clap(long)]
        fix: bool,
    },
    /// Load a level and write it back out
    Resave {
        #[clap(required = true)]
        dir: PathBuf,
        #[clap(required = true)]
        out: PathBuf,
    },
    /// Print the tiles of one tileset object
    Render {
        /// Folder holding unpacked tilesets
        #[clap(required = true)]
        root: PathBuf,
        #[clap(required = true)]
        tileset: String,
        #[clap(required = true)]
        object: u8,
        #[clap(default_value_t = 1)]
        width: usize,
        #[clap(default_value_t = 1)]
        height: usize,
        #[clap(long)]
        fullslope: bool,
    },
}

#[derive(Serialize)]
struct AreaSummary {
    number: usize,
    tilesets: Vec<String>,
    entrances: usize,
    sprites: usize,
    zones: usize,
    locations: usize,
    paths: usize,
    progress_paths: usize,
    comments: usize,
    objects: [usize; 3],
    issues: Vec<Issue>,
}

#[derive(Serialize)]
struct LevelSummary {
    title: Option<String>,
    author: Option<String>,
    group: Option<String>,
    website: Option<String>,
    warnings: Vec<String>,
    areas: Vec<AreaSummary>,
}

fn load(dir: &Path, opts: &LoadOptions) -> Result<(Level, Vec<String>)> {
    let (level, warnings) = Level::read_dir(dir, opts)?;
    for w in &warnings {
        warn!("{w}");
    }
    Ok((level, warnings.iter().map(ToString::to_string).collect()))
}

fn info_cmd(dir: PathBuf, opts: &LoadOptions) -> Result<()> {
    let (level, warnings) = load(&dir, opts)?;
    let [title, author, group, website] = InfoField::ALL.map(|f| level.info(f));
    let areas = level
        .areas()
        .iter()
        .map(|a| AreaSummary {
            number: a.number,
            tilesets: a.tilesets.iter().filter(|t| !t.is_empty()).cloned().collect(),
            entrances: a.entrances.len(),
            sprites: a.sprites.len(),
            zones: a.zones.len(),
            locations: a.locations.len(),
            paths: a.paths.len(),
            progress_paths: a.progress_paths.len(),
            comments: a.comments.len(),
            objects: [a.layers[0].len(), a.layers[1].len(), a.layers[2].len()],
            issues: diagnostics::check(a),
        })
        .collect();
    let summary = LevelSummary {
        title,
        author,
        group,
        website,
        warnings,
        areas,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn check_cmd(dir: PathBuf, fix: bool, opts: &LoadOptions) -> Result<()> {
    let (mut level, _) = load(&dir, opts)?;
    let mut total = 0;
    for n in 1..=level.areas().len() {
        let Some(area) = level.area_mut(n) else { continue };
        let issues = if fix {
            diagnostics::fix_all(area)
        } else {
            diagnostics::check(area)
        };
        for issue in &issues {
            println!("area {n}: {issue}");
        }
        total += issues.len();
    }
    if fix && total > 0 {
        level.write_dir(&dir)?;
        info!("fixed {total} problems in {}", dir.display());
    } else if !fix && total > 0 {
        anyhow::bail!("{total} problems found");
    }
    Ok(())
}

fn resave_cmd(dir: PathBuf, out: PathBuf, opts: &LoadOptions) -> Result<()> {
    let (mut level, _) = load(&dir, opts)?;
    for n in 1..=level.areas().len() {
        if let Some(area) = level.area_mut(n) {
            area.sort_sprites_by_zone();
        }
    }
    level.write_dir(&out)
}

fn render_cmd(
    root: PathBuf,
    tileset: &str,
    object: u8,
    (width, height): (usize, usize),
    fullslope: bool,
) -> Result<()> {
    let source = DirTilesetSource::new(root);
    let files = source
        .object_files(tileset)?
        .ok_or_else(|| anyhow!("tileset '{tileset}' not found under {}", source.root().display()))?;
    let ts = Tileset::from_files(tileset, &files)?;
    if ts.objects.get(object).is_none() {
        warn!("tileset '{tileset}' has no object {object}");
    }
    let grid = ts.render(object, width, height, fullslope);
    for row in grid.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(|c| c.map_or_else(|| "....".to_owned(), |t| format!("{t:04x}")))
            .collect();
        println!("{}", cells.join(" "));
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let opts = match &args.config {
        Some(path) => LoadOptions::from_json_file(path)
            .with_context(|| format!("Loading options from {}", path.display()))?,
        None => LoadOptions::default(),
    };
    match args.command {
        Command::Info { dir } => info_cmd(dir, &opts),
        Command::Check { dir, fix } => check_cmd(dir, fix, &opts),
        Command::Resave { dir, out } => resave_cmd(dir, out, &opts),
        Command::Render {
            root,
            tileset,
            object,
            width,
            height,
            fullslope,
        } => render_cmd(root, &tileset, object, (width, height), fullslope),
    }
}
