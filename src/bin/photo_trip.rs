//! photo-trip CLI - reconstruct trip itineraries from photo folders
//!
//! Usage:
//!   photo-trip <folder> [trip.gpx trip.md trip.csv trip.html] [--infer | --manual]
//!   photo-trip --batch <root> [--batch-output <dir>]
//!   photo-trip --route-cities Rome Florence Venice [--route-dates ...]
//!
//! Outputs are written to `Route/` inside the photo folder (or the current
//! directory when only GPX sources are given).

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{info, warn};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use photo_trip::cache::ROUTE_DIR;
use photo_trip::geocode::{Geocoder, NoGeocoder};
use photo_trip::route::{parse_date, parse_route_dates};
use photo_trip::{
    batch_process, build_route, build_trip, gpx_io, load_custom_locations, map, write_outputs, Cluster,
    DateRange, ExifReader, InferenceMode, LocationPrompt, MapStyle, NominatimGeocoder, OutputNames,
    PhotoGroup, RouteStop, Sources, TripConfig,
};

#[derive(Parser)]
#[command(name = "photo-trip")]
#[command(about = "Reconstruct travel itineraries from photos and GPX tracks", long_about = None)]
struct Cli {
    /// Folder with photos
    folder: Option<PathBuf>,

    /// Output GPX filename (saved in the Route subfolder)
    #[arg(default_value = "trip.gpx")]
    output_gpx: String,

    /// Output Markdown summary filename
    #[arg(default_value = "trip.md")]
    output_md: String,

    /// Output CSV filename
    #[arg(default_value = "trip.csv")]
    output_csv: String,

    /// Output HTML map filename
    #[arg(default_value = "trip.html")]
    output_html: String,

    /// Process several photo folders and merge them
    #[arg(long, num_args = 1..)]
    multi_folders: Vec<PathBuf>,

    /// GPX file to use as reference track
    #[arg(long)]
    gpx_import: Option<PathBuf>,

    /// Directories to search for GPX files
    #[arg(long, num_args = 1..)]
    gpx_search: Vec<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reverse geocode addresses into the summary and CSV (slow)
    #[arg(long)]
    geocode: bool,

    /// Time gap (hours) between segments
    #[arg(long)]
    gap: Option<f64>,

    /// Distance gap (km) between segments
    #[arg(long)]
    distance: Option<f64>,

    /// Timezone shift in hours applied to EXIF capture times
    #[arg(long, allow_negative_numbers = true)]
    tz_shift: Option<i64>,

    /// Only keep photos within YYYY-MM-DD:YYYY-MM-DD
    #[arg(long)]
    date_range: Option<String>,

    /// Minimum number of photos per segment
    #[arg(long)]
    min_photos: Option<usize>,

    /// Infer locations for photos without GPS data
    #[arg(long, conflicts_with = "manual")]
    infer: bool,

    /// Enter locations by hand for photos without GPS data
    #[arg(long)]
    manual: bool,

    /// Extract dates from filenames when EXIF is missing
    #[arg(long)]
    filename_dates: bool,

    /// Map with start/end markers, heat layer and time slider
    #[arg(long)]
    advanced_map: bool,

    /// Write outputs without asking for confirmation
    #[arg(long)]
    skip_preview: bool,

    /// Treat the imported GPX file as a single segment
    #[arg(long)]
    gpx_as_route: bool,

    /// Batch process every subfolder of this root
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Output directory for batch processing
    #[arg(long, default_value = "TripArchive")]
    batch_output: PathBuf,

    /// Build a custom route from these place names
    #[arg(long, num_args = 1..)]
    route_cities: Vec<String>,

    /// Visit date (YYYY-MM-DD) per route place, in order
    #[arg(long, num_args = 1..)]
    route_dates: Vec<String>,

    /// Start date of the custom route (default: today)
    #[arg(long)]
    route_start_date: Option<String>,

    /// Output GPX filename for the custom route
    #[arg(long, default_value = "custom_route.gpx")]
    route_gpx_output: String,

    /// Output HTML filename for the custom route
    #[arg(long, default_value = "custom_route.html")]
    route_html_output: String,

    /// JSON file mapping place names to [lat, lon]
    #[arg(long)]
    custom_locations_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    if !cli.route_cities.is_empty() {
        return run_route(&cli);
    }

    let config = build_config(&cli)?;

    if let Some(root) = &cli.batch {
        return run_batch(root, &cli.batch_output, &config);
    }

    run_trip(&cli, &config)
}

/// Load `--config` and apply flag overrides.
fn build_config(cli: &Cli) -> anyhow::Result<TripConfig> {
    let mut config = match &cli.config {
        Some(path) => TripConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TripConfig::default(),
    };

    if let Some(gap) = cli.gap {
        config.segment.time_gap_hours = gap;
    }
    if let Some(distance) = cli.distance {
        config.segment.distance_gap_km = distance;
    }
    if let Some(min) = cli.min_photos {
        config.segment.min_cluster_size = min;
    }
    if let Some(shift) = cli.tz_shift {
        config.timestamp.tz_shift_hours = shift;
    }
    if cli.filename_dates {
        config.timestamp.use_filename_dates = true;
    }
    if let Some(range) = &cli.date_range {
        config.scan.date_range = Some(DateRange::parse(range)?);
    }
    if cli.infer {
        config.inference = InferenceMode::Interpolate;
    } else if cli.manual {
        config.inference = InferenceMode::Manual;
    }
    if cli.geocode {
        config.geocode_addresses = true;
    }
    Ok(config)
}

/// Nominatim when it can be built, otherwise a geocoder that finds nothing.
fn make_geocoder() -> Box<dyn Geocoder> {
    match NominatimGeocoder::new() {
        Ok(g) => Box::new(g),
        Err(e) => {
            warn!("Geocoding disabled: {}", e);
            Box::new(NoGeocoder)
        }
    }
}

// ============================================================================
// Trip
// ============================================================================

fn run_trip(cli: &Cli, config: &TripConfig) -> anyhow::Result<()> {
    let mut folders: Vec<PathBuf> = cli.folder.iter().cloned().collect();
    folders.extend(cli.multi_folders.iter().cloned());

    let sources = Sources {
        folders,
        gpx_imports: cli.gpx_import.iter().cloned().collect(),
        gpx_search_dirs: cli.gpx_search.clone(),
        gpx_as_route: cli.gpx_as_route,
    };
    if sources.is_empty() {
        bail!("specify at least one source of data (folder, --multi-folders, --gpx-import or --gpx-search)");
    }

    let geocoder = make_geocoder();
    let mut stdin = stdin_prompt;
    let prompt: Option<&mut dyn LocationPrompt> =
        if config.inference == InferenceMode::Manual { Some(&mut stdin) } else { None };

    let plan = match build_trip(&sources, config, &ExifReader, &*geocoder, prompt) {
        Ok(plan) => plan,
        Err(e) if e.is_empty_result() => {
            println!("{}. Nothing to write.", capitalize(&e.to_string()));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let stats = &plan.stats;
    info!(
        "{} photos with GPS, {} inferred, {} left out, {} track points",
        stats.photos_with_gps, stats.inferred, stats.unresolved, stats.track_points
    );
    if stats.unresolved > 0 && config.inference == InferenceMode::None {
        println!("Use --infer or --manual to include photos without GPS data.");
    }

    if !cli.skip_preview && !confirm_preview(&plan.clusters)? {
        println!("Operation cancelled by user.");
        return Ok(());
    }

    let base = match &cli.folder {
        Some(folder) => folder.clone(),
        None => std::env::current_dir()?,
    };
    let names = OutputNames {
        gpx: cli.output_gpx.clone(),
        markdown: cli.output_md.clone(),
        csv: cli.output_csv.clone(),
        html: cli.output_html.clone(),
    };
    let style = if cli.advanced_map { MapStyle::Advanced } else { MapStyle::Basic };
    let addresses = config.geocode_addresses.then_some(&*geocoder);

    let written = write_outputs(&plan.clusters, &base.join(ROUTE_DIR), &names, addresses, style)
        .context("Failed to write outputs")?;

    println!("\nFinished! Output files:");
    println!("GPX track: {}", written.gpx.display());
    println!("Markdown summary: {}", written.markdown.display());
    println!("CSV: {}", written.csv.display());
    println!("HTML map: {}", written.html.display());
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn confirm_preview(clusters: &[Cluster]) -> anyhow::Result<bool> {
    println!("\nTrip Clustering Preview:\n");
    for (idx, cluster) in clusters.iter().enumerate() {
        let first = cluster.first();
        println!(
            "Segment {}: {} photos from {} to {} (start: {:.5}, {:.5})",
            idx + 1,
            cluster.len(),
            cluster.start().format("%Y-%m-%d %H:%M"),
            cluster.end().format("%Y-%m-%d %H:%M"),
            first.point.latitude,
            first.point.longitude
        );
    }
    let answer = read_line("\nProceed with file generation? (y/n): ")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn read_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn stdin_prompt(group: &PhotoGroup) -> Option<String> {
    println!("\nFolder: {}", group.name());
    println!(
        "Contains {} photos from {} to {}",
        group.count,
        group.first.format("%Y-%m-%d"),
        group.last.format("%Y-%m-%d")
    );
    println!("Example: {}", group.example);
    match read_line("Enter location (city, country) or press Enter to skip: ") {
        Ok(line) if !line.trim().is_empty() => Some(line.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!("Could not read input: {}", e);
            None
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

fn run_batch(root: &Path, out_dir: &Path, config: &TripConfig) -> anyhow::Result<()> {
    println!("Starting batch processing from {}", root.display());
    let geocoder = make_geocoder();
    let summary = batch_process(root, out_dir, config, &ExifReader, &*geocoder)
        .with_context(|| format!("Batch processing of {} failed", root.display()))?;

    println!(
        "\nBatch processing complete. Created {} trips in {}",
        summary.trips.len(),
        out_dir.display()
    );
    println!("Open {} to browse all trips", out_dir.join("index.html").display());
    Ok(())
}

// ============================================================================
// Custom route
// ============================================================================

fn run_route(cli: &Cli) -> anyhow::Result<()> {
    println!("Creating custom route with {} locations", cli.route_cities.len());

    let dates = parse_route_dates(&cli.route_dates);
    let today = Local::now().date_naive();
    let start: NaiveDate = match &cli.route_start_date {
        Some(s) => parse_date(s).unwrap_or_else(|e| {
            warn!("{}, using today instead", e);
            today
        }),
        None => today,
    };

    let custom: HashMap<_, _> = match &cli.custom_locations_file {
        Some(path) if path.exists() => load_custom_locations(path).unwrap_or_else(|e| {
            warn!("Error loading custom locations file {}: {}", path.display(), e);
            HashMap::new()
        }),
        _ => HashMap::new(),
    };

    let stops = RouteStop::from_names(&cli.route_cities, &dates);
    let geocoder = make_geocoder();
    let points = build_route(&stops, start, &custom, &*geocoder);
    let Some(cluster) = Cluster::new(points) else {
        println!("Could not geocode any locations. Route creation failed.");
        return Ok(());
    };

    let route_dir = std::env::current_dir()?.join(ROUTE_DIR);
    std::fs::create_dir_all(&route_dir)?;
    let gpx_path = route_dir.join(&cli.route_gpx_output);
    let html_path = route_dir.join(&cli.route_html_output);

    gpx_io::write_route(cluster.points(), "Custom Route", &gpx_path).context("Failed to write custom route")?;
    map::write_map(&[cluster], &html_path, MapStyle::Advanced).context("Failed to write custom route")?;

    println!("GPX file saved to {}", gpx_path.display());
    println!("Interactive map saved to {}", html_path.display());
    println!("You can now process your photos using:");
    println!(
        "photo-trip YOUR_PHOTO_FOLDER --gpx-import {}/{} --infer --filename-dates --gpx-as-route",
        ROUTE_DIR, cli.route_gpx_output
    );
    Ok(())
}
