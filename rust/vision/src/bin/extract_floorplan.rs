// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: Extract storage units from a site map image (JSON output)
//!
//! Usage:
//!   extract-floorplan <image_path> --output <floor.json> [options]
//!
//! Built with the `cli` feature: `cargo run --features cli --bin extract-floorplan`

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use storemap_vision::{
    detect_floor, load_image, normalize_floor, Catalog, ExpectedMix, ExtractionConfig,
    RunOptions, TesseractCli, UnitMixReport,
};

/// Sample units printed after extraction
const SAMPLE_UNITS: usize = 10;
/// Units without an identifier listed after extraction
const LISTED_MISSING: usize = 20;

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    expected_mix: Option<PathBuf>,
    options: RunOptions,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,storemap_vision=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let parsed = match parse_args(&args[1..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(parsed) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut input = None;
    let mut output = None;
    let mut config = None;
    let mut expected_mix = None;
    let mut options = RunOptions::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .with_context(|| format!("Missing value for {}", arg))
        };
        match arg.as_str() {
            "--output" | "-o" => output = Some(PathBuf::from(value()?)),
            "--target-width" => {
                let raw = value()?;
                let width = raw
                    .parse()
                    .with_context(|| format!("Invalid target width '{}'", raw))?;
                options.target_width = Some(width);
            }
            "--floor-name" => options.floor_name = value()?,
            "--floor-id" => options.floor_id = value()?,
            "--expected-range" => options.expected_range = Some(value()?),
            "--config" => config = Some(PathBuf::from(value()?)),
            "--expected-mix" => expected_mix = Some(PathBuf::from(value()?)),
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            other => {
                if input.is_some() {
                    bail!("Unexpected argument: {}", other);
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    Ok(Args {
        input: input.context("Missing input image")?,
        output: output.context("Missing --output")?,
        config,
        expected_mix,
        options,
    })
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ExtractionConfig::from_json_file(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?,
        None => ExtractionConfig::default(),
    };

    // Step 1: Load image
    println!("Loading image: {}", args.input.display());
    let image = load_image(&args.input)?;
    println!("Image dimensions: {} x {}", image.width(), image.height());

    // Step 2: Detect units and features
    let recognizer = TesseractCli::from_env();
    println!("Text recognition: {}", recognizer.command());
    let mut floor = detect_floor(&image, &config, &recognizer, &args.options);

    // Step 3: Compare against the expected unit mix (source pixels)
    if let Some(path) = &args.expected_mix {
        let expected = ExpectedMix::from_json_file(path)
            .with_context(|| format!("Cannot read expected mix '{}'", path.display()))?;
        let catalog = Catalog::new(config.catalog.clone());
        let report = UnitMixReport::from_units(&floor.units, &catalog, &expected);
        println!("\nUnit mix for {}:", floor.name);
        print!("{}", report);
        if report.is_clean() {
            println!("Unit mix matches the expected counts");
        } else {
            for issue in report.issues() {
                println!("  - {}", issue);
            }
        }
    }

    // Step 4: Rescale and write
    normalize_floor(&mut floor, args.options.target_width);
    let document = floor.to_document();
    write_json(&args.output, &serde_json::to_string_pretty(&document)?)?;

    println!("\nJSON output saved to: {}", args.output.display());
    println!("  Total units: {}", document.stats.total_units);
    println!("  Units with ID: {}", document.stats.units_with_id);
    println!("  Units missing ID: {}", document.stats.units_missing_id);

    println!("\nSample units (first {}):", SAMPLE_UNITS);
    for unit in document.units.iter().take(SAMPLE_UNITS) {
        println!(
            "  Unit {:>4}  x={:>5}  y={:>5}  w={:>4}  h={:>4}  {}",
            unit.id, unit.x, unit.y, unit.w, unit.h, unit.unit_type
        );
    }

    let missing: Vec<_> = document.units.iter().filter(|u| u.id.is_empty()).collect();
    if !missing.is_empty() {
        println!("\nUnits missing IDs ({}):", missing.len());
        for unit in missing.iter().take(LISTED_MISSING) {
            println!("  x={:>5}  y={:>5}  w={:>4}  h={:>4}", unit.x, unit.y, unit.w, unit.h);
        }
        if missing.len() > LISTED_MISSING {
            println!("  ... and {} more", missing.len() - LISTED_MISSING);
        }
    }

    Ok(())
}

fn write_json(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn print_usage() {
    eprintln!("Usage: extract-floorplan <image_path> --output <floor.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <path>        Output JSON file (required)");
    eprintln!("  --target-width <px>        Rescale coordinates to this width");
    eprintln!("  --floor-name <name>        Floor name (default: Ground Floor)");
    eprintln!("  --floor-id <id>            Floor ID (default: floor-1)");
    eprintln!("  --expected-range <A-B>     Valid unit ID range, fixes digit misreads");
    eprintln!("  --config <path>            JSON file overriding calibrated thresholds");
    eprintln!("  --expected-mix <path>      JSON unit counts per size to validate against");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TESSERACT_CMD              Path to the tesseract executable");
    eprintln!("  RUST_LOG                   Log filter (default: info,storemap_vision=debug)");
}
