use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use palette::{LinSrgb, Srgb};
use rayon::prelude::*;
use slime_common::{FieldSnapshot, SimulationConfig, SpeciesPalette};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input snapshot file path (.bin)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the config.toml the run used, for the species palette
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory PNG frames are written to
    #[arg(short, long, default_value = "frames")]
    out_dir: PathBuf,

    /// Intensity gain before tone mapping
    #[arg(long, default_value_t = 0.1)]
    gain: f32,

    /// Integer upscale factor for the output frames
    #[arg(long, default_value_t = 1)]
    scale: u32,
}

/// Converts the palette's sRGB colours into linear light once.
fn linear_colors(palette: &SpeciesPalette) -> Vec<LinSrgb<f32>> {
    palette
        .colors()
        .iter()
        .map(|&[r, g, b]| Srgb::new(r, g, b).into_format::<f32>().into_linear::<f32>())
        .collect()
}

/// Maps an encoded intensity into `[0, 1)`.
#[inline(always)]
fn tone_map(value: u16, gain: f32) -> f32 {
    1.0 - (-(value as f32) * gain).exp()
}

/// Renders one snapshot, adding every species' colour in linear light.
fn render_snapshot(snapshot: &FieldSnapshot, colors: &[LinSrgb<f32>], gain: f32) -> Result<RgbImage> {
    if !snapshot.is_consistent() {
        anyhow::bail!(
            "Snapshot at tick {} has {} cells for a {}x{} grid.",
            snapshot.tick, snapshot.cells.len(), snapshot.width, snapshot.height
        );
    }
    if (snapshot.species_count as usize) > colors.len() {
        anyhow::bail!(
            "Snapshot has {} species but the palette has {} colours.",
            snapshot.species_count, colors.len()
        );
    }

    let mut image = RgbImage::new(snapshot.width, snapshot.height);
    for (cell, pixel) in snapshot.cells.iter().zip(image.pixels_mut()) {
        let mut sum = LinSrgb::new(0.0f32, 0.0, 0.0);
        for species in 0..snapshot.species_count {
            let weight = tone_map(snapshot.layout.decode(cell, species), gain);
            let color = colors[species as usize];
            sum = LinSrgb::new(
                sum.red + color.red * weight,
                sum.green + color.green * weight,
                sum.blue + color.blue * weight,
            );
        }
        let clamped = LinSrgb::new(sum.red.min(1.0), sum.green.min(1.0), sum.blue.min(1.0));
        let srgb: Srgb<u8> = Srgb::<f32>::from_linear(clamped).into_format();
        *pixel = Rgb([srgb.red, srgb.green, srgb.blue]);
    }
    Ok(image)
}

/// Reads a `u32` count followed by that many bincode snapshots.
fn read_snapshots(path: &Path) -> Result<Vec<FieldSnapshot>> {
    let input_file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let mut reader = BufReader::new(input_file);

    let snapshot_count: u32 = bincode::deserialize_from(&mut reader)
        .context("Failed to read snapshot count from header")?;
    info!("Found {} snapshots in the file", snapshot_count);

    let mut snapshots = Vec::with_capacity(snapshot_count as usize);
    for i in 0..snapshot_count {
        let snapshot: FieldSnapshot = bincode::deserialize_from(&mut reader)
            .with_context(|| format!("Failed to read snapshot {}", i))?;
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    let _ = Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .try_init();

    info!("Starting Slime Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output directory: {}", args.out_dir.display());

    if args.scale == 0 {
        anyhow::bail!("--scale must be at least 1.");
    }

    let palette = match SimulationConfig::load(&args.config) {
        Ok(config) => {
            info!("Loaded species palette from {}", args.config.display());
            config.palette()?
        }
        Err(e) => {
            warn!(
                "Failed to load config file '{}': {}. Using the default palette.",
                args.config.display(),
                e
            );
            SimulationConfig::default().palette()?
        }
    };
    let colors = linear_colors(&palette);

    let snapshots = read_snapshots(&args.input)?;
    if snapshots.is_empty() {
        warn!("Input file contains no snapshots. Exiting.");
        return Ok(());
    }
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory {}", args.out_dir.display()))?;

    // Set up progress bar
    let progress_bar = ProgressBar::new(snapshots.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let results: Vec<Result<()>> = snapshots
        .par_iter()
        .progress_with(progress_bar.clone())
        .map(|snapshot| -> Result<()> {
            let mut image = render_snapshot(snapshot, &colors, args.gain)?;
            if args.scale > 1 {
                image = imageops::resize(
                    &image,
                    image.width() * args.scale,
                    image.height() * args.scale,
                    FilterType::Nearest,
                );
            }
            let path = args.out_dir.join(format!("frame_{:06}.png", snapshot.tick));
            image
                .save(&path)
                .with_context(|| format!("Failed to write frame {}", path.display()))?;
            Ok(())
        })
        .collect();
    progress_bar.finish();

    let failures: Vec<_> = results.into_iter().filter_map(|r| r.err()).collect();
    for e in &failures {
        warn!("{:#}", e);
    }
    let written = snapshots.len() - failures.len();
    let duration = start_time.elapsed();
    info!(
        "Wrote {} frames in {:.2?} ({:.1} frames per second)",
        written,
        duration,
        written as f64 / duration.as_secs_f64().max(1e-9)
    );
    if written == 0 {
        anyhow::bail!("No frames could be rendered.");
    }
    Ok(())
}

// Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use slime_common::codec::pack_cells;
    use slime_common::ChannelLayout;

    fn snapshot(values: &[f32], species_count: u32, width: u32, height: u32) -> FieldSnapshot {
        let layout = ChannelLayout::for_species(species_count).unwrap();
        FieldSnapshot {
            tick: 0,
            time: 0.0,
            width,
            height,
            species_count,
            layout,
            cells: pack_cells(layout, values, species_count),
            species_totals: vec![0.0; species_count as usize],
            agents: None,
        }
    }

    fn red_green() -> SpeciesPalette {
        SpeciesPalette::new(vec![("red".into(), [255, 0, 0]), ("green".into(), [0, 255, 0])]).unwrap()
    }

    #[test]
    fn empty_cells_render_black() {
        let colors = linear_colors(&red_green());
        let image = render_snapshot(&snapshot(&[0.0; 4], 2, 2, 1), &colors, 0.1).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn species_compose_additively() {
        let colors = linear_colors(&red_green());
        // Cell 0: red only. Cell 1: red and green saturated
        let image = render_snapshot(&snapshot(&[60000.0, 0.0, 60000.0, 60000.0], 2, 2, 1), &colors, 0.1).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 0]);
    }

    #[test]
    fn tone_map_is_monotonic_and_bounded() {
        let mut previous = tone_map(0, 0.1);
        assert_eq!(previous, 0.0);
        for v in [1u16, 10, 100, 1000, u16::MAX] {
            let now = tone_map(v, 0.1);
            assert!(now >= previous && now <= 1.0);
            previous = now;
        }
    }

    #[test]
    fn rejects_snapshots_with_more_species_than_colours() {
        let colors = linear_colors(&red_green());
        assert!(render_snapshot(&snapshot(&[0.0; 3], 3, 1, 1), &colors, 0.1).is_err());
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = Args {
            input: PathBuf::from("does/not/exist.bin"),
            config: PathBuf::from("does/not/exist.toml"),
            out_dir: std::env::temp_dir().join("slime_frames_missing"),
            gain: 0.1,
            scale: 1,
        };
        assert!(run_with_args(args).is_err());
    }
}
