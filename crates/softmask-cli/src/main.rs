//! softmask: post-process segmentation masks from the command line.
//!
//! Reads a source image and one or more raw candidate masks produced by
//! an external point-prompted segmentation engine, runs them through the
//! clean -> feather -> composite pipeline, and writes the ranked results.
//! Useful for:
//!
//! - Comparing feathering curves and band widths on real engine output
//! - Tuning the cleaner radius against speckle and pinholes
//! - Producing the JSON response document a front end consumes
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin softmask -- [OPTIONS] <IMAGE_PATH> --mask mask0.png=0.91 --mask mask1.png=0.55
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use softmask_export::{ResponseDocument, ResponseOptions};
use softmask_pipeline::diagnostics::{Clock, RunDiagnostics};
use softmask_pipeline::{
    Background, FeatherConfig, FeatherMethod, MaskResult, PipelineConfig, Proposal, codec,
};
use tracing::Level;

/// Post-process candidate segmentation masks into soft-edged cut-outs.
///
/// Each `--mask` is cleaned, feathered and composited against the source
/// image; results are ranked by score, best first.
#[derive(Parser)]
#[command(name = "softmask", version)]
struct Cli {
    /// Path to the source image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Candidate mask as `PATH=SCORE`; repeat for every candidate.
    ///
    /// Mask pixels brighter than mid-grey count as foreground.
    #[arg(long = "mask", value_name = "PATH=SCORE", value_parser = parse_mask_arg)]
    masks: Vec<MaskArg>,

    /// Radius of the disk used to remove specks and fill pinholes.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLEAN_RADIUS)]
    clean_radius: u32,

    /// Feathering curve.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_METHOD)]
    method: Method,

    /// Feather band width in pixels; 0 keeps the hard edge.
    #[arg(long, default_value_t = FeatherConfig::DEFAULT_WIDTH)]
    width: u32,

    /// Exponent for the ease-out-power curve.
    #[arg(long, default_value_t = FeatherConfig::DEFAULT_EXPONENT)]
    exponent: f64,

    /// Preview background: `transparent`, `#rrggbb` or `#rrggbbaa`.
    #[arg(long, default_value = "transparent", value_parser = parse_background)]
    background: Background,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Directory to write `<rank>_masked.png` and `<rank>_mask.png` into.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Write the JSON response document to this file.
    #[arg(long)]
    response: Option<PathBuf>,

    /// Keep previews in the response document at full size.
    #[arg(long)]
    no_crop: bool,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of runs for averaging stage durations.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

/// A `--mask PATH=SCORE` argument.
#[derive(Clone, Debug)]
struct MaskArg {
    path: PathBuf,
    score: f32,
}

fn parse_mask_arg(s: &str) -> Result<MaskArg, String> {
    let (path, score) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected PATH=SCORE, got {s:?}"))?;
    let score: f32 = score
        .trim()
        .parse()
        .map_err(|e| format!("invalid score {score:?}: {e}"))?;
    if path.is_empty() {
        return Err(format!("missing mask path in {s:?}"));
    }
    Ok(MaskArg {
        path: PathBuf::from(path),
        score,
    })
}

fn parse_background(s: &str) -> Result<Background, String> {
    Background::parse(s).map_err(|e| e.to_string())
}

/// Feathering curve selection.
#[derive(Clone, Copy, ValueEnum)]
enum Method {
    /// Straight ramp.
    Linear,
    /// Fast rise, slow approach to opaque.
    Exponential,
    /// Half-cosine, smooth at both ends.
    Cosine,
    /// Logistic S-curve.
    Sigmoid,
    /// Quadratic ease-out.
    EaseOutQuad,
    /// Cubic ease-out.
    EaseOutCubic,
    /// Ease-out with a configurable exponent.
    EaseOutPower,
}

/// Maps a [`FeatherMethod`] to the local CLI [`Method`] enum.
const fn method_from_pipeline(m: FeatherMethod) -> Method {
    match m {
        FeatherMethod::Linear => Method::Linear,
        FeatherMethod::Exponential => Method::Exponential,
        FeatherMethod::Cosine => Method::Cosine,
        FeatherMethod::Sigmoid => Method::Sigmoid,
        FeatherMethod::EaseOutQuad => Method::EaseOutQuad,
        FeatherMethod::EaseOutCubic => Method::EaseOutCubic,
        FeatherMethod::EaseOutPower => Method::EaseOutPower,
    }
}

/// The CLI default method, derived from [`FeatherConfig::DEFAULT_METHOD`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_METHOD: Method = method_from_pipeline(FeatherConfig::DEFAULT_METHOD);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        let method = match cli.method {
            Method::Linear => FeatherMethod::Linear,
            Method::Exponential => FeatherMethod::Exponential,
            Method::Cosine => FeatherMethod::Cosine,
            Method::Sigmoid => FeatherMethod::Sigmoid,
            Method::EaseOutQuad => FeatherMethod::EaseOutQuad,
            Method::EaseOutCubic => FeatherMethod::EaseOutCubic,
            Method::EaseOutPower => FeatherMethod::EaseOutPower,
        };
        PipelineConfig {
            clean_radius: cli.clean_radius,
            feather: FeatherConfig::new(method, cli.width).with_exponent(cli.exponent),
            background: cli.background,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn setup_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn load_proposals(masks: &[MaskArg]) -> Result<Vec<Proposal>, String> {
    masks
        .iter()
        .map(|arg| {
            let bytes = read_file(&arg.path)?;
            let mask = codec::decode_mask(&bytes)
                .map_err(|e| format!("Error decoding mask {}: {e}", arg.path.display()))?;
            Ok(Proposal::new(mask, arg.score))
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            tracing::error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;

    let image_bytes = read_file(&cli.image_path)?;
    let source = codec::decode_rgba(&image_bytes)
        .map_err(|e| format!("Error decoding {}: {e}", cli.image_path.display()))?;
    let proposals = load_proposals(&cli.masks)?;

    tracing::info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        masks = proposals.len(),
        "loaded inputs",
    );
    tracing::debug!("config: {config:?}");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut results = Vec::new();

    for run in 0..cli.runs {
        if cli.runs > 1 {
            tracing::info!("run {}/{}", run + 1, cli.runs);
        }
        let (run_results, diagnostics) = softmask_pipeline::run_with_diagnostics(
            &source,
            proposals.clone(),
            &config,
            &StdClock,
        )
        .map_err(|e| format!("Pipeline error: {e}"))?;

        if cli.diagnostics {
            print_diagnostics(&diagnostics, cli.json)?;
        }

        // Keep the outputs of the first run only.
        if run == 0 {
            results = run_results;
        }
        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    for (rank, result) in results.iter().enumerate() {
        let bounds = result.bounds.map_or_else(
            || "empty".to_owned(),
            |b| format!("{}x{}+{}+{}", b.width(), b.height(), b.x_min, b.y_min),
        );
        println!(
            "#{} score={:.4} mask={} bounds={bounds}",
            rank + 1,
            result.score,
            result.index,
        );
    }

    if let Some(ref dir) = cli.out_dir {
        write_outputs(dir, &results)?;
    }

    if let Some(ref path) = cli.response {
        let options = ResponseOptions {
            crop_to_bounds: !cli.no_crop,
        };
        let json = ResponseDocument::from_results(&results, options)
            .and_then(|doc| doc.to_json())
            .map_err(|e| format!("Error building response: {e}"))?;
        std::fs::write(path, &json)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        tracing::info!(
            "response written to {} ({} bytes)",
            path.display(),
            json.len(),
        );
    }

    Ok(())
}

fn print_diagnostics(diagnostics: &RunDiagnostics, json: bool) -> Result<(), String> {
    if json {
        let json = serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

/// Write every result as `<rank>_masked.png` and `<rank>_mask.png`.
fn write_outputs(dir: &Path, results: &[MaskResult]) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    for (rank, result) in results.iter().enumerate() {
        for (suffix, bytes) in [
            ("masked", &result.composited_png),
            ("mask", &result.alpha_mask_png),
        ] {
            let path = dir.join(format!("{}_{suffix}.png", rank + 1));
            std::fs::write(&path, bytes)
                .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
            tracing::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        }
    }
    tracing::info!("{} results written to {}", results.len(), dir.display());
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from per-mask
/// diagnostics.
type StageExtractor = fn(&softmask_pipeline::diagnostics::MaskDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RunDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means over every mask of every run.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Clean", |m| m.clean.duration),
        ("Feather", |m| m.feather.duration),
        ("Composite", |m| m.composite.duration),
        ("Encode", |m| m.encode.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .flat_map(|d| &d.masks)
            .map(|m| extractor(m).as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mask_args_split_on_last_equals() {
        let arg = parse_mask_arg("masks/a=b.png=0.75").unwrap();
        assert_eq!(arg.path, PathBuf::from("masks/a=b.png"));
        assert!((arg.score - 0.75).abs() < f32::EPSILON);

        assert!(parse_mask_arg("mask.png").is_err());
        assert!(parse_mask_arg("mask.png=high").is_err());
        assert!(parse_mask_arg("=0.5").is_err());
    }

    #[test]
    fn default_method_matches_pipeline_default() {
        assert_eq!(FeatherConfig::DEFAULT_METHOD, FeatherMethod::default());
        assert!(matches!(CLI_DEFAULT_METHOD, Method::EaseOutPower));
    }

    #[test]
    fn flags_build_a_config() {
        let cli = Cli::parse_from([
            "softmask",
            "in.png",
            "--method",
            "cosine",
            "--width",
            "6",
            "--clean-radius",
            "2",
            "--background",
            "#102030",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.feather.method, FeatherMethod::Cosine);
        assert_eq!(config.feather.width, 6);
        assert_eq!(config.clean_radius, 2);
        assert_eq!(config.background, Background::Color([0x10, 0x20, 0x30, 255]));
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::parse_from([
            "softmask",
            "in.png",
            "--width",
            "6",
            "--config-json",
            r#"{"clean_radius": 0, "feather": {"method": "sigmoid", "width": 3}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.clean_radius, 0);
        assert_eq!(config.feather.method, FeatherMethod::Sigmoid);
        assert_eq!(config.feather.width, 3);
    }

    #[test]
    fn invalid_exponent_is_rejected() {
        let cli = Cli::parse_from(["softmask", "in.png", "--exponent", "0"]);
        assert!(config_from_cli(&cli).is_err());
    }
}
