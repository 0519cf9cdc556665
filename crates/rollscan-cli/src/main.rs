//! rollscan CLI — analyze scanned player-piano rolls.

mod midi;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use rollscan::{RollAnalyzer, RollConfig, RollKind, RollTypeSpec};

type CliError = Box<dyn std::error::Error>;
pub(crate) type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "rollscan")]
#[command(about = "Analyze scanned player-piano rolls: margins, holes, tears, tracker mapping")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a roll scan and write a JSON report.
    Analyze(CliAnalyzeArgs),

    /// Print the tracker-bar constant table for a roll type.
    RollInfo {
        /// Roll family to describe.
        #[arg(long, value_enum, default_value_t = RollTypeArg::Standard88)]
        roll_type: RollTypeArg,
    },
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the input scan (single-channel brightness image).
    #[arg(long)]
    image: PathBuf,

    /// Path to write the analysis report (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional path for a pixel-state overlay PNG.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Optional path for a Standard MIDI File of the note list.
    #[arg(long)]
    midi: Option<PathBuf>,

    /// Roll family of the scan (roll type is not auto-detected).
    #[arg(long, value_enum, default_value_t = RollTypeArg::Standard88)]
    roll_type: RollTypeArg,

    /// Brightness at or above which a pixel reads as non-paper.
    #[arg(long, default_value = "249")]
    brightness_threshold: u8,

    /// Minimum region area (pixels) for a music hole.
    #[arg(long)]
    min_hole_area: Option<u64>,

    /// Maximum hole width as a fraction of the tracker spacing.
    #[arg(long)]
    max_hole_width: Option<f64>,

    /// Width/height ratio above which a hole is rejected.
    #[arg(long)]
    aspect_ratio: Option<f64>,

    /// Major-axis cutoff in degrees for the skew filter.
    #[arg(long)]
    major_axis_cutoff: Option<f64>,

    /// Enable the off-track centroid filter.
    #[arg(long)]
    off_track_filter: bool,
}

/// Roll families accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RollTypeArg {
    WelteRed,
    WelteGreen,
    WelteLicensee,
    DuoArt,
    Standard88,
    Standard65,
}

impl From<RollTypeArg> for RollKind {
    fn from(arg: RollTypeArg) -> Self {
        match arg {
            RollTypeArg::WelteRed => RollKind::WelteRed,
            RollTypeArg::WelteGreen => RollKind::WelteGreen,
            RollTypeArg::WelteLicensee => RollKind::WelteLicensee,
            RollTypeArg::DuoArt => RollKind::DuoArt,
            RollTypeArg::Standard88 => RollKind::Standard88,
            RollTypeArg::Standard65 => RollKind::Standard65,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::RollInfo { roll_type } => run_roll_info(roll_type),
    }
}

fn build_config(args: &CliAnalyzeArgs) -> RollConfig {
    let mut config = RollConfig::for_roll_type(args.roll_type.into());
    config.brightness_threshold = args.brightness_threshold;
    if let Some(v) = args.min_hole_area {
        config.min_hole_area = v;
    }
    if let Some(v) = args.max_hole_width {
        config.max_hole_width_ratio = v;
    }
    if let Some(v) = args.aspect_ratio {
        config.aspect_ratio_threshold = v;
    }
    if let Some(v) = args.major_axis_cutoff {
        config.major_axis_cutoff_deg = v;
    }
    if args.off_track_filter {
        config.notes.off_track_filter = true;
    }
    config
}

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());

    let img = image::open(&args.image).map_err(|e| -> CliError {
        format!("failed to open image {}: {}", args.image.display(), e).into()
    })?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let config = build_config(args);
    let analyzer = RollAnalyzer::new(config);
    let analysis = analyzer.analyze_image(&gray)?;
    let report = analysis.report();

    tracing::info!(
        "Found {} music holes, {} rejected, {} notes, {} tears, {} shifts",
        report.geometry.musical_hole_count,
        report.geometry.bad_hole_count,
        report.geometry.musical_note_count,
        report.geometry.bass_tear_count + report.geometry.treble_tear_count,
        report.geometry.shift_count,
    );
    tracing::info!(
        "Tracker bar: {} holes, separation {:.3}px, offset {:.2}px",
        report.geometry.tracker_hole_count,
        report.geometry.hole_separation,
        report.geometry.hole_offset,
    );

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Report written to {}", args.out.display());

    if let Some(overlay_path) = &args.overlay {
        let overlay = rollscan::overlay::render(&analysis.grid);
        overlay.save(overlay_path)?;
        tracing::info!("Overlay written to {}", overlay_path.display());
    }

    if let Some(midi_path) = &args.midi {
        midi::write_midi(&report, midi_path)?;
        tracing::info!("MIDI written to {}", midi_path.display());
    }

    Ok(())
}

fn run_roll_info(roll_type: RollTypeArg) -> CliResult<()> {
    let spec = RollTypeSpec::for_kind(roll_type.into());
    println!("Roll type:          {}", spec.kind.name());
    println!("Tracker holes:      {}", spec.tracker_holes);
    println!("Bass MIDI key:      {}", spec.bass_midi);
    println!("Treble MIDI key:    {}", spec.treble_midi);
    println!(
        "Bass expression:    track {:3}  midi {}",
        spec.bass_expression.track, spec.bass_expression.midi
    );
    println!(
        "Bass notes:         track {:3}  midi {}",
        spec.bass_notes.track, spec.bass_notes.midi
    );
    println!(
        "Treble notes:       track {:3}  midi {}",
        spec.treble_notes.track, spec.treble_notes.midi
    );
    println!(
        "Treble expression:  track {:3}  midi {}",
        spec.treble_expression.track, spec.treble_expression.midi
    );
    if let Some(rewind) = spec.rewind {
        println!("Rewind hole:        track {:3}  midi {}", rewind.track, rewind.midi);
    }
    println!("Min tracker edge:   {} hole spacings", spec.min_tracker_edge);
    Ok(())
}
