//! Command line tools for pinhole calibration files.
//!
//! Usage:
//! ```bash
//! pinhole-calib export-theia out.xml 36.0 cam0.mp4.calib cam1.mp4.calib
//! pinhole-calib generate --out-dir fixtures
//! pinhole-calib rotate cam0.calib cam0-rotated.calib
//! pinhole-calib rescale cam0.calib cam0-small.calib 960 540
//! pinhole-calib inspect cam0.calib --json
//! pinhole-calib convert cam0.calib cam0.yaml
//! ```

use clap::{Parser, Subcommand};
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::info;
use pinhole_calib::export::{load_cameras, TheiaExporter};
use pinhole_calib::synthetic::{write_fixtures, SyntheticRigConfig};
use pinhole_calib::util::{display_calibration, ensure_output_dir, CalibrationSummary};
use pinhole_calib::{codec, geometry};
use std::path::PathBuf;

/// Pinhole camera calibration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Also write logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a set of calibration files to Theia format
    ExportTheia {
        /// Output XML file
        output: PathBuf,
        /// Physical sensor width in millimetres
        sensor_width_mm: f64,
        /// Calibration files, named <video>.calib
        #[arg(required = true)]
        calibs: Vec<PathBuf>,
        /// Set the third_party attribute of the document
        #[arg(long)]
        third_party: bool,
    },
    /// Write a ring of synthetic cameras looking at a common target
    Generate {
        /// YAML file overriding the default rig
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory for the generated fake-cam-NN.calib files
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Rotate a calibration by 90 degrees about the optical axis
    Rotate { input: PathBuf, output: PathBuf },
    /// Adapt a calibration to a new image size
    Rescale {
        input: PathBuf,
        output: PathBuf,
        width: u32,
        height: u32,
    },
    /// Print the parameters of a calibration
    Inspect {
        input: PathBuf,
        /// Print as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Convert between the legacy layout and the YAML envelope, by extension
    Convert { input: PathBuf, output: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let logger = Logger::try_with_str(&cli.log_level)?;
    let logger = match &cli.log_dir {
        Some(dir) => logger
            .log_to_file(
                FileSpec::default()
                    .directory(dir)
                    .suppress_timestamp()
                    .suffix("log"),
            )
            .duplicate_to_stderr(Duplicate::All)
            .format_for_files(detailed_format),
        None => logger,
    };
    let _logger = logger.format_for_stderr(colored_detailed_format).start()?;

    match cli.command {
        Command::ExportTheia {
            output,
            sensor_width_mm,
            calibs,
            third_party,
        } => {
            let cameras = load_cameras(&calibs)?;
            let mut exporter = TheiaExporter::new(sensor_width_mm);
            exporter.third_party = third_party;
            exporter.write(&output, &cameras)?;
        }
        Command::Generate { config, out_dir } => {
            let config = match config {
                Some(path) => SyntheticRigConfig::load_from_yaml(path)?,
                None => SyntheticRigConfig::default(),
            };
            ensure_output_dir(&out_dir)?;
            for path in write_fixtures(&config, &out_dir)? {
                println!("{}", path.display());
            }
        }
        Command::Rotate { input, output } => {
            let calib = codec::read_calibration(&input)?;
            codec::write_calibration(&output, &geometry::rotate90(&calib))?;
            info!("Rotated {} into {}", input.display(), output.display());
        }
        Command::Rescale {
            input,
            output,
            width,
            height,
        } => {
            let mut calib = codec::read_calibration(&input)?;
            calib.resize_image(width, height)?;
            codec::write_calibration(&output, &calib)?;
            info!(
                "Rescaled {} to {}x{} into {}",
                input.display(),
                width,
                height,
                output.display()
            );
        }
        Command::Inspect { input, json } => {
            let calib = codec::read_calibration(&input)?;
            if json {
                let summary = CalibrationSummary::new(&calib);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                display_calibration(&input.display().to_string(), &calib);
            }
        }
        Command::Convert { input, output } => {
            let calib = codec::read_calibration(&input)?;
            codec::write_calibration(&output, &calib)?;
            info!("Converted {} into {}", input.display(), output.display());
        }
    }

    Ok(())
}
