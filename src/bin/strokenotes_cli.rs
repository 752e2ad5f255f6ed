//! StrokeNotes CLI - Bridge interface for the upload UI
//!
//! Commands: fonts, check, generate
//! Outputs JSON to stdout
//! Returns 1 on fatal errors, 2 when some rows were skipped

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use base64::Engine as _;
use strokenotes_core::{
    BatchConfig, BatchPipeline, Color, Dataset, HersheyFontSet, MissingValuePolicy, StrokeFont,
    Template,
};

#[derive(Parser)]
#[command(name = "strokenotes-cli")]
#[command(about = "StrokeNotes CLI - Personalized stroke-font SVG notes from a CSV")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Batch configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the Hershey .jhf glyph files
    #[arg(short, long)]
    fonts_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported fonts and how many glyphs are loaded for each
    Fonts,

    /// Check a template against a dataset without rendering
    Check {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Render every row and write the archive
    Generate {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        style: StyleArgs,

        /// Archive path (defaults to the configured archive name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Embed the archive as base64 in the JSON output instead of writing it
        #[arg(long)]
        inline: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Dataset file (.csv, or .json array of records)
    #[arg(short, long)]
    dataset: PathBuf,

    /// Message template, e.g. "Hi [First Name], thanks for your order!"
    #[arg(short, long)]
    template: String,

    /// Column used to name the output files
    #[arg(long)]
    identity_column: Option<String>,

    /// What to do with rows lacking a placeholder value
    #[arg(long, value_enum)]
    missing: Option<MissingArg>,
}

#[derive(Args)]
struct StyleArgs {
    #[arg(long)]
    font: Option<String>,

    #[arg(long)]
    stroke_color: Option<String>,

    #[arg(long)]
    stroke_width: Option<f64>,

    #[arg(long)]
    background: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MissingArg {
    Warn,
    Skip,
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": message.to_string(),
    });
    println!("{}", output);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match BatchConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => return fail(format!("Failed to load config '{}': {}", path.display(), e)),
        },
        None => BatchConfig::default(),
    };
    if let Some(dir) = cli.fonts_dir {
        config.fonts_dir = Some(dir);
    }

    let fonts_dir = config.fonts_dir.clone().unwrap_or_else(|| PathBuf::from("fonts"));
    let fonts = match HersheyFontSet::load_dir(&fonts_dir) {
        Ok(f) => f,
        Err(e) => return fail(format!("Failed to load fonts from '{}': {}", fonts_dir.display(), e)),
    };

    match cli.command {
        Commands::Fonts => {
            let listing: Vec<_> = StrokeFont::ALL
                .iter()
                .map(|f| serde_json::json!({
                    "id": f.name(),
                    "file": format!("{}.jhf", f.file_stem()),
                    "glyphs": fonts.glyph_count(*f),
                }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing).unwrap_or_default());
            ExitCode::SUCCESS
        }

        Commands::Check { input } => {
            apply_input_args(&mut config, &input);
            let dataset = match Dataset::load(&input.dataset) {
                Ok(d) => d,
                Err(e) => return fail(e),
            };
            let template = Template::new(input.template);
            let pipeline = BatchPipeline::new(Box::new(fonts), config);
            let result = pipeline.check(&dataset, &template);

            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Generate { input, style, output, inline } => {
            apply_input_args(&mut config, &input);
            if let Err(e) = apply_style_args(&mut config, &style) {
                return fail(e);
            }

            let template = Template::new(input.template);
            let pipeline = BatchPipeline::new(Box::new(fonts), config);
            let result = match pipeline.run_path(&input.dataset, &template) {
                Ok(r) => r,
                Err(e) => return fail(e),
            };

            let report = &result.report;
            let mut json = serde_json::json!({
                "success": true,
                "report": report,
                "skip_summary": report.skip_summary(),
            });

            if inline {
                json["archive_base64"] = serde_json::Value::String(
                    base64::engine::general_purpose::STANDARD.encode(&result.archive),
                );
            } else {
                let path = output.unwrap_or_else(|| PathBuf::from(&report.archive_name));
                if let Err(e) = fs::write(&path, &result.archive) {
                    return fail(format!("Failed to write archive '{}': {}", path.display(), e));
                }
                json["archive_path"] = serde_json::Value::String(path.display().to_string());
            }

            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
            if report.skipped.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn apply_input_args(config: &mut BatchConfig, input: &InputArgs) {
    if let Some(column) = &input.identity_column {
        config.identity_column = column.clone();
    }
    if let Some(missing) = input.missing {
        config.missing_values = match missing {
            MissingArg::Warn => MissingValuePolicy::Warn,
            MissingArg::Skip => MissingValuePolicy::Skip,
        };
    }
}

fn apply_style_args(config: &mut BatchConfig, style: &StyleArgs) -> Result<(), strokenotes_core::OptionsError> {
    let render = &mut config.render;
    if let Some(font) = &style.font {
        render.font = font.parse()?;
    }
    if let Some(color) = &style.stroke_color {
        render.stroke_color = Color::parse(color)?;
    }
    if let Some(width) = style.stroke_width {
        render.stroke_width = width;
    }
    if let Some(background) = &style.background {
        render.background = Some(Color::parse(background)?);
    }
    render.validate()
}
