use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

use kaiord::adapter::{KrdReader, KrdWriter};
use kaiord::config::ConverterConfig;
use kaiord::fit::{FitReader, FitWriter};
use kaiord::format::Format;
use kaiord::logging::{init_logging, LogLevel};
use kaiord::round_trip::RoundTripValidator;
use kaiord::schema::Krd;
use kaiord::tcx::{TcxReader, TcxValidator, TcxWriter};
use kaiord::tolerance::{ToleranceChecker, ToleranceViolation};
use kaiord::xml::XmlValidationResult;
use kaiord::zwift::{ZwiftReader, ZwiftValidator, ZwiftWriter};

/// kaiord - structured workout converter
///
/// Converts workouts between FIT, TCX, Zwift (.zwo) and the canonical KRD
/// JSON document, and checks that conversions preserve their values.
#[derive(Parser)]
#[command(name = "kaiord")]
#[command(version)]
#[command(about = "Structured workout converter", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a workout file to another format
    Convert {
        /// Input file path (fit, tcx, zwo, json)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Input format (auto-detect if not specified)
        #[arg(long)]
        from: Option<String>,

        /// Output format (auto-detect if not specified)
        #[arg(long)]
        to: Option<String>,
    },

    /// Check a KRD document or an XML workout for structural problems
    Validate {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// File format (auto-detect if not specified)
        #[arg(short = 'f', long)]
        format: Option<String>,
    },

    /// Run a conversion cycle and report values that drift past tolerance
    RoundTrip {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// File format (auto-detect if not specified)
        #[arg(short = 'f', long)]
        format: Option<String>,

        /// Carrier format for KRD input
        #[arg(long, default_value = "fit")]
        via: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ConverterConfig::load_from_file(path)?,
        None => ConverterConfig::load_or_default(),
    };

    // Set up logging based on verbosity
    config.logging.level = match cli.verbose {
        0 => config.logging.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            from,
            to,
        } => {
            let source = resolve_format(from.as_deref(), &input)?;
            let target = resolve_format(to.as_deref(), &output)?;
            println!(
                "{}",
                format!("Converting {} to {}...", source, target).green().bold()
            );

            let krd = read_krd(&input, source, &config)?;
            let bytes = write_krd(&krd, target, &config)?;
            fs::write(&output, bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            println!("  Output: {}", output.display());
            println!("{}", "✓ Conversion completed successfully".green());
        }

        Commands::Validate { input, format } => {
            let format = resolve_format(format.as_deref(), &input)?;
            println!("{}", format!("Validating {} file...", format).blue().bold());

            let issues = validate_file(&input, format, &config)?;
            if issues.is_empty() {
                println!("{}", "✓ No problems found".blue());
            } else {
                println!("{}", format!("✗ {} problem(s) found:", issues.len()).red().bold());
                for issue in &issues {
                    println!("  - {}", issue);
                }
                std::process::exit(1);
            }
        }

        Commands::RoundTrip { input, format, via } => {
            let format = resolve_format(format.as_deref(), &input)?;
            println!("{}", format!("Round-tripping {} file...", format).cyan().bold());

            let violations = round_trip(&input, format, &via, &config)?;
            if violations.is_empty() {
                println!("{}", "✓ Every value is within tolerance".cyan());
            } else {
                println!(
                    "{}",
                    format!("✗ {} value(s) drifted past tolerance:", violations.len())
                        .yellow()
                        .bold()
                );
                for violation in &violations {
                    println!("  - {}", violation);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn resolve_format(explicit: Option<&str>, path: &Path) -> Result<Format> {
    match explicit {
        Some(name) => name.parse::<Format>().map_err(anyhow::Error::msg),
        None => Format::from_path(path).with_context(|| {
            format!(
                "Cannot detect the format of {}; pass it explicitly",
                path.display()
            )
        }),
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn zwift_validator(config: &ConverterConfig) -> ZwiftValidator {
    ZwiftValidator::new(config.zwift_validation_mode())
}

fn read_krd(path: &Path, format: Format, config: &ConverterConfig) -> Result<Krd> {
    let krd = match format {
        Format::Fit => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            FitReader::new().read_to_krd(&bytes)
        }
        Format::Tcx => TcxReader::new().read_to_krd(&read_text(path)?),
        Format::Zwift => ZwiftReader::new()
            .with_validator(zwift_validator(config))
            .read_to_krd(&read_text(path)?),
        Format::Krd => Krd::from_json(&read_text(path)?),
    };
    krd.with_context(|| format!("Failed to convert {}", path.display()))
}

fn write_krd(krd: &Krd, format: Format, config: &ConverterConfig) -> Result<Vec<u8>> {
    let bytes = match format {
        Format::Fit => fit_writer(config).write(krd)?,
        Format::Tcx => tcx_writer(config).write(krd)?.into_bytes(),
        Format::Zwift => ZwiftWriter::new()
            .with_validator(zwift_validator(config))
            .write(krd)?
            .into_bytes(),
        Format::Krd => krd.to_json_pretty()?.into_bytes(),
    };
    Ok(bytes)
}

fn xml_issues(result: XmlValidationResult) -> Vec<String> {
    result.errors.iter().map(ToString::to_string).collect()
}

fn validate_file(path: &Path, format: Format, config: &ConverterConfig) -> Result<Vec<String>> {
    let issues = match format {
        Format::Krd => match Krd::from_json(&read_text(path)?) {
            Ok(_) => Vec::new(),
            Err(kaiord::KaiordError::Validation(issues)) => {
                issues.iter().map(ToString::to_string).collect()
            }
            Err(err) => vec![err.user_message()],
        },
        Format::Tcx => xml_issues(TcxValidator::new().validate(&read_text(path)?)),
        Format::Zwift => xml_issues(zwift_validator(config).validate(&read_text(path)?)),
        Format::Fit => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            match FitReader::new().read_to_krd(&bytes) {
                Ok(_) => Vec::new(),
                Err(err) => vec![err.user_message()],
            }
        }
    };
    Ok(issues)
}

fn round_trip(
    path: &Path,
    format: Format,
    via: &str,
    config: &ConverterConfig,
) -> Result<Vec<ToleranceViolation>> {
    let checker = ToleranceChecker::new(config.tolerances);

    let violations = match format {
        Format::Fit => {
            let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            RoundTripValidator::new(FitReader::new(), fit_writer(config))
                .with_checker(checker)
                .validate_format_to_krd_to_format(&bytes)?
        }
        Format::Tcx => RoundTripValidator::new(TcxReader::new(), tcx_writer(config))
            .with_checker(checker)
            .validate_format_to_krd_to_format(&read_text(path)?)?,
        Format::Zwift => zwift_round_trip(config)
            .with_checker(checker)
            .validate_format_to_krd_to_format(&read_text(path)?)?,
        Format::Krd => {
            let krd = Krd::from_json(&read_text(path)?)?;
            match via.parse::<Format>().map_err(anyhow::Error::msg)? {
                Format::Fit => krd_cycle(
                    RoundTripValidator::new(FitReader::new(), fit_writer(config)),
                    &krd,
                    checker,
                )?,
                Format::Tcx => krd_cycle(
                    RoundTripValidator::new(TcxReader::new(), tcx_writer(config)),
                    &krd,
                    checker,
                )?,
                Format::Zwift => krd_cycle(zwift_round_trip(config), &krd, checker)?,
                Format::Krd => bail!("A KRD document needs a carrier format other than KRD"),
            }
        }
    };
    Ok(violations)
}

fn krd_cycle<R, W>(
    validator: RoundTripValidator<R, W>,
    krd: &Krd,
    checker: ToleranceChecker,
) -> Result<Vec<ToleranceViolation>>
where
    R: KrdReader,
    W: KrdWriter<Payload = R::Payload>,
{
    Ok(validator
        .with_checker(checker)
        .validate_krd_to_format_to_krd(krd)?)
}

fn fit_writer(config: &ConverterConfig) -> FitWriter {
    FitWriter::new().with_profile_version(config.fit.profile_version)
}

fn tcx_writer(config: &ConverterConfig) -> TcxWriter {
    TcxWriter::new().with_output_validation(config.tcx.validate_output)
}

fn zwift_round_trip(config: &ConverterConfig) -> RoundTripValidator<ZwiftReader, ZwiftWriter> {
    RoundTripValidator::new(
        ZwiftReader::new().with_validator(zwift_validator(config)),
        ZwiftWriter::new().with_validator(zwift_validator(config)),
    )
}
