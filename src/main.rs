//! pota-adif CLI - Turn a pasted POTA hunter log into an ADIF file.

use anyhow::{Context, Result};
use clap::Parser;
use pota_adif::{
    adif::adif_header,
    config::Config,
    convert::{Conversion, convert},
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// pota-adif - Convert POTA hunter log pastes to ADIF
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hunter log text file ("-" or omitted reads stdin)
    input: Option<PathBuf>,

    /// Previously exported ADIF log; contacts already in it are skipped
    #[arg(short, long)]
    adif: Option<PathBuf>,

    /// Output file ("-" writes to stdout) [default: from config, pota_log.adi]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file [default: ~/.config/pota-adif/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duplicate time window in minutes
    #[arg(short, long)]
    tolerance: Option<u32>,

    /// Also drop repeats inside the pasted log itself
    #[arg(long)]
    within_batch: bool,

    /// Operator callsign for records that do not name one
    #[arg(long, env = "POTA_STATION_CALLSIGN")]
    station_callsign: Option<String>,

    /// Print the conversion as JSON instead of writing ADIF
    #[arg(long)]
    json: bool,

    /// Do not write an ADIF header
    #[arg(long)]
    no_header: bool,

    /// Print a conversion summary to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config = load_config(&args)?;
    debug!("Config: {:?}", config);

    let log_text = read_input(args.input.as_deref())?;
    let prior = match args.adif {
        Some(ref path) => Some(
            fs::read(path)
                .with_context(|| format!("Failed to read ADIF file: {}", path.display()))?,
        ),
        None => None,
    };

    let conversion = convert(&log_text, prior.as_deref(), &config.convert_options())?;

    for warning in &conversion.warnings {
        warn!("Skipped {}", warning);
    }

    if args.verbose {
        eprintln!("{}", conversion.summary);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&conversion)?);
        return Ok(());
    }

    if conversion.records.is_empty() {
        warn!("No new QSOs found in the pasted log");
    }

    let output = args.output.clone().unwrap_or(config.output_file.clone());
    let header = config.write_header && !args.no_header;
    write_output(&output, &conversion, header)?;

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(tolerance) = args.tolerance {
        config.dedup.tolerance_minutes = tolerance;
    }
    if args.within_batch {
        config.dedup.within_batch = true;
    }
    if let Some(ref call) = args.station_callsign {
        config.station_callsign = Some(call.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Read the pasted log from a file or stdin.
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => fs::read_to_string(p)
            .with_context(|| format!("Failed to read log file: {}", p.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read log from stdin")?;
            Ok(text)
        }
    }
}

/// Render the ADIF document for a conversion.
fn render(conversion: &Conversion, header: bool) -> String {
    let mut out = String::new();
    if header {
        out.push_str(&adif_header(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        ));
    }
    out.push_str(&conversion.adif);
    out
}

/// Write the ADIF document to a file or stdout.
fn write_output(path: &Path, conversion: &Conversion, header: bool) -> Result<()> {
    let document = render(conversion, header);
    if path == Path::new("-") {
        io::stdout()
            .write_all(document.as_bytes())
            .context("Failed to write ADIF to stdout")?;
        return Ok(());
    }

    fs::write(path, document)
        .with_context(|| format!("Failed to write ADIF file: {}", path.display()))?;
    info!(
        "Wrote {} QSOs to {}",
        conversion.records.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pota_adif::convert::ConvertOptions;

    #[test]
    fn test_render_with_header() {
        let log = "2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some Park";
        let conversion = convert(log, None, &ConvertOptions::default()).unwrap();

        let with_header = render(&conversion, true);
        assert!(with_header.contains("<eoh>"));
        assert!(with_header.ends_with("<eor>\n"));

        let bare = render(&conversion, false);
        assert!(bare.starts_with("<qso_date:8>20240501"));
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "pota-adif",
            "--config",
            "/nonexistent/pota-adif.toml",
        ]);
        assert!(load_config(&args).is_err());

        let args = Args::parse_from(["pota-adif", "log.txt", "-t", "20", "--within-batch"]);
        assert_eq!(args.input, Some(PathBuf::from("log.txt")));
        assert_eq!(args.tolerance, Some(20));
        assert!(args.within_batch);
    }
}
