//! `agcflow`: normalize the level of a WAV file.
//!
//! ```text
//! agcflow <input.wav> <output.wav> [options]
//!
//!   --config <path>      settings JSON (default: user config dir)
//!   --save-config        write the effective settings back to --config
//!   --gain-db <dB>       fixed digital gain, [0, 50)
//!   --no-adaptive        disable the adaptive stage
//!   --vad-attack <p>     speech-probability attack weight, [0, 1]
//!   --split | --no-split force band splitting on or off
//!   --debug              mirror pipeline input and output to WAV files
//!   --debug-dir <dir>    directory for debug WAV mirrors
//! ```
//!
//! Set `RUST_LOG` to change verbosity (default `agcflow=info`).

mod settings;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[derive(Debug, Default)]
struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    save_config: bool,
    gain_db: Option<f32>,
    no_adaptive: bool,
    vad_attack: Option<f32>,
    split: Option<bool>,
    debug: bool,
    debug_dir: Option<String>,
}

const USAGE: &str = "usage: agcflow <input.wav> <output.wav> [--config <path>] [--save-config] \
[--gain-db <dB>] [--no-adaptive] [--vad-attack <p>] [--split|--no-split] [--debug] [--debug-dir <dir>]";

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut positional = Vec::new();
    let mut it = raw.into_iter();

    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--save-config" => args.save_config = true,
            "--gain-db" => {
                let raw = value("--gain-db")?;
                args.gain_db = Some(raw.parse().with_context(|| format!("bad gain {raw:?}"))?);
            }
            "--no-adaptive" => args.no_adaptive = true,
            "--vad-attack" => {
                let raw = value("--vad-attack")?;
                args.vad_attack =
                    Some(raw.parse().with_context(|| format!("bad VAD attack {raw:?}"))?);
            }
            "--split" => args.split = Some(true),
            "--no-split" => args.split = Some(false),
            "--debug" => args.debug = true,
            "--debug-dir" => args.debug_dir = Some(value("--debug-dir")?),
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([input, output]) => {
            args.input = input;
            args.output = output;
            Ok(args)
        }
        Err(_) => bail!("{USAGE}"),
    }
}

/// Command-line values are checked as given; out-of-range values are an
/// error rather than being clamped like a stale settings file.
fn apply_overrides(settings: &mut AppSettings, args: &Args) -> Result<()> {
    if let Some(db) = args.gain_db {
        settings.fixed_digital_gain_db = db;
    }
    if args.no_adaptive {
        settings.adaptive_digital_enabled = false;
    }
    if let Some(p) = args.vad_attack {
        settings.vad_attack_probability = p;
    }
    if args.split.is_some() {
        settings.enable_band_split = args.split;
    }
    if args.debug {
        settings.debug_mirror = true;
    }
    if args.debug_dir.is_some() {
        settings.debug_dir = args.debug_dir.clone();
    }
    if let Err(e) = settings.pipeline_template().gain().check() {
        bail!("invalid command-line option: {e}");
    }
    settings.normalize();
    Ok(())
}

fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agcflow=info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let settings_path = args.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    apply_overrides(&mut settings, &args)?;
    info!(
        settings_path = ?settings_path,
        gain_db = settings.fixed_digital_gain_db,
        adaptive = settings.adaptive_digital_enabled,
        vad_attack = settings.vad_attack_probability,
        debug_mirror = settings.debug_mirror,
        "settings loaded"
    );
    if args.save_config {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("saving settings to {}", settings_path.display()))?;
    }

    let report = agcflow_core::batch::process_wav_file(
        &args.input,
        &args.output,
        &settings.pipeline_template(),
    )
    .with_context(|| format!("processing {}", args.input.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
