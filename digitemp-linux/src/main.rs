use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Local;
use clap::{ArgGroup, Parser};
use ds9097::Ds9097;
use linux_embedded_hal::Delay;

mod commands;
mod config;
mod error;
mod link;
mod report;

use config::Config;
use error::AppError;
use link::SerialPortLink;

/// Read DS18B20 temperature sensors through a DS9097 serial 1-Wire adapter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").args(["init", "walk", "temp", "all"])))]
struct Args {
    /// Discover the sensors on the bus and write them to the config file
    #[arg(short, long)]
    init: bool,
    /// List the ROM codes of every device on the bus
    #[arg(short, long)]
    walk: bool,
    /// Read sensor N (0-based) and print degrees Celsius
    #[arg(short, long, value_name = "N")]
    temp: Option<usize>,
    /// Read every configured sensor (default)
    #[arg(short, long)]
    all: bool,
    /// Serial device of the adapter, overrides the config file
    #[arg(short, long, value_name = "PATH")]
    serial: Option<String>,
    /// Config file
    #[arg(short, long, value_name = "PATH", default_value = "digitemp.conf")]
    config: PathBuf,
    /// Serial read timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_ms: u64,
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    // Parse command line arguments
    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Loads the config file. `--init` rewrites it, so a malformed file only warns there.
fn load_config(args: &Args) -> Result<Config, AppError> {
    match Config::load(&args.config) {
        Err(e @ AppError::Config { .. }) if args.init => {
            log::warn!("{e}, replacing it");
            Ok(Config::default())
        }
        res => res,
    }
}

fn run(args: &Args) -> Result<ExitCode, AppError> {
    let config = load_config(args)?;
    let tty = args.serial.as_deref().unwrap_or(&config.tty);
    // Open the adapter; the link is released when `bus` drops
    let link = SerialPortLink::new(tty, Duration::from_millis(args.timeout_ms));
    log::debug!("adapter on {}, config {}", link.path(), args.config.display());
    let mut bus = Ds9097::new(link);
    let mut delay = Delay;
    let mut out = io::stdout().lock();

    if args.init {
        let found = commands::init(&mut bus, tty)?;
        for (index, rom) in &found.roms {
            writeln!(out, "ROM #{index} : {rom}")?;
        }
        found.save(&args.config)?;
        writeln!(out, "Wrote {}", args.config.display())?;
    } else if args.walk {
        for rom in commands::walk(&mut bus)? {
            writeln!(out, "{rom}")?;
        }
    } else if let Some(index) = args.temp {
        let rom = config.sensor(index)?;
        let temp = commands::read_one(&mut bus, &mut delay, &rom)?;
        writeln!(out, "{:.2}", temp.to_num::<f64>())?;
    } else {
        if !args.all {
            log::debug!("no mode given, reading every sensor");
        }
        let summary = commands::read_all(
            &mut bus,
            &mut delay,
            &config,
            || Local::now().naive_local(),
            &mut out,
            &mut io::stderr().lock(),
        )?;
        if summary.all_failed() {
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
