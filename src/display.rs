//! Text output: user and server lines, progress dots, results.

use crate::location::{ClientLocation, CITIES};
use crate::measurements::{bps_to_mbps, Averages};
use crate::progress::{ProgressCallback, ProgressEvent, TestPhase};
use crate::speedtest::directory::Endpoint;
use crate::speedtest::session::MeasurementSession;
use colored::Colorize;
use log::trace;
use std::io::{self, Write};
use std::time::Duration;

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Text with progress dots while transferring.
    Text,
    /// Text results only, for pipes and redirects.
    Silent,
    /// Structured output only.
    Json,
}

impl DisplayMode {
    /// `--json` wins; otherwise dots are only drawn on a terminal.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty {
            DisplayMode::Text
        } else {
            DisplayMode::Silent
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, DisplayMode::Json)
    }
}

/// Prints `Latency: ...` and a dot per throughput tick.
pub struct TextProgress;

impl ProgressCallback for TextProgress {
    fn on_progress(&self, event: ProgressEvent) {
        let mut stdout = io::stdout().lock();

        let _ = match event {
            ProgressEvent::LatencyMeasured { latency, jitter } => writeln!(
                stdout,
                "{} {} {}",
                "Latency:".bold().white(),
                format_latency(latency).bright_cyan(),
                format!("(jitter {})", format_latency(jitter)).dimmed()
            ),
            ProgressEvent::PhaseChange(TestPhase::Download) => {
                write!(stdout, "{} ", "Download Test:".bold().white())
            }
            ProgressEvent::PhaseChange(TestPhase::Upload) => {
                write!(stdout, "{} ", "Upload Test:".bold().white())
            }
            ProgressEvent::Throughput { direction, bytes, elapsed, speed_bps } => {
                trace!(
                    "{}: {} bytes after {:?}, {:.2} Mbit/s",
                    direction,
                    bytes,
                    elapsed,
                    bps_to_mbps(speed_bps)
                );
                write!(stdout, ".")
            }
            ProgressEvent::PhaseComplete(TestPhase::Download | TestPhase::Upload) => {
                writeln!(stdout)
            }
            _ => Ok(()),
        };
        let _ = stdout.flush();
    }
}

pub fn show_user(user: &ClientLocation) {
    if user.ip.is_empty() {
        println!("{} {}", "Testing From:".bold().white(), user.coordinate().to_string().bright_blue());
    } else {
        println!(
            "{} {} {}",
            "Testing From IP:".bold().white(),
            user.ip.bright_blue(),
            format!("({}) [{}]", user.isp, user.coordinate()).bright_blue()
        );
    }

    if let Some(ref label) = user.label {
        println!("{} {}", "Location:".bold().white(), label);
    }
}

pub fn show_server_list(endpoints: &[Endpoint]) {
    for endpoint in endpoints {
        println!("{}", format_server(endpoint));
    }
}

pub fn show_server(endpoint: &Endpoint) {
    println!();
    println!("{} {}", "Target Server:".bold().white(), format_server(endpoint));
}

/// `with_latency` repeats the latency line for modes without progress output.
pub fn show_server_result(session: &MeasurementSession, with_latency: bool) {
    if with_latency {
        println!(
            "{} {}",
            "Latency:".bold().white(),
            format_latency(session.latency()).bright_cyan()
        );
    }

    if let Some(ref error) = session.error {
        println!("{} {}", "Failed:".bold().red(), error.message);
    }

    if session.download.is_some() || session.upload.is_some() {
        print_speeds(&speed_lines(
            ("Download:", session.download_mbps()),
            ("Upload:", session.upload_mbps()),
        ));
    }

    for warning in &session.warnings {
        println!("{} {}", "Note:".yellow(), warning.message.dimmed());
    }

    if let Some(ref validity) = session.validity {
        if !validity.valid {
            println!(
                "{}",
                "Warning: Result seems to be wrong. Please test again.".yellow()
            );
            for reason in &validity.reasons {
                println!("  {}", reason.dimmed());
            }
        }
    }
}

pub fn show_average(averages: &Averages) {
    println!();
    print_speeds(&speed_lines(
        ("Download Avg:", averages.download_mbps),
        ("Upload Avg:", averages.upload_mbps),
    ));
    println!("{}", format!("({} servers)", averages.sessions).dimmed());
}

/// One `label value` pair per line, download first.
fn speed_lines(
    download: (&'static str, Option<f64>),
    upload: (&'static str, Option<f64>),
) -> [(&'static str, String); 2] {
    [
        (download.0, format_speed(download.1)),
        (upload.0, format_speed(upload.1)),
    ]
}

fn print_speeds(lines: &[(&str, String)]) {
    for (label, speed) in lines {
        println!("{} {}", label.bold().white(), speed.bright_cyan());
    }
}

pub fn show_city_list() {
    for (label, lat, lon) in CITIES {
        println!("{:<12} {:>9.4}, {:>9.4}", label, lat, lon);
    }
}

/// `[ 6691]   235.37km Tokyo (Japan) by Example`
pub fn format_server(endpoint: &Endpoint) -> String {
    let distance = match endpoint.distance_km {
        Some(km) => format!("{:8.2}km", km),
        None => format!("{:>8}  ", "-"),
    };

    let mut line = format!("[{:>5}] {} {}", endpoint.id, distance, endpoint.name);
    if !endpoint.country.is_empty() {
        line.push_str(&format!(" ({})", endpoint.country));
    }
    line.push_str(&format!(" by {}", endpoint.sponsor));
    line
}

pub fn format_speed(mbps: Option<f64>) -> String {
    match mbps {
        Some(mbps) => format!("{:5.2} Mbit/s", mbps),
        None => "n/a".to_string(),
    }
}

pub fn format_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(latency) => format!("{:.2}ms", latency.as_secs_f64() * 1000.0),
        None => "unavailable".to_string(),
    }
}
