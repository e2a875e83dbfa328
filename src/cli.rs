// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Recognizing a still image
//! - Focus diagnostics
//! - Replaying a frame directory through the full pipeline
//! - Hosting and joining remote sessions

use card_scanner::backends::camera::{ImageSequenceSource, load_image_as_frame};
use card_scanner::backends::recognition::{HttpBackend, Recognition, RecognitionMatch, ScanBackend};
use card_scanner::collection::ScanLog;
use card_scanner::config::Config;
use card_scanner::scanner::{
    CaptureLoopBuilder, FocusScorer, KeypointModel, ManualCapture, ModelLoader, RecognitionClient,
    ReplayModel, ScanEvent, SubmitTarget, event_channel,
};
use card_scanner::session::{RemoteSessionBridge, decode_join_code, parse_join_target};
use chrono::Utc;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Load the configuration from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Config::load()?);
    };
    let mut config = Config::load_from(path)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.scanner.validate()?;
    Ok(config)
}

fn http_backend(config: &Config) -> Result<Arc<dyn ScanBackend>, Box<dyn std::error::Error>> {
    Ok(Arc::new(HttpBackend::from_config(config)?))
}

fn open_log(path: Option<&Path>) -> Result<ScanLog, Box<dyn std::error::Error>> {
    match path {
        Some(path) if path.exists() => Ok(ScanLog::load_from(path)?),
        _ => Ok(ScanLog::new()),
    }
}

fn print_match(card: &RecognitionMatch) {
    println!("  Name:      {}", card.name);
    println!("  Set:       {} ({})", card.set_name, card.set);
    if !card.collector_number.is_empty() {
        println!("  Number:    {}", card.collector_number);
    }
    if let Some(usd) = &card.prices.usd {
        println!("  Price:     ${}", usd);
    }
    if let Some(usd_foil) = &card.prices.usd_foil {
        println!("  Foil:      ${}", usd_foil);
    }
}

fn print_log_summary(log: &ScanLog, path: &Path) {
    println!();
    println!(
        "Scan log: {} cards ({} distinct), ${:.2}",
        log.card_count(),
        log.len(),
        log.total_value()
    );
    println!("Saved to: {}", path.display());
}

/// Recognize a single image
pub fn recognize_image(
    config: &Config,
    image: &Path,
    full: bool,
    log_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_image_as_frame(image)?;
    println!("Image: {}x{}", frame.width, frame.height);

    let region = if full {
        (*frame.image).clone()
    } else {
        let rect = ManualCapture::from_config(&config.scanner).region(frame.width, frame.height);
        println!(
            "Capture region: {}x{} at ({}, {})",
            rect.width, rect.height, rect.x, rect.y
        );
        rect.crop(&frame.image).ok_or("Capture region is empty")?
    };

    let client = RecognitionClient::new(http_backend(config)?);
    let rt = tokio::runtime::Runtime::new()?;
    let recognition = rt.block_on(client.submit(Arc::new(region)))?;

    match recognition {
        Recognition::Match(card) => {
            println!("Found {}", card.name);
            print_match(&card);
            if let Some(path) = log_path {
                let mut log = open_log(Some(path))?;
                log.apply(&card, Utc::now());
                log.save_to(path)?;
                print_log_summary(&log, path);
            }
        }
        Recognition::NoMatch => println!("No match"),
    }
    Ok(())
}

/// Print the focus score of an image against the configured threshold
pub fn focus_report(
    config: &Config,
    image: &Path,
    region_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_image_as_frame(image)?;
    let region = if region_only {
        let rect = ManualCapture::from_config(&config.scanner).region(frame.width, frame.height);
        rect.crop(&frame.image).ok_or("Capture region is empty")?
    } else {
        (*frame.image).clone()
    };

    let scorer = FocusScorer::from_config(&config.scanner);
    let score = scorer.score(&region);
    let verdict = if score >= scorer.threshold() {
        "sharp"
    } else {
        "too blurry"
    };

    println!("Region: {}x{}", region.width(), region.height());
    println!(
        "Focus score: {:.1} (threshold {:.1}, {})",
        score,
        scorer.threshold(),
        verdict
    );
    Ok(())
}

/// Replay a frame directory through the capture loop
pub fn scan_directory(
    config: &Config,
    dir: &Path,
    detections: &Path,
    remote: Option<&str>,
    looping: bool,
    log_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = match remote {
        Some(text) => {
            let session_id = parse_join_target(text)
                .ok_or_else(|| format!("Not a join URL or session id: {}", text))?;
            println!("Uploading into remote session {}", session_id);
            SubmitTarget::RemoteSession(session_id)
        }
        None => SubmitTarget::Recognize,
    };

    let source = ImageSequenceSource::from_dir(dir, config.scanner.target_fps)?.looping(looping);

    let detections_path: PathBuf = detections.to_path_buf();
    let loader: ModelLoader = Box::new(move || -> Result<Box<dyn KeypointModel>, String> {
        Ok(Box::new(ReplayModel::from_file(&detections_path)?))
    });

    let rt = tokio::runtime::Runtime::new()?;
    let client = RecognitionClient::new(http_backend(config)?);
    let (sender, mut receiver) = event_channel();

    let mut capture = CaptureLoopBuilder::new("scan-loop")
        .config(config.scanner.clone())
        .submit_to(target)
        .start(Box::new(source), loader, client, rt.handle().clone(), sender)?;

    // Set up Ctrl+C handler
    let stop_signal = capture.stop_signal();
    ctrlc::set_handler(move || {
        stop_signal.store(true, Ordering::SeqCst);
    })?;

    println!("Scanning {} (press Ctrl+C to stop)", dir.display());
    println!();

    let mut log = open_log(log_path)?;
    let mut last_status = String::new();

    // The stream ends once the loop and its submissions have finished
    rt.block_on(async {
        while let Some(event) = receiver.next().await {
            if let ScanEvent::Recognized { card, .. } = &event {
                log.apply(card, Utc::now());
            }
            let text = event.status_text();
            if text != last_status {
                println!("{}", text);
                last_status = text;
            }
        }
    });
    capture.join();

    if let Some(path) = log_path {
        log.save_to(path)?;
        print_log_summary(&log, path);
    }
    Ok(())
}

/// Host a remote session and print incoming results
pub fn run_session(config: &Config, log_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    let backend = http_backend(config)?;
    let (sender, mut receiver) = event_channel();

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let mut log = open_log(log_path)?;

    rt.block_on(async {
        let _bridge = RemoteSessionBridge::new(backend, config.session.clone()).spawn(sender);

        while !stop_flag.load(Ordering::SeqCst) {
            let event = match tokio::time::timeout(Duration::from_millis(200), receiver.next()).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => continue,
            };

            match &event {
                ScanEvent::SessionStarted { join_url, .. } | ScanEvent::SessionRenewed { join_url, .. } => {
                    println!("{}", event.status_text());
                    println!("Join URL: {}", join_url);
                }
                ScanEvent::Recognized { card, .. } => {
                    println!("{}", event.status_text());
                    print_match(card);
                    log.apply(card, Utc::now());
                }
                _ => println!("{}", event.status_text()),
            }
        }
    });
    println!();
    println!("Session closed");

    if let Some(path) = log_path {
        log.save_to(path)?;
        print_log_summary(&log, path);
    }
    Ok(())
}

/// Decode a join code from an image file
pub fn decode_join(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_image_as_frame(image)?;
    let session_id = decode_join_code(&frame.image).ok_or("No join code found in image")?;
    println!("{}", session_id);
    Ok(())
}

/// Print the effective configuration as JSON
pub fn show_config(
    config: &Config,
    path: Option<&Path>,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Config::default_path)
            .ok_or("No configuration directory available")?;
        config.save_to(&path)?;
        println!("Saved to: {}", path.display());
    }
    Ok(())
}
