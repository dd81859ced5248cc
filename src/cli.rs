// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for burst capture
//!
//! This module provides command-line functionality for:
//! - Simulating a burst against a synthetic camera
//! - Printing the effective configuration

use burst_capture::memory::{MemorySample, MemoryStatsProvider};
use burst_capture::{BurstCaptureManager, BurstConfig, CaptureError, CaptureOutcome};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Memory usage reported by the simulated device
const SIMULATED_TOTAL_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Options for the `simulate` command
pub struct SimulateOptions {
    pub requests: usize,
    pub capture_ms: u64,
    pub tap_interval_ms: u64,
    pub frame_bytes: usize,
    pub fail_every: Option<usize>,
    pub pressure: bool,
}

/// Memory provider with a fixed usage ratio
struct SimulatedMemory {
    used_bytes: u64,
}

impl MemoryStatsProvider for SimulatedMemory {
    fn sample(&self) -> Option<MemorySample> {
        Some(MemorySample::new(self.used_bytes, SIMULATED_TOTAL_BYTES))
    }
}

/// Load the configuration file if given, otherwise defaults
pub fn load_config(path: Option<&Path>) -> Result<BurstConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(BurstConfig::load(path)?),
        None => Ok(BurstConfig::default()),
    }
}

/// Print the effective configuration as JSON
pub fn print_config(config: &BurstConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Drive a burst of synthetic captures through the manager
pub fn simulate(
    config: BurstConfig,
    options: SimulateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let used_fraction = if options.pressure { 0.95 } else { 0.40 };
    let provider = Arc::new(SimulatedMemory {
        used_bytes: (SIMULATED_TOTAL_BYTES as f64 * used_fraction) as u64,
    });
    let manager = BurstCaptureManager::with_memory_provider(config, provider)?;

    println!(
        "Simulating {} captures ({} ms each, tap every {} ms)",
        options.requests, options.capture_ms, options.tap_interval_ms
    );
    println!();

    let started = Instant::now();
    let completed = Arc::new(AtomicUsize::new(0));
    let outcomes: Arc<Mutex<Vec<(usize, CaptureOutcome)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut accepted = 0;
    let mut rejected = 0;

    for index in 0..options.requests {
        let pool = Arc::clone(manager.buffer_pool());
        let capture_time = Duration::from_millis(options.capture_ms);
        let frame_bytes = options.frame_bytes;
        let should_fail = options
            .fail_every
            .is_some_and(|every| every > 0 && (index + 1) % every == 0);

        let action = move || {
            let mut frame = pool.get(frame_bytes);
            frame.resize(frame_bytes, 0);
            thread::sleep(capture_time);
            pool.recycle(frame);
            if should_fail {
                Err(CaptureError::Failed(format!("simulated failure on frame {}", index)))
            } else {
                Ok(())
            }
        };

        let completed = Arc::clone(&completed);
        let outcomes = Arc::clone(&outcomes);
        let on_complete = move |outcome: CaptureOutcome| {
            completed.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut outcomes) = outcomes.lock() {
                outcomes.push((index, outcome));
            }
        };

        let quality = manager.optimal_quality();
        if manager.request_capture(action, on_complete) {
            accepted += 1;
            println!(
                "  [{:>3}] accepted  quality={:.2} burst={}",
                index,
                quality,
                manager.is_burst_mode_active()
            );
        } else {
            rejected += 1;
            println!("  [{:>3}] rejected  (queue full)", index);
        }

        if options.tap_interval_ms > 0 {
            thread::sleep(Duration::from_millis(options.tap_interval_ms));
        }
    }

    // Wait for everything admitted to finish
    let deadline = Instant::now()
        + Duration::from_millis(options.capture_ms.saturating_mul(accepted as u64 + 1))
        + Duration::from_secs(5);
    while completed.load(Ordering::SeqCst) < accepted && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    println!();
    println!("Completion order:");
    if let Ok(outcomes) = outcomes.lock() {
        for (index, outcome) in outcomes.iter() {
            println!("  [{:>3}] {}", index, outcome);
        }
    }

    let status = manager.status();
    let stats = manager.buffer_pool().stats();
    println!();
    println!("Accepted:        {}", accepted);
    println!("Rejected:        {}", rejected);
    println!("Completed:       {}", completed.load(Ordering::SeqCst));
    println!("Elapsed:         {} ms", started.elapsed().as_millis());
    println!("Burst mode:      {}", status.burst_mode);
    println!("Quality:         {:.2}", status.quality);
    println!("Memory pressure: {}", status.memory_pressure);
    println!(
        "Buffer pool:     {} hits, {} misses, {} discarded, {} evicted",
        stats.hits, stats.misses, stats.discarded, stats.evicted
    );

    manager.shutdown();
    Ok(())
}
