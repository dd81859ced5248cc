// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use burst_capture::burst::select_tier;
use burst_capture::constants::{QualityLevels, QualityTier, format_bytes};

#[test]
fn test_quality_tier_values() {
    // Test that all tiers exist (Low through Default)
    assert_eq!(QualityTier::ALL.len(), 5);
}

#[test]
fn test_quality_tier_ordering() {
    // Test that tiers are ordered from lowest to highest quality
    let levels = QualityLevels::default();
    let mut prev_quality = 0.0f32;
    for tier in QualityTier::ALL {
        let quality = levels.value(tier);
        assert!(
            quality >= prev_quality,
            "Tiers should be ordered from lowest to highest"
        );
        prev_quality = quality;
    }
    assert!(levels.is_ordered());
}

#[test]
fn test_default_quality_levels() {
    let levels = QualityLevels::default();
    assert_eq!(levels.value(QualityTier::Default), 0.95);
    assert_eq!(levels.value(QualityTier::Burst), 0.85);
    assert!((0.60..=0.65).contains(&levels.value(QualityTier::Low)));
    assert!((0.65..=0.70).contains(&levels.value(QualityTier::LowMedium)));
    assert!((0.75..=0.80).contains(&levels.value(QualityTier::Medium)));
}

#[test]
fn test_quality_tier_display_names() {
    // Test that all tiers have non-empty display names
    for tier in QualityTier::ALL {
        let name = tier.display_name();
        assert!(!name.is_empty(), "Tier {:?} has empty display name", tier);
    }
}

#[test]
fn test_quality_degrades_with_load() {
    // Holding pressure fixed, quality never rises as load grows
    let levels = QualityLevels::default();
    for pressure in [false, true] {
        let mut prev = f32::MAX;
        for load in 0..32 {
            let burst = load > 2;
            let quality = levels.value(select_tier(load, pressure, burst));
            assert!(quality <= prev, "Quality rose at load {}", load);
            prev = quality;
        }
    }
}

#[test]
fn test_format_bytes() {
    assert_eq!(format_bytes(512), "512 B");
    assert_eq!(format_bytes(16 * 1024), "16 KiB");
    assert_eq!(format_bytes(1024 * 1024), "1 MiB");
    assert_eq!(format_bytes(1536 * 1024), "1.5 MiB");
}
