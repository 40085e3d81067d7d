// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Conjunction extraction.
//!
//! A conjunction is a local minimum of the great-circle (angular) separation
//! between the ground positions of two spacecraft. Both trajectories are
//! first reduced to the time ranges where *both* provide continuous data;
//! separations and minima are computed per matched range only.

use crate::error::{Error, Result};
use crate::instant::Time;
use crate::intervals::{intersect_intervals, Interval};
use crate::series::{ConjunctionSeries, OrbitSamples};
use chrono::Duration;
use std::cmp::Ordering;

/// Great-circle distance in degrees between two `(latitude, longitude)`
/// positions given in degrees.
pub fn angular_separation(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let a = unit_vector(lat1, lon1);
    let b = unit_vector(lat2, lon2);
    let cosine = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

#[inline]
fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Element-wise angular separation of two equally sampled trajectories.
pub fn angular_separations(first: &OrbitSamples, second: &OrbitSamples) -> Result<Vec<f64>> {
    if first.len() != second.len() {
        return Err(Error::invalid_input(format!(
            "trajectory lengths differ ({} vs {})",
            first.len(),
            second.len()
        )));
    }
    Ok((0..first.len())
        .map(|i| {
            angular_separation(
                first.latitudes[i],
                first.longitudes[i],
                second.latitudes[i],
                second.longitudes[i],
            )
        })
        .collect())
}

/// Sign of `value` as -1, 0 or +1 (NaN counts as 0).
fn signum(value: f64) -> i8 {
    match value.partial_cmp(&0.0) {
        Some(Ordering::Greater) => 1,
        Some(Ordering::Less) => -1,
        _ => 0,
    }
}

/// Indices of the local minima of `values`.
///
/// The slope at `i + 1` is the sign of the central difference
/// `values[i + 2] - values[i]`. Every descending-to-rising transition of the
/// slope opens a window reaching to the next rising slope; the minimum of
/// the window is reported. Flat stretches therefore yield a single minimum.
pub fn local_minima(values: &[f64]) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    let slope: Vec<i8> = values.windows(3).map(|w| signum(w[2] - w[0])).collect();
    let mut minima: Vec<usize> = Vec::new();

    for idx0 in 0..slope.len() - 1 {
        if slope[idx0] >= slope[idx0 + 1] || slope[idx0] != -1 {
            continue;
        }
        let Some(idx1) = (idx0 + 1..slope.len()).find(|&i| slope[i] == 1) else {
            break;
        };
        let window = idx0 + 1..idx1 + 2;
        let offset = window.start;
        let argmin = values[window]
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| offset + i);
        if let Some(index) = argmin {
            if minima.last() != Some(&index) {
                minima.push(index);
            }
        }
    }
    minima
}

/// Time ranges of continuous data assuming a fixed sampling `step`.
///
/// Times are rounded to the step; each range runs from its first sample to
/// one step after its last sample. Samples closer than one step are
/// rejected.
pub fn continuous_ranges(times: &[Time], step: Duration) -> Result<Vec<Interval>> {
    let rounded: Vec<Time> = times.iter().map(|t| t.round_to(step)).collect();
    let Some(&first) = rounded.first() else {
        return Ok(Vec::new());
    };
    let mut ranges = Vec::new();
    let mut range_start = first;
    for pair in rounded.windows(2) {
        let delta = pair[1] - pair[0];
        if delta < step {
            return Err(Error::invalid_input(format!(
                "samples at {} and {} are closer than the {} ms sampling step",
                pair[0],
                pair[1],
                step.num_milliseconds()
            )));
        }
        if delta > step {
            ranges.push(Interval::new(range_start, pair[0] + step));
            range_start = pair[1];
        }
    }
    if let Some(&last) = rounded.last() {
        ranges.push(Interval::new(range_start, last + step));
    }
    Ok(ranges)
}

/// Pairs of trajectory slices covering the time ranges where both
/// trajectories have continuous data.
///
/// The two slices of every pair must share identical time stamps.
pub fn overlapping_samples(
    first: &OrbitSamples,
    second: &OrbitSamples,
    step: Duration,
) -> Result<Vec<(OrbitSamples, OrbitSamples)>> {
    let ranges1 = continuous_ranges(&first.times, step)?;
    let ranges2 = continuous_ranges(&second.times, step)?;
    let mut pairs = Vec::new();
    for overlap in intersect_intervals(&ranges1, &ranges2) {
        let slice1 = first.between(overlap.start, overlap.end);
        let slice2 = second.between(overlap.start, overlap.end);
        if slice1.times != slice2.times {
            return Err(Error::invalid_input(format!(
                "trajectory time stamps differ within {overlap}"
            )));
        }
        pairs.push((slice1, slice2));
    }
    Ok(pairs)
}

/// Detect the conjunctions of two trajectories.
pub fn extract_conjunctions(
    first: &OrbitSamples,
    second: &OrbitSamples,
    step: Duration,
) -> Result<ConjunctionSeries> {
    for samples in [first, second] {
        if samples
            .latitudes
            .iter()
            .chain(&samples.longitudes)
            .any(|v| !v.is_finite())
        {
            return Err(Error::invalid_input("trajectory contains non-finite coordinates"));
        }
    }
    let mut result = ConjunctionSeries::default();
    for (slice1, slice2) in overlapping_samples(first, second, step)? {
        let separations = angular_separations(&slice1, &slice2)?;
        for index in local_minima(&separations) {
            result.push(slice1.times[index], separations[index]);
        }
    }
    Ok(result)
}
