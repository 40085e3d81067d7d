// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Vallés Puig, Ramon

//! Orbit-direction segment extractor.
//!
//! Turns a sampled latitude signal into orbit-direction blocks:
//!
//! 1. split the samples into continuous runs at gaps above the threshold,
//! 2. smooth each run with a non-uniform 3-point filter (edges untouched),
//! 3. locate sign changes of the first difference ([`lookup_extrema`]),
//! 4. refine each bracketed extremum with a closed-form parabola vertex
//!    ([`find_extremum`]),
//! 5. label every point with the direction in effect after it,
//! 6. frame each run with START / END markers.
//!
//! All emitted times are rounded to whole milliseconds.

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use crate::instant::Time;
use crate::series::{BoundaryType, OrbitDirection, OrbitDirectionSeries};
use chrono::Duration;
use qtty::Seconds;
use std::ops::Range;

/// Extract orbit-direction blocks from `(time, latitude)` samples.
///
/// Times must be valid and strictly increasing, latitudes finite.
pub fn extract_orbit_directions(
    times: &[Time],
    latitudes: &[f64],
    config: &ExtractorConfig,
) -> Result<OrbitDirectionSeries> {
    check_input(times, latitudes)?;
    let resolution = Duration::milliseconds(1);
    let mut output = OrbitDirectionSeries::default();

    for run in continuous_runs(times, config.gap_threshold()) {
        let run_times = &times[run.clone()];
        let run_values = &latitudes[run];
        let first = run_times[0];
        let last = run_times[run_times.len() - 1];
        let end = (last + config.nominal_sampling()).round_to(resolution);

        if run_times.len() < 2 {
            output.push(first.round_to(resolution), OrbitDirection::Undefined, BoundaryType::Start);
            output.push(end, OrbitDirection::Undefined, BoundaryType::End);
            continue;
        }

        let offsets: Vec<f64> = run_times
            .iter()
            .map(|t| t.delta_seconds(first).value())
            .collect();
        let smoothed = low_pass_filter(&offsets, run_values);
        let rising = non_descending(&smoothed);

        let mut block = Block::open(first.round_to(resolution), OrbitDirection::from_rising(rising[0]));
        for index in lookup_extrema(&smoothed) {
            let offset = find_extremum(&offsets, &smoothed, index);
            let time = first.add_seconds(Seconds::new(offset))?.round_to(resolution);
            block.inversion(time, OrbitDirection::from_rising(rising[index]));
        }
        block.close(end, &mut output);
    }
    Ok(output)
}

fn check_input(times: &[Time], values: &[f64]) -> Result<()> {
    if times.len() != values.len() {
        return Err(Error::invalid_input(format!(
            "{} times but {} values",
            times.len(),
            values.len()
        )));
    }
    if times.iter().any(|t| !t.is_valid()) {
        return Err(Error::invalid_input("input contains an invalid time"));
    }
    if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
        return Err(Error::invalid_input(format!(
            "input times are not strictly increasing at #{}",
            index + 1
        )));
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::invalid_input(format!("non-finite value at #{index}")));
    }
    Ok(())
}

/// Points of one block collected before they are committed, so that
/// inversions colliding after rounding can be folded.
struct Block {
    points: Vec<(Time, OrbitDirection)>,
}

impl Block {
    fn open(time: Time, direction: OrbitDirection) -> Self {
        Self {
            points: vec![(time, direction)],
        }
    }

    fn inversion(&mut self, time: Time, direction: OrbitDirection) {
        let (last_time, _) = self.points[self.points.len() - 1];
        if time > last_time {
            self.points.push((time, direction));
        } else if self.points.len() > 1 {
            // Two opposite inversions within one millisecond cancel out.
            self.points.pop();
        } else {
            // An inversion on the block start redefines the start direction.
            self.points[0].1 = direction;
        }
    }

    fn close(self, end: Time, output: &mut OrbitDirectionSeries) {
        for (index, (time, direction)) in self.points.into_iter().enumerate() {
            let boundary = if index == 0 {
                BoundaryType::Start
            } else {
                BoundaryType::Middle
            };
            output.push(time, direction, boundary);
        }
        output.push(end, OrbitDirection::Undefined, BoundaryType::End);
    }
}

/// Index ranges of the maximal runs whose consecutive samples are no more
/// than `threshold` apart.
pub fn continuous_runs(times: &[Time], threshold: Duration) -> Vec<Range<usize>> {
    if times.is_empty() {
        return Vec::new();
    }
    let mut runs = Vec::new();
    let mut run_start = 0;
    for (index, pair) in times.windows(2).enumerate() {
        if pair[1] - pair[0] > threshold {
            runs.push(run_start..index + 1);
            run_start = index + 1;
        }
    }
    runs.push(run_start..times.len());
    runs
}

/// Non-equidistant 3-point smoothing filter preserving the two edge values.
///
/// Interior point `i` becomes
/// `0.5 * (y[i-1] * (1 - α) + y[i] + y[i+1] * α)` with
/// `α = (x[i] - x[i-1]) / (x[i+1] - x[i-1])`.
pub fn low_pass_filter(x: &[f64], y: &[f64]) -> Vec<f64> {
    if y.len() < 3 {
        return y.to_vec();
    }
    let mut result = Vec::with_capacity(y.len());
    result.push(y[0]);
    for i in 1..y.len() - 1 {
        let alpha = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
        result.push(0.5 * (y[i - 1] * (1.0 - alpha) + y[i] + y[i + 1] * alpha));
    }
    result.push(y[y.len() - 1]);
    result
}

/// `true` where the signal does not descend between consecutive samples.
fn non_descending(values: &[f64]) -> Vec<bool> {
    values.windows(2).map(|w| w[1] - w[0] >= 0.0).collect()
}

/// Indices of the samples at which the first difference changes sign.
///
/// Each returned index `i` brackets an extremum between samples `i - 1`,
/// `i` and `i + 1`.
pub fn lookup_extrema(values: &[f64]) -> Vec<usize> {
    let rising = non_descending(values);
    rising
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] != w[1])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Abscissa of the vertex of the parabola through the three samples
/// centred on `index`.
///
/// Falls back to `x[index]` when the samples are collinear.
pub fn find_extremum(x: &[f64], y: &[f64], index: usize) -> f64 {
    let (x0, y0) = (x[index - 1], y[index - 1]);
    let (a1, a2) = (x[index] - x0, x[index + 1] - x0);
    let (b1, b2) = (y[index] - y0, y[index + 1] - y0);
    let (a1b2, a2b1) = (a1 * b2, a2 * b1);
    let vertex = x0 + 0.5 * (a1 * a1b2 - a2 * a2b1) / (a1b2 - a2b1);
    if vertex.is_finite() {
        vertex.clamp(x0, x[index + 1])
    } else {
        x[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesData;
    use std::f64::consts::PI;

    const PERIOD: f64 = 5640.0;

    fn t(seconds: i64) -> Time {
        Time::from_seconds(seconds).unwrap()
    }

    fn sinusoid(seconds: std::ops::Range<i64>) -> (Vec<Time>, Vec<f64>) {
        seconds
            .map(|s| (t(s), 80.0 * (2.0 * PI * s as f64 / PERIOD).sin()))
            .unzip()
    }

    #[test]
    fn test_continuous_runs() {
        let times = vec![t(0), t(1), t(2), t(20), t(21), t(60)];
        let runs = continuous_runs(&times, Duration::seconds(10));
        assert_eq!(runs, vec![0..3, 3..5, 5..6]);
        assert!(continuous_runs(&[], Duration::seconds(10)).is_empty());
    }

    #[test]
    fn test_low_pass_filter_keeps_edges() {
        let x = [0.0, 1.0, 2.0, 4.0];
        let y = [1.0, 3.0, 1.0, 5.0];
        let smoothed = low_pass_filter(&x, &y);
        assert_eq!(smoothed[0], 1.0);
        assert_eq!(smoothed[3], 5.0);
        // α = 0.5 → 0.5 * (0.5 + 3 + 0.5)
        assert!((smoothed[1] - 2.0).abs() < 1e-12);
        // α = 1/3 → 0.5 * (3 * 2/3 + 1 + 5/3)
        assert!((smoothed[2] - (0.5 * (2.0 + 1.0 + 5.0 / 3.0))).abs() < 1e-12);
    }

    #[test]
    fn test_lookup_extrema() {
        assert_eq!(lookup_extrema(&[0.0, 1.0, 2.0, 1.0, 0.0, 1.0]), vec![2, 4]);
        assert!(lookup_extrema(&[0.0, 1.0, 2.0]).is_empty());
        assert!(lookup_extrema(&[]).is_empty());
    }

    #[test]
    fn test_find_extremum_parabola() {
        // y = -(x - 1.3)^2 sampled at 0, 1, 2
        let x = [0.0, 1.0, 2.0];
        let y: Vec<f64> = x.iter().map(|v: &f64| -(v - 1.3).powi(2)).collect();
        let vertex = find_extremum(&x, &y, 1);
        assert!((vertex - 1.3).abs() < 1e-12, "vertex = {vertex}");
        assert_eq!(find_extremum(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 1), 1.0);
    }

    #[test]
    fn test_sinusoid_extrema() {
        let duration = 6 * 3600;
        let (times, values) = sinusoid(0..duration);
        let series = extract_orbit_directions(&times, &values, &ExtractorConfig::default()).unwrap();
        series.verify().unwrap();

        let middles: Vec<_> = series.iter().filter(|p| p.boundary == BoundaryType::Middle).collect();
        let expected = 2.0 * duration as f64 / PERIOD;
        assert!(
            (middles.len() as f64 - expected).abs() <= 1.0,
            "found {} inversions, expected {expected:.2}",
            middles.len()
        );

        for (k, point) in middles.iter().enumerate() {
            let analytic = PERIOD / 4.0 + k as f64 * PERIOD / 2.0;
            let found = point.time.delta_seconds(Time::EPOCH_2000).value();
            assert!((found - analytic).abs() < 1.0, "extremum #{k}: {found} vs {analytic}");
            let direction = if k % 2 == 0 {
                OrbitDirection::Descending
            } else {
                OrbitDirection::Ascending
            };
            assert_eq!(point.direction, direction);
            assert_eq!(point.time.nanos() % 1_000_000, 0);
        }

        let first = series.first().unwrap();
        assert_eq!(first.boundary, BoundaryType::Start);
        assert_eq!(first.direction, OrbitDirection::Ascending);
        let last = series.last().unwrap();
        assert_eq!(last.boundary, BoundaryType::End);
        assert_eq!(last.time, t(duration));
    }

    #[test]
    fn test_gap_splits_blocks() {
        let (mut times, mut values) = sinusoid(0..600);
        let (later_times, later_values) = sinusoid(2000..2600);
        times.extend(later_times);
        values.extend(later_values);
        let series = extract_orbit_directions(&times, &values, &ExtractorConfig::default()).unwrap();
        series.verify().unwrap();
        assert_eq!(series.blocks().len(), 2);
        let ends: Vec<_> = series
            .iter()
            .filter(|p| p.boundary == BoundaryType::End)
            .map(|p| p.time)
            .collect();
        assert_eq!(ends, vec![t(600), t(2600)]);
    }

    #[test]
    fn test_single_sample_run() {
        let series = extract_orbit_directions(&[t(10)], &[1.0], &ExtractorConfig::default()).unwrap();
        let rows: Vec<_> = series.iter().map(|p| (p.time, p.direction, p.boundary)).collect();
        assert_eq!(
            rows,
            vec![
                (t(10), OrbitDirection::Undefined, BoundaryType::Start),
                (t(11), OrbitDirection::Undefined, BoundaryType::End),
            ]
        );
        series.verify().unwrap();
    }

    #[test]
    fn test_empty_input() {
        let series = extract_orbit_directions(&[], &[], &ExtractorConfig::default()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = ExtractorConfig::default();
        assert!(extract_orbit_directions(&[t(0), t(1)], &[0.0], &config).is_err());
        assert!(extract_orbit_directions(&[t(1), t(0)], &[0.0, 1.0], &config).is_err());
        assert!(extract_orbit_directions(&[t(0), t(1)], &[0.0, f64::NAN], &config).is_err());
        assert!(extract_orbit_directions(&[Time::INVALID], &[0.0], &config).is_err());
    }
}
