use chrono::Duration;
use orbit_lookup::{
    extract_orbit_directions, resolve_overlaps, BoundaryType, Config, ExtractorConfig, Interval,
    LeapSecondTable, OrbitDirection, OrbitDirectionSeries, OrbitDirectionTable, Segment, Selection,
    Time,
};
use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use BoundaryType::{End, Middle, Start};
use OrbitDirection::{Ascending as A, Descending as D, Undefined as U};

fn at(text: &str) -> Time {
    Time::parse(text).unwrap()
}

fn open(path: &Path) -> OrbitDirectionTable {
    OrbitDirectionTable::open_orbit_direction(
        path,
        "Orbit directions boundaries in geographic coordinates.",
        &Config::default(),
        Arc::new(LeapSecondTable::builtin()),
    )
    .unwrap()
}

fn series(rows: &[(&str, OrbitDirection, BoundaryType)]) -> OrbitDirectionSeries {
    let mut series = OrbitDirectionSeries::default();
    for &(time, direction, boundary) in rows {
        series.push(at(time), direction, boundary);
    }
    series
}

fn rows(series: &OrbitDirectionSeries) -> Vec<(Time, OrbitDirection, BoundaryType)> {
    series.iter().map(|p| (p.time, p.direction, p.boundary)).collect()
}

#[test]
fn adjacent_products_then_removal_leaves_synthetic_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = open(&dir.path().join("geo.json"));

    let product_a = series(&[
        ("2020-01-01T00:00:00Z", A, Start),
        ("2020-01-01T00:23:00Z", D, Middle),
        ("2020-01-01T00:50:00Z", A, Middle),
        ("2020-01-01T01:00:04Z", U, End),
    ]);
    table
        .update(
            at("2020-01-01T00:00:00Z"),
            at("2020-01-01T01:00:00Z"),
            &product_a,
            "PRODUCT_A".to_string(),
            Duration::zero(),
            Duration::seconds(1),
        )
        .unwrap();

    // extracted with the last samples of PRODUCT_A as leading margin
    let product_b = series(&[
        ("2020-01-01T00:59:54Z", A, Start),
        ("2020-01-01T01:17:00Z", D, Middle),
        ("2020-01-01T01:47:00Z", A, Middle),
        ("2020-01-01T02:00:01Z", U, End),
    ]);
    table
        .update(
            at("2020-01-01T01:00:00Z"),
            at("2020-01-01T02:00:00Z"),
            &product_b,
            "PRODUCT_B".to_string(),
            Duration::seconds(4),
            Duration::seconds(1),
        )
        .unwrap();
    table.verify().unwrap();
    assert_eq!(
        table.data().boundaries(),
        &[Start, Middle, Middle, Middle, Middle, End]
    );
    assert_eq!(table.data().directions(), &[A, D, A, D, A, U]);

    table
        .remove(Selection::Range(Interval::new(
            at("2020-01-01T00:00:00Z"),
            at("2020-01-01T01:00:00Z"),
        )))
        .unwrap();
    table.verify().unwrap();
    let keys: Vec<&String> = table.sources().map(|(_, key)| key).collect();
    assert_eq!(keys, vec!["PRODUCT_B"]);
    assert_eq!(
        rows(table.data()),
        vec![
            (at("2020-01-01T01:00:00Z"), A, Start),
            (at("2020-01-01T01:17:00Z"), D, Middle),
            (at("2020-01-01T01:47:00Z"), A, Middle),
            (at("2020-01-01T02:00:01Z"), U, End),
        ]
    );
}

#[test]
fn save_then_open_reproduces_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geo.json");
    let mut table = open(&path);
    table
        .update(
            at("2021-06-30T23:00:00Z"),
            at("2021-07-01T01:00:00Z"),
            &series(&[
                ("2021-06-30T23:00:00Z", D, Start),
                ("2021-06-30T23:40:12.345Z", A, Middle),
                ("2021-07-01T00:27:01.5Z", D, Middle),
                ("2021-07-01T01:00:01Z", U, End),
            ]),
            "SW_OPER_MODA_SC_1B_20210630".to_string(),
            Duration::zero(),
            Duration::seconds(1),
        )
        .unwrap();
    table.save().unwrap();
    assert!(!table.is_dirty());

    let loaded = open(&path);
    assert!(!loaded.is_dirty());
    assert_eq!(loaded.data(), table.data());
    assert_eq!(loaded.provenance(), table.provenance());
    assert_eq!(loaded.dump(), table.dump());
}

/// Labelled time span used to exercise the resolver.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    start: Time,
    end: Time,
    label: &'static str,
}

impl Segment for Span {
    fn start(&self) -> Time {
        self.start
    }

    fn end(&self) -> Time {
        self.end
    }

    fn trim(&self, start: Time, end: Option<Time>) -> Self {
        Span {
            start: start.latest(self.start),
            end: end.map_or(self.end, |end| end.earliest(self.end)),
            label: self.label,
        }
    }
}

fn span(start: i64, end: i64, label: &'static str) -> Span {
    Span {
        start: Time::from_seconds(start).unwrap(),
        end: Time::from_seconds(end).unwrap(),
        label,
    }
}

#[test]
fn covering_source_hides_lower_priority_source() {
    let low = vec![span(10, 20, "A")];
    let high = vec![span(0, 30, "B")];
    assert_eq!(resolve_overlaps(&[low, high]), vec![span(0, 30, "B")]);
}

#[test]
fn partial_overlap_splits_at_higher_priority_bounds() {
    let low = vec![span(0, 100, "A")];
    let high = vec![span(40, 60, "B")];
    assert_eq!(
        resolve_overlaps(&[low, high]),
        vec![span(0, 40, "A"), span(40, 60, "B"), span(60, 100, "A")]
    );
}

#[test]
fn sinusoid_extrema_through_table() {
    const PERIOD: f64 = 5640.0;
    const DURATION: i64 = 4 * 3600;
    let seconds: Vec<i64> = (0..DURATION).collect();
    let times: Vec<Time> = seconds.iter().map(|&s| Time::from_seconds(s).unwrap()).collect();
    let latitudes: Vec<f64> = seconds
        .iter()
        .map(|&s| 80.0 * (2.0 * PI * s as f64 / PERIOD).sin())
        .collect();

    let extracted =
        extract_orbit_directions(&times, &latitudes, &ExtractorConfig::default()).unwrap();
    let extrema: Vec<f64> = extracted
        .iter()
        .filter(|p| p.boundary == Middle)
        .map(|p| p.time.delta_seconds(Time::EPOCH_2000).value())
        .collect();
    let expected = 2.0 * DURATION as f64 / PERIOD;
    assert!((extrema.len() as f64 - expected).abs() <= 1.0);
    for time in &extrema {
        let nearest = ((time - PERIOD / 4.0) / (PERIOD / 2.0)).round() * PERIOD / 2.0 + PERIOD / 4.0;
        assert!((time - nearest).abs() <= 1.0, "{time} s too far from {nearest} s");
    }

    let dir = tempfile::tempdir().unwrap();
    let mut table = open(&dir.path().join("geo.json"));
    let (first, last) = (times[0], times[times.len() - 1]);
    table
        .update(first, last, &extracted, "SINE".to_string(), Duration::zero(), Duration::seconds(1))
        .unwrap();
    let t = |s: i64| Time::from_seconds(s).unwrap();
    assert_eq!(table.direction_at(t(100)), A);
    assert_eq!(table.direction_at(t(2_000)), D);
    assert_eq!(table.direction_at(t(5_000)), A);
    assert_eq!(table.direction_at(t(-10)), U);
    assert_eq!(table.direction_at(t(DURATION + 10)), U);
}
