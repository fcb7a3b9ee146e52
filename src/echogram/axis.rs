use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::echogram::binning::AxisMap;
/// Tick mark handed to the display layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AxisTick {
    /// Position along the axis in raster pixels, 0 at the first cell edge.
    pub pixel: f64,
    pub value: f64,
    pub label: String,
}
const TIME_STEPS_SECS: [f64; 16] = [
    1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0,
    21600.0, 86400.0,
];
/// 1-2-5 step giving at most `count` intervals over `span`.
pub fn nice_step(span: f64, count: usize) -> f64 {
    if span <= 0.0 || count == 0 {
        return 1.0;
    }
    let raw = span / count as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|&s| s >= raw)
        .unwrap_or(10.0 * magnitude)
}
fn ticks_with_step(map: &AxisMap, step: f64, label: impl Fn(f64) -> String) -> Vec<AxisTick> {
    let span = map.span();
    if span <= 0.0 {
        return vec![AxisTick {
            pixel: 0.0,
            value: map.min,
            label: label(map.min),
        }];
    }
    let first = (map.min / step).ceil() as i64;
    let last = (map.max / step).floor() as i64;
    (first..=last)
        .map(|k| {
            let value = k as f64 * step;
            AxisTick {
                pixel: (value - map.min) / span * map.bins as f64,
                value,
                label: label(value),
            }
        })
        .collect()
}
pub fn format_time(secs: f64, with_date: bool) -> String {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(whole as i64, nanos) {
        Some(t) if with_date => t.format("%Y-%m-%d %H:%M").to_string(),
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => format!("{secs:.0}"),
    }
}
pub fn time_ticks(map: &AxisMap, count: usize) -> Vec<AxisTick> {
    let raw = map.span() / count.max(1) as f64;
    let step = TIME_STEPS_SECS
        .into_iter()
        .find(|&s| s >= raw)
        .unwrap_or_else(|| (raw / 86400.0).ceil() * 86400.0);
    let with_date = step >= 86400.0;
    ticks_with_step(map, step, |v| format_time(v, with_date))
}
pub fn depth_ticks(map: &AxisMap, count: usize) -> Vec<AxisTick> {
    let step = nice_step(map.span(), count);
    let decimals = if step >= 1.0 { 0 } else { 1 };
    ticks_with_step(map, step, |v| format!("{v:.decimals$} m"))
}
