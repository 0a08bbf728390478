//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - history: `-` line (broken at gaps)
//! - forecast: `*` markers joined by `.`

use crate::domain::{CanonicalSeries, ForecastPoint, Period};

/// Render the canonical series and an optional forecast.
pub fn render_series_plot(
    series: &CanonicalSeries,
    forecast: &[ForecastPoint],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let segments = history_segments(series);
    let fc: Vec<(f64, f64)> = forecast
        .iter()
        .map(|p| (p.period.as_fractional_year(), p.value))
        .collect();

    let all = || segments.iter().flatten().chain(fc.iter());
    let Some((x_min, x_max)) = range(all().map(|p| p.0)) else {
        return "Plot: no data\n".to_string();
    };
    let (y_min, y_max) = range(all().map(|p| p.1)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);
    let (x_min, x_max) = if x_max > x_min { (x_min, x_max) } else { (x_min - 0.5, x_max + 0.5) };

    let mut grid = vec![vec![' '; width]; height];
    let frame = Frame {
        x_min,
        x_max,
        y_min,
        y_max,
        width,
        height,
    };

    // History first so the forecast never paints over it.
    for seg in &segments {
        draw_polyline(&mut grid, &frame, seg, '-');
    }
    if !fc.is_empty() {
        let mut path = Vec::with_capacity(fc.len() + 1);
        path.extend(segments.last().and_then(|s| s.last()).copied());
        path.extend(fc.iter().copied());
        draw_polyline(&mut grid, &frame, &path, '.');
        for &(x, y) in &fc {
            grid[frame.row(y)][frame.col(x)] = '*';
        }
    }

    let first = series.first_period().or_else(|| forecast.first().map(|p| p.period));
    let last = forecast.last().map(|p| p.period).or_else(|| series.last_period());

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} .. {} | y=[{y_min:.2}, {y_max:.2}]\n",
        label(first),
        label(last)
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: usize,
    height: usize,
}

impl Frame {
    fn col(&self, x: f64) -> usize {
        let u = ((x - self.x_min) / (self.x_max - self.x_min)).clamp(0.0, 1.0);
        (u * (self.width as f64 - 1.0)).round() as usize
    }

    fn row(&self, y: f64) -> usize {
        let u = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        // y=top is max -> row 0
        (self.height as f64 - 1.0 - (u * (self.height as f64 - 1.0))).round() as usize
    }
}

fn label(p: Option<Period>) -> String {
    p.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Runs of consecutive observed months as `(fractional year, value)` points.
fn history_segments(series: &CanonicalSeries) -> Vec<Vec<(f64, f64)>> {
    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut prev: Option<Period> = None;
    for (period, value) in series.observations() {
        let continues = prev.is_some_and(|p| p.succ() == period);
        if !continues {
            segments.push(Vec::new());
        }
        if let Some(seg) = segments.last_mut() {
            seg.push((period.as_fractional_year(), value));
        }
        prev = Some(period);
    }
    segments
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi.is_finite() {
        Some((lo, hi))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn draw_polyline(grid: &mut [Vec<char>], frame: &Frame, points: &[(f64, f64)], ch: char) {
    let mut prev = None;
    for &(x, y) in points {
        let (c, r) = (frame.col(x), frame.row(y));
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, c, r, ch);
        } else if grid[r][c] == ' ' {
            grid[r][c] = ch;
        }
        prev = Some((c, r));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
