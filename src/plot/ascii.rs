//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Reflectivity plots show `log10 R` against Q:
//! - observed points: `o`
//! - fitted curve: `-` line
//! - optional highlights: `H` (data above the model), `L` (below)
//!
//! Points with `R <= 0` have no logarithm and are left out.

use crate::domain::{ProfilePoint, ResidualPoint};
use crate::report::Outliers;

/// Render observed vs fitted reflectivity.
pub fn render_ascii_plot(
    residuals: &[ResidualPoint],
    width: usize,
    height: usize,
    outliers: Option<&Outliers>,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let curve: Vec<(f64, f64)> = residuals
        .iter()
        .filter(|r| r.r_fit > 0.0)
        .map(|r| (r.q, r.r_fit.log10()))
        .collect();
    let marked = |q: f64, list: Option<&Vec<ResidualPoint>>| list.is_some_and(|l| l.iter().any(|p| p.q == q));
    let points: Vec<(f64, f64, char)> = residuals
        .iter()
        .filter(|r| r.r_obs > 0.0)
        .map(|r| {
            let ch = if marked(r.q, outliers.map(|o| &o.high)) {
                'H'
            } else if marked(r.q, outliers.map(|o| &o.low)) {
                'L'
            } else {
                'o'
            };
            (r.q, r.r_obs.log10(), ch)
        })
        .collect();

    let xs = points.iter().map(|p| p.0).chain(curve.iter().map(|c| c.0));
    let (q_min, q_max) = range(xs).unwrap_or((0.0, 1.0));
    let ys = points.iter().map(|p| p.1).chain(curve.iter().map(|c| c.1));
    let (y_min, y_max) = range(ys).unwrap_or((-1.0, 0.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let header = format!("Plot: Q=[{q_min:.4}, {q_max:.4}] 1/A | log10 R=[{y_min:.2}, {y_max:.2}]\n");
    let grid = render_grid(&points, &curve, (q_min, q_max), (y_min, y_max), width, height);
    header + &grid
}

/// Render an SLD depth profile (SLD in units of 1e-6 / A^2).
pub fn render_profile_plot(profile: &[ProfilePoint], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let curve: Vec<(f64, f64)> = profile.iter().map(|p| (p.z, p.sld * 1e6)).collect();
    let (z_min, z_max) = range(curve.iter().map(|c| c.0)).unwrap_or((0.0, 1.0));
    let (s_min, s_max) = range(curve.iter().map(|c| c.1)).unwrap_or((0.0, 1.0));
    let (s_min, s_max) = pad_range(s_min, s_max, 0.05);

    let header = format!("Profile: z=[{z_min:.1}, {z_max:.1}] A | SLD=[{s_min:.3}, {s_max:.3}] 1e-6/A^2\n");
    let grid = render_grid(&[], &curve, (z_min, z_max), (s_min, s_max), width, height);
    header + &grid
}

fn render_grid(
    points: &[(f64, f64, char)],
    curve: &[(f64, f64)],
    (x_min, x_max): (f64, f64),
    (y_min, y_max): (f64, f64),
    width: usize,
    height: usize,
) -> String {
    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);

    for &(x, y, ch) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = ch;
    }

    let mut out = String::new();
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

/// Finite min/max of a sequence, if it spans a non-empty interval.
fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
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
