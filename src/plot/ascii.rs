//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! A plot is a stack of layers. Lines and reference levels are drawn first
//! and only fill blank cells; point layers are drawn last and overwrite.

use crate::domain::Trace;
use crate::stopping::TrendStatistics;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Consecutive points joined by line segments.
    Line(Vec<(f64, f64)>),
    /// Isolated points.
    Points(Vec<(f64, f64)>),
    /// Horizontal level across the whole plot.
    Level(f64),
    /// Vertical marker at an x position.
    Marker(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub label: String,
    pub glyph: char,
    pub kind: LayerKind,
}

impl Layer {
    pub fn line(label: &str, glyph: char, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.to_string(),
            glyph,
            kind: LayerKind::Line(points),
        }
    }

    pub fn points(label: &str, glyph: char, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.to_string(),
            glyph,
            kind: LayerKind::Points(points),
        }
    }

    pub fn level(label: &str, glyph: char, y: f64) -> Self {
        Self {
            label: label.to_string(),
            glyph,
            kind: LayerKind::Level(y),
        }
    }

    pub fn marker(label: &str, glyph: char, x: f64) -> Self {
        Self {
            label: label.to_string(),
            glyph,
            kind: LayerKind::Marker(x),
        }
    }
}

fn trace_points(trace: &Trace, from_pace: Option<i64>) -> Vec<(f64, f64)> {
    trace
        .iter()
        .filter(|(p, _)| from_pace.is_none_or(|start| *p >= start))
        .map(|(p, v)| (p as f64, v))
        .collect()
}

/// Reference trajectory, the extrapolated prediction from the jump onward,
/// and optionally the smart (jumping) run.
pub fn render_extrapolation_plot(
    reference: &Trace,
    predicted: &Trace,
    smart: Option<&Trace>,
    jump_pace: i64,
    asymptote: f64,
    width: usize,
    height: usize,
) -> String {
    let mut layers = vec![
        Layer::line("brute force", '-', trace_points(reference, None)),
        Layer::line("prediction", '~', trace_points(predicted, Some(jump_pace))),
        Layer::level("asymptote", '=', asymptote),
        Layer::marker("jump", '|', jump_pace as f64),
    ];
    if let Some(smart) = smart {
        layers.push(Layer::points("smart", 'o', trace_points(smart, None)));
    }
    render_plot(&layers, width, height)
}

/// `log10(error)` per pace, its rolling average, the floor, and the stop pace.
pub fn render_error_plot(
    stats: &TrendStatistics,
    log_floor: f64,
    stop_index: Option<usize>,
    width: usize,
    height: usize,
) -> String {
    let indexed = |v: &[f64]| v.iter().enumerate().map(|(i, &y)| (i as f64, y)).collect::<Vec<_>>();
    let mut layers = vec![
        Layer::line("rolling average", '-', indexed(&stats.average)),
        Layer::level("floor", '_', log_floor),
    ];
    if let Some(i) = stop_index {
        layers.push(Layer::marker("stop", '|', i as f64));
    }
    layers.push(Layer::points("log10 error", '.', indexed(&stats.logged)));
    render_plot(&layers, width, height)
}

/// Render layers onto a `width` x `height` grid with a header and legend.
pub fn render_plot(layers: &[Layer], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = x_range(layers).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(layers).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    for layer in layers {
        match &layer.kind {
            LayerKind::Line(points) => {
                draw_curve(&mut grid, points, x_min, x_max, y_min, y_max, layer.glyph);
            }
            LayerKind::Level(y) if y.is_finite() => {
                let row = map_y(*y, y_min, y_max, height);
                draw_line(&mut grid, 0, row, width - 1, row, layer.glyph);
            }
            LayerKind::Marker(x) if x.is_finite() => {
                let col = map_x(*x, x_min, x_max, width);
                draw_line(&mut grid, col, 0, col, height - 1, layer.glyph);
            }
            _ => {}
        }
    }
    for layer in layers {
        if let LayerKind::Points(points) = &layer.kind {
            for &(x, y) in points.iter().filter(|(x, y)| x.is_finite() && y.is_finite()) {
                grid[map_y(y, y_min, y_max, height)][map_x(x, x_min, x_max, width)] = layer.glyph;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: pace=[{x_min:.0}, {x_max:.0}] | y=[{y_min:.3e}, {y_max:.3e}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    let legend: Vec<String> = layers.iter().map(|l| format!("{} {}", l.glyph, l.label)).collect();
    out.push_str(&legend.join("  "));
    out.push('\n');

    out
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else if min.is_finite() {
        Some((min - 0.5, max + 0.5))
    } else {
        None
    }
}

fn x_range(layers: &[Layer]) -> Option<(f64, f64)> {
    finite_bounds(layers.iter().flat_map(|l| match &l.kind {
        LayerKind::Line(p) | LayerKind::Points(p) => p.iter().filter(|(_, y)| y.is_finite()).map(|&(x, _)| x).collect(),
        LayerKind::Marker(x) => vec![*x],
        LayerKind::Level(_) => Vec::new(),
    }))
}

fn y_range(layers: &[Layer]) -> Option<(f64, f64)> {
    finite_bounds(layers.iter().flat_map(|l| match &l.kind {
        LayerKind::Line(p) | LayerKind::Points(p) => p.iter().map(|&(_, y)| y).collect(),
        LayerKind::Level(y) => vec![*y],
        LayerKind::Marker(_) => Vec::new(),
    }))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Join consecutive finite points; a non-finite point breaks the line.
fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    ch: char,
) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, ch),
            None => draw_line(grid, col, row, col, row, ch),
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
