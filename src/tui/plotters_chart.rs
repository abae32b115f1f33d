//! Plotters-powered error-series chart widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description; series and bounds are computed outside
/// the render call.
pub struct ErrorPlottersChart<'a> {
    /// `log10(error)` per pace index.
    pub logged: &'a [(f64, f64)],
    /// Rolling average, split into finite runs.
    pub average: &'a [Vec<(f64, f64)>],
    /// Horizontal `log10` floor.
    pub floor: f64,
    /// Index of the stopping pace, if reached.
    pub stop: Option<f64>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: String,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl<'a> Widget for ErrorPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to build a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(&self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let average_color = RGBColor(0, 255, 255); // cyan
            let floor_color = RGBColor(255, 255, 0); // yellow
            let stop_color = RGBColor(0, 255, 0); // green

            // Pixels rather than `Circle`: the backend maps circle radii to
            // normalized canvas units and draws them far too large.
            chart.draw_series(self.logged.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;

            for run in self.average {
                chart.draw_series(LineSeries::new(run.iter().copied(), &average_color))?;
            }

            if self.floor.is_finite() && self.floor >= y0 && self.floor <= y1 {
                chart.draw_series(LineSeries::new([(x0, self.floor), (x1, self.floor)], &floor_color))?;
            }

            if let Some(stop) = self.stop.filter(|s| s.is_finite()) {
                chart.draw_series(LineSeries::new([(stop, y0), (stop, y1)], &stop_color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
