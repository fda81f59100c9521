//! Interactive trajectory chart export.
//!
//! Produces a single self-contained HTML file: an inline SVG plot with one
//! line-and-marker series per trail, a legend whose entries toggle their
//! series, and the raw series data embedded as JSON.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tracing::info;
use vtrack_models::{Centroid, TrackColor};
use vtrack_tracker::TrailStore;

use crate::error::{PipelineError, PipelineResult};

const TITLE: &str = "Object Trajectories";
const X_AXIS_TITLE: &str = "X Position";
const Y_AXIS_TITLE: &str = "Y Position";
const TICKS: usize = 5;

/// One trajectory series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub key: String,
    #[serde(serialize_with = "serialize_color")]
    pub color: TrackColor,
    pub points: Vec<Centroid>,
}

/// Trajectory chart over every trail of a run.
#[derive(Debug, Clone)]
pub struct TrajectoryChart {
    series: Vec<ChartSeries>,
}

const WIDTH: u32 = 960;
const HEIGHT: u32 = 600;

/// Plot-area margins: left, right, top, bottom.
const MARGIN: (f64, f64, f64, f64) = (70.0, 20.0, 50.0, 60.0);

impl TrajectoryChart {
    /// Build one series per non-empty trail, in first-encounter order.
    pub fn from_trails(trails: &TrailStore) -> Self {
        let series = trails
            .trails()
            .iter()
            .filter(|trail| !trail.points.is_empty())
            .map(|trail| ChartSeries {
                key: trail.key.clone(),
                color: TrackColor::for_identity(trail.id),
                points: trail.points.clone(),
            })
            .collect();

        Self { series }
    }

    pub fn series(&self) -> &[ChartSeries] {
        &self.series
    }

    /// Render the chart as a complete HTML document.
    pub fn render(&self) -> PipelineResult<String> {
        let data = serde_json::to_string(&self.series)
            .map_err(|e| PipelineError::chart_failed(e.to_string()))?
            // Keep the payload from closing its script element
            .replace("</", "<\\/");

        let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        let _ = writeln!(html, "    <title>{}</title>", TITLE);
        html.push_str(STYLE);
        html.push_str("</head>\n<body>\n");
        let _ = writeln!(html, "<h1>{}</h1>", TITLE);
        html.push_str("<div class=\"chart\">\n");
        html.push_str(&self.render_svg());
        html.push_str(&self.render_legend());
        html.push_str("</div>\n");
        let _ = writeln!(
            html,
            "<script type=\"application/json\" id=\"trajectory-data\">{}</script>",
            data
        );
        html.push_str(TOGGLE_SCRIPT);
        html.push_str("</body>\n</html>\n");

        Ok(html)
    }

    /// Render and write the chart to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render()?)?;
        info!(path = %path.display(), series = self.series.len(), "Wrote trajectory chart");
        Ok(())
    }

    fn render_svg(&self) -> String {
        let scale = Scale::fit(&self.series, f64::from(WIDTH), f64::from(HEIGHT));
        let mut svg = String::new();

        let _ = writeln!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            w = WIDTH,
            h = HEIGHT
        );
        svg.push_str(&scale.axes());

        for (index, series) in self.series.iter().enumerate() {
            let color = series.color.to_hex();
            let _ = writeln!(
                svg,
                "<g class=\"series\" id=\"series-{}\" data-key=\"{}\">",
                index,
                escape_html(&series.key)
            );

            let path: Vec<String> = series
                .points
                .iter()
                .map(|p| format!("{:.2},{:.2}", scale.x(p.x), scale.y(p.y)))
                .collect();
            let _ = writeln!(
                svg,
                "  <polyline points=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>",
                path.join(" "),
                color
            );

            for point in &series.points {
                let _ = writeln!(
                    svg,
                    "  <circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"4\" fill=\"{}\"><title>{} ({}, {})</title></circle>",
                    scale.x(point.x),
                    scale.y(point.y),
                    color,
                    escape_html(&series.key),
                    point.x,
                    point.y
                );
            }
            svg.push_str("</g>\n");
        }

        svg.push_str("</svg>\n");
        svg
    }

    fn render_legend(&self) -> String {
        let mut legend = String::from("<ul class=\"legend\">\n");
        for (index, series) in self.series.iter().enumerate() {
            let _ = writeln!(
                legend,
                "  <li data-series=\"series-{}\"><span class=\"swatch\" style=\"background:{}\"></span>{}</li>",
                index,
                series.color.to_hex(),
                escape_html(&series.key)
            );
        }
        legend.push_str("</ul>\n");
        legend
    }
}

/// Maps data coordinates into the plot area.
struct Scale {
    min: (f64, f64),
    span: (f64, f64),
    origin: (f64, f64),
    size: (f64, f64),
}

impl Scale {
    fn fit(series: &[ChartSeries], width: f64, height: f64) -> Self {
        let mut points = series.iter().flat_map(|s| s.points.iter());
        let (mut lo, mut hi) = match points.next() {
            Some(p) => ((p.x, p.y), (p.x, p.y)),
            None => ((0, 0), (1, 1)),
        };
        for p in points {
            lo = (lo.0.min(p.x), lo.1.min(p.y));
            hi = (hi.0.max(p.x), hi.1.max(p.y));
        }

        let (left, right, top, bottom) = MARGIN;
        Self {
            min: (lo.0 as f64, lo.1 as f64),
            span: (
                (f64::from(hi.0) - f64::from(lo.0)).max(1.0),
                (f64::from(hi.1) - f64::from(lo.1)).max(1.0),
            ),
            origin: (left, top),
            size: (width - left - right, height - top - bottom),
        }
    }

    fn x(&self, value: i32) -> f64 {
        self.origin.0 + (value as f64 - self.min.0) / self.span.0 * self.size.0
    }

    /// Larger values plot higher.
    fn y(&self, value: i32) -> f64 {
        self.origin.1 + self.size.1 - (value as f64 - self.min.1) / self.span.1 * self.size.1
    }

    fn axes(&self) -> String {
        let (x0, y0) = self.origin;
        let (w, h) = self.size;
        let bottom = y0 + h;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "<rect class=\"plot\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/>",
            x0, y0, w, h
        );

        for i in 0..=TICKS {
            let t = i as f64 / TICKS as f64;
            let (px, py) = (x0 + t * w, bottom - t * h);
            let _ = writeln!(
                out,
                "<text class=\"tick\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\">{:.0}</text>",
                px,
                bottom + 18.0,
                self.min.0 + t * self.span.0
            );
            let _ = writeln!(
                out,
                "<text class=\"tick\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\">{:.0}</text>",
                x0 - 8.0,
                py + 4.0,
                self.min.1 + t * self.span.1
            );
        }

        let _ = writeln!(
            out,
            "<text class=\"axis-title\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\">{}</text>",
            x0 + w / 2.0,
            bottom + 45.0,
            X_AXIS_TITLE
        );
        let _ = writeln!(
            out,
            "<text class=\"axis-title\" x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" transform=\"rotate(-90 {:.2} {:.2})\">{}</text>",
            x0 - 50.0,
            y0 + h / 2.0,
            x0 - 50.0,
            y0 + h / 2.0,
            Y_AXIS_TITLE
        );
        out
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn serialize_color<S: serde::Serializer>(color: &TrackColor, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&color.to_hex())
}

const STYLE: &str = r#"    <style>
        body { font-family: sans-serif; margin: 2em; }
        .chart { display: flex; gap: 1.5em; align-items: flex-start; }
        .plot { fill: #fafafa; stroke: #999; }
        .tick { font-size: 11px; fill: #555; }
        .axis-title { font-size: 13px; fill: #222; }
        .legend { list-style: none; padding: 0; }
        .legend li { cursor: pointer; margin: 0.3em 0; user-select: none; }
        .legend li.hidden { opacity: 0.35; }
        .swatch { display: inline-block; width: 12px; height: 12px; margin-right: 0.5em; }
    </style>
"#;

const TOGGLE_SCRIPT: &str = r#"<script>
document.querySelectorAll('.legend li').forEach(function (item) {
    item.addEventListener('click', function () {
        var series = document.getElementById(item.dataset.series);
        var hidden = item.classList.toggle('hidden');
        series.style.display = hidden ? 'none' : '';
    });
});
</script>
"#;
