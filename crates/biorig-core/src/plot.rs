//! Plot rendering
//!
//! Turns a sample buffer snapshot into a time-in-minutes line chart.

use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::buffer::Sample;

/// Errors drawing a plot
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Nothing to plot: the sample buffer holds no finite samples")]
    Empty,

    #[error("Failed to draw plot {}: {message}", path.display())]
    Draw { path: PathBuf, message: String },
}

/// Unit of the timestamp column sent by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    /// Arduino `millis()`
    #[default]
    Milliseconds,
    /// Seconds
    Seconds,
}

impl TimestampUnit {
    /// Convert a timestamp in this unit to minutes
    pub fn to_minutes(&self, timestamp: f64) -> f64 {
        match self {
            TimestampUnit::Milliseconds => timestamp / 60_000.0,
            TimestampUnit::Seconds => timestamp / 60.0,
        }
    }
}

/// x/y data ready for drawing, x in minutes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotSeries {
    /// Time axis in minutes
    pub minutes: Vec<f64>,
    /// Measured values
    pub values: Vec<f64>,
}

impl PlotSeries {
    /// Build from a buffer snapshot
    pub fn from_samples(samples: &[Sample], unit: TimestampUnit) -> Self {
        let (minutes, values) = samples
            .iter()
            .map(|s| (unit.to_minutes(s.timestamp), s.value))
            .unzip();
        Self { minutes, values }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.minutes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.minutes.is_empty()
    }

    /// Drawable (minutes, value) pairs; `nan`/`inf` readings are skipped
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.minutes
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// Axis ranges over the drawable points, padded so a flat or
    /// single-point series is still visible
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut points = self.points();
        let (x, y) = points.next()?;
        let ((x_min, x_max), (y_min, y_max)) =
            points.fold(((x, x), (y, y)), |((x_lo, x_hi), (y_lo, y_hi)), (x, y)| {
                ((x_lo.min(x), x_hi.max(x)), (y_lo.min(y), y_hi.max(y)))
            });
        Some((pad(x_min, x_max), pad(y_min, y_max)))
    }
}

fn pad(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        let margin = (hi - lo) * 0.05;
        (lo - margin, hi + margin)
    }
}

/// Something that can draw a series
pub trait PlotRenderer {
    /// Draw the series
    fn render(&self, series: &PlotSeries) -> Result<(), PlotError>;
}

/// Writes the chart to an SVG file
#[derive(Debug, Clone)]
pub struct SvgPlotRenderer {
    path: PathBuf,
    size: (u32, u32),
    y_label: String,
}

impl SvgPlotRenderer {
    /// Render to `path` at 500x500
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: (500, 500),
            y_label: "Value".to_string(),
        }
    }

    /// Override the image size in pixels
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Override the y-axis caption
    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    /// Output file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn draw(
        &self,
        series: &PlotSeries,
        ((x_min, x_max), (y_min, y_max)): ((f64, f64), (f64, f64)),
    ) -> Result<(), Box<dyn std::error::Error>> {
        let root = SVGBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Plotting", ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Time (min)")
            .y_desc(self.y_label.as_str())
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        chart.draw_series(LineSeries::new(series.points(), &BLUE))?;

        root.present()?;
        Ok(())
    }
}

impl PlotRenderer for SvgPlotRenderer {
    fn render(&self, series: &PlotSeries) -> Result<(), PlotError> {
        let bounds = series.bounds().ok_or(PlotError::Empty)?;
        self.draw(series, bounds).map_err(|e| PlotError::Draw {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
