//! SVG Chart Generator for Training Results
//!
//! Generates self-contained SVG files for the convergence history
//! (loss and accuracy per epoch) and the confusion-matrix heatmap.

use std::fs;
use std::path::Path;

use crate::utils::metrics::ConfusionMatrix;

/// Chart styling constants
const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

pub const COLOR_PRIMARY: &str = "#3498db";
pub const COLOR_SECONDARY: &str = "#e67e22";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// Heatmap ramp endpoints (light yellow to dark blue)
const HEAT_LOW: (f64, f64, f64) = (255.0, 255.0, 217.0);
const HEAT_HIGH: (f64, f64, f64) = (8.0, 29.0, 88.0);

/// A data point for a line chart
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A data series for charts
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
}

impl DataSeries {
    /// Build a per-epoch series, numbering epochs from 1
    pub fn from_epochs(name: &str, values: &[f64], color: &str) -> Self {
        Self {
            name: name.to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, &y)| DataPoint { x: (i + 1) as f64, y })
                .collect(),
            color: color.to_string(),
        }
    }
}

/// Generate a line chart SVG
///
/// The y axis spans the data range padded by 5%; the x axis spans the data range.
pub fn generate_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    output_path: &Path,
) -> std::io::Result<()> {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, y_min, y_max) = find_ranges(series);
    let pad = ((y_max - y_min) * 0.05).max(1e-6);
    let (y_min, y_max) = (y_min - pad, y_max + pad);
    // a single epoch still needs a non-zero x span
    let x_max = if x_max > x_min { x_max } else { x_min + 1.0 };

    let to_x = |x: f64| MARGIN_LEFT + ((x - x_min) / (x_max - x_min)) * plot_width;
    let to_y = |y: f64| MARGIN_TOP + plot_height - ((y - y_min) / (y_max - y_min)) * plot_height;

    let mut svg = svg_header(title);

    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);

        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.3}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            value
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));

    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    ));

    for series_data in series {
        if series_data.points.is_empty() {
            continue;
        }

        let path: Vec<String> = series_data
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let cmd = if i == 0 { "M" } else { "L" };
                format!("{} {:.2} {:.2}", cmd, to_x(p.x), to_y(p.y))
            })
            .collect();

        svg.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path.join(" "),
            series_data.color
        ));

        // Markers only while they stay readable
        if series_data.points.len() <= 30 {
            for p in &series_data.points {
                svg.push_str(&format!(
                    r#"<circle cx="{:.2}" cy="{:.2}" r="4" fill="{}" stroke="white" stroke-width="1"/>"#,
                    to_x(p.x),
                    to_y(p.y),
                    series_data.color
                ));
            }
        }
    }

    // X tick labels, at most ten
    if let Some(first) = series.iter().find(|s| !s.points.is_empty()) {
        let step = (first.points.len() / 10).max(1);
        for p in first.points.iter().step_by(step) {
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
                to_x(p.x),
                MARGIN_TOP + plot_height + 20.0,
                COLOR_TEXT,
                p.x
            ));
        }
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for series_data in series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 160.0,
            legend_y,
            series_data.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 140.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&series_data.name)
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");

    fs::write(output_path, svg)
}

/// Generate a confusion-matrix heatmap SVG
///
/// Each cell shows its count and its share of all samples. Tick labels are
/// supplied by the caller in class-index order.
pub fn generate_confusion_heatmap(
    title: &str,
    cm: &ConfusionMatrix,
    tick_labels: &[String],
    output_path: &Path,
) -> std::io::Result<()> {
    let n = cm.num_classes.max(1);
    let plot_size = (CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM).min(CHART_WIDTH - 2.0 * MARGIN_LEFT - 120.0);
    let cell = plot_size / n as f64;
    let left = MARGIN_LEFT + 80.0;
    let top = MARGIN_TOP;
    let max_count = cm.max_count().max(1) as f64;
    let threshold = max_count / 2.0;

    let mut svg = svg_header(title);

    for row in 0..cm.num_classes {
        for col in 0..cm.num_classes {
            let count = cm.get(row, col);
            let t = count as f64 / max_count;
            let x = left + col as f64 * cell;
            let y = top + row as f64 * cell;
            let text_color = if count as f64 > threshold { "white" } else { "black" };

            svg.push_str(&format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" stroke="white" stroke-width="1"/>"#,
                x,
                y,
                cell,
                cell,
                heat_color(t)
            ));
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="Arial, sans-serif" font-size="16" fill="{}">{}</text>"#,
                x + cell / 2.0,
                y + cell / 2.0 - 4.0,
                text_color,
                count
            ));
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="Arial, sans-serif" font-size="13" fill="{}">{:.2}%</text>"#,
                x + cell / 2.0,
                y + cell / 2.0 + 16.0,
                text_color,
                cm.percent_of_total(row, col)
            ));
        }
    }

    for (i, label) in tick_labels.iter().enumerate().take(cm.num_classes) {
        let center = i as f64 * cell + cell / 2.0;
        // predicted ticks along the bottom, rotated 45 degrees
        let bx = left + center;
        let by = top + plot_size + 18.0;
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}" transform="rotate(-45 {:.2} {:.2})">{}</text>"#,
            bx,
            by,
            COLOR_TEXT,
            bx,
            by,
            escape_xml(label)
        ));
        svg.push_str(&format!(
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            left - 8.0,
            top + center + 4.0,
            COLOR_TEXT,
            escape_xml(label)
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">Predicted</text>"#,
        left + plot_size / 2.0,
        CHART_HEIGHT - 10.0,
        COLOR_TEXT
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{:.2}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {:.2})">Actual</text>"#,
        top + plot_size / 2.0,
        COLOR_TEXT,
        top + plot_size / 2.0
    ));

    // Color bar
    let bar_x = left + plot_size + 30.0;
    for i in 0..10 {
        let t = 1.0 - i as f64 / 9.0;
        svg.push_str(&format!(
            r#"<rect x="{:.2}" y="{:.2}" width="20" height="{:.2}" fill="{}"/>"#,
            bar_x,
            top + i as f64 * plot_size / 10.0,
            plot_size / 10.0,
            heat_color(t)
        ));
    }
    svg.push_str(&format!(
        r#"<text x="{:.2}" y="{:.2}" font-family="Arial, sans-serif" font-size="11" fill="{}">{}</text>"#,
        bar_x + 26.0,
        top + 10.0,
        COLOR_TEXT,
        cm.max_count()
    ));
    svg.push_str(&format!(
        r#"<text x="{:.2}" y="{:.2}" font-family="Arial, sans-serif" font-size="11" fill="{}">0</text>"#,
        bar_x + 26.0,
        top + plot_size,
        COLOR_TEXT
    ));

    svg.push_str("</svg>");

    fs::write(output_path, svg)
}

fn svg_header(title: &str) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    ));
    svg
}

fn heat_color(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(HEAT_LOW.0, HEAT_HIGH.0),
        mix(HEAT_LOW.1, HEAT_HIGH.1),
        mix(HEAT_LOW.2, HEAT_HIGH.2)
    )
}

fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for s in series {
        for p in &s.points {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
    }

    if !x_min.is_finite() {
        return (0.0, 1.0, 0.0, 1.0);
    }

    (x_min, x_max, y_min, y_max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_chart_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loss.svg");

        let series = vec![
            DataSeries::from_epochs("train", &[0.69, 0.52, 0.41], COLOR_PRIMARY),
            DataSeries::from_epochs("val", &[0.70, 0.58, 0.49], COLOR_SECONDARY),
        ];

        generate_line_chart("Loss", "Epoch", "Loss", &series, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn test_single_point_chart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.svg");
        let series = vec![DataSeries::from_epochs("train", &[0.5], COLOR_PRIMARY)];

        generate_line_chart("One", "Epoch", "Loss", &series, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_confusion_heatmap_has_counts_and_percentages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cm.svg");
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        let labels = vec!["Brain Tumor=0".to_string(), "Healthy=1".to_string()];

        generate_confusion_heatmap("Confusion matrix", &cm, &labels, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();

        assert!(svg.contains(">2<"));
        assert!(svg.contains("50.00%"));
        assert!(svg.contains("25.00%"));
        assert!(svg.contains("Brain Tumor=0"));
        assert!(svg.contains("Actual"));
        assert!(svg.contains("Predicted"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & c"), "a&lt;b &amp; c");
    }
}
