//! SVG charts of a split's judged scores.

use super::judge::{Evaluation, WEIGHTS};
use anyhow::{Context, Result, anyhow};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LABELS: [&str; 5] = [
    "Source Accuracy",
    "Content Accuracy",
    "Completeness",
    "Relevance",
    "Final Score",
];

const COLORS: [RGBColor; 5] = [
    RGBColor(0xFF, 0x6B, 0x6B),
    RGBColor(0x4E, 0xCD, 0xC4),
    RGBColor(0x45, 0xB7, 0xD1),
    RGBColor(0x96, 0xCE, 0xB4),
    RGBColor(0xF0, 0xA2, 0x02),
];

const FONT: &str = "sans-serif";
const HISTOGRAM_BINS: usize = 20;
/// Above this many questions the per-question chart is unreadable.
const MAX_COMPARISON_QUESTIONS: usize = 100;

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("chart rendering failed: {}", e)
}

/// Four dimension scores followed by the final score.
fn all_scores(e: &Evaluation) -> [f64; 5] {
    let [source, content, completeness, relevance] = e.dimension_scores();
    [source, content, completeness, relevance, e.final_score]
}

fn averages(evaluations: &[Evaluation]) -> [f64; 5] {
    let mut sums = [0.0; 5];
    for e in evaluations {
        for (sum, score) in sums.iter_mut().zip(all_scores(e)) {
            *sum += score;
        }
    }
    sums.map(|sum| sum / evaluations.len() as f64)
}

fn segment_label(labels: &[&str], value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            labels.get(*i as usize).map(|s| s.to_string()).unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

fn centered(size: u32) -> TextStyle<'static> {
    TextStyle::from((FONT, size).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom))
}

/// Render every chart for a split into `out_dir`.
///
/// File names are prefixed with `{split}_` when a split is given. The
/// per-question comparison is skipped for large splits.
pub fn render_all(
    evaluations: &[Evaluation],
    out_dir: &Path,
    split: Option<&str>,
) -> Result<Vec<PathBuf>> {
    if evaluations.is_empty() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create chart directory {:?}", out_dir))?;
    let prefix = split.map(|s| format!("{}_", s)).unwrap_or_default();
    let file = |name: &str| out_dir.join(format!("{}{}.svg", prefix, name));

    let mut written = Vec::new();

    let path = file("average_scores");
    average_scores(evaluations, &path)?;
    written.push(path);

    let path = file("score_distribution");
    score_distribution(evaluations, &path)?;
    written.push(path);

    let path = file("final_score_histogram");
    final_score_histogram(evaluations, &path)?;
    written.push(path);

    if evaluations.len() <= MAX_COMPARISON_QUESTIONS {
        let path = file("all_questions_comparison");
        question_comparison(evaluations, &path)?;
        written.push(path);
    } else {
        debug!(
            questions = evaluations.len(),
            "skipping per-question comparison chart"
        );
    }

    let path = file("weight_contribution");
    weight_contribution(evaluations, &path)?;
    written.push(path);

    info!(dir = %out_dir.display(), charts = written.len(), "rendered charts");
    Ok(written)
}

/// Bar chart of the average score per dimension.
pub fn average_scores(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let averages = averages(evaluations);

    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Average Scores by Dimension", (FONT, 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..5u32).into_segmented(), 0.0f64..10.0f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Average Score")
        .x_label_formatter(&|v| segment_label(&LABELS, v))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(averages.iter().enumerate().map(|(i, &avg)| {
            let x = i as u32;
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), avg)],
                COLORS[i].filled(),
            );
            bar.set_margin(0, 0, 20, 20);
            bar
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(averages.iter().enumerate().map(|(i, &avg)| {
            Text::new(
                format!("{:.2}", avg),
                (SegmentValue::CenterOf(i as u32), (avg + 0.1).min(9.9)),
                centered(16),
            )
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Box plot of each dimension's score spread.
pub fn score_distribution(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Score Distribution", (FONT, 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..5u32).into_segmented(), 0.0f32..10.5f32)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Score")
        .x_label_formatter(&|v| segment_label(&LABELS, v))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series((0..LABELS.len()).map(|i| {
            let values: Vec<f64> = evaluations.iter().map(|e| all_scores(e)[i]).collect();
            let quartiles = Quartiles::new(values.as_slice());
            Boxplot::new_vertical(SegmentValue::CenterOf(i as u32), &quartiles)
                .width(40)
                .whisker_width(0.5)
                .style(COLORS[i].stroke_width(2))
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Histogram of final scores with the average marked.
pub fn final_score_histogram(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let bin_width = 10.0 / HISTOGRAM_BINS as f64;
    let mut counts = [0u32; HISTOGRAM_BINS];
    for e in evaluations {
        let bin = ((e.final_score / bin_width).max(0.0) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let peak = counts.iter().copied().max().unwrap_or(0) as f64;
    let y_max = peak * 1.15 + 1.0;
    let mean = averages(evaluations)[4];

    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Final Score Distribution", (FONT, 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0f64..10.0f64, 0.0f64..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Final Score")
        .y_desc("Questions")
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(counts.iter().enumerate().map(|(i, &count)| {
            let x0 = i as f64 * bin_width;
            Rectangle::new(
                [(x0, 0.0), (x0 + bin_width, count as f64)],
                COLORS[2].mix(0.7).filled(),
            )
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(mean, 0.0), (mean, y_max)],
            RED.stroke_width(2),
        ))
        .map_err(plot_err)?
        .label(format!("Average: {:.2}", mean))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Grouped bars of the four dimension scores for every question.
pub fn question_comparison(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let n = evaluations.len();
    let bar_width = 0.2;
    let width = (400 + n as u32 * 40).clamp(1000, 4000);

    let root = SVGBackend::new(path, (width, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Scores per Question", (FONT, 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0.0f64..10.5f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Question")
        .y_desc("Score")
        .x_labels(n.min(50))
        .x_label_formatter(&|v| format!("{}", v.round() as i64 + 1))
        .draw()
        .map_err(plot_err)?;

    for (dim, (label, _)) in WEIGHTS.iter().enumerate() {
        let offset = (dim as f64 - 1.5) * bar_width;
        let color = COLORS[dim];
        chart
            .draw_series(evaluations.iter().enumerate().map(|(q, e)| {
                let x0 = q as f64 + offset - bar_width / 2.0;
                Rectangle::new(
                    [(x0, 0.0), (x0 + bar_width, e.dimension_scores()[dim])],
                    color.filled(),
                )
            }))
            .map_err(plot_err)?
            .label(*label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

/// Each dimension's weighted share of the average final score.
pub fn weight_contribution(evaluations: &[Evaluation], path: &Path) -> Result<()> {
    let averages = averages(evaluations);
    let contributions: Vec<f64> = WEIGHTS
        .iter()
        .zip(averages)
        .map(|((_, weight), avg)| avg * weight)
        .collect();
    let total: f64 = contributions.iter().sum();
    let y_max = contributions.iter().copied().fold(0.0, f64::max) * 1.25 + 0.5;
    let labels: Vec<&str> = WEIGHTS.iter().map(|(label, _)| *label).collect();

    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Weighted Contribution to Final Score", (FONT, 28))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0u32..4u32).into_segmented(), 0.0f64..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Score x Weight")
        .x_label_formatter(&|v| segment_label(&labels, v))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(contributions.iter().enumerate().map(|(i, &value)| {
            let x = i as u32;
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), value)],
                COLORS[i].filled(),
            );
            bar.set_margin(0, 0, 25, 25);
            bar
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(contributions.iter().enumerate().map(|(i, &value)| {
            let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
            Text::new(
                format!("{:.2} ({:.0}%)", value, share),
                (SegmentValue::CenterOf(i as u32), value),
                centered(16),
            )
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
