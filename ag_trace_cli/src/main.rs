use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};

use ag_trace::{
    build_scene, classify, count_flags, format_report, parse_trace, AxisBounds, LineKind,
    MarkerKind, Scene, SceneItem, SceneOptions, TraceData,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use rayon::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Guidance-trace plotting and section-control diagnosis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render guidance geometry and the recorded path for one or more runs
    Plot(PlotArgs),
    /// Analyze section-control state and report the root cause per run
    Diagnose(DiagnoseArgs),
}

#[derive(Parser, Debug)]
struct PlotArgs {
    /// Recording JSON files to render
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output PNG path (single input only; defaults next to each input)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Additional SVG output path (single input only)
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Implement width in meters (overrides the recording's toolWidth)
    #[arg(long)]
    width: Option<f64>,

    /// Explicit track-index range as MIN,MAX (overrides pathsAway-derived)
    #[arg(long)]
    tracks: Option<String>,

    /// Reference-line field name tried before the built-in aliases
    #[arg(long = "line-field")]
    line_field: Option<String>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct DiagnoseArgs {
    /// Recording JSON files to analyze
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "section_report.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Optional CSV path for the per-run count table
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Plot(args) if args.verbose => "debug",
        Command::Diagnose(args) if args.verbose => "debug",
        _ => "info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Plot(args) => handle_plot(args),
        Command::Diagnose(args) => handle_diagnose(args),
    }
}

fn handle_plot(args: PlotArgs) -> Result<()> {
    if args.inputs.len() > 1 && (args.png.is_some() || args.svg.is_some()) {
        return Err(anyhow!(
            "--png/--svg take an explicit path and only apply to a single input"
        ));
    }

    let mut opts = SceneOptions::default();
    opts.tool_width = args.width;
    if let Some(spec) = args.tracks.as_ref() {
        opts.track_range = Some(parse_track_range(spec)?);
    }
    if let Some(field) = args.line_field.as_ref() {
        opts.line_aliases.insert(0, field.clone());
    }

    args.inputs
        .par_iter()
        .map(|path| -> Result<()> {
            let data = load_trace(path)?;
            let scene = build_scene(&data, &opts)
                .with_context(|| format!("failed to build scene for {}", path.display()))?;
            log_run_summary(path, &data);

            let title = plot_title(path, &data);
            let png_path = args
                .png
                .clone()
                .unwrap_or_else(|| path.with_extension("png"));
            match render_guard(&scene, &title, &png_path, ChartKind::Png) {
                Ok(()) => info!("Wrote plot: {}", png_path.display()),
                Err(err) => warn!("Skipping PNG render ({}): {}", png_path.display(), err),
            }

            if let Some(svg_path) = args.svg.as_ref() {
                match render_guard(&scene, &title, svg_path, ChartKind::Svg) {
                    Ok(()) => info!("Wrote plot: {}", svg_path.display()),
                    Err(err) => warn!("Skipping SVG render ({}): {}", svg_path.display(), err),
                }
            }
            Ok(())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(())
}

fn handle_diagnose(args: DiagnoseArgs) -> Result<()> {
    let mut report = format!("Generated: {}\n\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    let mut csv_rows: Vec<(String, &'static str, usize, usize, f64)> = Vec::new();

    for path in &args.inputs {
        let data = load_trace(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        // a diagnosis over undefined fields would mislead; drop this report
        // alone and keep going with the remaining inputs
        let counts = match count_flags(&data.tractor_path) {
            Ok(counts) => counts,
            Err(err) => {
                warn!("cannot diagnose {}: {}", path.display(), err);
                report.push_str(&format!(
                    "Section Control Analysis: {name}\nERROR: {err}\n\n"
                ));
                continue;
            }
        };
        let cause = classify(&counts);
        info!(
            "{}: {} ({} samples)",
            path.display(),
            cause.label(),
            counts.total
        );

        report.push_str(&format_report(&name, &data.tractor_path, &counts, cause));
        report.push('\n');

        for (label, count) in counts.summary_rows() {
            csv_rows.push((name.clone(), label, count, counts.total, counts.percent(count)));
        }
    }

    if args.output.as_os_str() == "-" {
        io::stdout().write_all(report.as_bytes())?;
    } else {
        fs::write(&args.output, &report)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        info!("Diagnostic report written: {}", args.output.display());
    }

    if let Some(csv_path) = args.csv.as_ref() {
        write_counts_csv(&csv_rows, csv_path)?;
        info!("Wrote count table: {}", csv_path.display());
    }

    Ok(())
}

fn load_trace(path: &Path) -> Result<TraceData> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_trace(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}

fn log_run_summary(path: &Path, data: &TraceData) {
    let samples = &data.tractor_path;
    let duration = samples.last().map(|s| s.t).unwrap_or(0.0);
    info!(
        "{}: {} path points, {:.1}s, maneuver seen: {}",
        path.display(),
        samples.len(),
        duration,
        samples.iter().any(|s| s.uturn)
    );
}

fn parse_track_range(spec: &str) -> Result<(i32, i32)> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(anyhow!("--tracks expects MIN,MAX, got '{spec}'"));
    }
    let min: i32 = parts[0]
        .parse()
        .with_context(|| format!("invalid track index '{}'", parts[0]))?;
    let max: i32 = parts[1]
        .parse()
        .with_context(|| format!("invalid track index '{}'", parts[1]))?;
    if min > max {
        return Err(anyhow!("--tracks range is inverted: {min} > {max}"));
    }
    Ok((min, max))
}

fn plot_title(path: &Path, data: &TraceData) -> String {
    let meta = &data.metadata;
    let scalar = |v: &Option<serde_json::Value>| -> String {
        match v {
            None => "?".to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut title = format!(
        "{} | Phase: {} | YT Btn: {}",
        stem,
        scalar(&meta.you_turn_phase),
        meta.is_you_turn_btn_on
            .map_or_else(|| "?".to_string(), |v| v.to_string())
    );
    if let Some(width) = meta.turn_area_width {
        title.push_str(&format!(" | Turn Area: {width:.2}m"));
    }
    if let Some(stamp) = meta.test_run_date_time.as_ref() {
        title.push_str(&format!(" | {stamp}"));
    }
    title
}

fn write_counts_csv(rows: &[(String, &'static str, usize, usize, f64)], path: &Path) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["file", "label", "count", "total", "percent"])?;
    for (file_name, label, count, total, percent) in rows {
        writer.write_record([
            file_name.clone(),
            (*label).to_string(),
            count.to_string(),
            total.to_string(),
            format!("{percent:.1}"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

enum ChartKind {
    Png,
    Svg,
}

/// Plotting backends can panic on font trouble; degrade to a warning instead
/// of taking the whole run down.
fn render_guard(scene: &Scene, title: &str, path: &Path, kind: ChartKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        match kind {
            ChartKind::Png => {
                let (w, h) = figure_size(scene);
                let root = BitMapBackend::new(path, (w, h)).into_drawing_area();
                draw_scene(root, scene, title).map_err(|e| format!("plotting error: {e}"))
            }
            ChartKind::Svg => {
                let (w, h) = figure_size(scene);
                let root = SVGBackend::new(path, (w, h)).into_drawing_area();
                draw_scene(root, scene, title).map_err(|e| format!("plotting error: {e}"))
            }
        }
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

/// Data-space bounds for the chart: the scene's boundary-derived axis focus
/// when present, else the bounding box of everything drawn.
fn data_bounds(scene: &Scene) -> AxisBounds {
    let mut bounds = scene.axis.unwrap_or_else(|| {
        let mut bounds = AxisBounds {
            e_min: f64::INFINITY,
            e_max: f64::NEG_INFINITY,
            n_min: f64::INFINITY,
            n_max: f64::NEG_INFINITY,
        };
        let mut cover = |e: f64, n: f64| {
            bounds.e_min = bounds.e_min.min(e);
            bounds.e_max = bounds.e_max.max(e);
            bounds.n_min = bounds.n_min.min(n);
            bounds.n_max = bounds.n_max.max(n);
        };
        for item in &scene.items {
            match item {
                SceneItem::Polyline { points, .. } => {
                    for p in points {
                        cover(p.e, p.n);
                    }
                }
                SceneItem::Marker { at, .. } | SceneItem::Label { at, .. } => cover(at.e, at.n),
                SceneItem::Circle { at, radius } => {
                    cover(at.e - radius, at.n - radius);
                    cover(at.e + radius, at.n + radius);
                }
            }
        }
        bounds
    });
    if !bounds.e_min.is_finite() || !bounds.n_min.is_finite() {
        bounds = AxisBounds {
            e_min: -10.0,
            e_max: 10.0,
            n_min: -10.0,
            n_max: 10.0,
        };
    }
    if bounds.e_max <= bounds.e_min {
        bounds.e_min -= 1.0;
        bounds.e_max += 1.0;
    }
    if bounds.n_max <= bounds.n_min {
        bounds.n_min -= 1.0;
        bounds.n_max += 1.0;
    }
    bounds
}

/// Size the bitmap from the axis ranges so a meter spans roughly the same
/// number of pixels on both axes.
fn figure_size(scene: &Scene) -> (u32, u32) {
    let bounds = data_bounds(scene);
    let ratio = (bounds.n_max - bounds.n_min) / (bounds.e_max - bounds.e_min);
    let width = 1280u32;
    let height = ((width as f64) * ratio).clamp(480.0, 1600.0) as u32;
    (width, height)
}

fn line_style(kind: LineKind) -> (RGBColor, u32, bool, &'static str) {
    // color, stroke width, dashed, legend label
    match kind {
        LineKind::Boundary => (RGBColor(128, 128, 128), 2, false, "Field Boundary"),
        LineKind::TurnLine => (RGBColor(220, 20, 20), 2, true, "Turn Line"),
        LineKind::OffsetTrack => (RGBColor(30, 100, 220), 1, true, "Parallel Tracks"),
        LineKind::ReferenceLine => (RGBColor(30, 100, 220), 3, false, "AB Line (Reference)"),
        LineKind::TurnPattern => (RGBColor(255, 140, 0), 3, false, "Turn Pattern"),
        LineKind::PathStraight => (RGBColor(34, 139, 34), 2, false, "Path (Straight)"),
        LineKind::PathManeuver => (RGBColor(199, 21, 133), 3, false, "Path (U-Turn)"),
    }
}

fn draw_scene<DB>(
    root: DrawingArea<DB, plotters::coord::Shift>,
    scene: &Scene,
    title: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let bounds = data_bounds(scene);
    root.fill(&WHITE)?;

    let caption_font = FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&root)
        .margin(25)
        .caption(title, caption_font)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(bounds.e_min..bounds.e_max, bounds.n_min..bounds.n_max)?;

    chart
        .configure_mesh()
        .x_desc("Easting (m)")
        .y_desc("Northing (m)")
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.0}"))
        .label_style(FontDesc::new(
            FontFamily::SansSerif,
            16.0,
            FontStyle::Normal,
        ))
        .draw()?;

    let label_font = FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal);
    let mut labeled: HashSet<&'static str> = HashSet::new();

    for item in &scene.items {
        match item {
            SceneItem::Polyline { kind, points } => {
                let (color, stroke, dashed, legend) = line_style(*kind);
                let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.e, p.n)).collect();
                let style = ShapeStyle {
                    color: color.to_rgba(),
                    filled: false,
                    stroke_width: stroke,
                };
                let anno = if dashed {
                    chart.draw_series(DashedLineSeries::new(coords, 8, 4, style))?
                } else {
                    chart.draw_series(LineSeries::new(coords, style))?
                };
                if labeled.insert(legend) {
                    anno.label(legend).legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], color)
                    });
                }
            }
            SceneItem::Marker { kind, at } => {
                let coord = (at.e, at.n);
                match kind {
                    MarkerKind::PathStart => {
                        chart.draw_series(std::iter::once(Circle::new(
                            coord,
                            6,
                            RGBColor(34, 139, 34).filled(),
                        )))?;
                    }
                    MarkerKind::PathEnd => {
                        chart.draw_series(std::iter::once(Circle::new(
                            coord,
                            6,
                            RGBColor(220, 20, 20).filled(),
                        )))?;
                    }
                    MarkerKind::PatternStart => {
                        chart.draw_series(std::iter::once(TriangleMarker::new(
                            coord,
                            8,
                            RGBColor(255, 140, 0).filled(),
                        )))?;
                    }
                    MarkerKind::TurnLineVertex => {
                        chart.draw_series(std::iter::once(Circle::new(
                            coord,
                            3,
                            RGBColor(220, 20, 20).mix(0.5).filled(),
                        )))?;
                    }
                    MarkerKind::TimeTick => {
                        chart.draw_series(std::iter::once(Circle::new(
                            coord,
                            2,
                            BLACK.mix(0.5).filled(),
                        )))?;
                    }
                }
            }
            SceneItem::Circle { at, radius } => {
                // trigger radius lives in data coordinates, so draw it as a
                // closed polyline rather than a pixel-radius circle element
                let steps = 64;
                let ring = (0..=steps).map(|i| {
                    let angle = std::f64::consts::TAU * f64::from(i) / f64::from(steps);
                    (at.e + radius * angle.cos(), at.n + radius * angle.sin())
                });
                chart.draw_series(LineSeries::new(ring, RGBColor(255, 140, 0).stroke_width(2)))?;
            }
            SceneItem::Label { at, text } => {
                chart.draw_series(std::iter::once(Text::new(
                    text.clone(),
                    (at.e, at.n),
                    label_font.clone().color(&BLACK.mix(0.7)),
                )))?;
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(
            FontFamily::SansSerif,
            14.0,
            FontStyle::Normal,
        ))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(())
}
