//! Colour bar legends.

use std::io::Write;

use anyhow::Result;

use crate::render::{
    color::{Palette, MISSING_COLOR},
    geometry::Frame,
    svg::{write_text, Anchor, TextStyle},
};

/// Number of gradient stops sampled along a colour bar.
const GRADIENT_STOPS: usize = 16;

/// A horizontal colour bar: gradient, ticks, label and an optional "No data" swatch.
pub(crate) struct Colorbar<'a> {
    pub palette: &'a Palette,
    pub vmin: f64,
    pub vmax: f64,
    pub label: &'a str,
    pub show_missing: bool,
}

/// Vertical space a colour bar of height `bar_height` needs, including ticks and label.
pub(crate) fn colorbar_height(bar_height: f64, font_size: f64) -> f64 {
    bar_height + 6.0 + font_size * 3.2
}

/// Step of a "nice" tick spacing (1, 2 or 5 times a power of ten).
pub(crate) fn nice_step(range: f64, target: usize) -> f64 {
    let raw = range / target.max(1) as f64;
    if !(raw.is_finite() && raw > 0.0) { return 1.0 }
    let magnitude = 10f64.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let nice = if norm < 1.5 { 1.0 } else if norm < 3.0 { 2.0 } else if norm < 7.0 { 5.0 } else { 10.0 };
    nice * magnitude
}

/// Tick positions on multiples of a nice step, inside [vmin, vmax].
pub(crate) fn nice_ticks(vmin: f64, vmax: f64, target: usize) -> Vec<f64> {
    if !(vmax > vmin) { return vec![vmin] }
    let step = nice_step(vmax - vmin, target);
    let first = (vmin / step).ceil() as i64;
    let last = (vmax / step + 1e-9).floor() as i64;
    (first..=last)
        .map(|k| {
            let v = k as f64 * step;
            if v == 0.0 { 0.0 } else { v }
        })
        .collect()
}

/// Format a tick label with as many decimals as the step needs.
pub(crate) fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step > 0.0 && step.is_finite() {
        (-step.log10().floor()).clamp(0.0, 6.0) as usize
    } else {
        2
    };
    let text = format!("{value:.decimals$}");
    if text.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') { text.trim_start_matches('-').to_string() } else { text }
}

/// Write a horizontal colour bar into `frame` (the gradient rectangle).
/// `id` must be unique within the document.
pub(crate) fn write_colorbar(writer: &mut impl Write, id: &str, frame: Frame, bar: &Colorbar, font_size: f64) -> Result<()> {
    writeln!(writer, r#"<defs><linearGradient id="{id}" x1="0" y1="0" x2="1" y2="0">"#)?;
    for i in 0..GRADIENT_STOPS {
        let t = i as f64 / (GRADIENT_STOPS - 1) as f64;
        writeln!(writer, r#"<stop offset="{:.4}" stop-color="{}"/>"#, t, bar.palette.at(t))?;
    }
    writeln!(writer, "</linearGradient></defs>")?;
    writeln!(writer, r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="url(#{id})" stroke="#444444" stroke-width="0.6"/>"##,
        frame.x, frame.y, frame.width, frame.height)?;

    let ticks = nice_ticks(bar.vmin, bar.vmax, 5);
    let step = nice_step(bar.vmax - bar.vmin, 5);
    let range = bar.vmax - bar.vmin;
    let tick_style = TextStyle::new(font_size * 0.85, Anchor::Middle);
    for tick in ticks {
        let t = if range > 0.0 { (tick - bar.vmin) / range } else { 0.5 };
        let x = frame.x + t * frame.width;
        writeln!(writer, r##"<line x1="{x:.2}" y1="{:.2}" x2="{x:.2}" y2="{:.2}" stroke="#444444" stroke-width="0.6"/>"##,
            frame.bottom(), frame.bottom() + 4.0)?;
        write_text(writer, x, frame.bottom() + 4.0 + font_size, &format_tick(tick, step), tick_style)?;
    }

    write_text(writer, frame.center_x(), frame.bottom() + 8.0 + font_size * 2.2, bar.label,
        TextStyle::new(font_size, Anchor::Middle))?;

    if bar.show_missing {
        let x = frame.right() + 14.0;
        writeln!(writer, r##"<rect x="{x:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{MISSING_COLOR}" stroke="#444444" stroke-width="0.6"/>"##,
            frame.y, frame.height, frame.height)?;
        write_text(writer, x + frame.height + 4.0, frame.y + frame.height * 0.75, "No data",
            TextStyle::new(font_size * 0.85, Anchor::Start))?;
    }

    Ok(())
}
