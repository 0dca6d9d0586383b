//! SVG document writing.

use std::io::Write;

use anyhow::{Context, Result};

/// In-memory SVG document.
pub(crate) struct SvgStringWriter {
    buffer: Vec<u8>,
}

/// Implement std::io::Write so `write!` / `writeln!` work.
impl Write for SvgStringWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }
}

impl SvgStringWriter {
    pub(crate) fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Write the XML declaration, the opening `<svg>` tag and a background fill.
    pub(crate) fn write_header(&mut self, width: f64, height: f64, background: &str) -> Result<()> {
        writeln!(self, r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"##)?;
        writeln!(self, r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="DejaVu Sans, Arial, Helvetica, sans-serif">"##)?;
        writeln!(self, r##"<rect width="100%" height="100%" fill="{background}"/>"##)?;
        Ok(())
    }

    /// Write the closing `</svg>` tag.
    pub(crate) fn write_footer(&mut self) -> Result<()> {
        writeln!(self, "</svg>")?;
        Ok(())
    }

    /// Get the SVG string.
    pub(crate) fn into_string(self) -> Result<String> {
        String::from_utf8(self.buffer)
            .context("[render::svg] SVG output is not valid UTF-8")
    }
}

/// Horizontal anchoring of a text element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Anchor { Start, Middle, End }

impl Anchor {
    fn as_str(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// Font settings for a text element.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TextStyle {
    pub size: f64,
    pub anchor: Anchor,
    pub bold: bool,
    pub fill: &'static str,
}

impl TextStyle {
    pub(crate) const fn new(size: f64, anchor: Anchor) -> Self {
        Self { size, anchor, bold: false, fill: "#222222" }
    }

    pub(crate) const fn bold(self) -> Self { Self { bold: true, ..self } }
}

/// Escape text for use in SVG/HTML content and attributes.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Write a text element. Newlines start a new line below the first.
pub(crate) fn write_text(writer: &mut impl Write, x: f64, y: f64, text: &str, style: TextStyle) -> Result<()> {
    write_text_rotated(writer, x, y, text, style, 0.0)
}

/// Write a text element rotated by `angle` degrees around its anchor point.
pub(crate) fn write_text_rotated(writer: &mut impl Write, x: f64, y: f64, text: &str, style: TextStyle, angle: f64) -> Result<()> {
    let weight = if style.bold { "bold" } else { "normal" };
    let transform = if angle != 0.0 { format!(r#" transform="rotate({angle} {x:.2} {y:.2})""#) } else { String::new() };
    write!(writer, r#"<text x="{x:.2}" y="{y:.2}" font-size="{}" font-weight="{weight}" text-anchor="{}" fill="{}"{transform}>"#,
        style.size, style.anchor.as_str(), style.fill)?;
    for (i, line) in text.split('\n').enumerate() {
        if i == 0 {
            write!(writer, "<tspan x=\"{x:.2}\">{}</tspan>", escape(line))?;
        } else {
            write!(writer, "<tspan x=\"{x:.2}\" dy=\"{:.2}\">{}</tspan>", style.size * 1.2, escape(line))?;
        }
    }
    writeln!(writer, "</text>")?;
    Ok(())
}

/// Number of lines in a possibly multi-line label.
pub(crate) fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

#[cfg(test)]
mod tests {
    use super::{escape, write_text, Anchor, SvgStringWriter, TextStyle};

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"LST <°C> & "NDVI""#), "LST &lt;°C&gt; &amp; &quot;NDVI&quot;");
    }

    #[test]
    fn document_is_well_formed() {
        let mut writer = SvgStringWriter::new();
        writer.write_header(100.0, 50.0, "#ffffff").unwrap();
        write_text(&mut writer, 50.0, 10.0, "Heat\nVulnerability", TextStyle::new(12.0, Anchor::Middle).bold()).unwrap();
        writer.write_footer().unwrap();
        let svg = writer.into_string().unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<tspan").count(), 2);
        assert!(svg.contains(r#"font-weight="bold""#));
    }
}
