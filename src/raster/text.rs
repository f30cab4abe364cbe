//! Character-count text layout for slide bodies.
//!
//! Widths are approximated by `char` count; glyph metrics are never measured. The body font size
//! and wrap width are chosen together so ~70 characters fit the content column.

/// Maximum characters per wrapped body line.
pub const WRAP_WIDTH: usize = 70;
/// Maximum title characters before truncation (ellipsis excluded).
pub const TITLE_BUDGET: usize = 60;

const BULLET_PREFIX: &str = "\u{2022} ";
const CONTINUATION_PREFIX: &str = "  ";

/// Escape the five XML metacharacters.
pub fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Truncate `title` to [`TITLE_BUDGET`] characters, appending `...` when anything was cut.
pub fn truncate_title(title: &str) -> String {
    let title = title.trim();
    if title.chars().count() <= TITLE_BUDGET {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(TITLE_BUDGET).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}

/// Greedy word wrap: tokens are appended to the current line until the next one would push it
/// past `width` characters. A single token longer than `width` gets a line of its own and is not
/// split. Runs of whitespace collapse to one space.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if line_chars > 0 && line_chars + 1 + word_chars > width {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
        if line_chars > 0 {
            line.push(' ');
            line_chars += 1;
        }
        line.push_str(word);
        line_chars += word_chars;
    }
    if line_chars > 0 {
        lines.push(line);
    }
    lines
}

/// One rendered body line, already prefixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyLine {
    pub text: String,
    /// True for the first line of a bullet.
    pub starts_bullet: bool,
}

/// Wrap every bullet and prefix first lines with a bullet marker, continuations with blanks.
pub fn layout_bullets(points: &[String], width: usize) -> Vec<BodyLine> {
    let mut out = Vec::new();
    for point in points {
        for (i, chunk) in wrap_words(point, width).into_iter().enumerate() {
            let prefix = if i == 0 {
                BULLET_PREFIX
            } else {
                CONTINUATION_PREFIX
            };
            out.push(BodyLine {
                text: format!("{prefix}{chunk}"),
                starts_bullet: i == 0,
            });
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/raster/text.rs"]
mod tests;
