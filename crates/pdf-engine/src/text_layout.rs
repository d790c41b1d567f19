//! Line wrapping for text runs
//!
//! Base-14 fonts carry no metrics here, so widths are estimated from an
//! average glyph advance relative to the font size.

/// Configuration for wrapping a text run
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    /// Box width available to each line, in points
    pub wrap_width: f32,

    pub font_size: f32,

    /// Average character width ratio (relative to font size)
    pub char_width_ratio: f32,
}

impl LayoutConfig {
    /// Characters that fit on one line, never less than one
    pub fn chars_per_line(&self) -> usize {
        let advance = self.font_size * self.char_width_ratio;
        if advance <= 0.0 || !self.wrap_width.is_finite() {
            return usize::MAX;
        }
        ((self.wrap_width / advance).floor() as usize).max(1)
    }
}

/// Wrap text into lines; explicit newlines always break
pub fn layout_lines(text: &str, config: &LayoutConfig) -> Vec<String> {
    let chars_per_line = config.chars_per_line();
    text.lines()
        .flat_map(|paragraph| wrap_text(paragraph, chars_per_line))
        .collect()
}

/// Greedy word wrap by character count.
///
/// Words longer than a line are split across lines.
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let would_exceed = if current_line.is_empty() {
            word_len > chars_per_line
        } else {
            current_len + 1 + word_len > chars_per_line
        };

        if would_exceed && !current_line.is_empty() && word_len <= chars_per_line {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
            current_len = word_len;
        } else if word_len > chars_per_line {
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
            }

            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(chars_per_line).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    lines.push(chunk.iter().collect());
                } else {
                    current_line = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else {
            if !current_line.is_empty() {
                current_line.push(' ');
                current_len += 1;
            }
            current_line.push_str(word);
            current_len += word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_text_simple() {
        let lines = wrap_text("Hello world", 6);
        assert_eq!(lines, vec!["Hello", "world"]);
    }

    #[test]
    fn wrap_text_long_word() {
        let lines = wrap_text("Supercalifragilistic", 10);
        assert_eq!(lines, vec!["Supercalif", "ragilistic"]);
    }

    #[test]
    fn wrap_text_long_word_after_short_one() {
        let lines = wrap_text("to abcdefghijkl end", 5);
        assert_eq!(lines, vec!["to", "abcde", "fghij", "kl", "end"]);
    }

    #[test]
    fn wrap_text_fits_one_line() {
        assert_eq!(wrap_text("Hello", 20), vec!["Hello"]);
        assert_eq!(wrap_text("", 20), vec![""]);
    }

    #[test]
    fn wrap_text_counts_characters_not_bytes() {
        let lines = wrap_text("été été", 3);
        assert_eq!(lines, vec!["été", "été"]);
    }

    #[test]
    fn layout_lines_respects_newlines_and_width() {
        let config = LayoutConfig {
            wrap_width: 30.0,
            font_size: 10.0,
            char_width_ratio: 0.5,
        };
        assert_eq!(config.chars_per_line(), 6);
        let lines = layout_lines("Paid in full\nThanks", &config);
        assert_eq!(lines, vec!["Paid", "in", "full", "Thanks"]);
    }

    #[test]
    fn chars_per_line_never_zero() {
        let config = LayoutConfig {
            wrap_width: 1.0,
            font_size: 40.0,
            char_width_ratio: 0.5,
        };
        assert_eq!(config.chars_per_line(), 1);
    }
}
