use comrak::{ComrakOptions, markdown_to_html};
use once_cell::sync::Lazy;

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.hardbreaks = true;
    options
});

/// Renders assistant markdown to HTML, leaving LaTeX intact for MathJax.
pub fn render_markdown(content: &str) -> String {
    let shielded = shield_math(content);
    let html = markdown_to_html(&shielded.text, &MARKDOWN_OPTIONS);
    shielded.restore(html)
}

/// Markdown source with math segments swapped for inert placeholders.
#[derive(Debug, PartialEq)]
pub struct ShieldedMath {
    pub text: String,
    pub segments: Vec<String>,
}

impl ShieldedMath {
    /// Puts the original (HTML-escaped) math back into rendered HTML.
    pub fn restore(&self, mut html: String) -> String {
        for (index, segment) in self.segments.iter().enumerate() {
            html = html.replace(&placeholder(index), &escape_html(segment));
        }
        html
    }
}

// Private-use codepoints: markdown leaves them alone and they are stripped from input.
const SENTINEL_OPEN: char = '\u{E000}';
const SENTINEL_CLOSE: char = '\u{E001}';

fn placeholder(index: usize) -> String {
    format!("{SENTINEL_OPEN}{index}{SENTINEL_CLOSE}")
}

/// Replaces `$$..$$`, `\[..\]`, `\(..\)` and `$..$` outside code with placeholders.
pub fn shield_math(source: &str) -> ShieldedMath {
    let cleaned = source.replace([SENTINEL_OPEN, SENTINEL_CLOSE], "");
    let source = cleaned.as_str();
    let bytes = source.as_bytes();
    let mut text = String::with_capacity(source.len());
    let mut segments = Vec::new();
    let mut copied = 0;
    let mut i = 0;
    let mut line_start = true;

    while i < bytes.len() {
        if line_start && source[i..].starts_with("```") {
            i = fence_end(source, i);
            continue;
        }
        line_start = false;

        let segment_end = match bytes[i] {
            b'\n' => {
                line_start = true;
                i += 1;
                continue;
            }
            b'`' => {
                i = inline_code_end(source, i);
                continue;
            }
            b'\\' => match bytes.get(i + 1) {
                Some(b'[') => find_after(source, i + 2, "\\]"),
                Some(b'(') => find_after(source, i + 2, "\\)"),
                Some(b'$') => {
                    i += 2;
                    continue;
                }
                _ => None,
            },
            b'$' if bytes.get(i + 1) == Some(&b'$') => find_after(source, i + 2, "$$"),
            b'$' => inline_dollar_end(source, i),
            _ => None,
        };

        match segment_end {
            Some(end) => {
                text.push_str(&source[copied..i]);
                text.push_str(&placeholder(segments.len()));
                segments.push(source[i..end].to_string());
                copied = end;
                i = end;
            }
            None => i += 1,
        }
    }

    text.push_str(&source[copied..]);
    ShieldedMath { text, segments }
}

/// End (exclusive) of `close` searched from `from`.
fn find_after(source: &str, from: usize, close: &str) -> Option<usize> {
    source[from..].find(close).map(|rel| from + rel + close.len())
}

/// `$x$` on a single line; the opening `$` must not be followed by a space,
/// and the closing one must not be preceded by a space nor followed by a digit.
fn inline_dollar_end(source: &str, start: usize) -> Option<usize> {
    let rest = &source[start + 1..];
    let first = rest.chars().next()?;
    if first.is_whitespace() || first == '$' {
        return None;
    }
    let line = rest.split('\n').next().unwrap_or(rest);
    let close = line.find('$')?;
    let before = line[..close].chars().last()?;
    if before.is_whitespace() {
        return None;
    }
    if line[close + 1..].chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(start + 1 + close + 1)
}

/// Skips a run of backticks and everything up to the matching run.
fn inline_code_end(source: &str, start: usize) -> usize {
    let run = source[start..].bytes().take_while(|b| *b == b'`').count();
    let fence = &source[start..start + run];
    match source[start + run..].find(fence) {
        Some(rel) => start + run + rel + run,
        None => start + run,
    }
}

/// Position just after the closing fence line, or the end of input.
fn fence_end(source: &str, start: usize) -> usize {
    let body = match source[start..].find('\n') {
        Some(rel) => start + rel,
        None => return source.len(),
    };
    match source[body..].find("\n```") {
        Some(rel) => {
            let close = body + rel + 1;
            match source[close..].find('\n') {
                Some(nl) => close + nl,
                None => source.len(),
            }
        }
        None => source.len(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_and_display_math_are_shielded() {
        let shielded = shield_math("Euler: $e^{i\\pi}+1=0$ and $$\\sum_{n} a_n$$");
        assert_eq!(shielded.text, format!("Euler: {} and {}", placeholder(0), placeholder(1)));
        assert_eq!(shielded.segments, vec!["$e^{i\\pi}+1=0$", "$$\\sum_{n} a_n$$"]);
    }

    #[test]
    fn bracket_delimiters_are_shielded() {
        let shielded = shield_math("\\(a_1\\) then \\[b_2\\]");
        assert_eq!(shielded.segments, vec!["\\(a_1\\)", "\\[b_2\\]"]);
    }

    #[test]
    fn prices_are_not_math() {
        let shielded = shield_math("It costs $5 and $10 today");
        assert!(shielded.segments.is_empty());
        assert_eq!(shielded.text, "It costs $5 and $10 today");
    }

    #[test]
    fn escaped_dollars_are_left_alone() {
        assert!(shield_math("\\$x$ is literal").segments.is_empty());
    }

    #[test]
    fn code_is_never_shielded() {
        let source = "Use `$HOME/$USER` here\n```sh\necho $a_b$\n```\nthen $x$";
        let shielded = shield_math(source);
        assert_eq!(shielded.segments, vec!["$x$"]);
        assert!(shielded.text.contains("echo $a_b$"));
        assert!(shielded.text.contains("`$HOME/$USER`"));
    }

    #[test]
    fn display_math_may_span_lines() {
        let shielded = shield_math("$$\na_1 +\nb_2\n$$");
        assert_eq!(shielded.segments.len(), 1);
    }

    #[test]
    fn rendered_math_keeps_underscores_and_backslashes() {
        let html = render_markdown("Value $a_i \\cdot b_i$ and *bold*");
        assert!(html.contains("$a_i \\cdot b_i$"));
        assert!(html.contains("<em>bold</em>"));
    }

    #[test]
    fn placeholder_lookalikes_in_text_stay_literal() {
        let html = render_markdown("$x$ then literal MATHSEGMENT0END");
        assert_eq!(html, "<p>$x$ then literal MATHSEGMENT0END</p>\n");

        let sneaky = format!("$x$ then {}", placeholder(0));
        assert_eq!(render_markdown(&sneaky), "<p>$x$ then 0</p>\n");
    }

    #[test]
    fn math_is_html_escaped_on_restore() {
        let html = render_markdown("$a<b$");
        assert!(html.contains("$a&lt;b$"));
    }

    #[test]
    fn code_blocks_carry_language_class_for_highlighting() {
        let html = render_markdown("```rust\nfn main() {}\n```");
        assert!(html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn single_newlines_become_breaks() {
        let html = render_markdown("line one\nline two");
        assert!(html.contains("<br />"));
    }

    #[test]
    fn raw_html_is_not_passed_through() {
        let html = render_markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn tables_render() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }
}
