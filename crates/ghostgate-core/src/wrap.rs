//! Greedy word wrap.

/// Wrap `text` so that no line exceeds `width` characters where possible.
///
/// Breaks only at spaces and keeps existing newlines. Words longer than
/// `width` are left intact on a line of their own. A width of zero disables
/// wrapping.
pub fn wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        wrap_line(line, width, &mut out);
    }
    out
}

fn wrap_line(line: &str, width: usize, out: &mut String) {
    let mut current = 0usize;
    for (i, word) in line.split(' ').enumerate() {
        let len = word.chars().count();
        if i == 0 {
            out.push_str(word);
            current = len;
        } else if current > 0 && current + 1 + len > width {
            out.push('\n');
            out.push_str(word);
            current = len;
        } else {
            out.push(' ');
            out.push_str(word);
            current += 1 + len;
        }
    }
}
