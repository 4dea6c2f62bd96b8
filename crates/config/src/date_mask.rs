// Date masks: the human-readable date patterns used in configuration
// ("YYYY-MM-DD", "YYMM", "DD/MM/YYYY HH:MI:SS") and their strftime equivalents.

use crate::error::ConfigError;

const SEPARATORS: &[char] = &['-', '/', ':', ' '];

/// Characters allowed in the date component of an identifier template.
const ID_MASK_CHARS: &[char] = &['Y', 'M', 'D', '-', '/', ' '];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Literal(char),
    Field(&'a str),
}

fn split_mask(mask: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = mask;

    while let Some(c) = rest.chars().next() {
        if SEPARATORS.contains(&c) {
            pieces.push(Piece::Literal(c));
            rest = &rest[c.len_utf8()..];
            continue;
        }
        // Minutes are the only two-letter field made of distinct letters
        if rest.starts_with("MI") {
            pieces.push(Piece::Field(&rest[..2]));
            rest = &rest[2..];
            continue;
        }
        let run = rest.chars().take_while(|&ch| ch == c).map(char::len_utf8).sum::<usize>();
        pieces.push(Piece::Field(&rest[..run]));
        rest = &rest[run..];
    }

    pieces
}

fn field_format(field: &str) -> Option<&'static str> {
    let fmt = match field {
        "YYYY" => "%Y",
        "YY" => "%y",
        "MMMM" => "%B",
        "MMM" => "%b",
        "MM" => "%m",
        "M" => "%-m",
        "DD" => "%d",
        "D" => "%-d",
        "HH" => "%H",
        "MI" => "%M",
        "SS" => "%S",
        _ => return None,
    };
    Some(fmt)
}

/// Convert a date mask into a chrono format string.
pub fn to_chrono(mask: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(mask.len() * 2);
    for piece in split_mask(mask) {
        match piece {
            Piece::Literal(c) => out.push(c),
            Piece::Field(field) => {
                let fmt = field_format(field).ok_or_else(|| ConfigError::DateMask {
                    mask: mask.to_string(),
                    component: field.to_string(),
                })?;
                out.push_str(fmt);
            }
        }
    }
    Ok(out)
}

/// True when a template token reads as a date mask (`YYMM`, `YYYY-MM`, ...).
pub fn is_id_date_mask(token: &str) -> bool {
    token.chars().count() > 1 && token.chars().all(|c| ID_MASK_CHARS.contains(&c))
}

/// Width of a rendered mask, or `None` when a field renders with variable
/// width (month names, unpadded numbers).
pub fn rendered_width(mask: &str) -> Option<usize> {
    let mut width = 0;
    for piece in split_mask(mask) {
        width += match piece {
            Piece::Literal(c) => c.len_utf8(),
            Piece::Field(f @ ("YYYY" | "YY" | "MM" | "DD" | "HH" | "MI" | "SS")) => f.len(),
            Piece::Field(_) => return None,
        };
    }
    Some(width)
}
