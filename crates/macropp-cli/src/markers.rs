//! Compiles a `--includemarker` format string into the closure
//! `macropp_core::EngineConfig.include_marker` expects. Mirrors `gpp.c`'s
//! `construct_include_directive_marker`: up to three `%`/`?` holes are
//! substituted in order with the line number, the filename, and the marker
//! kind (`""`/`"1"`/`"2"` for file-start/entering/returning); `@` stands for
//! a literal space, `\` escapes the following character literally, and a
//! trailing newline is always appended to the expansion.

use macropp_core::{IncludeMarkerFn, IncludeMarkerKind};

/// One hole or literal chunk of a compiled format.
enum Piece {
    Literal(String),
    Lineno,
    Filename,
    Kind,
}

/// Parses `fmt` once up front, producing a closure that re-renders it per
/// include-boundary event without re-parsing.
pub fn compile(fmt: &str) -> IncludeMarkerFn {
    let pieces = parse(fmt);
    std::rc::Rc::new(move |kind: IncludeMarkerKind, lineno: usize, filename: &str| {
        let mut out = String::new();
        let mut holes_seen = 0;
        for piece in &pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Lineno => {
                    out.push_str(&lineno.to_string());
                    holes_seen += 1;
                }
                Piece::Filename => {
                    out.push_str(filename);
                    holes_seen += 1;
                }
                Piece::Kind => {
                    out.push_str(kind.as_str());
                    holes_seen += 1;
                }
            }
        }
        let _ = holes_seen;
        out.push('\n');
        out
    })
}

/// `%`/`?` holes are assigned line number, filename, marker-kind in the
/// order they appear; a fourth or later hole is treated as a literal
/// character since the format only ever carries three values.
fn parse(fmt: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut hole_index = 0;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    literal.push(escaped);
                }
            }
            '@' => literal.push(' '),
            '%' | '?' => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(match hole_index {
                    0 => Piece::Lineno,
                    1 => Piece::Filename,
                    _ => Piece::Kind,
                });
                hole_index += 1;
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_holes_in_order() {
        let marker = compile("line %@file ?@kind ?");
        let text = marker(IncludeMarkerKind::Entering, 12, "foo.h");
        assert_eq!(text, "line 12 file foo.h kind 1\n");
    }

    #[test]
    fn escapes_literal_percent() {
        let marker = compile("\\%literal");
        let text = marker(IncludeMarkerKind::FileStart, 1, "x");
        assert_eq!(text, "%literal\n");
    }

    #[test]
    fn no_holes_is_a_constant_marker() {
        let marker = compile("---");
        assert_eq!(marker(IncludeMarkerKind::Returning, 99, "y"), "---\n");
    }
}
