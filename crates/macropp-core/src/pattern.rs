//! Delimiter patterns: the literal-byte + meta-class token sequences that
//! make up a [`crate::mode::Mode`]'s nine fields.
//!
//! Represented as a parsed `Vec<PatternTok>` rather than an in-band escape
//! byte range, so a pattern can never collide with an arbitrary input byte
//! the way the original's raw `\x01..\x0E` control-byte encoding could.

use crate::charset::Charset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// `\b` one or more spaces/tabs
    Space1,
    /// `\w` zero or more spaces/tabs (cannot be negated)
    Space0,
    /// `\B` one or more spaces/tabs/newlines
    SpaceNl1,
    /// `\W` zero or more spaces/tabs/newlines (cannot be negated)
    SpaceNl0,
    /// `\a` a letter
    Alpha,
    /// `\A` a letter, space, tab or newline
    AlphaSpace,
    /// `\#` a digit
    Digit,
    /// `\i` an identifier character per the active `id_set`
    Ident,
    /// `\t` a literal tab, as a class so it can be negated
    Tab,
    /// `\n` a literal newline, as a class so it can be negated
    Newline,
    /// `\o` an operator per the active `op_set`
    Operator,
    /// `\O` an operator or grouping char (`op_set` union `ext_op_set`)
    OperatorExt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternTok {
    Literal(u8),
    Class(ClassKind, bool),
}

/// A sequence of literal bytes and meta-class tokens, e.g. `mStart`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern(pub Vec<PatternTok>);

impl Pattern {
    pub fn empty() -> Self {
        Pattern(Vec::new())
    }

    pub fn literal(s: &str) -> Self {
        Pattern(s.bytes().map(PatternTok::Literal).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the pattern back to a best-effort literal string, standing
    /// in for a class token with a representative character. Used only for
    /// the rare case where a definition-time delimiter pattern must be
    /// reconstituted into text (the user-macro aliasing special case,
    /// spec.md §4.4).
    pub fn render_literal(&self) -> String {
        let mut s = String::new();
        for tok in &self.0 {
            match *tok {
                PatternTok::Literal(b) => s.push(b as char),
                PatternTok::Class(kind, negated) => {
                    if negated {
                        continue;
                    }
                    let c = match kind {
                        ClassKind::Space1 | ClassKind::Space0 | ClassKind::SpaceNl1 | ClassKind::SpaceNl0 => ' ',
                        ClassKind::Alpha | ClassKind::AlphaSpace => 'a',
                        ClassKind::Digit => '0',
                        ClassKind::Ident => 'x',
                        ClassKind::Tab => '\t',
                        ClassKind::Newline => '\n',
                        ClassKind::Operator | ClassKind::OperatorExt => '+',
                    };
                    s.push(c);
                }
            }
        }
        s
    }

    /// First literal byte of the pattern, used where the original takes
    /// `pattern[0]` directly (e.g. positional arg refs: `mArgRef[0]` + digit).
    pub fn first_byte(&self) -> Option<u8> {
        match self.0.first() {
            Some(PatternTok::Literal(b)) => Some(*b),
            _ => None,
        }
    }

    /// Parses the human-facing escape syntax used both by `-U`/`-M`/`+c`/`+s`
    /// CLI arguments (`gpp.c: strNl`, tolerant of unknown escapes) and by
    /// `#mode user`/`#mode meta` string literals (`gpp.c: strNl2`, strict).
    pub fn parse_escaped(s: &str, strict: bool) -> Result<Pattern, PatternError> {
        let bytes = s.as_bytes();
        if let Some(&first) = bytes.first() {
            if !is_delim(first) {
                return Err(PatternError::BadStartChar);
            }
        }
        let mut toks = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c == b'\\' {
                let neg = bytes.get(i + 1) == Some(&b'!');
                let code_idx = i + 1 + if neg { 1 } else { 0 };
                let code = bytes.get(code_idx).copied();
                let (tok, consumed) = match code {
                    Some(b'n') | Some(b'r') => (PatternTok::Literal(b'\n'), code_idx + 1 - i),
                    Some(b't') => (PatternTok::Literal(b'\t'), code_idx + 1 - i),
                    Some(b'b') => (PatternTok::Class(ClassKind::Space1, neg), code_idx + 1 - i),
                    Some(b'w') => {
                        if neg {
                            return Err(PatternError::NegatedWhitespaceClass);
                        }
                        (PatternTok::Class(ClassKind::Space0, false), code_idx + 1 - i)
                    }
                    Some(b'B') => (PatternTok::Class(ClassKind::SpaceNl1, neg), code_idx + 1 - i),
                    Some(b'W') => {
                        if neg {
                            return Err(PatternError::NegatedWhitespaceClass);
                        }
                        (PatternTok::Class(ClassKind::SpaceNl0, false), code_idx + 1 - i)
                    }
                    Some(b'a') => (PatternTok::Class(ClassKind::Alpha, neg), code_idx + 1 - i),
                    Some(b'A') => (PatternTok::Class(ClassKind::AlphaSpace, neg), code_idx + 1 - i),
                    Some(b'#') => (PatternTok::Class(ClassKind::Digit, neg), code_idx + 1 - i),
                    Some(b'i') => (PatternTok::Class(ClassKind::Ident, neg), code_idx + 1 - i),
                    Some(b'o') => (PatternTok::Class(ClassKind::Operator, neg), code_idx + 1 - i),
                    Some(b'O') => (PatternTok::Class(ClassKind::OperatorExt, neg), code_idx + 1 - i),
                    Some(b'"') | Some(b'\\') if !neg => {
                        let lit = code.unwrap();
                        (PatternTok::Literal(lit), code_idx + 1 - i)
                    }
                    _ => {
                        if strict {
                            return Err(PatternError::UnknownEscape);
                        }
                        (PatternTok::Literal(b'\\'), 1)
                    }
                };
                toks.push(tok);
                i += consumed;
            } else if c == b' ' {
                toks.push(PatternTok::Class(ClassKind::Space1, false));
                i += 1;
            } else {
                toks.push(PatternTok::Literal(c));
                i += 1;
            }
        }
        Ok(Pattern(toks))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("character not allowed to start a syntax specifier")]
    BadStartChar,
    #[error("\\w and \\W cannot be negated")]
    NegatedWhitespaceClass,
    #[error("unknown escape sequence in syntax specifier")]
    UnknownEscape,
}

pub fn is_delim(c: u8) -> bool {
    !(c.is_ascii_alphanumeric() || c == b'_')
}

pub fn is_white(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\n'
}

fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn is_space_or_nl(c: u8) -> bool {
    is_space(c) || c == b'\n'
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// The three charsets a class test needs, pulled from the owning
/// [`crate::spec::Spec`].
pub struct ClassSet<'a> {
    pub id_set: &'a Charset,
    pub op_set: &'a Charset,
    pub ext_op_set: &'a Charset,
}

fn class_matches(kind: ClassKind, classes: &ClassSet, i: &mut usize, get: &mut dyn FnMut(usize) -> u8) -> bool {
    match kind {
        ClassKind::Space1 => {
            let c = get(*i);
            *i += 1;
            if !is_space(c) {
                return false;
            }
            loop {
                let c2 = get(*i);
                if is_space(c2) {
                    *i += 1;
                } else {
                    break;
                }
            }
            true
        }
        ClassKind::Space0 => {
            loop {
                let c2 = get(*i);
                if is_space(c2) {
                    *i += 1;
                } else {
                    break;
                }
            }
            true
        }
        ClassKind::SpaceNl1 => {
            let c = get(*i);
            *i += 1;
            if !is_space_or_nl(c) {
                return false;
            }
            loop {
                let c2 = get(*i);
                if is_space_or_nl(c2) {
                    *i += 1;
                } else {
                    break;
                }
            }
            true
        }
        ClassKind::SpaceNl0 => {
            loop {
                let c2 = get(*i);
                if is_space_or_nl(c2) {
                    *i += 1;
                } else {
                    break;
                }
            }
            true
        }
        ClassKind::Alpha => {
            let c = get(*i);
            *i += 1;
            is_alpha(c)
        }
        ClassKind::AlphaSpace => {
            let c = get(*i);
            *i += 1;
            is_alpha(c) || is_space_or_nl(c)
        }
        ClassKind::Digit => {
            let c = get(*i);
            *i += 1;
            c.is_ascii_digit()
        }
        ClassKind::Ident => {
            let c = get(*i);
            *i += 1;
            classes.id_set.contains(c)
        }
        ClassKind::Tab => {
            let c = get(*i);
            *i += 1;
            c == b'\t'
        }
        ClassKind::Newline => {
            let c = get(*i);
            *i += 1;
            c == b'\n'
        }
        ClassKind::Operator => {
            let c = get(*i);
            *i += 1;
            classes.op_set.contains(c)
        }
        ClassKind::OperatorExt => {
            let c = get(*i);
            *i += 1;
            classes.op_set.contains(c) || classes.ext_op_set.contains(c)
        }
    }
}

/// `gpp.c: matchSequence` — advances `*pos` over input iff `pat` matches at
/// that position.
pub fn match_sequence(pat: &Pattern, pos: &mut usize, classes: &ClassSet, get: &mut dyn FnMut(usize) -> u8) -> bool {
    let mut i = *pos;
    for tok in &pat.0 {
        match *tok {
            PatternTok::Literal(b) => {
                let c = get(i);
                i += 1;
                if c != b {
                    return false;
                }
            }
            PatternTok::Class(kind, negated) => {
                let matched = class_matches(kind, classes, &mut i, get);
                let ok = if negated { !matched } else { matched };
                if !ok {
                    return false;
                }
            }
        }
    }
    *pos = i;
    true
}

/// `gpp.c: matchStartSequence` — like [`match_sequence`] but the pattern's
/// first token, if a class, tests the byte *preceding* `*pos` instead of
/// consuming from `*pos` onward (used to check e.g. "macro call must be
/// preceded by whitespace").
pub fn match_start_sequence(pat: &Pattern, pos: &mut usize, classes: &ClassSet, get: &mut dyn FnMut(usize) -> u8) -> bool {
    let Some((first, rest)) = pat.0.split_first() else {
        return true;
    };
    let rest_pattern;
    let tail: &[PatternTok] = match first {
        PatternTok::Literal(_) => &pat.0,
        PatternTok::Class(kind, negated) => {
            let c = if *pos == 0 { b'\n' } else { get(*pos - 1) };
            let matched = match kind {
                ClassKind::Space1 | ClassKind::Space0 => is_space(c),
                ClassKind::SpaceNl1 | ClassKind::SpaceNl0 => is_space_or_nl(c),
                ClassKind::Alpha => is_alpha(c),
                ClassKind::AlphaSpace => is_alpha(c) || is_space_or_nl(c),
                ClassKind::Digit => c.is_ascii_digit(),
                ClassKind::Ident => classes.id_set.contains(c),
                ClassKind::Tab => c == b'\t',
                ClassKind::Newline => c == b'\n',
                ClassKind::Operator => classes.op_set.contains(c),
                ClassKind::OperatorExt => classes.op_set.contains(c) || classes.ext_op_set.contains(c),
            };
            let ok = if *negated { !matched } else { matched };
            if !ok {
                return false;
            }
            rest_pattern = Pattern(rest.to_vec());
            &rest_pattern.0
        }
    };
    let tail_pattern = Pattern(tail.to_vec());
    match_sequence(&tail_pattern, pos, classes, get)
}

/// `gpp.c: matchEndSequence` — treats EOF as matching a bare `\n` terminator,
/// and when `preservelf` is set, retreats one position if the last consumed
/// char was whitespace so a trailing newline survives in the output.
pub fn match_end_sequence(
    pat: &Pattern,
    pos: &mut usize,
    classes: &ClassSet,
    preservelf: bool,
    get: &mut dyn FnMut(usize) -> u8,
) -> bool {
    if pat.0.is_empty() {
        return true;
    }
    if get(*pos) == 0 && pat.0 == vec![PatternTok::Literal(b'\n')] {
        return true;
    }
    if !match_sequence(pat, pos, classes, get) {
        return false;
    }
    if preservelf && *pos > 0 && is_white(get(*pos - 1)) {
        *pos -= 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::{default_ext_op_set, default_id_set, default_op_set};

    fn classes() -> (Charset, Charset, Charset) {
        (default_id_set(), default_op_set(), default_ext_op_set())
    }

    #[test]
    fn literal_pattern_matches_exact_bytes() {
        let (id, op, ext) = classes();
        let classes = ClassSet { id_set: &id, op_set: &op, ext_op_set: &ext };
        let buf = b"#define\0";
        let pat = Pattern::literal("#define");
        let mut pos = 0;
        assert!(match_sequence(&pat, &mut pos, &classes, &mut |p| buf.get(p).copied().unwrap_or(0)));
        assert_eq!(pos, 7);
    }

    #[test]
    fn one_or_more_space_class_is_greedy() {
        let (id, op, ext) = classes();
        let classes = ClassSet { id_set: &id, op_set: &op, ext_op_set: &ext };
        let buf = b"   x\0";
        let pat = Pattern(vec![PatternTok::Class(ClassKind::Space1, false)]);
        let mut pos = 0;
        assert!(match_sequence(&pat, &mut pos, &classes, &mut |p| buf.get(p).copied().unwrap_or(0)));
        assert_eq!(pos, 3);
    }

    #[test]
    fn one_or_more_space_fails_without_any() {
        let (id, op, ext) = classes();
        let classes = ClassSet { id_set: &id, op_set: &op, ext_op_set: &ext };
        let buf = b"x\0";
        let pat = Pattern(vec![PatternTok::Class(ClassKind::Space1, false)]);
        let mut pos = 0;
        assert!(!match_sequence(&pat, &mut pos, &classes, &mut |p| buf.get(p).copied().unwrap_or(0)));
    }

    #[test]
    fn parse_escaped_rejects_negated_w() {
        assert!(Pattern::parse_escaped("\\!w", true).is_err());
    }

    #[test]
    fn parse_escaped_space_becomes_one_or_more_class() {
        let pat = Pattern::parse_escaped("a b", false).unwrap();
        assert_eq!(
            pat.0,
            vec![
                PatternTok::Literal(b'a'),
                PatternTok::Class(ClassKind::Space1, false),
                PatternTok::Literal(b'b'),
            ]
        );
    }

    #[test]
    fn end_sequence_matches_eof_as_newline() {
        let (id, op, ext) = classes();
        let classes = ClassSet { id_set: &id, op_set: &op, ext_op_set: &ext };
        let buf: &[u8] = b"";
        let pat = Pattern::literal("\n");
        let mut pos = 0;
        assert!(match_end_sequence(&pat, &mut pos, &classes, false, &mut |p| buf.get(p).copied().unwrap_or(0)));
    }
}
