//! `Mode`: the nine-field scanner syntax record described in spec.md §3,
//! used once for user-macro syntax and once for meta-directive syntax.

use crate::charset::Charset;
use crate::pattern::Pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mode {
    /// String preceding a macro name.
    pub m_start: Pattern,
    /// End of a parameterless call.
    pub m_end: Pattern,
    /// Start of the argument list.
    pub m_arg_s: Pattern,
    /// Argument separator.
    pub m_arg_sep: Pattern,
    /// End of the argument list.
    pub m_arg_e: Pattern,
    /// How to refer to positional args inside a body (e.g. `#`).
    pub m_arg_ref: Pattern,
    /// Single byte that escapes the next byte, or `None`.
    pub quotechar: Option<u8>,
    /// Characters that increase the nesting depth while scanning for an
    /// argument terminator (e.g. `(`).
    pub stackchar: Charset,
    /// Characters that decrease the nesting depth (e.g. `)`).
    pub unstackchar: Charset,
}

fn charset_of(bytes: &str) -> Charset {
    let mut set = Charset::empty();
    for b in bytes.bytes() {
        set.insert(b);
    }
    set
}

impl Mode {
    /// `gpp.c: CUser`
    pub fn c_user() -> Self {
        Mode {
            m_start: Pattern::empty(),
            m_end: Pattern::empty(),
            m_arg_s: Pattern::literal("("),
            m_arg_sep: Pattern::literal(","),
            m_arg_e: Pattern::literal(")"),
            m_arg_ref: Pattern::literal("#"),
            quotechar: Some(b'\\'),
            stackchar: charset_of("("),
            unstackchar: charset_of(")"),
        }
    }

    /// `gpp.c: CMeta`
    pub fn c_meta() -> Self {
        Mode {
            m_start: Pattern::literal("#"),
            m_end: Pattern::literal("\n"),
            m_arg_s: Pattern::parse_escaped("\\b", false).expect("constant pattern"),
            m_arg_sep: Pattern::parse_escaped("\\b", false).expect("constant pattern"),
            m_arg_e: Pattern::literal("\n"),
            m_arg_ref: Pattern::literal("#"),
            quotechar: Some(b'\\'),
            stackchar: charset_of("("),
            unstackchar: charset_of(")"),
        }
    }

    /// `gpp.c: KUser` (no quotechar)
    pub fn k_user() -> Self {
        Mode {
            quotechar: None,
            ..Mode::c_user()
        }
    }

    /// `gpp.c: KMeta`
    pub fn k_meta() -> Self {
        Mode {
            m_start: Pattern::parse_escaped("\\n#\\w", false).expect("constant pattern"),
            m_end: Pattern::literal("\n"),
            m_arg_s: Pattern::parse_escaped("\\b", false).expect("constant pattern"),
            m_arg_sep: Pattern::parse_escaped("\\b", false).expect("constant pattern"),
            m_arg_e: Pattern::literal("\n"),
            m_arg_ref: Pattern::literal("#"),
            quotechar: None,
            stackchar: Charset::empty(),
            unstackchar: Charset::empty(),
        }
    }

    /// `gpp.c: Tex`
    pub fn tex() -> Self {
        Mode {
            m_start: Pattern::literal("\\"),
            m_end: Pattern::empty(),
            m_arg_s: Pattern::literal("{"),
            m_arg_sep: Pattern::literal("}{"),
            m_arg_e: Pattern::literal("}"),
            m_arg_ref: Pattern::literal("#"),
            quotechar: Some(b'@'),
            stackchar: charset_of("{"),
            unstackchar: charset_of("}"),
        }
    }

    /// `gpp.c: Html`
    pub fn html() -> Self {
        Mode {
            m_start: Pattern::literal("<#"),
            m_end: Pattern::literal(">"),
            m_arg_s: Pattern::parse_escaped("\\B", false).expect("constant pattern"),
            m_arg_sep: Pattern::literal("|"),
            m_arg_e: Pattern::literal(">"),
            m_arg_ref: Pattern::literal("#"),
            quotechar: Some(b'\\'),
            stackchar: charset_of("<"),
            unstackchar: charset_of(">"),
        }
    }

    /// `gpp.c: XHtml`
    pub fn xhtml() -> Self {
        Mode {
            m_end: Pattern::literal("/>"),
            m_arg_e: Pattern::literal("/>"),
            ..Mode::html()
        }
    }
}
