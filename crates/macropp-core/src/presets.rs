//! Built-in mode presets selectable via `-C`/`-T`/`-H`/`-X`/`-P` or
//! `#mode standard <name>`. `gpp.c: SetStandardMode`.

use crate::charset::{default_ext_op_set, default_id_set, default_op_set, prolog_op_set};
use crate::mode::Mode;
use crate::spec::{CommentFlags, CommentRule, Spec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    C,
    Tex,
    Html,
    XHtml,
    Prolog,
    Generic,
}

impl Preset {
    pub fn parse(name: &str) -> Option<Preset> {
        match name.to_ascii_lowercase().as_str() {
            "c" | "c++" | "cpp" => Some(Preset::C),
            "tex" => Some(Preset::Tex),
            "html" => Some(Preset::Html),
            "xhtml" => Some(Preset::XHtml),
            "prolog" => Some(Preset::Prolog),
            "default" | "generic" | "gpp" => Some(Preset::Generic),
            _ => None,
        }
    }

    fn slash_star_comment() -> CommentRule {
        CommentRule {
            start: pat("/*"),
            end: pat("*/"),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::comment(), CommentFlags::comment()],
        }
    }

    fn slash_slash_comment() -> CommentRule {
        CommentRule {
            start: pat("//"),
            end: pat("\n"),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::comment(), CommentFlags::comment()],
        }
    }

    /// C preset's `\\\n` rule (`gpp.c: SetStandardMode`'s `"ccc"`): a
    /// comment in all three ambiences, so it's swallowed inside meta
    /// directive arguments and macro-call arguments too, not just plain text.
    fn c_backslash_newline_continuation() -> CommentRule {
        CommentRule {
            start: pat("\\\n"),
            end: pat(""),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::comment(), CommentFlags::comment()],
        }
    }

    /// Prolog preset's `\\\n` rule (`gpp.c: SetStandardMode`'s `"cii"`):
    /// swallowed in meta directives but left alone in user/text ambience.
    fn prolog_backslash_newline_continuation() -> CommentRule {
        CommentRule {
            start: pat("\\\n"),
            end: pat(""),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::ignored(), CommentFlags::ignored()],
        }
    }

    fn double_quote_string() -> CommentRule {
        CommentRule {
            start: pat("\""),
            end: pat("\""),
            quote: Some(b'\\'),
            warn: Some(b'\n'),
            flags: [CommentFlags::string(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    fn single_quote_string() -> CommentRule {
        CommentRule {
            start: pat("'"),
            end: pat("'"),
            quote: Some(b'\\'),
            warn: Some(b'\n'),
            flags: [CommentFlags::string(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    /// `gpp.c: add_comment(P, "css", "%", "\n", 0, 0)`.
    fn percent_comment() -> CommentRule {
        CommentRule {
            start: pat("%"),
            end: pat("\n"),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    /// Prolog's `/* */` rule (`gpp.c: add_comment(P, "css", "\213/*", "*/",
    /// 0, 0)`): `\213` is `\!o`, "not preceded by an operator", which keeps
    /// this from colliding with Prolog's `/` division operator.
    fn prolog_block_comment() -> CommentRule {
        CommentRule {
            start: crate::pattern::Pattern::parse_escaped("\\!o/*", false).expect("constant pattern"),
            end: pat("*/"),
            quote: None,
            warn: None,
            flags: [CommentFlags::comment(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    /// Prolog's double-quote string (`gpp.c: add_comment(P, "sss", "\"",
    /// "\"", 0, '\n')`): no backslash escape, unlike the C preset's.
    fn prolog_double_quote_string() -> CommentRule {
        CommentRule {
            start: pat("\""),
            end: pat("\""),
            quote: None,
            warn: Some(b'\n'),
            flags: [CommentFlags::string(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    /// Prolog's single-quote string (`gpp.c: add_comment(P, "sss", "\207'",
    /// "'", 0, '\n')`): `\207` is `\!#`, "not preceded by a digit", so this
    /// doesn't swallow the `0'a` character-literal syntax.
    fn prolog_single_quote_string() -> CommentRule {
        CommentRule {
            start: crate::pattern::Pattern::parse_escaped("\\!#'", false).expect("constant pattern"),
            end: pat("'"),
            quote: None,
            warn: Some(b'\n'),
            flags: [CommentFlags::string(), CommentFlags::string(), CommentFlags::string()],
        }
    }

    pub fn spec(self) -> Spec {
        match self {
            Preset::C => Spec {
                user: Mode::k_user(),
                meta: Mode::k_meta(),
                comments: vec![
                    Self::slash_star_comment(),
                    Self::slash_slash_comment(),
                    Self::c_backslash_newline_continuation(),
                    Self::double_quote_string(),
                    Self::single_quote_string(),
                ],
                preservelf: true,
                op_set: default_op_set(),
                ext_op_set: default_ext_op_set(),
                id_set: default_id_set(),
            },
            Preset::Tex => Spec {
                user: Mode::tex(),
                meta: Mode::c_meta(),
                comments: Vec::new(),
                preservelf: false,
                op_set: default_op_set(),
                ext_op_set: default_ext_op_set(),
                id_set: default_id_set(),
            },
            Preset::Html => Spec {
                user: Mode::html(),
                meta: Mode::c_meta(),
                comments: Vec::new(),
                preservelf: false,
                op_set: default_op_set(),
                ext_op_set: default_ext_op_set(),
                id_set: default_id_set(),
            },
            Preset::XHtml => Spec {
                user: Mode::xhtml(),
                meta: Mode::c_meta(),
                comments: Vec::new(),
                preservelf: false,
                op_set: default_op_set(),
                ext_op_set: default_ext_op_set(),
                id_set: default_id_set(),
            },
            Preset::Prolog => Spec {
                user: Mode::k_user(),
                meta: Mode::k_meta(),
                comments: vec![
                    Self::prolog_block_comment(),
                    Self::prolog_backslash_newline_continuation(),
                    Self::percent_comment(),
                    Self::prolog_double_quote_string(),
                    Self::prolog_single_quote_string(),
                ],
                preservelf: true,
                op_set: prolog_op_set(),
                ext_op_set: default_ext_op_set(),
                id_set: default_id_set(),
            },
            Preset::Generic => Spec::generic(),
        }
    }
}

fn pat(s: &str) -> crate::pattern::Pattern {
    crate::pattern::Pattern::literal(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!(Preset::parse("C"), Some(Preset::C));
        assert_eq!(Preset::parse("tex"), Some(Preset::Tex));
        assert_eq!(Preset::parse("XHTML"), Some(Preset::XHtml));
        assert_eq!(Preset::parse("bogus"), None);
    }

    #[test]
    fn c_preset_has_preservelf_and_comments() {
        let spec = Preset::C.spec();
        assert!(spec.preservelf);
        assert_eq!(spec.comments.len(), 5);
    }

    #[test]
    fn generic_preset_matches_default_spec() {
        assert_eq!(Preset::Generic.spec(), Spec::generic());
    }

    #[test]
    fn prolog_preset_has_block_comment_and_guarded_quote() {
        let spec = Preset::Prolog.spec();
        assert_eq!(spec.comments.len(), 5);
        let block = &spec.comments[0];
        assert_eq!(block.flags[0], CommentFlags::comment());
        assert_eq!(block.flags[1], CommentFlags::string());
        let quote = &spec.comments[4];
        assert!(quote.quote.is_none());
    }

    #[test]
    fn c_and_prolog_backslash_continuation_differ() {
        let c = Preset::C.spec();
        let prolog = Preset::Prolog.spec();
        let c_rule = c.comments.iter().find(|r| r.start == pat("\\\n")).unwrap();
        let prolog_rule = prolog.comments.iter().find(|r| r.start == pat("\\\n")).unwrap();
        assert_eq!(c_rule.flags, [CommentFlags::comment(), CommentFlags::comment(), CommentFlags::comment()]);
        assert_eq!(prolog_rule.flags, [CommentFlags::comment(), CommentFlags::ignored(), CommentFlags::ignored()]);
    }
}
