//! The 21 meta-directive names recognized after `Meta.mStart` + identifier.
//! `gpp.c: ParsePossibleMeta`'s directive-id table. The semantics for each
//! directive live on [`crate::engine::Engine`], which has the context
//! (spec stack, macro table, conditional stack, I/O) they need; this module
//! is just the name → id classification.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Define,
    Undef,
    Ifdef,
    Ifndef,
    Else,
    Endif,
    Include,
    Exec,
    Defeval,
    Ifeq,
    Ifneq,
    Eval,
    If,
    Mode,
    Line,
    File,
    Elif,
    Error,
    Warning,
    Date,
    Sinclude,
}

impl Directive {
    /// How many argument slots `findMetaArgs` should look for: `define`
    /// and `defeval` take two, most take one, a handful take zero.
    pub fn arg_slots(self) -> u8 {
        match self {
            Directive::Define | Directive::Defeval | Directive::Ifeq | Directive::Ifneq => 2,
            Directive::Else | Directive::Endif | Directive::Line | Directive::File => 0,
            _ => 1,
        }
    }

    pub fn from_name(name: &str) -> Option<Directive> {
        Some(match name {
            "define" => Directive::Define,
            "undef" => Directive::Undef,
            "ifdef" => Directive::Ifdef,
            "ifndef" => Directive::Ifndef,
            "else" => Directive::Else,
            "endif" => Directive::Endif,
            "include" => Directive::Include,
            "exec" => Directive::Exec,
            "defeval" => Directive::Defeval,
            "ifeq" => Directive::Ifeq,
            "ifneq" => Directive::Ifneq,
            "eval" => Directive::Eval,
            "if" => Directive::If,
            "mode" => Directive::Mode,
            "line" => Directive::Line,
            "file" => Directive::File,
            "elif" => Directive::Elif,
            "error" => Directive::Error,
            "warning" => Directive::Warning,
            "date" => Directive::Date,
            "sinclude" => Directive::Sinclude,
            _ => return None,
        })
    }

    /// `gpp.c`'s output-shape rule (spec.md §4.5): every directive except
    /// these replaces its own text with a blank line, preserving line
    /// count; these instead emit their own substitute content (or nothing)
    /// in place of the directive line.
    pub fn keeps_own_text(self) -> bool {
        matches!(
            self,
            Directive::Eval | Directive::Line | Directive::File | Directive::Date | Directive::Exec | Directive::Include | Directive::Sinclude
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_21_directives() {
        let names = [
            "define", "undef", "ifdef", "ifndef", "else", "endif", "include", "exec", "defeval", "ifeq", "ifneq", "eval", "if", "mode", "line",
            "file", "elif", "error", "warning", "date", "sinclude",
        ];
        for name in names {
            assert!(Directive::from_name(name).is_some(), "{name} should be recognized");
        }
        assert_eq!(names.len(), 21);
    }

    #[test]
    fn unknown_name_is_not_a_directive() {
        assert_eq!(Directive::from_name("bogus"), None);
    }

    #[test]
    fn define_and_defeval_take_two_arguments() {
        assert_eq!(Directive::Define.arg_slots(), 2);
        assert_eq!(Directive::Defeval.arg_slots(), 2);
        assert_eq!(Directive::If.arg_slots(), 1);
        assert_eq!(Directive::Endif.arg_slots(), 0);
    }
}
