//! The macro table: definitions, named-arg bookkeeping, and the `defined(x)`
//! built-in. `gpp.c: MACRO`, `findIdent`, `findNamedArg`.
//!
//! Splicing a macro *invocation* out of the input stream
//! (`gpp.c: SplicePossibleUser`) needs mutable access to the active input
//! context and recursive pre-expansion, so it lives in [`crate::engine`]
//! rather than here; this module only owns the table of definitions.

use std::collections::HashMap;

use crate::spec::Spec;

/// `nnamedargs`: `-1` untyped body using `#N` refs, `0..N` named
/// parameters, `-2` the built-in `defined(...)`.
pub const UNTYPED: i32 = -1;
pub const BUILTIN_DEFINED: i32 = -2;

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub body: String,
    pub named_args: Vec<String>,
    pub nnamedargs: i32,
    /// Spec in force at the definition site, cloned so later `#mode`
    /// changes don't affect macros already defined.
    pub define_spec: Spec,
    pub defined_in_comment: bool,
}

impl Macro {
    pub fn is_named(&self) -> bool {
        self.nnamedargs >= 0
    }

    /// `gpp.c: findNamedArg` — index of `name` among this macro's
    /// positional parameter names, if any.
    pub fn find_named_arg(&self, name: &str) -> Option<usize> {
        self.named_args.iter().position(|n| n == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable::default()
    }

    /// `#define` always first deletes an existing definition of the same
    /// name (spec.md §4.5) before installing the new one.
    pub fn define(&mut self, m: Macro) {
        self.macros.insert(m.name.clone(), m);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn find(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Macro {
        Macro {
            name: name.to_string(),
            body: "body".to_string(),
            named_args: Vec::new(),
            nnamedargs: UNTYPED,
            define_spec: Spec::generic(),
            defined_in_comment: false,
        }
    }

    #[test]
    fn redefining_replaces_the_previous_definition() {
        let mut table = MacroTable::new();
        table.define(sample("X"));
        let mut second = sample("X");
        second.body = "other".to_string();
        table.define(second);
        assert_eq!(table.find("X").unwrap().body, "other");
    }

    #[test]
    fn undef_is_a_no_op_when_absent() {
        let mut table = MacroTable::new();
        table.undef("nope");
        assert!(!table.is_defined("nope"));
    }

    #[test]
    fn find_named_arg_looks_up_positional_name() {
        let mut m = sample("f");
        m.named_args = vec!["a".into(), "b".into()];
        m.nnamedargs = 2;
        assert_eq!(m.find_named_arg("b"), Some(1));
        assert_eq!(m.find_named_arg("c"), None);
    }
}
