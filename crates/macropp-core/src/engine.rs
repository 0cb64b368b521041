//! Ties every other module into the actual preprocessing loop.
//! `gpp.c: ProcessContext`, `ParseText`, `ParsePossibleMeta`,
//! `SplicePossibleUser`, `findMetaArgs`.

use std::path::Path;

use crate::charset::Charset;
use crate::context::input::InputContext;
use crate::context::output::OutputContext;
use crate::directives::Directive;
use crate::error::{EngineError, Location, Result};
use crate::eval::{EvalError, EvalResult, Evaluator};
use crate::include::{self, IncludeConfig};
use crate::macros::{Macro, MacroTable, BUILTIN_DEFINED, UNTYPED};
use crate::mode::Mode;
use crate::pattern::{is_delim, match_end_sequence, match_sequence, match_start_sequence, ClassSet, Pattern};
use crate::presets::Preset;
use crate::spec::{Ambience, Spec, SpecStack};

/// `gpp.c: STACKDEPTH` — bounds both `#if`/`#ifdef` nesting and macro
/// recursion depth, so a runaway self-referential macro aborts instead of
/// overflowing the native stack.
const STACKDEPTH: usize = 50;

/// `gpp.c: commented[]`/`iflevel` — 0 emits, 1 is a normal skipped branch,
/// 2 is "latched off": an ancestor branch was false, so no sibling `#elif`
/// at this level can ever turn output back on.
#[derive(Debug, Clone)]
struct ConditionalStack {
    state: Vec<u8>,
    /// Whether `#else` has already fired at each level, so a later `#elif`
    /// there can be rejected (spec.md §8 boundary behavior).
    in_else: Vec<bool>,
}

impl ConditionalStack {
    fn new() -> Self {
        ConditionalStack {
            state: vec![0],
            in_else: vec![false],
        }
    }

    fn current(&self) -> u8 {
        *self.state.last().expect("conditional stack is never empty")
    }

    fn iflevel(&self) -> usize {
        self.state.len() - 1
    }

    fn push(&mut self, value: u8, loc: &Location) -> Result<()> {
        if self.state.len() >= STACKDEPTH {
            return Err(EngineError::fatal(loc.clone(), "#if/#ifdef nested too deeply"));
        }
        self.state.push(value);
        self.in_else.push(false);
        Ok(())
    }

    fn pop(&mut self, loc: &Location) -> Result<u8> {
        if self.state.len() <= 1 {
            return Err(EngineError::fatal(loc.clone(), "#endif without matching #if"));
        }
        self.in_else.pop();
        Ok(self.state.pop().unwrap())
    }

    fn mark_else(&mut self, loc: &Location) -> Result<()> {
        if *self.in_else.last().expect("conditional stack is never empty") {
            return Err(EngineError::fatal(loc.clone(), "#else after #else at the same level"));
        }
        *self.in_else.last_mut().unwrap() = true;
        Ok(())
    }

    fn check_elif_allowed(&self, loc: &Location) -> Result<()> {
        if *self.in_else.last().expect("conditional stack is never empty") {
            return Err(EngineError::fatal(loc.clone(), "#elif after #else at the same level"));
        }
        Ok(())
    }

    fn set_current(&mut self, value: u8) {
        *self.state.last_mut().expect("conditional stack is never empty") = value;
    }
}

/// Which point in an include's lifecycle a marker is being written for
/// (`gpp.c: write_include_marker`'s third, literal `"1"`/`"2"`/`""` argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeMarkerKind {
    /// The top-level input file, before anything has been read.
    FileStart,
    /// Just before recursing into an included file.
    Entering,
    /// Just after returning from an included file, back in the parent.
    Returning,
}

impl IncludeMarkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IncludeMarkerKind::FileStart => "",
            IncludeMarkerKind::Entering => "1",
            IncludeMarkerKind::Returning => "2",
        }
    }
}

/// A compiled `--includemarker` format, called with `(kind, lineno, filename)`
/// at each include boundary. Building this from the raw format string (the
/// `%`/`?`-hole, `@`/`\`-escape syntax of spec.md §6) is the CLI's job, not
/// the engine's (spec.md §1: "the include-marker formatter" is an external
/// collaborator) — the engine only ever calls the finished closure.
pub type IncludeMarkerFn = std::rc::Rc<dyn Fn(IncludeMarkerKind, usize, &str) -> String>;

/// Everything about a run that isn't scanner syntax: where to look for
/// includes, what the CLI is allowed to do, how output is shaped.
#[derive(Clone)]
pub struct EngineConfig {
    pub include: IncludeConfig,
    /// `-x`: `#exec` is allowed to run shell commands.
    pub exec_allowed: bool,
    /// `-m`: switch to the C preset automatically on `.h`/`.c` includes.
    pub autoswitch: bool,
    /// `-z`: emit CRLF line endings.
    pub crlf: bool,
    /// `-O`: also echo output to standard out when writing to a file.
    pub file_and_stdout: bool,
    /// `--warninglevel`: warning verbosity (0 = silent).
    pub warning_level: u8,
    /// `--includemarker`: compiled marker formatter, when configured.
    pub include_marker: Option<IncludeMarkerFn>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("include", &self.include)
            .field("exec_allowed", &self.exec_allowed)
            .field("autoswitch", &self.autoswitch)
            .field("crlf", &self.crlf)
            .field("file_and_stdout", &self.file_and_stdout)
            .field("warning_level", &self.warning_level)
            .field("include_marker", &self.include_marker.is_some())
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            include: IncludeConfig::default(),
            exec_allowed: false,
            autoswitch: false,
            crlf: false,
            file_and_stdout: false,
            warning_level: 1,
            include_marker: None,
        }
    }
}

/// Owned copy of the three charsets a pattern match needs, so they can
/// outlive the `&self` borrow used to fetch them while `ctx`/`out` are
/// borrowed mutably for the match itself.
struct Classes {
    id_set: Charset,
    op_set: Charset,
    ext_op_set: Charset,
}

impl Classes {
    fn as_ref(&self) -> ClassSet<'_> {
        ClassSet {
            id_set: &self.id_set,
            op_set: &self.op_set,
            ext_op_set: &self.ext_op_set,
        }
    }
}

pub struct Engine {
    specs: SpecStack,
    macros: MacroTable,
    conditionals: ConditionalStack,
    config: EngineConfig,
    depth: usize,
}

impl Engine {
    pub fn new(base_spec: Spec, config: EngineConfig) -> Self {
        Engine {
            specs: SpecStack::new(base_spec),
            macros: MacroTable::new(),
            conditionals: ConditionalStack::new(),
            config,
            depth: 0,
        }
    }

    pub fn define_builtin(&mut self, name: &str, value: &str) {
        self.macros.define(Macro {
            name: name.to_string(),
            body: value.to_string(),
            named_args: Vec::new(),
            nnamedargs: UNTYPED,
            define_spec: self.specs.top().clone(),
            defined_in_comment: false,
        });
    }

    /// `-D`/`+D`: pre-seeds a macro definition before any input is read,
    /// using the same head syntax as `#define` (`NAME`, or `NAME(a,b)` for
    /// a named-argument macro).
    pub fn define_from_cli(&mut self, head: &str, body: &str) {
        let (name, named_args, nnamedargs) = parse_define_head(head.trim());
        self.macros.define(Macro {
            name,
            body: body.to_string(),
            named_args,
            nnamedargs,
            define_spec: self.specs.top().clone(),
            defined_in_comment: false,
        });
    }

    fn classes(&self) -> Classes {
        let spec = self.specs.top();
        Classes {
            id_set: spec.id_set,
            op_set: spec.op_set,
            ext_op_set: spec.ext_op_set,
        }
    }

    fn loc(&self, ctx: &InputContext) -> Location {
        Location::new(ctx.filename().to_string(), ctx.lineno())
    }

    /// `gpp.c: ProcessContext` — drains `ctx` into `out` until exhausted.
    pub fn process(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<()> {
        loop {
            if let Some(e) = ctx.take_io_error() {
                return Err(EngineError::Io(e));
            }
            if ctx.is_exhausted(1) {
                break;
            }
            self.parse_text(ctx, out)?;
            if let Some(e) = ctx.take_io_error() {
                return Err(EngineError::Io(e));
            }
        }
        if self.conditionals.iflevel() != 0 {
            return Err(EngineError::fatal(self.loc(ctx), "unterminated #if at end of input"));
        }
        Ok(())
    }

    /// Recursively pre-expands `text` in a fresh string context under
    /// `spec`, optionally with named-parameter bindings, returning the
    /// resulting output buffer. `gpp.c`'s macro-body and argument
    /// pre-expansion calls, which all recurse through `ProcessText`.
    fn expand_in(&mut self, text: &str, spec: Spec, filename: &str, lineno: usize, ambience: Ambience, named_args: Option<Vec<(String, String)>>) -> Result<String> {
        if self.depth >= STACKDEPTH {
            return Err(EngineError::fatal(Location::new(filename, lineno), "macro expansion nested too deeply (possible infinite recursion)"));
        }
        self.depth += 1;
        self.specs.push(spec);
        let mut sub_ctx = InputContext::from_string(text, filename, lineno, ambience);
        sub_ctx.may_have_args = named_args.is_some();
        sub_ctx.named_args = named_args;
        let mut sub_out = OutputContext::buffer();
        let result = self.process(&mut sub_ctx, &mut sub_out);
        self.specs.pop();
        self.depth -= 1;
        result?;
        Ok(sub_out.into_buffer_string())
    }

    fn expand_argument(&mut self, text: &str, ctx: &InputContext) -> Result<String> {
        let spec = self.specs.top().clone();
        self.expand_in(text, spec, ctx.filename(), ctx.lineno(), Ambience::User, None)
    }

    /// `gpp.c: ParseText` — one step: try a comment/string rule, then a
    /// meta-directive, then a user-macro call, then a positional argument
    /// reference, else pass one identifier or character through untouched.
    fn parse_text(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<()> {
        if let Some(end) = self.try_comment(ctx, out)? {
            ctx.shift_in(end);
            return Ok(());
        }
        if let Some(end) = self.try_meta(ctx, out)? {
            ctx.shift_in(end);
            return Ok(());
        }
        if let Some(end) = self.try_user_macro(ctx, out)? {
            ctx.shift_in(end);
            return Ok(());
        }
        if ctx.may_have_args {
            if let Some(end) = self.try_arg_ref(ctx, out)? {
                ctx.shift_in(end);
                return Ok(());
            }
        }
        let quotechar = self.specs.top().user.quotechar;
        let mut end = self.identifier_end(ctx, 1, quotechar);
        if end == 1 {
            end = 2;
        }
        self.emit_range(ctx, out, 1, end)?;
        ctx.shift_in(end);
        Ok(())
    }

    // ---- identifier scanning (gpp.c: identifierEnd / iterIdentifierEnd) ----

    fn identifier_end(&self, ctx: &mut InputContext, start: usize, quotechar: Option<u8>) -> usize {
        let mut c = ctx.get_char(start);
        if c == 0 {
            return start;
        }
        let mut pos = start;
        if Some(c) == quotechar {
            let c2 = ctx.get_char(pos + 1);
            if c2 == 0 {
                return pos + 1;
            }
            if is_delim(c2) {
                return pos + 2;
            }
            pos += 2;
            c = ctx.get_char(pos);
        }
        while !is_delim(c) {
            pos += 1;
            c = ctx.get_char(pos);
        }
        pos
    }

    fn iter_identifier_end(&self, ctx: &mut InputContext, start: usize, quotechar: Option<u8>) -> usize {
        let mut pos = start;
        loop {
            let next = self.identifier_end(ctx, pos, quotechar);
            if next == pos {
                return next;
            }
            pos = next;
        }
    }

    fn read_text(&self, ctx: &mut InputContext, s: usize, e: usize) -> String {
        let mut bytes = Vec::with_capacity(e.saturating_sub(s));
        for p in s..e {
            bytes.push(ctx.get_char(p));
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Emits raw input bytes `[s, e)`, respecting the active conditional
    /// state: while commented, every newline in the range becomes a blank
    /// output line and everything else is dropped, so line numbers in
    /// downstream output stay aligned with the input (spec.md invariant 4).
    fn emit_range(&mut self, ctx: &mut InputContext, out: &mut OutputContext, s: usize, e: usize) -> Result<()> {
        if self.conditionals.current() == 0 {
            let quotechar = self.specs.top().user.quotechar;
            let mut i = s;
            while i < e {
                let c = ctx.get_char(i);
                if let Some(q) = quotechar {
                    if c == q && i + 1 < e {
                        out.put(c)?;
                        i += 1;
                        out.put(ctx.get_char(i))?;
                        i += 1;
                        continue;
                    }
                }
                out.put(c)?;
                i += 1;
            }
        } else {
            for p in s..e {
                if ctx.get_char(p) == b'\n' {
                    out.put(b'\n')?;
                }
            }
        }
        Ok(())
    }

    fn emit_text_literal(&mut self, out: &mut OutputContext, text: &str) -> Result<()> {
        if self.conditionals.current() == 0 {
            out.put_str(text)?;
        } else {
            for b in text.bytes() {
                if b == b'\n' {
                    out.put(b'\n')?;
                }
            }
        }
        Ok(())
    }

    // ---- comments / strings (gpp.c: skip over a CommentRule match) ----

    fn try_comment(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<Option<usize>> {
        if ctx.in_comment {
            return Ok(None);
        }
        let ambience = ctx.ambience;
        let comments = self.specs.top().comments.clone();
        let preservelf = self.specs.top().preservelf;
        let classes = self.classes();

        for rule in &comments {
            let flags = rule.flags_for(ambience);
            let mut start_pos = 1usize;
            if !match_start_sequence(&rule.start, &mut start_pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
                continue;
            }
            let content_start = start_pos;
            let mut scan = content_start;
            loop {
                if ctx.is_exhausted(scan) {
                    if rule.end.is_empty() {
                        // line-continuation style rule with no terminator: EOF ends it.
                        return self.finish_comment(ctx, out, flags, 1, content_start, scan, scan).map(Some);
                    }
                    return Err(EngineError::fatal(self.loc(ctx), "end of input inside comment or string"));
                }
                if let Some(q) = rule.quote {
                    if ctx.get_char(scan) == q {
                        scan += 2;
                        continue;
                    }
                }
                let mut end_try = scan;
                if match_end_sequence(&rule.end, &mut end_try, &classes.as_ref(), preservelf, &mut |p| ctx.get_char(p)) {
                    return self.finish_comment(ctx, out, flags, 1, content_start, scan, end_try).map(Some);
                }
                scan += 1;
            }
        }
        Ok(None)
    }

    fn finish_comment(
        &mut self,
        ctx: &mut InputContext,
        out: &mut OutputContext,
        flags: crate::spec::CommentFlags,
        delim_start: usize,
        content_start: usize,
        content_end: usize,
        total_end: usize,
    ) -> Result<usize> {
        if flags.ignore {
            return Ok(total_end);
        }
        if flags.output_delim {
            self.emit_range(ctx, out, delim_start, content_start)?;
        }
        if flags.output_text {
            if flags.parse_macros {
                let inner = self.read_text(ctx, content_start, content_end);
                let expanded = self.expand_argument(&inner, ctx)?;
                self.emit_text_literal(out, &expanded)?;
            } else {
                self.emit_range(ctx, out, content_start, content_end)?;
            }
        } else if self.config.include_marker.is_some() {
            for p in content_start..content_end {
                if ctx.get_char(p) == b'\n' {
                    out.put(b'\n')?;
                }
            }
        }
        if flags.output_delim {
            self.emit_range(ctx, out, content_end, total_end)?;
        }
        Ok(total_end)
    }

    // ---- meta-directives (gpp.c: ParsePossibleMeta / findMetaArgs) ----

    fn try_meta(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<Option<usize>> {
        let meta = self.specs.top().meta.clone();
        let classes = self.classes();
        let mut pos = 1usize;
        if !match_sequence(&meta.m_start, &mut pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
            return Ok(None);
        }
        let id_start = pos;
        let id_end = self.identifier_end(ctx, id_start, meta.quotechar);
        if id_end == id_start {
            return Ok(None);
        }
        let name = self.read_text(ctx, id_start, id_end);
        let Some(directive) = Directive::from_name(&name) else {
            return Ok(None);
        };
        let (args, end) = self.find_meta_args(ctx, id_end, directive.arg_slots())?;
        let arg_texts: Vec<String> = args.iter().map(|&(s, e)| self.read_text(ctx, s, e)).collect();
        self.dispatch_directive(ctx, out, directive, &arg_texts, end)?;
        Ok(Some(end))
    }

    /// `gpp.c: findMetaArgs` — scans `slots` arguments starting at `start`,
    /// separated by `Meta.mArgSep` and terminated by `Meta.mArgE`, honoring
    /// `Meta.stackchar`/`unstackchar` nesting so e.g. a parenthesized
    /// expression inside a `#define` body isn't split early.
    fn find_meta_args(&mut self, ctx: &mut InputContext, start: usize, slots: u8) -> Result<(Vec<(usize, usize)>, usize)> {
        let meta = self.specs.top().meta.clone();
        let classes = self.classes();

        if slots == 0 {
            let mut pos = start;
            if match_end_sequence(&meta.m_end, &mut pos, &classes.as_ref(), self.specs.top().preservelf, &mut |p| ctx.get_char(p)) {
                return Ok((Vec::new(), pos));
            }
            let mut p = start;
            while !matches!(ctx.get_char(p), b'\n' | 0) {
                p += 1;
            }
            if self.config.warning_level > 0 {
                log::warn!("{}: extra text after directive ignored", self.loc(ctx));
            }
            return Ok((Vec::new(), (p + 1).max(start + 1)));
        }

        let mut pos = start;
        if !match_sequence(&meta.m_arg_s, &mut pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
            return Err(EngineError::fatal(self.loc(ctx), "missing argument to directive"));
        }

        let mut spans = Vec::new();
        let mut remaining = slots;
        loop {
            let arg_start = pos;
            let mut depth = 0i32;
            let reached_end;
            loop {
                pos = self.iter_identifier_end(ctx, pos, meta.quotechar);
                let c = ctx.get_char(pos);
                if c == 0 {
                    return Err(EngineError::fatal(self.loc(ctx), "end of input inside directive argument"));
                }
                if meta.stackchar.contains(c) {
                    depth += 1;
                }
                if depth > 0 {
                    if meta.unstackchar.contains(c) {
                        depth -= 1;
                    }
                    pos += 1;
                    continue;
                }
                let arg_end = pos;
                if remaining > 1 {
                    let mut sep_pos = pos;
                    if match_sequence(&meta.m_arg_sep, &mut sep_pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
                        spans.push((arg_start, arg_end));
                        pos = sep_pos;
                        reached_end = false;
                        break;
                    }
                }
                let mut end_pos = pos;
                if match_end_sequence(&meta.m_arg_e, &mut end_pos, &classes.as_ref(), self.specs.top().preservelf, &mut |p| ctx.get_char(p)) {
                    spans.push((arg_start, arg_end));
                    pos = end_pos;
                    reached_end = true;
                    break;
                }
                pos += 1;
            }
            remaining -= 1;
            if reached_end || remaining == 0 {
                return Ok((spans, pos));
            }
        }
    }

    fn dispatch_directive(&mut self, ctx: &mut InputContext, out: &mut OutputContext, directive: Directive, args: &[String], end: usize) -> Result<()> {
        let loc = self.loc(ctx);
        let commented = self.conditionals.current() != 0;

        match directive {
            Directive::Define if !commented => self.do_define(ctx, &args[0], &args[1])?,
            Directive::Defeval if !commented => self.do_defeval(ctx, out, &args[0], &args[1])?,
            Directive::Undef if !commented => {
                self.macros.undef(args[0].trim());
            }
            // A nested #if* inside an already-suppressed branch inherits that
            // suppression permanently (state 2: never re-enabled by a sibling
            // #elif/#else), rather than evaluating its own condition.
            Directive::Ifdef if commented => self.conditionals.push(2, &loc)?,
            Directive::Ifdef => {
                let truth = self.macros.is_defined(args[0].trim());
                self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
            }
            Directive::Ifndef if commented => self.conditionals.push(2, &loc)?,
            Directive::Ifndef => {
                let truth = !self.macros.is_defined(args[0].trim());
                self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
            }
            Directive::If if commented => self.conditionals.push(2, &loc)?,
            Directive::If => {
                let truth = self.eval_condition(ctx, &args[0])?;
                self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
            }
            Directive::Ifeq if commented => self.conditionals.push(2, &loc)?,
            Directive::Ifeq => {
                let truth = self.text_eq(ctx, &args[0], &args[1])?;
                self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
            }
            Directive::Ifneq if commented => self.conditionals.push(2, &loc)?,
            Directive::Ifneq => {
                let truth = !self.text_eq(ctx, &args[0], &args[1])?;
                self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
            }
            Directive::Elif => {
                self.conditionals.check_elif_allowed(&loc)?;
                let was = self.conditionals.pop(&loc)?;
                if was == 2 || was == 0 {
                    self.conditionals.push(2, &loc)?;
                } else {
                    let truth = self.eval_condition(ctx, &args[0])?;
                    self.conditionals.push(if truth { 0 } else { 1 }, &loc)?;
                }
            }
            Directive::Else => {
                self.conditionals.mark_else(&loc)?;
                let was = self.conditionals.current();
                self.conditionals.set_current(if was == 1 { 0 } else { 2 });
            }
            Directive::Endif => {
                self.conditionals.pop(&loc)?;
            }
            Directive::Eval if !commented => {
                let expanded = self.expand_argument(&args[0], ctx)?;
                let evaluator = Evaluator::new();
                match evaluator.eval(&expanded) {
                    Ok(v) => self.emit_text_literal(out, &v.to_text())?,
                    Err(e) => return Err(EngineError::fatal(loc, format!("invalid expression: {e}"))),
                }
            }
            Directive::Include | Directive::Sinclude if !commented => {
                self.do_include(ctx, out, &args[0], directive == Directive::Sinclude)?;
            }
            Directive::Line if !commented => {
                self.emit_text_literal(out, "\n")?;
                self.emit_text_literal(out, &ctx.lineno().to_string())?;
            }
            Directive::File if !commented => {
                self.emit_text_literal(out, "\n")?;
                let filename = ctx.filename().to_string();
                self.emit_text_literal(out, &filename)?;
            }
            Directive::Error if !commented => {
                return Err(EngineError::UserError { location: loc, message: args[0].clone() });
            }
            Directive::Warning if !commented => {
                if self.config.warning_level > 0 {
                    log::warn!("{}: {}", loc, args[0]);
                }
            }
            Directive::Date if !commented => {
                let fmt = self.expand_argument(&args[0], ctx)?;
                let fmt = if fmt.trim().is_empty() { "%c" } else { fmt.as_str() };
                let text = chrono::Local::now().format(fmt).to_string();
                self.emit_text_literal(out, &text)?;
            }
            Directive::Mode if !commented => self.do_mode(ctx, &args[0])?,
            Directive::Exec if !commented => self.do_exec(ctx, out, &args[0])?,
            _ => {}
        }

        // Directives that don't emit their own substitute text (define,
        // ifdef, endif, mode, ...) leave a blank line in their place so
        // downstream line numbers still line up with the input; eval/line/
        // file/date/exec/include do that themselves when active, but still
        // need the blank filled in when skipped by an enclosing commented
        // branch.
        if !directive.keeps_own_text() || commented {
            self.emit_text_literal(out, "\n")?;
        }
        let _ = end;
        Ok(())
    }

    fn eval_condition(&mut self, ctx: &mut InputContext, expr: &str) -> Result<bool> {
        let expanded = self.expand_argument(expr, ctx)?;
        let substituted = self.substitute_defined(&expanded);
        match Evaluator::new().eval_numeric(&substituted) {
            Ok(n) => Ok(n != 0),
            Err(EvalError::NotNumeric) => Ok(!substituted.trim().is_empty() && substituted.trim() != "0"),
            Err(e) => Err(EngineError::fatal(self.loc(ctx), format!("invalid expression: {e}"))),
        }
    }

    /// Replaces every `defined(IDENT)` occurrence with `1`/`0` before the
    /// arithmetic evaluator sees the expression, standing in for the
    /// built-in `defined` phantom macro (`gpp.c: BUILTIN_DEFINED`).
    fn substitute_defined(&self, expr: &str) -> String {
        let bytes = expr.as_bytes();
        let mut out = String::with_capacity(expr.len());
        let mut i = 0;
        while i < bytes.len() {
            if expr[i..].starts_with("defined") {
                let mut j = i + "defined".len();
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'(' {
                    let mut k = j + 1;
                    while k < bytes.len() && bytes[k] != b')' {
                        k += 1;
                    }
                    if k < bytes.len() {
                        let name = expr[j + 1..k].trim();
                        out.push(if self.macros.is_defined(name) { '1' } else { '0' });
                        i = k + 1;
                        continue;
                    }
                }
            }
            out.push(bytes[i] as char);
            i += 1;
        }
        out
    }

    fn text_eq(&mut self, ctx: &InputContext, a: &str, b: &str) -> Result<bool> {
        let a = self.expand_argument(a, ctx)?;
        let b = self.expand_argument(b, ctx)?;
        Ok(a.trim() == b.trim())
    }

    fn do_define(&mut self, ctx: &InputContext, head: &str, body: &str) -> Result<()> {
        let head = head.trim();
        let (name, named_args, nnamedargs) = parse_define_head(head);
        self.macros.define(Macro {
            name,
            body: body.to_string(),
            named_args,
            nnamedargs,
            define_spec: self.specs.top().clone(),
            defined_in_comment: ctx.in_comment,
        });
        Ok(())
    }

    fn do_defeval(&mut self, ctx: &mut InputContext, out: &mut OutputContext, head: &str, body: &str) -> Result<()> {
        let expanded_body = self.expand_argument(body, ctx)?;
        self.do_define(ctx, head, &expanded_body)?;
        let _ = out;
        Ok(())
    }

    fn do_include(&mut self, ctx: &mut InputContext, out: &mut OutputContext, arg: &str, silent: bool) -> Result<()> {
        let filename = include::strip_quotes(arg.trim());
        let current_dir = Path::new(ctx.filename()).parent();
        let resolved = include::resolve(filename, current_dir, &self.config.include);
        let Some(path) = resolved else {
            if silent {
                return Ok(());
            }
            return Err(EngineError::IncludeNotFound(filename.into()));
        };
        let autoswitch_spec = if self.config.autoswitch && include::looks_like_c_header(filename) {
            Some(Preset::C.spec())
        } else {
            None
        };
        let file = std::fs::File::open(&path)?;
        let path_str = path.display().to_string();
        if let Some(marker) = self.config.include_marker.clone() {
            let text = marker(IncludeMarkerKind::Entering, 1, &path_str);
            self.emit_text_literal(out, &text)?;
        }
        if self.depth >= STACKDEPTH {
            return Err(EngineError::fatal(self.loc(ctx), "#include nested too deeply"));
        }
        self.depth += 1;
        self.specs.push_clone();
        if let Some(spec) = autoswitch_spec {
            *self.specs.top_mut() = spec;
        }
        let mut sub_ctx = InputContext::from_reader(Box::new(file), path_str, Ambience::Text);
        let result = self.process(&mut sub_ctx, out);
        self.specs.pop();
        self.depth -= 1;
        result?;
        if let Some(marker) = self.config.include_marker.clone() {
            let text = marker(IncludeMarkerKind::Returning, ctx.lineno(), ctx.filename());
            self.emit_text_literal(out, &text)?;
        }
        Ok(())
    }

    /// Writes the top-of-file include marker (`IncludeMarkerKind::FileStart`),
    /// when one is configured. Called once by the CLI driver before
    /// [`Engine::process`] on the primary input.
    pub fn write_file_start_marker(&mut self, out: &mut OutputContext, filename: &str) -> Result<()> {
        if let Some(marker) = self.config.include_marker.clone() {
            let text = marker(IncludeMarkerKind::FileStart, 1, filename);
            self.emit_text_literal(out, &text)?;
        }
        Ok(())
    }

    fn do_exec(&mut self, ctx: &mut InputContext, out: &mut OutputContext, command: &str) -> Result<()> {
        if !self.config.exec_allowed {
            return Err(EngineError::fatal(self.loc(ctx), "#exec is disabled (pass --enable-exec to allow it)"));
        }
        let output = std::process::Command::new("sh").arg("-c").arg(command).output()?;
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        self.emit_text_literal(out, &text)
    }

    fn do_mode(&mut self, ctx: &mut InputContext, args: &str) -> Result<()> {
        let tokens = tokenize_mode_args(args);
        let Some((cmd, rest)) = tokens.split_first() else {
            return Ok(());
        };
        let loc = self.loc(ctx);
        match cmd.as_str() {
            "save" | "push" => self.specs.push_clone(),
            "restore" | "pop" => {
                if self.specs.pop().is_none() {
                    return Err(EngineError::fatal(loc, "#mode restore without matching #mode save"));
                }
            }
            "standard" | "preset" => {
                if let Some(name) = rest.first() {
                    if let Some(preset) = Preset::parse(name) {
                        *self.specs.top_mut() = preset.spec();
                    }
                }
            }
            "preservelf" => {
                self.specs.top_mut().preservelf = rest.first().map(|v| v == "on" || v == "1").unwrap_or(true);
            }
            "quote" | "quoteon" => {
                self.specs.top_mut().user.quotechar = rest.first().and_then(|s| s.bytes().next());
            }
            "unquote" | "quoteoff" => {
                self.specs.top_mut().user.quotechar = None;
            }
            "nocomment" => self.specs.top_mut().comments.clear(),
            "charset" => {
                if rest.len() >= 2 {
                    if let Ok(set) = crate::charset::Charset::from_spec(&rest[1]) {
                        match rest[0].as_str() {
                            "op" | "operator" => self.specs.top_mut().op_set = set,
                            "par" | "group" | "ext" => self.specs.top_mut().ext_op_set = set,
                            "id" | "identifier" => self.specs.top_mut().id_set = set,
                            _ => {}
                        }
                    }
                }
            }
            "user" if rest.len() >= 9 => {
                self.specs.top_mut().user = mode_from_tokens(&rest[..9])?;
            }
            "meta" if rest.len() >= 7 => {
                self.specs.top_mut().meta = mode_from_tokens_meta(&rest[..7])?;
            }
            _ => {}
        }
        Ok(())
    }

    // ---- user macro splicing (gpp.c: SplicePossibleUser) ----

    fn try_user_macro(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<Option<usize>> {
        let user = self.specs.top().user.clone();
        let classes = self.classes();
        let mut pos = 1usize;
        if !match_start_sequence(&user.m_start, &mut pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
            return Ok(None);
        }
        let id_start = pos;
        let id_end = self.identifier_end(ctx, id_start, user.quotechar);
        if id_end == id_start {
            return Ok(None);
        }
        let name = self.read_text(ctx, id_start, id_end);

        if let Some(named) = ctx.named_args.clone() {
            if let Some((_, value)) = named.iter().find(|(n, _)| n == &name) {
                self.emit_text_literal(out, value)?;
                return Ok(Some(id_end));
            }
        }

        let mut sh_pos = id_end;
        let short_end = match_end_sequence(&user.m_end, &mut sh_pos, &classes.as_ref(), self.specs.top().preservelf, &mut |p| ctx.get_char(p)).then_some(sh_pos);

        let mut lg_pos = id_end;
        let has_long_start = match_sequence(&user.m_arg_s, &mut lg_pos, &classes.as_ref(), &mut |p| ctx.get_char(p));

        let Some(mac) = self.macros.find(&name).cloned() else {
            return Ok(None);
        };

        if has_long_start {
            if let Ok((arg_spans, call_end)) = self.scan_call_args(ctx, lg_pos, &user) {
                let mut expanded_args = Vec::with_capacity(arg_spans.len());
                for (s, e) in arg_spans {
                    let raw = self.read_text(ctx, s, e);
                    expanded_args.push(self.expand_argument(&raw, ctx)?);
                }
                self.expand_macro_call(ctx, out, &mac, &expanded_args, true)?;
                return Ok(Some(call_end));
            }
        }
        if let Some(end) = short_end {
            self.expand_macro_call(ctx, out, &mac, &[], false)?;
            return Ok(Some(end));
        }
        Ok(None)
    }

    /// Scans a long-form call's argument list starting right after
    /// `Mode.mArgS`, honoring `stackchar`/`unstackchar` nesting, until
    /// `Mode.mArgE`. Unbounded argument count (`gpp.c` caps at `MAXARGS`,
    /// 32, purely as a fixed-array limit that doesn't apply here).
    fn scan_call_args(&mut self, ctx: &mut InputContext, start: usize, mode: &Mode) -> std::result::Result<(Vec<(usize, usize)>, usize), ()> {
        let classes = self.classes();
        let mut pos = start;
        let mut spans = Vec::new();
        loop {
            let arg_start = pos;
            let mut depth = 0i32;
            loop {
                pos = self.iter_identifier_end(ctx, pos, mode.quotechar);
                let c = ctx.get_char(pos);
                if c == 0 {
                    return Err(());
                }
                if mode.stackchar.contains(c) {
                    depth += 1;
                }
                if depth > 0 {
                    if mode.unstackchar.contains(c) {
                        depth -= 1;
                    }
                    pos += 1;
                    continue;
                }
                let arg_end = pos;
                let mut sep_pos = pos;
                if match_sequence(&mode.m_arg_sep, &mut sep_pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
                    spans.push((arg_start, arg_end));
                    pos = sep_pos;
                    break;
                }
                let mut end_pos = pos;
                if match_sequence(&mode.m_arg_e, &mut end_pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
                    spans.push((arg_start, arg_end));
                    return Ok((spans, end_pos));
                }
                pos += 1;
            }
        }
    }

    fn expand_macro_call(&mut self, ctx: &mut InputContext, out: &mut OutputContext, mac: &Macro, args: &[String], long_form: bool) -> Result<()> {
        if mac.nnamedargs == BUILTIN_DEFINED {
            let truth = args.first().map(|a| self.macros.is_defined(a.trim())).unwrap_or(false);
            return self.emit_text_literal(out, if truth { "1" } else { "0" });
        }

        if mac.is_named() {
            let named_args: Vec<(String, String)> = mac
                .named_args
                .iter()
                .cloned()
                .zip(args.iter().cloned().chain(std::iter::repeat(String::new())))
                .take(mac.named_args.len())
                .collect();
            let expanded = self.expand_in(&mac.body, mac.define_spec.clone(), ctx.filename(), ctx.lineno(), Ambience::Text, Some(named_args))?;
            return self.emit_text_literal(out, &expanded);
        }

        let has_refs = body_has_positional_refs(&mac.body, mac.define_spec.user.m_arg_ref.first_byte().unwrap_or(b'#'));
        if !has_refs && long_form && mac.define_spec.user.m_end.is_empty() {
            let invocation = format!(
                "{}{}{}{}",
                mac.body,
                mac.define_spec.user.m_arg_s.render_literal(),
                args.join(&mac.define_spec.user.m_arg_sep.render_literal()),
                mac.define_spec.user.m_arg_e.render_literal(),
            );
            let expanded = self.expand_in(&invocation, self.specs.top().clone(), ctx.filename(), ctx.lineno(), Ambience::Text, None)?;
            return self.emit_text_literal(out, &expanded);
        }

        if self.depth >= STACKDEPTH {
            return Err(EngineError::fatal(self.loc(ctx), "macro expansion nested too deeply (possible infinite recursion)"));
        }
        self.depth += 1;
        self.specs.push(mac.define_spec.clone());
        let mut body_ctx = InputContext::from_string(&mac.body, ctx.filename(), ctx.lineno(), Ambience::Text);
        body_ctx.may_have_args = true;
        body_ctx.args = args.to_vec();
        let mut body_out = OutputContext::buffer();
        let result = self.process(&mut body_ctx, &mut body_out);
        self.specs.pop();
        self.depth -= 1;
        let expanded = result.map(|_| body_out.into_buffer_string())?;
        self.emit_text_literal(out, &expanded)
    }

    fn try_arg_ref(&mut self, ctx: &mut InputContext, out: &mut OutputContext) -> Result<Option<usize>> {
        let arg_ref = self.specs.top().user.m_arg_ref.clone();
        let classes = self.classes();
        let mut pos = 1usize;
        if !match_sequence(&arg_ref, &mut pos, &classes.as_ref(), &mut |p| ctx.get_char(p)) {
            return Ok(None);
        }
        let digit = ctx.get_char(pos);
        if !digit.is_ascii_digit() || digit == b'0' {
            return Ok(None);
        }
        let idx = (digit - b'1') as usize;
        let end = pos + 1;
        if let Some(text) = ctx.args.get(idx).cloned() {
            self.emit_text_literal(out, &text)?;
            Ok(Some(end))
        } else {
            Ok(None)
        }
    }
}

/// `gpp.c`: `#define NAME(a,b) body` vs `#define NAME body` — a named
/// macro's head is `NAME(arg,arg,...)`; anything else is an untyped macro
/// referenced by `#1`/`#2` in its body.
fn parse_define_head(head: &str) -> (String, Vec<String>, i32) {
    if let Some(paren) = head.find('(') {
        if head.ends_with(')') {
            let name = head[..paren].trim().to_string();
            let arg_list = &head[paren + 1..head.len() - 1];
            let named_args: Vec<String> = if arg_list.trim().is_empty() {
                Vec::new()
            } else {
                arg_list.split(',').map(|a| a.trim().to_string()).collect()
            };
            let n = named_args.len() as i32;
            return (name, named_args, n);
        }
    }
    let mut parts = head.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").to_string();
    (name, Vec::new(), UNTYPED)
}

fn body_has_positional_refs(body: &str, arg_ref_byte: u8) -> bool {
    let bytes = body.as_bytes();
    bytes.windows(2).any(|w| w[0] == arg_ref_byte && w[1].is_ascii_digit() && w[1] != b'0')
}

/// Splits `#mode user`/`#mode meta`'s argument text into whitespace- or
/// quote-delimited tokens (`gpp.c`'s `strNl2` tokenizing loop, simplified:
/// no nested escapes inside a quoted token beyond the closing quote).
fn tokenize_mode_args(args: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = args.trim().chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if c.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn mode_from_tokens(t: &[String]) -> Result<Mode> {
    mode_from_strings(t, true)
}

fn mode_from_tokens_meta(t: &[String]) -> Result<Mode> {
    meta_mode_from_strings(t, true)
}

/// Builds a user-macro [`Mode`] from 9 delimiter-pattern strings: `mStart
/// mEnd mArgS mArgSep mArgE mArgRef quotechar stackchar unstackchar`.
/// `strict` selects `Pattern::parse_escaped`'s stricter validation, used for
/// `#mode user` string literals; CLI-supplied `-U` arguments use the
/// tolerant form (spec.md §6, §11.2).
pub fn mode_from_strings(t: &[String], strict: bool) -> Result<Mode> {
    Ok(Mode {
        m_start: Pattern::parse_escaped(&t[0], strict).map_err(mode_err)?,
        m_end: Pattern::parse_escaped(&t[1], strict).map_err(mode_err)?,
        m_arg_s: Pattern::parse_escaped(&t[2], strict).map_err(mode_err)?,
        m_arg_sep: Pattern::parse_escaped(&t[3], strict).map_err(mode_err)?,
        m_arg_e: Pattern::parse_escaped(&t[4], strict).map_err(mode_err)?,
        m_arg_ref: Pattern::parse_escaped(&t[5], strict).map_err(mode_err)?,
        quotechar: t[6].bytes().next(),
        stackchar: crate::charset::Charset::from_spec(&t[7]).map_err(charset_err)?,
        unstackchar: crate::charset::Charset::from_spec(&t[8]).map_err(charset_err)?,
    })
}

/// Builds a meta-directive [`Mode`] from 7 delimiter-pattern strings (no
/// `stackchar`/`unstackchar`: directive argument lists don't nest on
/// grouping characters the way user-macro calls do).
pub fn meta_mode_from_strings(t: &[String], strict: bool) -> Result<Mode> {
    Ok(Mode {
        m_start: Pattern::parse_escaped(&t[0], strict).map_err(mode_err)?,
        m_end: Pattern::parse_escaped(&t[1], strict).map_err(mode_err)?,
        m_arg_s: Pattern::parse_escaped(&t[2], strict).map_err(mode_err)?,
        m_arg_sep: Pattern::parse_escaped(&t[3], strict).map_err(mode_err)?,
        m_arg_e: Pattern::parse_escaped(&t[4], strict).map_err(mode_err)?,
        m_arg_ref: Pattern::parse_escaped(&t[5], strict).map_err(mode_err)?,
        quotechar: t[6].bytes().next(),
        stackchar: crate::charset::Charset::empty(),
        unstackchar: crate::charset::Charset::empty(),
    })
}

fn mode_err(e: crate::pattern::PatternError) -> EngineError {
    EngineError::fatal(Location::new("<mode>", 0), e.to_string())
}

fn charset_err(e: crate::charset::CharsetError) -> EngineError {
    EngineError::fatal(Location::new("<mode>", 0), e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(spec: Spec, config: EngineConfig, text: &str) -> String {
        let mut engine = Engine::new(spec, config);
        let mut ctx = InputContext::from_string(text, "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        engine.process(&mut ctx, &mut out).unwrap();
        out.into_buffer_string()
    }

    #[test]
    fn simple_define_and_call() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define GREETING hello\nGREETING world\n");
        assert_eq!(out, "\nhello world\n");
    }

    #[test]
    fn named_args_with_positional_fallback() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define ADD(a,b) a+b\nADD(1,2)\n");
        assert_eq!(out.trim(), "1+2");
    }

    #[test]
    fn untyped_macro_with_hash_refs() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define PAIR(#1,#2)\nPAIR(x,y)\n");
        assert_eq!(out.trim(), "x,y");
    }

    #[test]
    fn conditional_suppresses_output_as_blank_lines() {
        let out = run(Spec::generic(), EngineConfig::default(), "#ifdef NOPE\nhidden\n#endif\nvisible\n");
        assert_eq!(out, "\n\nvisible\n");
    }

    #[test]
    fn ifeq_compares_expanded_text() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define X a\n#ifeq X,a\nyes\n#endif\n");
        assert_eq!(out.trim_start_matches('\n').trim(), "yes");
    }

    #[test]
    fn eval_directive_emits_arithmetic_result() {
        let out = run(Spec::generic(), EngineConfig::default(), "#eval 2+3\n");
        assert_eq!(out.trim(), "5");
    }

    #[test]
    fn if_condition_expands_macros_before_evaluating() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define N 5\n#if N > 3\nyes\n#else\nno\n#endif\n");
        assert_eq!(out.trim(), "yes");
    }

    #[test]
    fn eval_directive_expands_macros_before_evaluating() {
        let out = run(Spec::generic(), EngineConfig::default(), "#define N 5\n#eval N+1\n");
        assert_eq!(out.trim(), "6");
    }

    #[test]
    fn date_directive_honors_strftime_argument() {
        let out = run(Spec::generic(), EngineConfig::default(), "#date %Y\n");
        let year = out.trim();
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn defined_builtin_used_inside_if() {
        let mut engine = Engine::new(Spec::generic(), EngineConfig::default());
        let mut ctx = InputContext::from_string("#define FOO\n#if defined(FOO)\nyes\n#endif\n", "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        engine.process(&mut ctx, &mut out).unwrap();
        assert_eq!(out.into_buffer_string().trim(), "yes");
    }

    #[test]
    fn mode_switch_to_c_preset_enables_comments() {
        let mut engine = Engine::new(Spec::generic(), EngineConfig::default());
        let mut ctx = InputContext::from_string("#mode standard c\n/* gone */kept\n", "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        engine.process(&mut ctx, &mut out).unwrap();
        assert_eq!(out.into_buffer_string().trim(), "kept");
    }

    #[test]
    fn unterminated_if_at_eof_is_fatal() {
        let mut engine = Engine::new(Spec::generic(), EngineConfig::default());
        let mut ctx = InputContext::from_string("#ifdef X\nbody\n", "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        assert!(engine.process(&mut ctx, &mut out).is_err());
    }

    #[test]
    fn endif_without_if_is_fatal() {
        let mut engine = Engine::new(Spec::generic(), EngineConfig::default());
        let mut ctx = InputContext::from_string("#endif\n", "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        assert!(engine.process(&mut ctx, &mut out).is_err());
    }

    #[test]
    fn error_directive_aborts_with_user_message() {
        let mut engine = Engine::new(Spec::generic(), EngineConfig::default());
        let mut ctx = InputContext::from_string("#error boom\n", "test", 1, Ambience::Text);
        let mut out = OutputContext::buffer();
        let err = engine.process(&mut ctx, &mut out).unwrap_err();
        assert!(matches!(err, EngineError::UserError { .. }));
    }
}
