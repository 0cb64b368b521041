//! Command-line surface: one `clap::Parser` struct mirroring the flag table
//! a mode-configurable preprocessor needs — preset selection, raw mode
//! strings, comment/string rule injection, macro pre-definitions, include
//! search paths, and output shaping. `gpp`'s own argument syntax predates
//! `getopt`-style conventions (`+c`/`+s`/`+n`/`+z` alongside single-dash
//! flags); clap can't parse a `+`-prefixed flag, so those become long
//! `--add-comment`/`--add-string` options here instead (see DESIGN.md).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "macropp", about = "A mode-configurable macro preprocessor", version)]
pub struct Cli {
    /// Input file to process; omitted or `-` reads standard input.
    pub input: Option<PathBuf>,

    /// Select the C/C++ preset (K&R user syntax, `/* */` and `//` comments,
    /// string literals).
    #[clap(short = 'C', long = "c-mode")]
    pub c_mode: bool,

    /// Select the TeX preset (`\macro{args}` call syntax).
    #[clap(short = 'T', long = "tex-mode")]
    pub tex_mode: bool,

    /// Select the HTML preset (`<#macro|args>` call syntax).
    #[clap(short = 'H', long = "html-mode")]
    pub html_mode: bool,

    /// Select the XHTML preset (self-closing `<#macro|args/>` call syntax).
    #[clap(short = 'X', long = "xhtml-mode")]
    pub xhtml_mode: bool,

    /// Select the Prolog preset.
    #[clap(short = 'P', long = "prolog-mode")]
    pub prolog_mode: bool,

    /// Nine escaped-pattern strings defining user-macro syntax, in order:
    /// mStart mEnd mArgS mArgSep mArgE mArgRef quotechar stackchar
    /// unstackchar.
    #[clap(short = 'U', long = "user-mode", num_args = 9)]
    pub user_mode: Option<Vec<String>>,

    /// Seven escaped-pattern strings defining meta-directive syntax (must
    /// accompany `-U`): mStart mEnd mArgS mArgSep mArgE mArgRef quotechar.
    #[clap(short = 'M', long = "meta-mode", num_args = 7)]
    pub meta_mode: Option<Vec<String>>,

    /// Adds a comment rule: a 3-letter per-ambience spec (meta, user, text;
    /// letters i/I=ignore, c=comment, s=string, q=text-only, S=string+macros,
    /// Q=text+macros, C=comment+macros), a start pattern, and an end
    /// pattern. Repeatable.
    #[clap(long = "add-comment", num_args = 3, value_names = ["AMBIENCE", "START", "END"])]
    pub comments: Vec<String>,

    /// Adds a string rule: the same 3-letter ambience spec, start pattern,
    /// end pattern, and a single quote/escape character. Repeatable.
    #[clap(long = "add-string", num_args = 4, value_names = ["AMBIENCE", "START", "END", "QUOTE"])]
    pub strings: Vec<String>,

    /// Defines a macro before processing starts: `NAME`, `NAME=VALUE`, or
    /// `NAME(a,b)=BODY`. Repeatable.
    #[clap(short = 'D', long = "define")]
    pub defines: Vec<String>,

    /// Appends an include search directory, searched in the order given (up
    /// to 128 total). Repeatable.
    #[clap(short = 'I', long = "include-dir")]
    pub include_dirs: Vec<PathBuf>,

    /// Redirects output to a file instead of standard out.
    #[clap(short = 'o', long = "output", conflicts_with = "output_mirror")]
    pub output: Option<PathBuf>,

    /// Redirects output to a file, also mirroring it to standard out.
    #[clap(short = 'O', long = "output-mirror")]
    pub output_mirror: Option<PathBuf>,

    /// Allows `#exec` to run shell commands.
    #[clap(short = 'x', long = "exec")]
    pub exec: bool,

    /// Auto-switches to the C preset when including a `.h`/`.c` file.
    #[clap(short = 'm', long = "autoswitch")]
    pub autoswitch: bool,

    /// Preserves line feeds used as macro/directive terminators in the
    /// output, instead of retreating past trailing whitespace.
    #[clap(short = 'n', long = "preserve-lf")]
    pub preserve_lf: bool,

    /// Emits CRLF line endings.
    #[clap(short = 'z', long = "crlf")]
    pub crlf: bool,

    /// Processes a file before the main input, sharing macro/mode state
    /// with it.
    #[clap(long = "include")]
    pub pre_include: Option<PathBuf>,

    /// Don't search platform standard include directories.
    #[clap(long = "nostdinc")]
    pub no_std_inc: bool,

    /// Don't search the current file's directory first.
    #[clap(long = "nocurinc")]
    pub no_cur_inc: bool,

    /// Search the current file's directory last instead of first.
    #[clap(long = "curdirinclast")]
    pub cur_dir_inc_last: bool,

    /// Warning verbosity; 0 silences warnings.
    #[clap(long = "warninglevel", default_value_t = 2)]
    pub warning_level: u8,

    /// Include-marker format: three `%`/`?` holes (substituted with line
    /// number, filename, marker-kind in that order), `@` standing for a
    /// literal space and `\` escaping the following character.
    #[clap(long = "includemarker")]
    pub include_marker: Option<String>,

    /// Increases log verbosity (repeatable: `-v`, `-vv`).
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
