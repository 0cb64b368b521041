//! Turns a parsed [`crate::cli::Cli`] into the `macropp_core::Spec` +
//! `macropp_core::EngineConfig` pair an [`macropp_core::Engine`] is built
//! from, plus the list of `-D` definitions to seed afterwards. Grounded in
//! `gpp.c`'s argument-parsing loop in `main`: preset selection, `-U`/`-M`
//! raw mode strings, `+c`/`+s` comment/string rules (here `--add-comment`/
//! `--add-string`), and `-D`/`parseCmdlineDefine`.

use std::path::PathBuf;

use macropp_core::include::IncludeConfig;
use macropp_core::pattern::Pattern;
use macropp_core::presets::Preset;
use macropp_core::spec::{CommentFlags, CommentRule, Spec};
use macropp_core::{meta_mode_from_strings, mode_from_strings, EngineConfig};

use crate::cli::Cli;
use crate::markers;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("-C, -T, -H, -X and -P are mutually exclusive")]
    MultiplePresets,
    #[error("-M requires -U")]
    MetaWithoutUser,
    #[error("{0}")]
    InvalidMode(#[from] macropp_core::EngineError),
    #[error("invalid comment/string ambience spec {0:?}: must be 3 letters from I/i/c/s/q/S/Q/C")]
    InvalidAmbienceSpec(String),
    #[error("-I accepts at most 128 directories")]
    TooManyIncludeDirs,
    #[error("-D{0:?}: expected NAME, NAME=VALUE or NAME(args)=BODY")]
    InvalidDefine(String),
}

/// One `-D name[=value]` or `-Dname(a,b)=body` pre-definition, split into
/// the head [`macropp_core::Engine::define_from_cli`] expects and its body.
pub struct CliDefine {
    pub head: String,
    pub body: String,
}

pub struct ResolvedConfig {
    pub spec: Spec,
    pub engine: EngineConfig,
    pub defines: Vec<CliDefine>,
}

pub fn resolve(cli: &Cli) -> Result<ResolvedConfig, ConfigError> {
    let spec = resolve_spec(cli)?;
    let engine = resolve_engine(cli)?;
    let defines = cli.defines.iter().map(|d| split_define(d)).collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedConfig { spec, engine, defines })
}

fn resolve_spec(cli: &Cli) -> Result<Spec, ConfigError> {
    let presets = [cli.c_mode, cli.tex_mode, cli.html_mode, cli.xhtml_mode, cli.prolog_mode];
    if presets.iter().filter(|&&p| p).count() > 1 {
        return Err(ConfigError::MultiplePresets);
    }
    let mut spec = if cli.c_mode {
        Preset::C.spec()
    } else if cli.tex_mode {
        Preset::Tex.spec()
    } else if cli.html_mode {
        Preset::Html.spec()
    } else if cli.xhtml_mode {
        Preset::XHtml.spec()
    } else if cli.prolog_mode {
        Preset::Prolog.spec()
    } else {
        Spec::generic()
    };

    if let Some(user) = &cli.user_mode {
        spec.user = mode_from_strings(user, false)?;
        spec.meta = match &cli.meta_mode {
            Some(meta) => meta_mode_from_strings(meta, false)?,
            None => return Err(ConfigError::MetaWithoutUser),
        };
    } else if cli.meta_mode.is_some() {
        return Err(ConfigError::MetaWithoutUser);
    }

    for chunk in cli.comments.chunks(3) {
        let rule = build_comment_rule(&chunk[0], &chunk[1], &chunk[2], None)?;
        spec.comments.push(rule);
    }
    for chunk in cli.strings.chunks(4) {
        let quote = chunk[3].bytes().next();
        let rule = build_comment_rule(&chunk[0], &chunk[1], &chunk[2], quote)?;
        spec.comments.push(rule);
    }

    Ok(spec)
}

/// `gpp.c: parse_comment_specif` — maps a 3-letter ambience code (one letter
/// per meta/user/text) onto the flag bits that govern whether the delimited
/// text and its delimiters are emitted, and whether macros parse inside it.
fn build_comment_rule(ambience: &str, start: &str, end: &str, quote: Option<u8>) -> Result<CommentRule, ConfigError> {
    let letters: Vec<char> = ambience.chars().collect();
    if letters.len() != 3 {
        return Err(ConfigError::InvalidAmbienceSpec(ambience.to_string()));
    }
    let mut flags = [CommentFlags::default(); 3];
    for (i, &c) in letters.iter().enumerate() {
        flags[i] = comment_flags_for_letter(c).ok_or_else(|| ConfigError::InvalidAmbienceSpec(ambience.to_string()))?;
    }
    Ok(CommentRule {
        start: Pattern::parse_escaped(start, false).map_err(|e| ConfigError::InvalidAmbienceSpec(e.to_string()))?,
        end: Pattern::parse_escaped(end, false).map_err(|e| ConfigError::InvalidAmbienceSpec(e.to_string()))?,
        quote,
        warn: None,
        flags,
    })
}

fn comment_flags_for_letter(c: char) -> Option<CommentFlags> {
    Some(match c {
        'I' | 'i' => CommentFlags::ignored(),
        'c' => CommentFlags::comment(),
        's' => CommentFlags::string(),
        'q' => CommentFlags {
            output_text: true,
            output_delim: false,
            parse_macros: false,
            ignore: false,
        },
        'S' => CommentFlags {
            parse_macros: true,
            ..CommentFlags::string()
        },
        'Q' => CommentFlags {
            output_text: true,
            output_delim: false,
            parse_macros: true,
            ignore: false,
        },
        'C' => CommentFlags {
            parse_macros: true,
            ..CommentFlags::comment()
        },
        _ => return None,
    })
}

fn resolve_engine(cli: &Cli) -> Result<EngineConfig, ConfigError> {
    if cli.include_dirs.len() > 128 {
        return Err(ConfigError::TooManyIncludeDirs);
    }
    let include = IncludeConfig {
        include_dirs: cli.include_dirs.clone(),
        no_std_inc: cli.no_std_inc,
        no_cur_inc_first: cli.no_cur_inc,
        cur_dir_inc_last: cli.cur_dir_inc_last,
    };
    let include_marker = cli.include_marker.as_deref().map(markers::compile);
    Ok(EngineConfig {
        include,
        exec_allowed: cli.exec,
        autoswitch: cli.autoswitch,
        crlf: cli.crlf,
        file_and_stdout: cli.output_mirror.is_some(),
        warning_level: cli.warning_level,
        include_marker,
    })
}

pub fn output_path(cli: &Cli) -> Option<&PathBuf> {
    cli.output.as_ref().or(cli.output_mirror.as_ref())
}

/// `gpp.c: parseCmdlineDefine` — `NAME`, `NAME=VALUE`, or `NAME(a,b)=BODY`.
/// A bare name with no `=` defines an empty-bodied macro.
fn split_define(raw: &str) -> Result<CliDefine, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::InvalidDefine(raw.to_string()));
    }
    match raw.split_once('=') {
        Some((head, body)) => Ok(CliDefine {
            head: head.to_string(),
            body: body.to_string(),
        }),
        None => Ok(CliDefine {
            head: raw.to_string(),
            body: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_without_equals_has_empty_body() {
        let d = split_define("FOO").unwrap();
        assert_eq!(d.head, "FOO");
        assert_eq!(d.body, "");
    }

    #[test]
    fn define_with_equals_splits_head_and_body() {
        let d = split_define("FOO=bar").unwrap();
        assert_eq!(d.head, "FOO");
        assert_eq!(d.body, "bar");
    }

    #[test]
    fn named_arg_define_keeps_parens_in_head() {
        let d = split_define("ADD(a,b)=a+b").unwrap();
        assert_eq!(d.head, "ADD(a,b)");
        assert_eq!(d.body, "a+b");
    }

    #[test]
    fn comment_letters_map_to_expected_flags() {
        assert_eq!(comment_flags_for_letter('c'), Some(CommentFlags::comment()));
        assert_eq!(comment_flags_for_letter('s'), Some(CommentFlags::string()));
        assert_eq!(comment_flags_for_letter('i'), Some(CommentFlags::ignored()));
        assert_eq!(comment_flags_for_letter('x'), None);
    }
}
