//! File/stdio adapters between [`crate::cli::Cli`] and the
//! `macropp_core::InputContext`/`OutputContext` types the engine reads and
//! writes through.

use std::fs::File;
use std::io;
use std::path::Path;

use macropp_core::spec::Ambience;
use macropp_core::{InputContext, OutputContext};

/// Opens `path`, or standard input when `path` is `None` or `-`.
pub fn open_input(path: Option<&Path>) -> io::Result<(Box<dyn io::Read>, String)> {
    match path {
        None => Ok((Box::new(io::stdin()), "<stdin>".to_string())),
        Some(p) if p == Path::new("-") => Ok((Box::new(io::stdin()), "<stdin>".to_string())),
        Some(p) => {
            let file = File::open(p)?;
            Ok((Box::new(file), p.display().to_string()))
        }
    }
}

pub fn input_context(path: Option<&Path>) -> io::Result<InputContext> {
    let (reader, name) = open_input(path)?;
    Ok(InputContext::from_reader(reader, name, Ambience::Text))
}

/// Builds the output sink: a plain file for `-o`, a mirrored file for `-O`,
/// or standard out when neither was given.
pub fn output_context(output: Option<&Path>, mirror: bool, crlf: bool) -> io::Result<OutputContext> {
    match output {
        Some(p) => {
            let file = File::create(p)?;
            Ok(OutputContext::writer(Box::new(file), mirror, crlf))
        }
        None => Ok(OutputContext::writer(Box::new(io::stdout()), false, crlf)),
    }
}
