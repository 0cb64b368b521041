//! A mode-configurable text preprocessor: macro expansion, conditional
//! compilation, arithmetic evaluation, and file inclusion, with the
//! delimiter syntax for macro calls and meta-directives fully
//! reconfigurable at runtime (`#mode`). Ported from a well-known C
//! preprocessor of the same shape; see [`engine::Engine`] for the
//! top-level entry point.

pub mod charset;
pub mod context;
pub mod directives;
pub mod engine;
pub mod error;
pub mod eval;
pub mod include;
pub mod macros;
pub mod mode;
pub mod pattern;
pub mod presets;
pub mod spec;

pub use context::input::InputContext;
pub use context::output::OutputContext;
pub use engine::{meta_mode_from_strings, mode_from_strings, Engine, EngineConfig, IncludeMarkerFn, IncludeMarkerKind};
pub use error::{EngineError, Location, Result};
pub use presets::Preset;
pub use spec::{Ambience, Spec};
