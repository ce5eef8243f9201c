//! Channel layer: open shell streams and the readers draining them.
//!
//! Each channel gets a [`StreamReader`] task that decodes raw bytes
//! (escape sequences stripped, substitution rules applied) into a
//! [`ChannelOutput`] line buffer and wakes the session on every append.

mod decoder;
mod output;
mod reader;
mod rules;
mod shell;

pub use decoder::ChunkDecoder;
pub use output::ChannelOutput;
pub use reader::StreamReader;
pub use rules::{CompiledRule, SubstitutionRule, compile_rules};
pub use shell::{ChannelGuard, ChannelReader, ChannelWriter, ShellChannel};
