//! Turns raw channel bytes into normalized text.

use bytes::BytesMut;
use vte::{Parser, Perform};

use super::rules::CompiledRule;

/// Collects printable text, dropping escape sequences.
#[derive(Default)]
struct Printable {
    text: String,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.text.push(byte as char);
        }
    }
}

/// Stateful decoder for one channel.
///
/// Multi-byte characters and escape sequences split across reads are
/// carried into the next chunk.
pub struct ChunkDecoder {
    ansi: Option<Parser>,
    pending: BytesMut,
    rules: Vec<CompiledRule>,
}

impl ChunkDecoder {
    pub fn new(rules: Vec<CompiledRule>, strip_ansi: bool) -> Self {
        Self {
            ansi: strip_ansi.then(Parser::new),
            pending: BytesMut::new(),
            rules,
        }
    }

    /// Decode one read worth of bytes.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let text = match self.ansi.as_mut() {
            Some(parser) => {
                let mut printable = Printable::default();
                parser.advance(&mut printable, bytes);
                printable.text
            }
            None => self.decode_utf8(bytes),
        };

        self.rules
            .iter()
            .fold(text, |acc, rule| rule.apply(&acc))
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let complete = self.pending.split_to(e.valid_up_to());
                String::from_utf8_lossy(&complete).into_owned()
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::rules::{SubstitutionRule, compile_rules};

    fn decoder(strip_ansi: bool) -> ChunkDecoder {
        ChunkDecoder::new(compile_rules(&SubstitutionRule::defaults()).unwrap(), strip_ansi)
    }

    #[test]
    fn test_ansi_stripping() {
        let mut decoder = decoder(true);
        assert_eq!(decoder.decode(b"\x1b[32mGreen text\x1b[0m"), "Green text");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut decoder = decoder(true);
        let first = decoder.decode(b"ok\x1b[3");
        let second = decoder.decode(b"2mdone");
        assert_eq!(format!("{first}{second}"), "okdone");
    }

    #[test]
    fn test_utf8_split_across_reads() {
        let mut decoder = decoder(false);
        let bytes = "héllo".as_bytes();
        let first = decoder.decode(&bytes[..2]);
        let second = decoder.decode(&bytes[2..]);
        assert_eq!(first, "h");
        assert_eq!(second, "éllo");
    }

    #[test]
    fn test_rules_applied() {
        let mut decoder = decoder(true);
        assert_eq!(decoder.decode(b"echo 1\r\n1\r\n"), "echo 1\n1\n");
        assert_eq!(decoder.decode(b"no breaks  "), "no breaks  ");
    }

    #[test]
    fn test_rules_apply_to_chunks_without_line_breaks() {
        let rules = vec![SubstitutionRule::new("--More--", "").compile().unwrap()];
        let mut decoder = ChunkDecoder::new(rules, true);
        assert_eq!(decoder.decode(b"line --More-- tail"), "line  tail");
        assert_eq!(decoder.decode(b"--More--\r\n"), "\r\n");
    }
}
