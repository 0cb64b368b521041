//! Rewindable input context: a lookahead buffer over a file or an in-memory
//! string, tracking line number, filename, and (for macro-argument and
//! comment-interior sub-contexts) the ambient parse context.
//!
//! `gpp.c: INPUTCONTEXT`, `getChar`, `extendBuf`, `shiftIn`.
//!
//! The original indexes a raw `char*` that it grows and occasionally slides
//! forward in place (`C->buf += l`). Here `buf[0]` is always the byte that
//! immediately precedes the next unconsumed position (the "lookback" byte
//! `matchStartSequence` inspects); scanning positions are always `>= 1`
//! relative to the *current* window, but absolute positions returned to
//! callers stay stable until the next [`InputContext::shift_in`].

use std::io::Read;

use crate::spec::Ambience;

pub struct InputContext {
    /// `buf[0]` is the lookback byte; `buf[1..]` is unconsumed/look-ahead
    /// content. Grows on demand for file-backed contexts, fully populated
    /// up front for string-backed ones.
    buf: Vec<u8>,
    source: Option<Box<dyn Read>>,
    last_ingested: Option<u8>,
    lineno: usize,
    filename: String,
    eof: bool,
    io_error: Option<std::io::Error>,

    pub ambience: Ambience,
    pub in_comment: bool,
    pub may_have_args: bool,
    /// Already-expanded argument texts, indexed 0..9, for `#1`..`#9` refs.
    pub args: Vec<String>,
    /// Named parameters bound at the call site that spliced this context,
    /// for the named-arg shadowing lookup (spec.md §4.4).
    pub named_args: Option<Vec<(String, String)>>,
}

impl InputContext {
    pub fn from_string(text: &str, filename: impl Into<String>, lineno: usize, ambience: Ambience) -> Self {
        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.push(b'\n');
        buf.extend_from_slice(text.as_bytes());
        let eof = buf.len() <= 1;
        InputContext {
            buf,
            source: None,
            last_ingested: None,
            lineno,
            filename: filename.into(),
            eof,
            io_error: None,
            ambience,
            in_comment: false,
            may_have_args: false,
            args: Vec::new(),
            named_args: None,
        }
    }

    pub fn from_reader(reader: Box<dyn Read>, filename: impl Into<String>, ambience: Ambience) -> Self {
        InputContext {
            buf: vec![b'\n'],
            source: Some(reader),
            last_ingested: None,
            lineno: 1,
            filename: filename.into(),
            eof: false,
            io_error: None,
            ambience,
            in_comment: false,
            may_have_args: false,
            args: Vec::new(),
            named_args: None,
        }
    }

    pub fn lineno(&self) -> usize {
        self.lineno
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Surfaces and clears an I/O error observed during a previous
    /// `get_char`, so the engine loop can turn it into a fatal
    /// [`crate::error::EngineError`] at a point where that's ergonomic —
    /// `get_char` itself must stay infallible to serve as a
    /// `FnMut(usize) -> u8` for [`crate::pattern`]'s matchers.
    pub fn take_io_error(&mut self) -> Option<std::io::Error> {
        self.io_error.take()
    }

    /// `gpp.c: getChar` — grows the buffer from the file as needed. Dropped
    /// `\r` bytes and `0` (both the EOF sentinel and a never-produced data
    /// byte) are never visible to callers as content.
    pub fn get_char(&mut self, pos: usize) -> u8 {
        if self.source.is_none() {
            return self.buf.get(pos).copied().unwrap_or(0);
        }
        while pos >= self.buf.len() {
            if self.eof {
                self.buf.push(0);
                continue;
            }
            let mut byte = [0u8; 1];
            loop {
                match self.source.as_mut().unwrap().read(&mut byte) {
                    Ok(0) => {
                        byte[0] = 0;
                        break;
                    }
                    Ok(_) if byte[0] == b'\r' => continue,
                    Ok(_) => break,
                    Err(e) => {
                        self.io_error = Some(e);
                        byte[0] = 0;
                        break;
                    }
                }
            }
            if self.last_ingested == Some(b'\n') {
                self.lineno += 1;
            }
            self.last_ingested = Some(byte[0]);
            if byte[0] == 0 {
                self.eof = true;
            }
            self.buf.push(byte[0]);
        }
        self.buf[pos]
    }

    /// `gpp.c: shiftIn` — discards the bytes before `l - 1`, keeping
    /// position `l - 1` as the new lookback byte at index 0.
    pub fn shift_in(&mut self, l: usize) {
        if l <= 1 {
            return;
        }
        let l = l - 1;
        if l >= self.buf.len() {
            self.buf.clear();
            self.buf.push(0);
        } else {
            self.buf.drain(0..l);
        }
        if self.buf.len() <= 1 {
            self.eof = self.source.is_none() || self.eof;
        }
    }

    /// True once no further non-zero bytes can ever appear at or after
    /// `pos` (the scanner's signal to stop).
    pub fn is_exhausted(&mut self, pos: usize) -> bool {
        self.eof && self.get_char(pos) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_context_reads_sentinel_then_content() {
        let mut ctx = InputContext::from_string("ab", "test", 1, Ambience::Text);
        assert_eq!(ctx.get_char(0), b'\n');
        assert_eq!(ctx.get_char(1), b'a');
        assert_eq!(ctx.get_char(2), b'b');
        assert_eq!(ctx.get_char(3), 0);
    }

    #[test]
    fn shift_in_moves_lookback_byte() {
        let mut ctx = InputContext::from_string("abcd", "test", 1, Ambience::Text);
        ctx.shift_in(3); // consumed positions 1 and 2 ('a','b')
        assert_eq!(ctx.get_char(0), b'b');
        assert_eq!(ctx.get_char(1), b'c');
        assert_eq!(ctx.get_char(2), b'd');
    }

    #[test]
    fn file_backed_context_tracks_lineno() {
        let data = b"one\ntwo\nthree".to_vec();
        let mut ctx = InputContext::from_reader(Box::new(std::io::Cursor::new(data)), "test", Ambience::Text);
        assert_eq!(ctx.lineno(), 1);
        for i in 1..=8 {
            ctx.get_char(i);
        }
        assert_eq!(ctx.lineno(), 2);
    }

    #[test]
    fn file_backed_context_drops_carriage_returns() {
        let data = b"a\r\nb".to_vec();
        let mut ctx = InputContext::from_reader(Box::new(std::io::Cursor::new(data)), "test", Ambience::Text);
        assert_eq!(ctx.get_char(1), b'a');
        assert_eq!(ctx.get_char(2), b'\n');
        assert_eq!(ctx.get_char(3), b'b');
    }

    #[test]
    fn exhausted_context_reports_zero_forever() {
        let mut ctx = InputContext::from_string("a", "test", 1, Ambience::Text);
        assert_eq!(ctx.get_char(10), 0);
        assert_eq!(ctx.get_char(20), 0);
    }
}
