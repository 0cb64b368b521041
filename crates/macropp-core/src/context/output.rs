//! Output context: either a file sink (optionally mirrored to standard out)
//! or a growable in-memory buffer used while an argument or comment
//! interior is being pre-expanded. `gpp.c: OUTPUTCONTEXT`, `outchar`.

use std::io::{self, Write};

enum Sink {
    Buffer(Vec<u8>),
    Writer { out: Box<dyn Write>, mirror: bool },
}

pub struct OutputContext {
    sink: Sink,
    /// Emit CRLF line endings (`-z`).
    crlf: bool,
}

impl OutputContext {
    pub fn buffer() -> Self {
        OutputContext {
            sink: Sink::Buffer(Vec::new()),
            crlf: false,
        }
    }

    pub fn writer(out: Box<dyn Write>, mirror: bool, crlf: bool) -> Self {
        OutputContext {
            sink: Sink::Writer { out, mirror },
            crlf,
        }
    }

    /// `gpp.c: outchar`
    pub fn put(&mut self, c: u8) -> io::Result<()> {
        match &mut self.sink {
            Sink::Buffer(buf) => {
                buf.push(c);
                Ok(())
            }
            Sink::Writer { out, mirror } => {
                if self.crlf && c == b'\n' {
                    out.write_all(b"\r")?;
                    if *mirror {
                        io::stdout().write_all(b"\r")?;
                    }
                }
                if c != 13 {
                    out.write_all(&[c])?;
                    if *mirror {
                        io::stdout().write_all(&[c])?;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn put_str(&mut self, s: &str) -> io::Result<()> {
        for b in s.bytes() {
            self.put(b)?;
        }
        Ok(())
    }

    /// Drains a buffer-backed context's accumulated text. Panics if called
    /// on a file-backed context; callers only ever capture into a buffer.
    pub fn into_buffer_string(self) -> String {
        match self.sink {
            Sink::Buffer(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Sink::Writer { .. } => panic!("into_buffer_string called on a file-backed output context"),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Sink::Writer { out, .. } = &mut self.sink {
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_accumulates_bytes() {
        let mut ctx = OutputContext::buffer();
        ctx.put_str("hello").unwrap();
        assert_eq!(ctx.into_buffer_string(), "hello");
    }
}
