//! Incremental array framing
//!
//! [`ArrayScanner`] is fed raw body bytes chunk by chunk and carves out the
//! elements of the array sitting at a fixed dot path (for the service
//! envelope, `data.data`). It frames bytes only; each framed element is
//! handed back for `serde_json` to decode, so an element becomes available
//! the moment its closing byte arrives, long before the rest of the body.
//!
//! The scanner is a pushdown machine over complete tokens: a token split
//! across chunk boundaries leaves the cursor where it was and reports
//! [`ScanStep::NeedMore`]. Consumed bytes are dropped eagerly, so memory is
//! bounded by the largest single element plus one network chunk.

use crate::error::{Error, Result};

/// One step of scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    /// More input is needed before another element can be framed
    NeedMore,
    /// The bytes of one complete array element
    Item(Vec<u8>),
    /// The target array closed (or the document ended without one)
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Walking the envelope looking for the target array
    Seek,
    /// Inside the target array, framing elements
    Elements { after_element: bool },
    /// Target array closed or document complete
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    KeyOrEnd,
    Colon,
    CommaOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

#[derive(Debug)]
struct Frame {
    kind: Kind,
    /// Object key this container was entered under, if any
    entry: Option<String>,
}

/// Incremental scanner for one page body
#[derive(Debug)]
pub struct ArrayScanner {
    path: Vec<String>,
    buf: Vec<u8>,
    pos: usize,
    mode: Mode,
    stack: Vec<Frame>,
    expect: Expect,
    pending_key: Option<String>,
}

impl ArrayScanner {
    /// Create a scanner targeting the array at the given dot path
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            buf: Vec::new(),
            pos: 0,
            mode: Mode::Seek,
            stack: Vec::new(),
            expect: Expect::Value,
            pending_key: None,
        }
    }

    /// Feed another chunk of body bytes
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Whether the target array has closed (or the document completed)
    pub fn is_finished(&self) -> bool {
        self.mode == Mode::Finished
    }

    /// Advance the scan as far as the buffered bytes allow
    pub fn step(&mut self) -> Result<ScanStep> {
        loop {
            match self.mode {
                Mode::Finished => return Ok(ScanStep::End),
                Mode::Seek => {
                    if let Some(step) = self.seek_step()? {
                        return Ok(step);
                    }
                }
                Mode::Elements { .. } => return self.element_step(),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Seek phase
    // ------------------------------------------------------------------------

    /// Consume one token of the envelope. `None` means progress was made and
    /// the caller should keep stepping.
    fn seek_step(&mut self) -> Result<Option<ScanStep>> {
        self.skip_ws();
        let Some(&b) = self.buf.get(self.pos) else {
            self.compact();
            return Ok(Some(ScanStep::NeedMore));
        };

        match self.expect {
            Expect::Value => match b {
                b'{' => {
                    let entry = self.pending_key.take();
                    self.stack.push(Frame {
                        kind: Kind::Object,
                        entry,
                    });
                    self.pos += 1;
                    self.expect = Expect::KeyOrEnd;
                }
                b'[' => {
                    let entry = self.pending_key.take();
                    self.pos += 1;
                    if self.path_matches(entry.as_deref()) {
                        self.mode = Mode::Elements {
                            after_element: false,
                        };
                    } else {
                        self.stack.push(Frame {
                            kind: Kind::Array,
                            entry,
                        });
                        // An array opens straight onto a value (or its close).
                    }
                }
                b']' => match self.stack.pop() {
                    Some(Frame {
                        kind: Kind::Array, ..
                    }) => {
                        self.pos += 1;
                        self.value_done();
                    }
                    _ => return Err(self.corrupt("unexpected ']'")),
                },
                b'"' => match scan_string(&self.buf, self.pos) {
                    Some(end) => {
                        self.pos = end;
                        self.value_done();
                    }
                    None => {
                        self.compact();
                        return Ok(Some(ScanStep::NeedMore));
                    }
                },
                b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => {
                    match self.scan_primitive(self.pos)? {
                        Some(end) => {
                            self.pos = end;
                            self.value_done();
                        }
                        None => {
                            self.compact();
                            return Ok(Some(ScanStep::NeedMore));
                        }
                    }
                }
                _ => return Err(self.corrupt("expected a value")),
            },
            Expect::KeyOrEnd => match b {
                b'}' => match self.stack.pop() {
                    Some(Frame {
                        kind: Kind::Object, ..
                    }) => {
                        self.pos += 1;
                        self.value_done();
                    }
                    _ => return Err(self.corrupt("unexpected '}'")),
                },
                b'"' => match scan_string(&self.buf, self.pos) {
                    Some(end) => {
                        let key =
                            String::from_utf8_lossy(&self.buf[self.pos + 1..end - 1]).into_owned();
                        self.pending_key = Some(key);
                        self.pos = end;
                        self.expect = Expect::Colon;
                    }
                    None => {
                        self.compact();
                        return Ok(Some(ScanStep::NeedMore));
                    }
                },
                _ => return Err(self.corrupt("expected an object key")),
            },
            Expect::Colon => {
                if b == b':' {
                    self.pos += 1;
                    self.expect = Expect::Value;
                } else {
                    return Err(self.corrupt("expected ':'"));
                }
            }
            Expect::CommaOrEnd => {
                let Some(top) = self.stack.last() else {
                    return Err(self.corrupt("content after document end"));
                };
                match (b, top.kind) {
                    (b',', Kind::Object) => {
                        self.pos += 1;
                        self.expect = Expect::KeyOrEnd;
                    }
                    (b',', Kind::Array) => {
                        self.pos += 1;
                        self.expect = Expect::Value;
                    }
                    (b'}', Kind::Object) | (b']', Kind::Array) => {
                        self.stack.pop();
                        self.pos += 1;
                        self.value_done();
                    }
                    _ => return Err(self.corrupt("expected ',' or container end")),
                }
            }
        }
        Ok(None)
    }

    /// A value just completed in the current container (or at the root).
    fn value_done(&mut self) {
        self.pending_key = None;
        if self.stack.is_empty() {
            // Root value complete without meeting the target array: a page
            // with no items. Trailing bytes are ignored.
            self.mode = Mode::Finished;
        } else {
            self.expect = Expect::CommaOrEnd;
        }
    }

    /// Does the chain of entry keys down to `entry` equal the target path?
    fn path_matches(&self, entry: Option<&str>) -> bool {
        let Some(entry) = entry else { return false };
        let mut keys: Vec<&str> = Vec::with_capacity(self.stack.len());
        for (i, frame) in self.stack.iter().enumerate() {
            match frame.entry.as_deref() {
                None if i == 0 => {}
                None => return false,
                Some(key) => keys.push(key),
            }
        }
        keys.push(entry);
        keys.len() == self.path.len() && keys.iter().zip(&self.path).all(|(a, b)| *a == b)
    }

    // ------------------------------------------------------------------------
    // Element phase
    // ------------------------------------------------------------------------

    fn element_step(&mut self) -> Result<ScanStep> {
        let Mode::Elements { after_element } = self.mode else {
            return Ok(ScanStep::End);
        };

        self.skip_ws();
        if after_element {
            let Some(&b) = self.buf.get(self.pos) else {
                self.compact();
                return Ok(ScanStep::NeedMore);
            };
            match b {
                b',' => {
                    self.pos += 1;
                    self.mode = Mode::Elements {
                        after_element: false,
                    };
                    self.skip_ws();
                }
                b']' => {
                    self.pos += 1;
                    self.mode = Mode::Finished;
                    self.compact();
                    return Ok(ScanStep::End);
                }
                _ => return Err(self.corrupt("expected ',' or ']'")),
            }
        }

        let Some(&b) = self.buf.get(self.pos) else {
            self.compact();
            return Ok(ScanStep::NeedMore);
        };
        if b == b']' {
            self.pos += 1;
            self.mode = Mode::Finished;
            self.compact();
            return Ok(ScanStep::End);
        }

        match self.frame_element(self.pos)? {
            Some(end) => {
                let bytes = self.buf[self.pos..end].to_vec();
                self.pos = end;
                self.mode = Mode::Elements {
                    after_element: true,
                };
                self.compact();
                Ok(ScanStep::Item(bytes))
            }
            None => {
                self.compact();
                Ok(ScanStep::NeedMore)
            }
        }
    }

    /// Find the end of the element starting at `start`, if fully buffered.
    fn frame_element(&self, start: usize) -> Result<Option<usize>> {
        match self.buf[start] {
            b'"' => Ok(scan_string(&self.buf, start)),
            b'{' | b'[' => {
                let mut depth = 0usize;
                let mut i = start;
                while i < self.buf.len() {
                    match self.buf[i] {
                        b'"' => match scan_string(&self.buf, i) {
                            Some(end) => {
                                i = end;
                                continue;
                            }
                            None => return Ok(None),
                        },
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(Some(i + 1));
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                Ok(None)
            }
            b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => self.scan_primitive(start),
            _ => Err(self.corrupt("unexpected element start")),
        }
    }

    // ------------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------------

    /// Scan a bare token (number or literal). The token only completes when a
    /// delimiter follows it in the buffer.
    fn scan_primitive(&self, start: usize) -> Result<Option<usize>> {
        let mut i = start;
        while i < self.buf.len() {
            match self.buf[i] {
                b',' | b']' | b'}' | b' ' | b'\t' | b'\r' | b'\n' => break,
                _ => i += 1,
            }
        }
        if i == self.buf.len() {
            return Ok(None);
        }
        let token = &self.buf[start..i];
        if token[0].is_ascii_alphabetic()
            && token != &b"true"[..]
            && token != &b"false"[..]
            && token != &b"null"[..]
        {
            return Err(self.corrupt("invalid literal"));
        }
        Ok(Some(i))
    }

    fn skip_ws(&mut self) {
        while let Some(&b) = self.buf.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Drop consumed bytes so the buffer stays bounded.
    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    fn corrupt(&self, what: &str) -> Error {
        Error::decode(format!("malformed page body: {what}"))
    }
}

/// Find the end (exclusive, past the closing quote) of the string starting at
/// `start`, or `None` if it is not fully buffered.
fn scan_string(buf: &[u8], start: usize) -> Option<usize> {
    debug_assert_eq!(buf[start], b'"');
    let mut i = start + 1;
    while i < buf.len() {
        match buf[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
