//! Incremental field scanning for streamed JSON objects
//!
//! A model emits a top-level JSON object left to right, character by
//! character: `{"name":"Al` ... `ice","email":"a@` ... `b.com"}`. The
//! [`FieldScanner`] consumes those raw text deltas, split at arbitrary
//! points, and emits [`Token`]s as soon as value characters arrive, so the
//! tracker sees each field as a contiguous run of fragments.
//!
//! String values are emitted incrementally with JSON escapes decoded, even
//! when an escape is split across deltas. Numbers, booleans and null are
//! buffered and emitted as one fragment once the value is complete. Nested
//! objects and arrays are passed through verbatim as accumulating text for
//! the field, tracked by depth but not recursed into.
//!
//! The scanner never panics on malformed input; text it cannot place is
//! dropped, mirroring the tracker's tolerance policy.

use crate::types::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the opening `{`
    Start,
    /// Inside the object, expecting a key or `}`
    BeforeKey,
    /// Inside the key string
    InKey,
    /// After the key, expecting `:`
    AfterKey,
    /// After `:`, expecting the first value character
    BeforeValue,
    /// Inside a string value
    InString,
    /// Inside a number/boolean/null
    InScalar,
    /// Inside a nested object or array
    InNested,
    /// After a value, expecting `,` or `}`
    AfterValue,
    /// The top-level object has closed
    Finished,
}

/// Escape progress inside a key or string value, kept across deltas
#[derive(Debug, Clone, PartialEq, Eq)]
enum Escape {
    None,
    /// Saw `\`, waiting for the escape character
    Started,
    /// Saw `\u`, collecting four hex digits
    Unicode(String),
}

/// Streaming scanner from raw JSON text deltas to per-field tokens
#[derive(Debug)]
pub struct FieldScanner {
    state: ScanState,
    /// Key currently being read
    key_buf: String,
    /// Key whose value is currently being read
    current_key: String,
    /// Decoded value characters not yet emitted for `current_key`
    pending: String,
    escape: Escape,
    /// First half of a surrogate pair, waiting for its low half
    high_surrogate: Option<u16>,
    /// Buffered number/boolean/null text
    scalar_buf: String,
    /// Bracket depth inside a nested value
    depth: usize,
    nested_in_string: bool,
    nested_escape: bool,
}

impl Default for FieldScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Start,
            key_buf: String::new(),
            current_key: String::new(),
            pending: String::new(),
            escape: Escape::None,
            high_surrogate: None,
            scalar_buf: String::new(),
            depth: 0,
            nested_in_string: false,
            nested_escape: false,
        }
    }

    /// Whether the top-level object has closed
    pub fn is_finished(&self) -> bool {
        self.state == ScanState::Finished
    }

    /// Consume one raw text delta and return the tokens it completed
    ///
    /// Value characters accumulated during this push are flushed as one
    /// token per field, so a delta spanning several fields yields several
    /// tokens in emission order.
    pub fn push(&mut self, delta: &str) -> Vec<Token> {
        let mut out = Vec::new();
        for c in delta.chars() {
            self.step(c, &mut out);
        }
        self.flush_pending(&mut out);
        out
    }

    fn step(&mut self, c: char, out: &mut Vec<Token>) {
        match self.state {
            ScanState::Start => {
                if c == '{' {
                    self.state = ScanState::BeforeKey;
                }
            }
            ScanState::BeforeKey => match c {
                '"' => {
                    self.key_buf.clear();
                    self.escape = Escape::None;
                    self.state = ScanState::InKey;
                }
                '}' => self.state = ScanState::Finished,
                _ => {}
            },
            ScanState::InKey => {
                let ended = step_string(
                    &mut self.escape,
                    &mut self.high_surrogate,
                    c,
                    &mut self.key_buf,
                );
                if ended {
                    self.state = ScanState::AfterKey;
                }
            }
            ScanState::AfterKey => {
                if c == ':' {
                    self.state = ScanState::BeforeValue;
                }
            }
            ScanState::BeforeValue => match c {
                c if c.is_whitespace() => {}
                '"' => {
                    self.begin_value(out);
                    self.escape = Escape::None;
                    self.state = ScanState::InString;
                }
                '{' | '[' => {
                    self.begin_value(out);
                    self.depth = 1;
                    self.nested_in_string = false;
                    self.nested_escape = false;
                    self.pending.push(c);
                    self.state = ScanState::InNested;
                }
                _ => {
                    self.begin_value(out);
                    self.scalar_buf.clear();
                    self.scalar_buf.push(c);
                    self.state = ScanState::InScalar;
                }
            },
            ScanState::InString => {
                let ended = step_string(
                    &mut self.escape,
                    &mut self.high_surrogate,
                    c,
                    &mut self.pending,
                );
                if ended {
                    self.end_value(out);
                }
            }
            ScanState::InScalar => match c {
                ',' => {
                    self.emit_scalar(out);
                    self.state = ScanState::BeforeKey;
                }
                '}' => {
                    self.emit_scalar(out);
                    self.state = ScanState::Finished;
                }
                c if c.is_whitespace() => {
                    self.emit_scalar(out);
                    self.state = ScanState::AfterValue;
                }
                _ => self.scalar_buf.push(c),
            },
            ScanState::InNested => {
                self.pending.push(c);
                if self.nested_in_string {
                    if self.nested_escape {
                        self.nested_escape = false;
                    } else if c == '\\' {
                        self.nested_escape = true;
                    } else if c == '"' {
                        self.nested_in_string = false;
                    }
                } else {
                    match c {
                        '"' => self.nested_in_string = true,
                        '{' | '[' => self.depth += 1,
                        '}' | ']' => {
                            self.depth -= 1;
                            if self.depth == 0 {
                                self.end_value(out);
                            }
                        }
                        _ => {}
                    }
                }
            }
            ScanState::AfterValue => match c {
                ',' => self.state = ScanState::BeforeKey,
                '}' => self.state = ScanState::Finished,
                _ => {}
            },
            // Trailing content after the object is dropped
            ScanState::Finished => {}
        }
    }

    /// A new field's value begins; settle anything still owed to the
    /// previous field and take ownership of the parsed key.
    fn begin_value(&mut self, out: &mut Vec<Token>) {
        self.flush_pending(out);
        self.current_key = std::mem::take(&mut self.key_buf);
    }

    /// The value closed. An empty flush still emits a token so an empty
    /// string value marks its field as seen.
    fn end_value(&mut self, out: &mut Vec<Token>) {
        out.push(Token::new(
            self.current_key.clone(),
            std::mem::take(&mut self.pending),
        ));
        self.state = ScanState::AfterValue;
    }

    fn emit_scalar(&mut self, out: &mut Vec<Token>) {
        out.push(Token::new(
            self.current_key.clone(),
            std::mem::take(&mut self.scalar_buf),
        ));
    }

    fn flush_pending(&mut self, out: &mut Vec<Token>) {
        if !self.pending.is_empty() {
            out.push(Token::new(
                self.current_key.clone(),
                std::mem::take(&mut self.pending),
            ));
        }
    }
}

/// Advance one character inside a JSON string, decoding escapes into `out`.
/// Returns true when the closing quote is reached. Escape state lives in the
/// caller so a `\uXXXX` sequence can be split across deltas at any point.
fn step_string(
    escape: &mut Escape,
    high_surrogate: &mut Option<u16>,
    c: char,
    out: &mut String,
) -> bool {
    match escape {
        Escape::Started => {
            if c != 'u' && high_surrogate.take().is_some() {
                out.push('\u{FFFD}');
            }
            *escape = Escape::None;
            match c {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                '/' => out.push('/'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{0008}'),
                'f' => out.push('\u{000C}'),
                'u' => *escape = Escape::Unicode(String::new()),
                other => {
                    // Unknown escape, keep it verbatim
                    out.push('\\');
                    out.push(other);
                }
            }
            false
        }
        Escape::Unicode(hex) => {
            hex.push(c);
            if hex.len() == 4 {
                let unit = u16::from_str_radix(hex, 16).unwrap_or(0xFFFD);
                *escape = Escape::None;
                match high_surrogate.take() {
                    Some(high) if (0xDC00..0xE000).contains(&unit) => {
                        let cp = 0x10000
                            + (((high as u32) - 0xD800) << 10)
                            + ((unit as u32) - 0xDC00);
                        out.push(char::from_u32(cp).unwrap_or('\u{FFFD}'));
                    }
                    Some(_) => {
                        // Lone high surrogate followed by a non-low unit
                        out.push('\u{FFFD}');
                        push_code_unit(unit, high_surrogate, out);
                    }
                    None => push_code_unit(unit, high_surrogate, out),
                }
            }
            false
        }
        Escape::None => match c {
            '\\' => {
                *escape = Escape::Started;
                false
            }
            '"' => {
                if high_surrogate.take().is_some() {
                    out.push('\u{FFFD}');
                }
                true
            }
            other => {
                if high_surrogate.take().is_some() {
                    out.push('\u{FFFD}');
                }
                out.push(other);
                false
            }
        },
    }
}

fn push_code_unit(unit: u16, high_surrogate: &mut Option<u16>, out: &mut String) {
    if (0xD800..0xDC00).contains(&unit) {
        *high_surrogate = Some(unit);
    } else if (0xDC00..0xE000).contains(&unit) {
        // Low surrogate with no high half
        out.push('\u{FFFD}');
    } else {
        out.push(char::from_u32(unit as u32).unwrap_or('\u{FFFD}'));
    }
}
