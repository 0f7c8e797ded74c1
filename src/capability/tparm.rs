//! Terminfo parameter expansion
//!
//! Expands parameterized capability strings using the terminfo `%`
//! language: a small stack machine with up to nine integer parameters,
//! 26 dynamic and 26 static variables, arithmetic, comparisons and the
//! `%? c %t then %e else %;` conditional.

use thiserror::Error;

/// Maximum number of parameters a capability may reference
pub const MAX_PARAMS: usize = 9;

/// Errors produced while expanding a capability string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TparmError {
    #[error("stack underflow at byte {0}")]
    StackUnderflow(usize),
    #[error("unknown directive '%{1}' at byte {0}")]
    UnknownDirective(usize, char),
    #[error("unterminated directive at byte {0}")]
    Unterminated(usize),
    #[error("division by zero at byte {0}")]
    DivisionByZero(usize),
    #[error("arithmetic overflow at byte {0}")]
    Overflow(usize),
}

/// Printf-style format for `%d`, `%x`, ...
#[derive(Debug, Default, Clone, Copy)]
struct Format {
    left_align: bool,
    zero_pad: bool,
    width: usize,
    conversion: u8,
}

impl Format {
    fn render(&self, value: i32, out: &mut Vec<u8>) {
        let digits = match self.conversion {
            b'o' => format!("{value:o}"),
            b'x' => format!("{value:x}"),
            b'X' => format!("{value:X}"),
            _ => value.to_string(),
        };
        let pad = self.width.saturating_sub(digits.len());
        if self.left_align {
            out.extend_from_slice(digits.as_bytes());
            out.extend(std::iter::repeat(b' ').take(pad));
        } else if self.zero_pad {
            let (sign, body) = match digits.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", digits.as_str()),
            };
            out.extend_from_slice(sign.as_bytes());
            out.extend(std::iter::repeat(b'0').take(pad));
            out.extend_from_slice(body.as_bytes());
        } else {
            out.extend(std::iter::repeat(b' ').take(pad));
            out.extend_from_slice(digits.as_bytes());
        }
    }
}

/// Expansion state for one call
struct Machine<'a> {
    src: &'a [u8],
    pos: usize,
    params: [i32; MAX_PARAMS],
    stack: Vec<i32>,
    dynamic_vars: [i32; 26],
    static_vars: [i32; 26],
    out: Vec<u8>,
}

impl<'a> Machine<'a> {
    fn new(template: &'a str, params: &[i32]) -> Self {
        let mut p = [0; MAX_PARAMS];
        for (slot, value) in p.iter_mut().zip(params) {
            *slot = *value;
        }
        Self {
            src: template.as_bytes(),
            pos: 0,
            params: p,
            stack: Vec::new(),
            dynamic_vars: [0; 26],
            static_vars: [0; 26],
            out: Vec::with_capacity(template.len() + 8),
        }
    }

    fn pop(&mut self) -> Result<i32, TparmError> {
        self.stack.pop().ok_or(TparmError::StackUnderflow(self.pos))
    }

    fn next_byte(&mut self) -> Result<u8, TparmError> {
        let b = *self
            .src
            .get(self.pos)
            .ok_or(TparmError::Unterminated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn binary(&mut self, op: impl Fn(i32, i32) -> i32) -> Result<(), TparmError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.stack.push(op(a, b));
        Ok(())
    }

    fn run(mut self) -> Result<Vec<u8>, TparmError> {
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            self.pos += 1;
            if b != b'%' {
                self.out.push(b);
                continue;
            }
            let start = self.pos - 1;
            let d = self.next_byte()?;
            match d {
                b'%' => self.out.push(b'%'),
                b'c' => {
                    let v = self.pop()?;
                    // A NUL would terminate the string on a real terminal
                    self.out.push(if v == 0 { 0x80 } else { v as u8 });
                }
                b's' => {
                    let v = self.pop()?;
                    self.out.extend_from_slice(v.to_string().as_bytes());
                }
                b'p' => {
                    let n = self.next_byte()?;
                    if !(b'1'..=b'9').contains(&n) {
                        return Err(TparmError::UnknownDirective(start, n as char));
                    }
                    self.stack.push(self.params[usize::from(n - b'1')]);
                }
                b'P' => {
                    let v = self.pop()?;
                    let name = self.next_byte()?;
                    match name {
                        b'a'..=b'z' => self.dynamic_vars[usize::from(name - b'a')] = v,
                        b'A'..=b'Z' => self.static_vars[usize::from(name - b'A')] = v,
                        _ => return Err(TparmError::UnknownDirective(start, name as char)),
                    }
                }
                b'g' => {
                    let name = self.next_byte()?;
                    let v = match name {
                        b'a'..=b'z' => self.dynamic_vars[usize::from(name - b'a')],
                        b'A'..=b'Z' => self.static_vars[usize::from(name - b'A')],
                        _ => return Err(TparmError::UnknownDirective(start, name as char)),
                    };
                    self.stack.push(v);
                }
                b'\'' => {
                    let c = self.next_byte()?;
                    if self.next_byte()? != b'\'' {
                        return Err(TparmError::Unterminated(start));
                    }
                    self.stack.push(i32::from(c));
                }
                b'{' => {
                    let mut value: i32 = 0;
                    loop {
                        let c = self.next_byte()?;
                        match c {
                            b'0'..=b'9' => {
                                value = value.saturating_mul(10).saturating_add(i32::from(c - b'0'))
                            }
                            b'}' => break,
                            _ => return Err(TparmError::Unterminated(start)),
                        }
                    }
                    self.stack.push(value);
                }
                b'l' => {
                    // Strings are never pushed; length of an integer is its digit count
                    let v = self.pop()?;
                    self.stack.push(v.to_string().len() as i32);
                }
                b'+' => self.binary(i32::wrapping_add)?,
                b'-' => self.binary(i32::wrapping_sub)?,
                b'*' => self.binary(i32::wrapping_mul)?,
                b'/' | b'm' => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    if b == 0 {
                        return Err(TparmError::DivisionByZero(start));
                    }
                    let v = if d == b'/' { a.checked_div(b) } else { a.checked_rem(b) };
                    self.stack.push(v.ok_or(TparmError::Overflow(start))?);
                }
                b'&' => self.binary(|a, b| a & b)?,
                b'|' => self.binary(|a, b| a | b)?,
                b'^' => self.binary(|a, b| a ^ b)?,
                b'=' => self.binary(|a, b| i32::from(a == b))?,
                b'>' => self.binary(|a, b| i32::from(a > b))?,
                b'<' => self.binary(|a, b| i32::from(a < b))?,
                b'A' => self.binary(|a, b| i32::from(a != 0 && b != 0))?,
                b'O' => self.binary(|a, b| i32::from(a != 0 || b != 0))?,
                b'!' => {
                    let v = self.pop()?;
                    self.stack.push(i32::from(v == 0));
                }
                b'~' => {
                    let v = self.pop()?;
                    self.stack.push(!v);
                }
                b'i' => {
                    self.params[0] = self.params[0].wrapping_add(1);
                    self.params[1] = self.params[1].wrapping_add(1);
                }
                b'?' | b';' => {}
                b't' => {
                    let cond = self.pop()?;
                    if cond == 0 {
                        self.skip_branch(true)?;
                    }
                }
                b'e' => {
                    // Reached the end of a taken then-branch
                    self.skip_branch(false)?;
                }
                _ => {
                    self.pos -= 1;
                    let fmt = self.parse_format(start)?;
                    let v = self.pop()?;
                    fmt.render(v, &mut self.out);
                }
            }
        }
        Ok(self.out)
    }

    /// Parse `[:][-+# 0]*[width][.precision](d|o|x|X)`
    fn parse_format(&mut self, start: usize) -> Result<Format, TparmError> {
        let mut fmt = Format::default();
        if self.src.get(self.pos) == Some(&b':') {
            self.pos += 1;
        }
        while let Some(&c) = self.src.get(self.pos) {
            match c {
                b'-' => fmt.left_align = true,
                b'0' => fmt.zero_pad = true,
                b'+' | b'#' | b' ' => {}
                _ => break,
            }
            self.pos += 1;
        }
        while let Some(&c) = self.src.get(self.pos) {
            if !c.is_ascii_digit() {
                break;
            }
            fmt.width = fmt.width * 10 + usize::from(c - b'0');
            self.pos += 1;
        }
        if self.src.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            while self.src.get(self.pos).is_some_and(u8::is_ascii_digit) {
                self.pos += 1;
            }
        }
        let conv = self.next_byte()?;
        match conv {
            b'd' | b'o' | b'x' | b'X' => {
                fmt.conversion = conv;
                Ok(fmt)
            }
            _ => Err(TparmError::UnknownDirective(start, conv as char)),
        }
    }

    /// Skip forward past the current branch.
    ///
    /// With `stop_at_else`, stops after a matching `%e` (entering the else
    /// branch) or `%;`; otherwise only after the matching `%;`.
    fn skip_branch(&mut self, stop_at_else: bool) -> Result<(), TparmError> {
        let mut depth = 0usize;
        while self.pos < self.src.len() {
            let b = self.src[self.pos];
            self.pos += 1;
            if b != b'%' {
                continue;
            }
            let d = self.next_byte()?;
            match d {
                b'?' => depth += 1,
                b';' if depth == 0 => return Ok(()),
                b';' => depth -= 1,
                b'e' if depth == 0 && stop_at_else => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }
}

/// Expand a capability template with the given parameters
pub fn tparm(template: &str, params: &[i32]) -> Result<Vec<u8>, TparmError> {
    Machine::new(template, params).run()
}
