// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Tokenizer for one line of assembly source.

// PETSCII reverse-video-on, used as a comment marker in C64 listings.
const PETSCII_REVERSE: u8 = 0x12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Symbol(String),
    Number(i32),
    Str(String),
    Punct(Punct),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Comma,
    Colon,
    Hash,
    OpenParen,
    CloseParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    EqEq,
    Ne,
    Shl,
    Shr,
    Bang,
    Tilde,
}

#[derive(Debug, Clone)]
pub struct TokenizeError {
    pub message: String,
}

impl TokenizeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Tokenize a whole line. Comments (`;` or the PETSCII reverse marker)
/// truncate the line; tokens carry no positions of their own.
pub fn tokenize(line: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(line);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            input: line.as_bytes(),
            cursor: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_white();
        let c = self.current_byte();
        match c {
            0 => return Ok(None),
            b';' | PETSCII_REVERSE => {
                self.cursor = self.input.len();
                return Ok(None);
            }
            _ if is_symbol_start(c) => return Ok(Some(self.scan_symbol())),
            _ if is_digit(c) => return Ok(Some(self.scan_number()?)),
            b'$' => return Ok(Some(self.scan_hex()?)),
            b'"' | b'\'' => return Ok(Some(self.scan_string()?)),
            _ => {}
        }

        self.cursor += 1;
        let punct = match c {
            b',' => Punct::Comma,
            b':' => Punct::Colon,
            b'#' => Punct::Hash,
            b'(' => Punct::OpenParen,
            b')' => Punct::CloseParen,
            b'+' => Punct::Plus,
            b'-' => Punct::Minus,
            b'*' => Punct::Star,
            b'/' => Punct::Slash,
            b'%' => Punct::Percent,
            b'&' => Punct::Amp,
            b'|' => Punct::Pipe,
            b'^' => Punct::Caret,
            b'~' => Punct::Tilde,
            b'<' => match self.peek_byte(0) {
                b'<' => {
                    self.cursor += 1;
                    Punct::Shl
                }
                b'=' => {
                    self.cursor += 1;
                    Punct::Le
                }
                _ => Punct::Lt,
            },
            b'>' => match self.peek_byte(0) {
                b'>' => {
                    self.cursor += 1;
                    Punct::Shr
                }
                b'=' => {
                    self.cursor += 1;
                    Punct::Ge
                }
                _ => Punct::Gt,
            },
            b'=' => {
                if self.peek_byte(0) == b'=' {
                    self.cursor += 1;
                    Punct::EqEq
                } else {
                    Punct::Eq
                }
            }
            b'!' => {
                if self.peek_byte(0) == b'=' {
                    self.cursor += 1;
                    Punct::Ne
                } else {
                    Punct::Bang
                }
            }
            _ => {
                return Err(TokenizeError::new(format!(
                    "Unexpected character: {}",
                    c as char
                )))
            }
        };
        Ok(Some(Token::Punct(punct)))
    }

    fn scan_symbol(&mut self) -> Token {
        let start = self.cursor;
        while is_symbol_char(self.current_byte()) {
            self.cursor += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        Token::Symbol(text)
    }

    fn scan_number(&mut self) -> Result<Token, TokenizeError> {
        let start = self.cursor;
        while is_num_char(self.current_byte()) {
            self.cursor += 1;
        }
        let text = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16)
        } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
            u32::from_str_radix(bin, 2)
        } else {
            text.parse::<u32>()
        };
        match value {
            Ok(value) => Ok(Token::Number(value as i32)),
            Err(_) => Err(TokenizeError::new(format!(
                "Malformed numeric literal: {text}"
            ))),
        }
    }

    fn scan_hex(&mut self) -> Result<Token, TokenizeError> {
        self.cursor += 1;
        let start = self.cursor;
        while self.current_byte().is_ascii_hexdigit() {
            self.cursor += 1;
        }
        if self.cursor == start {
            return Err(TokenizeError::new("Malformed numeric literal: $"));
        }
        let digits = String::from_utf8_lossy(&self.input[start..self.cursor]).to_string();
        match u32::from_str_radix(&digits, 16) {
            Ok(value) => Ok(Token::Number(value as i32)),
            Err(_) => Err(TokenizeError::new(format!(
                "Malformed numeric literal: ${digits}"
            ))),
        }
    }

    fn scan_string(&mut self) -> Result<Token, TokenizeError> {
        let quote = self.current_byte();
        self.cursor += 1;
        let mut out = Vec::new();
        while self.current_byte() != 0 && self.current_byte() != quote {
            let c = self.current_byte();
            if c == b'\\' {
                self.cursor += 1;
                let esc = self.current_byte();
                if esc == 0 {
                    break;
                }
                out.push(match esc {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    _ => esc,
                });
            } else {
                out.push(c);
            }
            self.cursor += 1;
        }
        if self.current_byte() != quote {
            return Err(TokenizeError::new("Unterminated string"));
        }
        self.cursor += 1;
        Ok(Token::Str(String::from_utf8_lossy(&out).to_string()))
    }

    fn skip_white(&mut self) {
        while is_space(self.current_byte()) {
            self.cursor += 1;
        }
    }

    fn current_byte(&self) -> u8 {
        if self.cursor >= self.input.len() {
            0
        } else {
            self.input[self.cursor]
        }
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        let idx = self.cursor + offset;
        if idx >= self.input.len() {
            0
        } else {
            self.input[idx]
        }
    }
}

fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn is_symbol_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'.'
}

fn is_symbol_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_num_char(c: u8) -> bool {
    c.is_ascii_alphanumeric()
}
