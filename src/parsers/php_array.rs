//! Keyed-array resource files:
//!
//! ```php
//! <?php
//!
//! return [
//!     "welcome" => "Welcome, :name!",
//! ];
//! ```
//!
//! Only flat arrays of string literals are accepted. Output always uses
//! double-quoted literals so newlines and control characters are escaped.

use crate::error::ResourceError;
use crate::model::StringMap;

pub fn parse(text: &str) -> Result<StringMap, ResourceError> {
    let mut sc = Scanner::new(text);

    sc.skip_whitespace();
    if !sc.eat("<?php") {
        return Err(sc.error("missing <?php open tag"));
    }

    sc.seek_return()?;
    sc.skip_trivia();

    let close = if sc.eat("[") {
        ']'
    } else if sc.eat_word("array") {
        sc.skip_trivia();
        if !sc.eat("(") {
            return Err(sc.error("expected '(' after array"));
        }
        ')'
    } else {
        return Err(sc.error("return value is not an array literal"));
    };

    let mut entries = StringMap::new();

    loop {
        sc.skip_trivia();
        match sc.peek() {
            None => return Err(sc.error("unterminated array literal")),
            Some(c) if c == close => {
                sc.bump();
                break;
            }
            _ => {}
        }

        let key = sc.read_key()?;
        sc.skip_trivia();
        if !sc.eat("=>") {
            return Err(sc.error(&format!("expected '=>' after key '{key}'")));
        }
        sc.skip_trivia();

        let value = match sc.peek() {
            Some('\'') | Some('"') => sc.read_string()?,
            _ => {
                return Err(sc.error(&format!(
                    "unsupported value for key '{key}' (only string literals are supported)"
                )))
            }
        };
        entries.insert(key, value);

        sc.skip_trivia();
        match sc.peek() {
            Some(',') => sc.bump(),
            Some(c) if c == close => {}
            _ => return Err(sc.error("expected ',' between array items")),
        }
    }

    Ok(entries)
}

pub fn render(entries: &StringMap) -> String {
    let mut out = String::from("<?php\n\nreturn [\n");
    for (key, value) in entries.iter() {
        out.push_str(&format!("    \"{}\" => \"{}\",\n", escape(key), escape(value)));
    }
    out.push_str("];\n");
    out
}

/// Escape for a double-quoted PHP literal; the inverse of what [`parse`] reads.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.trim_start_matches('\u{feff}').chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, message: &str) -> ResourceError {
        ResourceError::Parse {
            line: self.line,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            for _ in s.chars() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    /// Case-insensitive keyword followed by a non-identifier character.
    fn eat_word(&mut self, word: &str) -> bool {
        let n = word.chars().count();
        let matches = word
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i).map(|p| p.to_ascii_lowercase()) == Some(c));
        let boundary = !self.peek_at(n).map(is_ident).unwrap_or(false);
        let preceded = self.pos > 0 && is_ident(self.chars[self.pos - 1]);

        if matches && boundary && !preceded {
            for _ in 0..n {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with("//") || (self.peek() == Some('#') && self.peek_at(1) != Some('[')) {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.bump();
                }
            } else if self.starts_with("/*") {
                self.bump();
                self.bump();
                while self.peek().is_some() && !self.starts_with("*/") {
                    self.bump();
                }
                self.eat("*/");
            } else {
                break;
            }
        }
    }

    /// Advance past the `return` keyword, skipping any preceding statements.
    fn seek_return(&mut self) -> Result<(), ResourceError> {
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.error("no return statement found")),
                Some('\'') | Some('"') => {
                    self.read_string()?;
                }
                _ => {
                    if self.eat_word("return") {
                        return Ok(());
                    }
                    self.bump();
                }
            }
        }
    }

    fn read_key(&mut self) -> Result<String, ResourceError> {
        match self.peek() {
            Some('\'') | Some('"') => self.read_string(),
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let mut key = String::new();
                key.push(c);
                self.bump();
                while let Some(d) = self.peek().filter(|d| d.is_ascii_digit()) {
                    key.push(d);
                    self.bump();
                }
                Ok(key)
            }
            _ => Err(self.error("expected a string or integer key")),
        }
    }

    fn read_string(&mut self) -> Result<String, ResourceError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a string literal")),
        };
        let start_line = self.line;
        self.bump();

        let mut out = String::new();
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => {
                    return Err(ResourceError::Parse {
                        line: start_line,
                        message: "unterminated string literal".into(),
                    })
                }
            };
            self.bump();

            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let next = match self.peek() {
                Some(n) => n,
                None => {
                    out.push('\\');
                    continue;
                }
            };

            if quote == '\'' {
                match next {
                    '\'' | '\\' => {
                        out.push(next);
                        self.bump();
                    }
                    _ => out.push('\\'),
                }
                continue;
            }

            match next {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'v' => out.push('\u{0b}'),
                'f' => out.push('\u{0c}'),
                'e' => out.push('\u{1b}'),
                '\\' | '$' | '"' => out.push(next),
                'u' if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    let mut hex = String::new();
                    while let Some(h) = self.peek().filter(|h| h.is_ascii_hexdigit()) {
                        hex.push(h);
                        self.bump();
                    }
                    if self.peek() != Some('}') {
                        return Err(self.error("invalid \\u{...} escape"));
                    }
                    let ch = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error("invalid \\u{...} escape"))?;
                    out.push(ch);
                }
                _ => {
                    // Unknown escapes are kept verbatim, as PHP does.
                    out.push('\\');
                    continue;
                }
            }
            self.bump();
        }
    }
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
