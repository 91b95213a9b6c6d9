//! Tokenizer for VBA module text.
//!
//! Whitespace is dropped; comments, line continuations and newlines are kept
//! as tokens so statement splitting can see them.

use crate::symbol::Span;

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword, including `[bracketed]` names.
    Identifier,
    /// Numeric literal.
    Number,
    /// `"..."` string literal.
    StringLiteral,
    /// `#...#` date literal.
    DateLiteral,
    /// Operator or punctuation.
    Punct,
    /// `:` statement separator.
    Colon,
    /// End of a physical line.
    Newline,
    /// ` _` line continuation, through the line break.
    Continuation,
    /// `'` or `Rem` comment, or a `#` directive line.
    Comment,
}

/// One token with its byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Category.
    pub kind: TokenKind,
    /// Byte span in the module text.
    pub span: Span,
}

impl Token {
    /// Token text.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }

    /// Case-insensitive keyword/identifier check.
    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text(source).eq_ignore_ascii_case(word)
    }

    /// Exact punctuation check.
    pub fn is_punct(&self, source: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(source) == punct
    }
}

/// Split module text into tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line_start = true;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        match c {
            b' ' | b'\t' => {
                pos += 1;
                continue;
            }
            b'\r' if bytes.get(pos + 1) == Some(&b'\n') => {
                pos += 2;
                tokens.push(token(TokenKind::Newline, start, pos));
                line_start = true;
                continue;
            }
            b'\n' | b'\r' => {
                pos += 1;
                tokens.push(token(TokenKind::Newline, start, pos));
                line_start = true;
                continue;
            }
            _ => {}
        }

        if c == b'_' && is_continuation(bytes, pos) {
            pos += 1;
            while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
                pos += 1;
            }
            if bytes.get(pos) == Some(&b'\r') {
                pos += 1;
            }
            if bytes.get(pos) == Some(&b'\n') {
                pos += 1;
            }
            tokens.push(token(TokenKind::Continuation, start, pos));
            continue;
        }

        let at_line_start = line_start;
        line_start = false;

        if c == b'\'' || (c == b'#' && at_line_start) {
            pos = end_of_line(bytes, pos);
            tokens.push(token(TokenKind::Comment, start, pos));
            continue;
        }

        if c == b'"' {
            pos += 1;
            while pos < bytes.len() {
                match bytes[pos] {
                    b'"' if bytes.get(pos + 1) == Some(&b'"') => pos += 2,
                    b'"' => {
                        pos += 1;
                        break;
                    }
                    b'\n' | b'\r' => break,
                    _ => pos += 1,
                }
            }
            tokens.push(token(TokenKind::StringLiteral, start, pos));
            continue;
        }

        if c == b'#' {
            let line_end = end_of_line(bytes, pos);
            if let Some(close) = source[pos + 1..line_end].find('#') {
                let inner = &source[pos + 1..pos + 1 + close];
                if !inner.is_empty() && inner.bytes().all(|b| b != b'"') {
                    pos = pos + 2 + close;
                    tokens.push(token(TokenKind::DateLiteral, start, pos));
                    continue;
                }
            }
            pos += 1;
            tokens.push(token(TokenKind::Punct, start, pos));
            continue;
        }

        if c == b'[' {
            let line_end = end_of_line(bytes, pos);
            pos = source[pos..line_end]
                .find(']')
                .map(|close| pos + close + 1)
                .unwrap_or(line_end);
            tokens.push(token(TokenKind::Identifier, start, pos));
            continue;
        }

        if c.is_ascii_alphabetic() || c >= 0x80 {
            pos += utf8_len(c);
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] >= 0x80)
            {
                pos += utf8_len(bytes[pos]);
            }
            if pos < bytes.len()
                && matches!(bytes[pos], b'$' | b'%' | b'#' | b'@')
                && !bytes
                    .get(pos + 1)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
            {
                pos += 1;
            }
            if source[start..pos].eq_ignore_ascii_case("rem") && at_line_start_or_colon(&tokens) {
                pos = end_of_line(bytes, pos);
                tokens.push(token(TokenKind::Comment, start, pos));
                continue;
            }
            tokens.push(token(TokenKind::Identifier, start, pos));
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) && !follows_value(&tokens, bytes)) {
            pos = scan_number(bytes, pos);
            tokens.push(token(TokenKind::Number, start, pos));
            continue;
        }

        if c == b'&' && matches!(bytes.get(pos + 1), Some(b'H' | b'h' | b'O' | b'o')) {
            let digits_start = pos + 2;
            let mut end = digits_start;
            while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                end += 1;
            }
            if end > digits_start {
                if bytes.get(end) == Some(&b'&') {
                    end += 1;
                }
                pos = end;
                tokens.push(token(TokenKind::Number, start, pos));
                continue;
            }
        }

        if c == b':' {
            if bytes.get(pos + 1) == Some(&b'=') {
                pos += 2;
                tokens.push(token(TokenKind::Punct, start, pos));
            } else {
                pos += 1;
                tokens.push(token(TokenKind::Colon, start, pos));
                line_start = true;
            }
            continue;
        }

        let two = source.get(pos..pos + 2).unwrap_or("");
        pos += if matches!(two, "<=" | ">=" | "<>") { 2 } else { utf8_len(c) };
        tokens.push(token(TokenKind::Punct, start, pos));
    }

    tokens
}

fn token(kind: TokenKind, start: usize, end: usize) -> Token {
    Token {
        kind,
        span: Span::new(start, end),
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

fn end_of_line(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\n' && bytes[pos] != b'\r' {
        pos += 1;
    }
    pos
}

/// `_` preceded by whitespace and followed only by whitespace up to the line end.
fn is_continuation(bytes: &[u8], pos: usize) -> bool {
    let preceded = pos == 0 || matches!(bytes[pos - 1], b' ' | b'\t');
    if !preceded {
        return false;
    }
    let mut next = pos + 1;
    while next < bytes.len() && matches!(bytes[next], b' ' | b'\t') {
        next += 1;
    }
    next >= bytes.len() || matches!(bytes[next], b'\r' | b'\n')
}

fn at_line_start_or_colon(tokens: &[Token]) -> bool {
    tokens
        .iter()
        .rev()
        .find(|t| t.kind != TokenKind::Continuation)
        .map_or(true, |t| matches!(t.kind, TokenKind::Newline | TokenKind::Colon))
}

/// `.5` after an identifier or `)` is member access, not a number.
fn follows_value(tokens: &[Token], bytes: &[u8]) -> bool {
    tokens.last().is_some_and(|t| {
        t.kind == TokenKind::Identifier
            || (t.kind == TokenKind::Punct && bytes[t.span.start] == b')')
    })
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    if pos < bytes.len()
        && matches!(bytes[pos], b'%' | b'&' | b'!' | b'#' | b'@' | b'^')
        && !bytes
            .get(pos + 1)
            .is_some_and(|b| b.is_ascii_alphanumeric())
    {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_iter()
            .map(|t| (t.kind, t.text(source).to_string()))
            .collect()
    }

    #[test]
    fn test_call_statement_tokens() {
        let tokens = texts("Foo 1, \"a\"\"b\", x");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Identifier, "Foo".to_string()),
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Punct, ",".to_string()),
                (TokenKind::StringLiteral, "\"a\"\"b\"".to_string()),
                (TokenKind::Punct, ",".to_string()),
                (TokenKind::Identifier, "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_continuation_and_comment() {
        let tokens = texts("Foo a, _\n    b ' trailing\n");
        let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Punct,
                TokenKind::Continuation,
                TokenKind::Identifier,
                TokenKind::Comment,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_named_argument_and_separator() {
        let tokens = texts("Foo b:=1: Bar");
        assert_eq!(tokens[2], (TokenKind::Punct, ":=".to_string()));
        assert_eq!(tokens[4].0, TokenKind::Colon);
    }

    #[test]
    fn test_rem_comment_only_at_statement_start() {
        let tokens = texts("Rem note here\nx = rem1");
        assert_eq!(tokens[0].0, TokenKind::Comment);
        assert_eq!(tokens.last().unwrap().1, "rem1");
    }

    #[test]
    fn test_type_hint_and_date() {
        let tokens = texts("s = Left$(t, 2) + #1/2/2020#");
        assert!(tokens.contains(&(TokenKind::Identifier, "Left$".to_string())));
        assert!(tokens.contains(&(TokenKind::DateLiteral, "#1/2/2020#".to_string())));
    }
}
