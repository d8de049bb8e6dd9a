//! 词法分析器。

use std::fmt::Display;

use crate::error::CompileError;

/// 词法单元种类
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    Comma,
    LeftParen,
    RightParen,
    Semicolon,
    EndOfFile,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer",
            TokenKind::Float => "number",
            TokenKind::Comma => "','",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::Semicolon => "';'",
            TokenKind::EndOfFile => "end of file",
        };
        f.write_str(s)
    }
}

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// 种类
    pub kind: TokenKind,
    /// 原文
    pub text: String,
    /// 行号
    pub line: usize,
    /// 列号
    pub column: usize,
}

/// 按需产生词法单元的词法分析器。
pub struct Lexer<'a> {
    source_name: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    current: Option<Token>,
}

impl<'a> Lexer<'a> {
    /// 创建一个新的 `Lexer`。
    pub fn new(source: &str, source_name: &'a str) -> Self {
        Self {
            source_name,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            current: None,
        }
    }

    /// 源文件名。
    pub fn source_name(&self) -> &'a str {
        self.source_name
    }

    /// 当前的词法单元，不前进。
    pub fn current(&mut self) -> Result<&Token, CompileError> {
        let token = match self.current.take() {
            Some(token) => token,
            None => self.lex()?,
        };
        Ok(self.current.insert(token))
    }

    /// 消耗当前的词法单元。
    pub fn next(&mut self) -> Result<(), CompileError> {
        let token = self.current()?;
        if token.kind == TokenKind::EndOfFile {
            let (line, column) = (token.line, token.column);
            return Err(self.error_at(line, column, "Unexpected end of file"));
        }
        self.current = None;
        Ok(())
    }

    /// 当前词法单元是否为给定的标识符。
    pub fn is_identifier(&mut self, name: &str, ignore_case: bool) -> Result<bool, CompileError> {
        let token = self.current()?;
        Ok(token.kind == TokenKind::Identifier
            && if ignore_case {
                token.text.eq_ignore_ascii_case(name)
            } else {
                token.text == name
            })
    }

    /// 在给定位置构造错误。
    pub fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> CompileError {
        CompileError::new(self.source_name, line, column, message)
    }

    /// 在当前词法单元处构造错误。
    pub fn error(&mut self, message: impl Into<String>) -> CompileError {
        match self.current() {
            Ok(token) => {
                let (line, column) = (token.line, token.column);
                self.error_at(line, column, message)
            }
            Err(err) => err,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '#' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia();

        let (line, column) = (self.line, self.column);
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let Some(ch) = self.peek() else {
            return Ok(token(TokenKind::EndOfFile, String::new()));
        };

        let single = match ch {
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(token(kind, ch.to_string()));
        }

        if ch.is_ascii_digit() {
            let mut text = self.take_while(|c| c.is_ascii_digit());
            if self.peek() != Some('.') {
                return Ok(token(TokenKind::Integer, text));
            }
            text.push('.');
            self.advance();
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {}
                Some(c) => {
                    return Err(self.error_at(
                        self.line,
                        self.column,
                        format!("Expected digit after '.', found '{}'", c),
                    ))
                }
                None => {
                    return Err(self.error_at(self.line, self.column, "Unexpected end of file in number"))
                }
            }
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
            return Ok(token(TokenKind::Float, text));
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Ok(token(TokenKind::Identifier, text));
        }

        Err(self.error_at(line, column, format!("Unexpected character '{}'", ch)))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek().filter(|&c| pred(c)) {
            s.push(c);
            self.advance();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(source, "test");
        let mut tokens = vec![];
        loop {
            let token = lexer.current().unwrap().clone();
            let eof = token.kind == TokenKind::EndOfFile;
            tokens.push((token.kind, token.text));
            if eof {
                break;
            }
            lexer.next().unwrap();
        }
        tokens
    }

    #[test]
    fn lex_statement() {
        let tokens = lex_all("difficulty 1.5, 2;");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Identifier, "difficulty".into()),
                (TokenKind::Float, "1.5".into()),
                (TokenKind::Comma, ",".into()),
                (TokenKind::Integer, "2".into()),
                (TokenKind::Semicolon, ";".into()),
                (TokenKind::EndOfFile, "".into()),
            ]
        );
    }

    #[test]
    fn lex_punctuation_and_identifiers() {
        let tokens = lex_all("offer_text (append(_a1))");
        let kinds = tokens.iter().map(|(k, _)| *k).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::LeftParen,
                TokenKind::Identifier,
                TokenKind::RightParen,
                TokenKind::RightParen,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(tokens[4].1, "_a1");
    }

    #[test]
    fn comments_produce_no_tokens() {
        let tokens = lex_all("# header\nweight 3; # trailing\n# last");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], (TokenKind::Identifier, "weight".into()));
        assert_eq!(tokens[3].0, TokenKind::EndOfFile);
    }

    #[test]
    fn positions() {
        let mut lexer = Lexer::new("weight\n  10;", "test");
        lexer.next().unwrap();
        let token = lexer.current().unwrap();
        assert_eq!((token.line, token.column), (2, 3));
    }

    #[test]
    fn eof_is_stable_but_not_consumable() {
        let mut lexer = Lexer::new("  ", "test");
        assert_eq!(lexer.current().unwrap().kind, TokenKind::EndOfFile);
        assert_eq!(lexer.current().unwrap().kind, TokenKind::EndOfFile);
        let err = lexer.next().unwrap_err();
        assert_eq!(err.message, "Unexpected end of file");
    }

    #[test]
    fn unexpected_character() {
        let mut lexer = Lexer::new("weight $", "script.vs");
        lexer.next().unwrap();
        let err = lexer.current().unwrap_err();
        assert_eq!(err.source_name, "script.vs");
        assert_eq!((err.line, err.column), (1, 8));
        assert!(err.message.contains('$'));
    }

    #[test]
    fn dangling_decimal_point() {
        let mut lexer = Lexer::new("1.", "test");
        assert!(lexer.current().is_err());
        let mut lexer = Lexer::new("1.x", "test");
        assert!(lexer.current().is_err());
    }

    #[test]
    fn identifier_case() {
        let mut lexer = Lexer::new("Weight", "test");
        assert!(!lexer.is_identifier("weight", false).unwrap());
        assert!(lexer.is_identifier("weight", true).unwrap());
    }
}
