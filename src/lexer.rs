use crate::error::Span;

/// Token types for the data step language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Missing,              // `.`
    Text(String),
    LiteralBlock(String), // verbatim DATALINES payload

    // Identifiers and keywords
    Ident(String),
    Datalines, // DATALINES / CARDS

    // Operators
    Plus,
    Minus,
    Star,
    Power, // **
    Slash,
    Eq, // `=` is assignment or comparison; the parser decides
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Concat, // ||

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dollar,
    Semicolon,

    // Special
    Unknown(String),
    Eof,
}

/// A lexical token with the raw source text it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

/// Tokenizer for data step scripts.
///
/// Two pieces of state make it context sensitive: `statement_start`
/// decides whether a `*` opens a comment or is multiplication, and
/// `capture` switches the next call into raw line reading for an inline
/// DATALINES block.
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    statement_start: bool,
    capture: bool,
    after_datalines: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            statement_start: true,
            capture: false,
            after_datalines: false,
        }
    }

    /// Drain the whole stream. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        if self.capture {
            return self.read_literal_block();
        }

        loop {
            self.skip_whitespace();
            let span = self.span();
            let Some(ch) = self.peek() else {
                return self.produce(TokenKind::Eof, String::new(), span);
            };

            if ch == '/' && self.peek_at(1) == Some('*') {
                self.skip_block_comment();
                continue;
            }
            if ch == '*' && self.statement_start {
                self.skip_statement_comment();
                continue;
            }

            let start = self.pos;
            let kind = match ch {
                ';' => { self.bump(); TokenKind::Semicolon }
                ',' => { self.bump(); TokenKind::Comma }
                '(' => { self.bump(); TokenKind::LParen }
                ')' => { self.bump(); TokenKind::RParen }
                '[' => { self.bump(); TokenKind::LBracket }
                ']' => { self.bump(); TokenKind::RBracket }
                '{' => { self.bump(); TokenKind::LBrace }
                '}' => { self.bump(); TokenKind::RBrace }
                '$' => { self.bump(); TokenKind::Dollar }
                '+' => { self.bump(); TokenKind::Plus }
                '-' => { self.bump(); TokenKind::Minus }
                '/' => { self.bump(); TokenKind::Slash }
                '=' => { self.bump(); TokenKind::Eq }
                '&' => { self.bump(); TokenKind::And }
                '*' => {
                    self.bump();
                    if self.peek() == Some('*') {
                        self.bump();
                        TokenKind::Power
                    } else {
                        TokenKind::Star
                    }
                }
                '^' | '~' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Ne
                    } else {
                        TokenKind::Not
                    }
                }
                '<' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '|' | '!' => {
                    self.bump();
                    if self.peek() == Some(ch) {
                        self.bump();
                        TokenKind::Concat
                    } else {
                        TokenKind::Or
                    }
                }
                '\'' | '"' => self.read_text(ch),
                '.' if !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    TokenKind::Missing
                }
                _ if ch.is_ascii_digit() || ch == '.' => self.read_number(),
                _ if ch.is_ascii_alphabetic() || ch == '_' => self.read_ident(),
                _ => {
                    self.bump();
                    TokenKind::Unknown(ch.to_string())
                }
            };

            let text: String = self.input[start..self.pos].iter().collect();
            return self.produce(kind, text, span);
        }
    }

    /// Update statement/capture state for a token about to be handed out.
    fn produce(&mut self, kind: TokenKind, text: String, span: Span) -> Token {
        match kind {
            TokenKind::Semicolon => {
                self.statement_start = true;
                self.capture = self.after_datalines;
                self.after_datalines = false;
            }
            TokenKind::Datalines => {
                // Only a statement-leading keyword opens a block; `infile datalines;` does not.
                self.after_datalines = self.statement_start;
                self.statement_start = false;
            }
            TokenKind::Eof => {}
            _ => {
                self.statement_start = false;
                self.after_datalines = false;
            }
        }
        Token { kind, text, span }
    }

    /// Collect raw lines up to a line holding only `;`.
    fn read_literal_block(&mut self) -> Token {
        self.capture = false;
        // Anything after `datalines;` on the keyword's own line is not data.
        self.take_line();
        let span = self.span();

        let mut content = String::new();
        while self.pos < self.input.len() {
            let raw = self.take_line();
            let line = raw.strip_suffix('\r').unwrap_or(&raw);
            if line.trim() == ";" {
                break;
            }
            content.push_str(line);
            content.push('\n');
        }

        // The closing line was a terminator, so a statement starts next.
        self.statement_start = true;
        self.after_datalines = false;
        Token { kind: TokenKind::LiteralBlock(content.clone()), text: content, span }
    }

    fn take_line(&mut self) -> String {
        let mut line = String::new();
        while let Some(ch) = self.peek() {
            self.bump();
            if ch == '\n' {
                break;
            }
            line.push(ch);
        }
        line
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump();
        self.bump();
        while self.pos < self.input.len() {
            if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                self.bump();
                self.bump();
                return;
            }
            self.bump();
        }
    }

    /// `* text ;` comment: discard through the terminator.
    fn skip_statement_comment(&mut self) {
        while let Some(ch) = self.peek() {
            self.bump();
            if ch == ';' {
                break;
            }
        }
    }

    fn read_text(&mut self, quote: char) -> TokenKind {
        self.bump(); // skip opening quote
        let mut s = String::new();
        loop {
            match self.peek() {
                None => {
                    let mut raw = String::from(quote);
                    raw.push_str(&s);
                    return TokenKind::Unknown(raw);
                }
                Some(ch) if ch == quote => {
                    self.bump();
                    if self.peek() == Some(quote) {
                        self.bump();
                        s.push(quote);
                    } else {
                        return TokenKind::Text(s);
                    }
                }
                Some(ch) => {
                    s.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let start = self.pos;
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.bump();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let s: String = self.input[start..self.pos].iter().collect();
        match s.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Unknown(s),
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let s: String = self.input[start..self.pos].iter().collect();
        match s.to_ascii_lowercase().as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "eq" => TokenKind::Eq,
            "ne" => TokenKind::Ne,
            "lt" => TokenKind::Lt,
            "le" => TokenKind::Le,
            "gt" => TokenKind::Gt,
            "ge" => TokenKind::Ge,
            "datalines" | "cards" => TokenKind::Datalines,
            _ => TokenKind::Ident(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().into_iter().map(|t| t.kind).collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.to_string())
    }

    #[test]
    fn star_after_operand_is_multiplication() {
        assert_eq!(
            kinds("y = y * 2 ;"),
            vec![
                ident("y"),
                TokenKind::Eq,
                ident("y"),
                TokenKind::Star,
                TokenKind::Number(2.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn star_at_statement_start_is_comment() {
        assert_eq!(
            kinds("* comment ; y = 1 ;"),
            vec![ident("y"), TokenKind::Eq, TokenKind::Number(1.0), TokenKind::Semicolon, TokenKind::Eof]
        );
    }

    #[test]
    fn comment_after_nested_terminator() {
        let toks = kinds("do; * inside the loop; x = 2 * 3; end;");
        assert_eq!(toks[0], ident("do"));
        assert_eq!(toks[1], TokenKind::Semicolon);
        assert_eq!(toks[2], ident("x"));
        assert!(toks.contains(&TokenKind::Star));
        assert_eq!(toks.iter().filter(|k| **k == TokenKind::Semicolon).count(), 3);
    }

    #[test]
    fn comment_spanning_lines() {
        let toks = kinds("*\n multi\n line;\nx=1;");
        assert_eq!(toks[0], ident("x"));
    }

    #[test]
    fn power_operator() {
        assert!(kinds("x = 2 ** 3;").contains(&TokenKind::Power));
    }

    #[test]
    fn literal_block_captured_verbatim() {
        let mut lexer = Lexer::new("datalines;\na 1\nb 2\n;\nrun;");
        let toks: Vec<TokenKind> = lexer.tokenize().into_iter().map(|t| t.kind).collect();
        assert_eq!(
            toks,
            vec![
                TokenKind::Datalines,
                TokenKind::Semicolon,
                TokenKind::LiteralBlock("a 1\nb 2\n".to_string()),
                ident("run"),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn literal_block_keeps_leading_blanks_and_symbols() {
        let toks = kinds("cards;\n  * not a comment;\n x/y\n   ;  \n");
        assert_eq!(toks[2], TokenKind::LiteralBlock("  * not a comment;\n x/y\n".to_string()));
        assert_eq!(toks[3], TokenKind::Eof);
    }

    #[test]
    fn literal_block_to_eof() {
        let toks = kinds("datalines;\n1 2\n3 4");
        assert_eq!(toks[2], TokenKind::LiteralBlock("1 2\n3 4\n".to_string()));
        assert_eq!(toks[3], TokenKind::Eof);
    }

    #[test]
    fn datalines_without_terminator_does_not_capture() {
        let toks = kinds("infile datalines dlm=',';");
        assert_eq!(toks[1], TokenKind::Datalines);
        assert_eq!(toks[2], ident("dlm"));
        assert_eq!(toks[4], TokenKind::Text(",".to_string()));
    }

    #[test]
    fn infile_datalines_does_not_capture() {
        let toks = kinds("infile datalines;\ninput x;");
        assert_eq!(toks[3], ident("input"));
    }

    #[test]
    fn comment_right_after_literal_block() {
        let toks = kinds("datalines;\n1\n;\n* trailing note; run;");
        assert_eq!(toks[3], ident("run"));
    }

    #[test]
    fn block_comment_does_not_reset_statement_start() {
        let toks = kinds("x = 3 /* note */ * 2;");
        assert!(toks.contains(&TokenKind::Star));
    }

    #[test]
    fn text_literals() {
        assert_eq!(kinds("'it''s'")[0], TokenKind::Text("it's".to_string()));
        assert_eq!(kinds("\"ab\"")[0], TokenKind::Text("ab".to_string()));
        assert!(matches!(kinds("'open")[0], TokenKind::Unknown(_)));
    }

    #[test]
    fn numbers_and_missing() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 ."),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Missing,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn word_operators_are_case_insensitive() {
        assert_eq!(
            kinds("a AND b or NOT c ge d"),
            vec![
                ident("a"),
                TokenKind::And,
                ident("b"),
                TokenKind::Or,
                TokenKind::Not,
                ident("c"),
                TokenKind::Ge,
                ident("d"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn symbol_operators() {
        assert_eq!(
            kinds("^= ~= <= >= || | & ^"),
            vec![
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Concat,
                TokenKind::Or,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_character_is_not_fatal() {
        let toks = kinds("x = @;");
        assert_eq!(toks[2], TokenKind::Unknown("@".to_string()));
        assert_eq!(toks[3], TokenKind::Semicolon);
    }

    #[test]
    fn spans_track_lines() {
        let toks = Lexer::new("x = 1;\n  y = 2;").tokenize();
        assert_eq!(toks[4].span, Span::new(2, 3));
        assert_eq!(toks[4].text, "y");
    }

    #[test]
    fn independent_lexers_do_not_share_state() {
        let mut a = Lexer::new("x = 1; * c;");
        let mut b = Lexer::new("y * 2;");
        a.next_token();
        a.next_token();
        a.next_token();
        a.next_token(); // `;`, so `a` is at a statement start
        b.next_token(); // `y`, so `b` is not
        assert_eq!(b.next_token().kind, TokenKind::Star);
        assert_eq!(a.next_token().kind, TokenKind::Eof);
    }
}
