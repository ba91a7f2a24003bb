//! Lexer, AST and parser for the MATLAB subset understood by the loopback
//! workspace.
//!
//! Covered: numbers, `'...'` and `"..."` strings, matrix literals with
//! whitespace or comma separated elements, ranges, indexing and calls,
//! assignment, `if`/`elseif`/`else`, `while`, `for`, `%` and `%{ %}`
//! comments, `...` continuation, and command syntax for a handful of
//! workspace commands (`clear x y`).
//!
//! Operator precedence (lowest → highest):
//!   `||`  →  `&&`  →  `|`  →  `&`  →  relational  →  `:`  →
//!   additive  →  multiplicative  →  unary  →  `^`  →  postfix `'`

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    Str(String),
    Ident(String),

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    DotStar,
    DotSlash,
    DotCaret,

    Eq, // ==
    Ne, // ~=
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Amp,
    Bar,
    Not, // ~

    Assign,
    Transpose,
    Colon,

    Comma,
    Semi,
    Newline,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Unknown(char),
    Eof,
}

/// Words that take command syntax: `clear a b` means `clear('a', 'b')`.
const COMMANDS: &[&str] = &["clear", "clearvars", "who", "format", "close"];

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
    /// Open `(` and `[`; whitespace separates elements only directly inside `[`.
    nest: Vec<char>,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer { src: src.chars().collect(), pos: 0, nest: Vec::new(), tokens: Vec::new() }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.src.get(self.pos + off).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn in_matrix(&self) -> bool {
        self.nest.last() == Some(&'[')
    }

    fn at_line_start(&self) -> bool {
        matches!(self.tokens.last(), None | Some(Token::Newline | Token::Semi | Token::Comma))
    }

    fn prev_is_value(&self) -> bool {
        matches!(
            self.tokens.last(),
            Some(
                Token::Num(_)
                    | Token::Str(_)
                    | Token::Ident(_)
                    | Token::RParen
                    | Token::RBracket
                    | Token::Transpose
            )
        )
    }

    /// Skip blanks and `...` continuations.  Returns whether anything was
    /// skipped.
    fn skip_blank(&mut self) -> bool {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(' ' | '\t') => self.pos += 1,
                Some('.') if self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') => {
                    while !matches!(self.advance(), None | Some('\n')) {}
                }
                _ => break,
            }
        }
        self.pos != start
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.pos += 1;
        }
    }

    /// After `%{` on a line of its own, skip through the matching `%}` line.
    fn skip_block_comment(&mut self) {
        let mut depth = 1;
        while depth > 0 && self.peek().is_some() {
            self.skip_line();
            self.advance();
            let line_start = self.pos;
            while matches!(self.peek(), Some(' ' | '\t')) {
                self.pos += 1;
            }
            let rest: String = self.src[self.pos..]
                .iter()
                .take_while(|&&c| c != '\n')
                .collect();
            match rest.trim_end() {
                "%{" => depth += 1,
                "%}" => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                self.skip_line();
            } else if rest.is_empty() && self.peek().is_none() {
                self.pos = line_start;
                break;
            }
        }
    }

    /// Whether the next character begins a new matrix element after blanks.
    fn starts_element(&self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => true,
            Some('\'' | '"' | '(' | '[' | '~') => true,
            Some('.') => self.peek_at(1).is_some_and(|c| c.is_ascii_digit()),
            Some('+' | '-') => {
                !matches!(self.peek_at(1), None | Some(' ' | '\t' | '\n' | '='))
            }
            _ => false,
        }
    }

    fn read_number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        } else if self.peek() == Some('.')
            && !matches!(self.peek_at(1), Some('*' | '/' | '^' | '\'' | '.'))
        {
            self.pos += 1;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }
        let text: String = self.src[start..self.pos].iter().collect();
        text.parse()
            .map(Token::Num)
            .map_err(|_| format!("invalid number '{text}'"))
    }

    /// A quoted literal; the quote character doubled stands for itself.
    fn read_string(&mut self, quote: char) -> Result<Token, String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return Err("unterminated string literal".into()),
                Some(c) if c == quote => {
                    if self.eat(quote) {
                        s.push(quote);
                    } else {
                        return Ok(Token::Str(s));
                    }
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Token::Ident(self.src[start..self.pos].iter().collect())
    }

    fn push(&mut self, t: Token) {
        self.tokens.push(t);
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        loop {
            let blank = self.skip_blank();
            let Some(c) = self.peek() else { break };

            if self.in_matrix() && blank && self.prev_is_value() && self.starts_element() {
                self.push(Token::Comma);
            }

            match c {
                '%' => {
                    let rest: String =
                        self.src[self.pos..].iter().take_while(|&&c| c != '\n').collect();
                    if self.at_line_start() && rest.trim_end() == "%{" {
                        self.skip_block_comment();
                    } else {
                        self.skip_line();
                    }
                }
                '\n' | '\r' => {
                    self.pos += 1;
                    if self.in_matrix() {
                        if !matches!(self.tokens.last(), Some(Token::Semi | Token::LBracket)) {
                            self.push(Token::Semi);
                        }
                    } else if c == '\n' {
                        self.push(Token::Newline);
                    }
                }
                '0'..='9' => {
                    let t = self.read_number()?;
                    self.push(t);
                }
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    let t = self.read_number()?;
                    self.push(t);
                }
                c if c.is_ascii_alphabetic() => {
                    let t = self.read_ident();
                    self.push(t);
                }
                '\'' => {
                    self.pos += 1;
                    if self.prev_is_value() && !blank {
                        self.push(Token::Transpose);
                    } else {
                        let t = self.read_string('\'')?;
                        self.push(t);
                    }
                }
                '"' => {
                    self.pos += 1;
                    let t = self.read_string('"')?;
                    self.push(t);
                }
                _ => {
                    self.pos += 1;
                    let t = self.operator(c);
                    self.push(t);
                }
            }
        }
        self.tokens.push(Token::Eof);
        Ok(self.tokens)
    }

    fn operator(&mut self, c: char) -> Token {
        match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '.' if self.eat('*') => Token::DotStar,
            '.' if self.eat('/') => Token::DotSlash,
            '.' if self.eat('^') => Token::DotCaret,
            '.' if self.eat('\'') => Token::Transpose,
            '=' if self.eat('=') => Token::Eq,
            '=' => Token::Assign,
            '~' if self.eat('=') => Token::Ne,
            '~' => Token::Not,
            '<' if self.eat('=') => Token::Le,
            '<' => Token::Lt,
            '>' if self.eat('=') => Token::Ge,
            '>' => Token::Gt,
            '&' if self.eat('&') => Token::AndAnd,
            '&' => Token::Amp,
            '|' if self.eat('|') => Token::OrOr,
            '|' => Token::Bar,
            ':' => Token::Colon,
            ',' => Token::Comma,
            ';' => Token::Semi,
            '(' => {
                self.nest.push('(');
                Token::LParen
            }
            ')' => {
                self.nest.pop();
                Token::RParen
            }
            '[' => {
                self.nest.push('[');
                Token::LBracket
            }
            ']' => {
                self.nest.pop();
                Token::RBracket
            }
            other => Token::Unknown(other),
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    MatMul,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    Var(String),
    /// `name(args)`: a function call or an index, decided at evaluation time.
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `start:stop` or `start:step:stop`.
    Range(Box<Expr>, Option<Box<Expr>>, Box<Expr>),
    /// Rows of elements.
    Matrix(Vec<Vec<Expr>>),
    Transpose(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(String, Expr),
    Command(String, Vec<String>),
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Vec<Stmt>,
    },
    While(Expr, Vec<Stmt>),
    For(String, Expr, Vec<Stmt>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, off: usize) -> &Token {
        self.tokens.get(self.pos + off).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self) -> Option<&str> {
        match self.peek() {
            Token::Ident(w) => Some(w.as_str()),
            _ => None,
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Comma | Token::Semi | Token::Newline) {
            self.pos += 1;
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    /// Statements up to (not including) one of `terminators`, or end of input
    /// when `terminators` is empty.
    fn parse_block(&mut self, terminators: &[&str]) -> Result<Vec<Stmt>, String> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            if self.peek() == &Token::Eof {
                if terminators.is_empty() {
                    return Ok(stmts);
                }
                return Err("missing 'end'".into());
            }
            if let Some(word) = self.peek_keyword() {
                if terminators.contains(&word) {
                    return Ok(stmts);
                }
                if matches!(word, "end" | "else" | "elseif") {
                    return Err(format!("unexpected '{word}'"));
                }
            }
            stmts.push(self.parse_stmt()?);
            match self.peek() {
                Token::Comma | Token::Semi | Token::Newline | Token::Eof => {}
                Token::Ident(w) if terminators.contains(&w.as_str()) => {}
                other => return Err(format!("unexpected {other:?} after statement")),
            }
        }
    }

    fn expect_end(&mut self) -> Result<(), String> {
        match self.advance() {
            Token::Ident(w) if w == "end" => Ok(()),
            other => Err(format!("expected 'end', found {other:?}")),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, String> {
        let Token::Ident(word) = self.peek().clone() else {
            return Ok(Stmt::Expr(self.parse_expr()?));
        };

        match word.as_str() {
            "if" => {
                self.pos += 1;
                let mut arms = Vec::new();
                let cond = self.parse_expr()?;
                let body = self.parse_block(&["elseif", "else", "end"])?;
                arms.push((cond, body));
                let mut otherwise = Vec::new();
                loop {
                    match self.peek_keyword() {
                        Some("elseif") => {
                            self.pos += 1;
                            let cond = self.parse_expr()?;
                            let body = self.parse_block(&["elseif", "else", "end"])?;
                            arms.push((cond, body));
                        }
                        Some("else") => {
                            self.pos += 1;
                            otherwise = self.parse_block(&["end"])?;
                        }
                        _ => break,
                    }
                }
                self.expect_end()?;
                Ok(Stmt::If { arms, otherwise })
            }
            "while" => {
                self.pos += 1;
                let cond = self.parse_expr()?;
                let body = self.parse_block(&["end"])?;
                self.expect_end()?;
                Ok(Stmt::While(cond, body))
            }
            "for" => {
                self.pos += 1;
                let Token::Ident(var) = self.advance() else {
                    return Err("expected loop variable after 'for'".into());
                };
                if !self.eat(&Token::Assign) {
                    return Err("expected '=' in 'for'".into());
                }
                let range = self.parse_expr()?;
                let body = self.parse_block(&["end"])?;
                self.expect_end()?;
                Ok(Stmt::For(var, range, body))
            }
            w if COMMANDS.contains(&w)
                && !matches!(self.peek_at(1), Token::Assign | Token::LParen) =>
            {
                self.pos += 1;
                let mut args = Vec::new();
                loop {
                    match self.peek().clone() {
                        Token::Ident(a) | Token::Str(a) => {
                            self.pos += 1;
                            args.push(a);
                        }
                        Token::Comma | Token::Semi | Token::Newline | Token::Eof => break,
                        other => return Err(format!("unexpected {other:?} in '{word}'")),
                    }
                }
                Ok(Stmt::Command(word, args))
            }
            _ if self.peek_at(1) == &Token::Assign => {
                self.pos += 2;
                Ok(Stmt::Assign(word, self.parse_expr()?))
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_oror()
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, String>,
        ops: &[(Token, BinOp)],
    ) -> Result<Expr, String> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.peek() == tok {
                    self.pos += 1;
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_oror(&mut self) -> Result<Expr, String> {
        self.binary_level(Self::parse_andand, &[(Token::OrOr, BinOp::OrOr)])
    }

    fn parse_andand(&mut self) -> Result<Expr, String> {
        self.binary_level(Self::parse_or, &[(Token::AndAnd, BinOp::AndAnd)])
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.binary_level(Self::parse_and, &[(Token::Bar, BinOp::Or)])
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.binary_level(Self::parse_relational, &[(Token::Amp, BinOp::And)])
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        self.binary_level(
            Self::parse_range,
            &[
                (Token::Eq, BinOp::Eq),
                (Token::Ne, BinOp::Ne),
                (Token::Lt, BinOp::Lt),
                (Token::Le, BinOp::Le),
                (Token::Gt, BinOp::Gt),
                (Token::Ge, BinOp::Ge),
            ],
        )
    }

    fn parse_range(&mut self) -> Result<Expr, String> {
        let start = self.parse_additive()?;
        if !self.eat(&Token::Colon) {
            return Ok(start);
        }
        let second = self.parse_additive()?;
        if self.eat(&Token::Colon) {
            let stop = self.parse_additive()?;
            Ok(Expr::Range(Box::new(start), Some(Box::new(second)), Box::new(stop)))
        } else {
            Ok(Expr::Range(Box::new(start), None, Box::new(second)))
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.binary_level(
            Self::parse_multiplicative,
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(
            Self::parse_unary,
            &[
                (Token::Star, BinOp::MatMul),
                (Token::DotStar, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::DotSlash, BinOp::Div),
            ],
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Token::Minus => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Plus => {
                self.pos += 1;
                self.parse_unary()
            }
            Token::Not => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    /// `^` binds tighter than unary minus on its left (`-2^2` is `-4`) but
    /// accepts a signed exponent (`2^-1`).
    fn parse_power(&mut self) -> Result<Expr, String> {
        let mut base = self.parse_postfix()?;
        while matches!(self.peek(), Token::Caret | Token::DotCaret) {
            self.pos += 1;
            let exponent = match self.peek() {
                Token::Minus => {
                    self.pos += 1;
                    Expr::Unary(UnaryOp::Neg, Box::new(self.parse_postfix()?))
                }
                _ => self.parse_postfix()?,
            };
            base = Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut e = self.parse_primary()?;
        while self.eat(&Token::Transpose) {
            e = Expr::Transpose(Box::new(e));
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Num(x) => Ok(Expr::Num(x)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Var(name));
                }
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        if !self.eat(&Token::Comma) {
                            return Err(format!("expected ')' after arguments to {name}"));
                        }
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')'".into());
                }
                Ok(inner)
            }
            Token::LBracket => self.parse_matrix(),
            Token::Eof => Err("unexpected end of input".into()),
            other => Err(format!("unexpected {other:?}")),
        }
    }

    fn parse_matrix(&mut self) -> Result<Expr, String> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.peek() {
                Token::RBracket => {
                    self.pos += 1;
                    break;
                }
                Token::Comma => self.pos += 1,
                Token::Semi | Token::Newline => {
                    self.pos += 1;
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                Token::Eof => return Err("unterminated matrix literal".into()),
                _ => row.push(self.parse_expr()?),
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        Ok(Expr::Matrix(rows))
    }
}

/// Parse a program into statements.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, String> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_block(&[])
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<Token> {
        Lexer::new(s).tokenize().unwrap()
    }

    fn one(s: &str) -> Stmt {
        let mut prog = parse_program(s).unwrap();
        assert_eq!(prog.len(), 1, "{prog:?}");
        prog.remove(0)
    }

    #[test]
    fn lex_quote_is_string_or_transpose() {
        assert_eq!(lex("'it''s'"), vec![Token::Str("it's".into()), Token::Eof]);
        assert_eq!(
            lex("a'"),
            vec![Token::Ident("a".into()), Token::Transpose, Token::Eof]
        );
    }

    #[test]
    fn lex_matrix_whitespace_separates() {
        assert_eq!(
            lex("[1 -2]"),
            vec![
                Token::LBracket,
                Token::Num(1.0),
                Token::Comma,
                Token::Minus,
                Token::Num(2.0),
                Token::RBracket,
                Token::Eof
            ]
        );
        assert!(!lex("[1 - 2]").contains(&Token::Comma));
        assert!(!lex("f(1 2)").contains(&Token::Comma));
    }

    #[test]
    fn lex_comments_and_continuation() {
        assert_eq!(lex("1 % one"), vec![Token::Num(1.0), Token::Eof]);
        assert_eq!(
            lex("(1+...\n2)"),
            vec![
                Token::LParen,
                Token::Num(1.0),
                Token::Plus,
                Token::Num(2.0),
                Token::RParen,
                Token::Eof
            ]
        );
    }

    #[test]
    fn lex_block_comment() {
        let toks = lex("x = 1\n%{\ny = 2\n%}\nz = 3");
        assert!(!toks.contains(&Token::Ident("y".into())));
        assert!(toks.contains(&Token::Ident("z".into())));
    }

    #[test]
    fn lex_number_forms() {
        assert_eq!(lex(".5")[0], Token::Num(0.5));
        assert_eq!(lex("1e3")[0], Token::Num(1000.0));
        assert_eq!(lex("2.")[0], Token::Num(2.0));
    }

    #[test]
    fn parse_precedence() {
        let Stmt::Expr(e) = one("-2^2") else { panic!() };
        assert_eq!(
            e,
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(BinOp::Pow, Box::new(Expr::Num(2.0)), Box::new(Expr::Num(2.0))))
            )
        );
    }

    #[test]
    fn parse_assignment_and_command() {
        assert!(matches!(one("x = 1;"), Stmt::Assign(ref n, _) if n == "x"));
        assert_eq!(one("clear a b"), Stmt::Command("clear".into(), vec!["a".into(), "b".into()]));
        assert_eq!(one("who"), Stmt::Command("who".into(), vec![]));
        assert!(matches!(one("clear('a')"), Stmt::Expr(Expr::Call(..))));
    }

    #[test]
    fn parse_if_elseif_else() {
        let s = one("if x == 1\n y = 1\nelseif x == 2\n y = 2\nelse\n y = 3\nend");
        match s {
            Stmt::If { arms, otherwise } => {
                assert_eq!(arms.len(), 2);
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parse_single_line_if() {
        assert!(matches!(one("if true, x = 1, end"), Stmt::If { .. }));
    }

    #[test]
    fn parse_for_range() {
        match one("for i = 1:2:9\n s = s + i;\nend") {
            Stmt::For(v, Expr::Range(_, Some(_), _), body) => {
                assert_eq!(v, "i");
                assert_eq!(body.len(), 1);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn parse_matrix_rows() {
        let Stmt::Expr(Expr::Matrix(rows)) = one("[1 2; 3 4]") else { panic!() };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 2);
        let Stmt::Expr(Expr::Matrix(rows)) = one("[1 2\n3 4]") else { panic!() };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn parse_errors() {
        assert!(parse_program("if x\n y = 1").is_err());
        assert!(parse_program("end").is_err());
        assert!(parse_program("x = 'abc").is_err());
        assert!(parse_program("x = (1").is_err());
    }
}
