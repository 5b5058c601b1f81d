//! Lexer for Go source declarations.
//!
//! Produces a token stream with Go's automatic semicolon insertion applied,
//! plus an out-of-band list of line comments. Comments carry their line and
//! whether they own the line, so the parser can attach doc blocks
//! (consecutive comment-only lines ending directly above a declaration) and
//! trailing comments (sharing a line with code).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    Ident,
    Int,
    Float,
    /// Interpreted string literal; `text` holds the decoded content.
    Str,
    /// Raw (backquoted) string literal; `text` holds the verbatim content.
    RawStr,
    Rune,
    Punct,
    /// Explicit `;` or one inserted at a newline.
    Semi,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokKind,
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokKind::Punct && self.text == text
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokKind::Ident && self.text == text
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub line: u32,
    /// `true` when no token precedes the comment on its line.
    pub own_line: bool,
    /// Raw text including the leading `//`.
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

/// A lexical error with the line it occurred on.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub line: u32,
    pub message: String,
}

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else",
    "fallthrough", "for", "func", "go", "goto", "if", "import", "interface",
    "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

/// Multi-character operators, longest first so matching is greedy.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=",
    "<=", ">=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<",
    ">>", "&^",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

pub fn lex(src: &str) -> Result<Lexed, LexError> {
    Lexer {
        rest: src,
        line: 1,
        out: Lexed::default(),
    }
    .run()
}

struct Lexer<'a> {
    rest: &'a str,
    line: u32,
    out: Lexed,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Lexed, LexError> {
        while let Some(c) = self.rest.chars().next() {
            match c {
                '\n' => {
                    self.newline();
                    self.advance(1);
                }
                c if c.is_whitespace() => self.advance(c.len_utf8()),
                '/' if self.rest.starts_with("//") => self.line_comment(),
                '/' if self.rest.starts_with("/*") => self.block_comment()?,
                ';' => {
                    self.push(TokKind::Semi, ";");
                    self.advance(1);
                }
                '"' => self.interpreted_string()?,
                '`' => self.raw_string()?,
                '\'' => self.rune()?,
                c if unicode_ident::is_xid_start(c) || c == '_' => self.ident(),
                c if c.is_ascii_digit() => self.number(),
                '.' if self.rest[1..].starts_with(|d: char| d.is_ascii_digit()) => self.number(),
                c => self.operator(c)?,
            }
        }
        self.newline();
        Ok(self.out)
    }

    fn advance(&mut self, bytes: usize) {
        self.rest = &self.rest[bytes..];
    }

    fn push(&mut self, kind: TokKind, text: impl Into<String>) {
        self.out.tokens.push(Token {
            kind,
            text: text.into(),
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            message: message.into(),
        }
    }

    /// Applies Go's semicolon-insertion rule at a line break.
    fn newline(&mut self) {
        let insert = match self.out.tokens.last() {
            Some(tok) if tok.line == self.line => match tok.kind {
                TokKind::Ident => {
                    !is_keyword(&tok.text)
                        || matches!(
                            tok.text.as_str(),
                            "break" | "continue" | "fallthrough" | "return"
                        )
                }
                TokKind::Int | TokKind::Float | TokKind::Str | TokKind::RawStr
                | TokKind::Rune => true,
                TokKind::Punct => matches!(tok.text.as_str(), ")" | "]" | "}" | "++" | "--"),
                TokKind::Semi => false,
            },
            _ => false,
        };
        if insert {
            self.push(TokKind::Semi, "\n");
        }
        self.line += 1;
    }

    fn token_on_line(&self) -> bool {
        self.out
            .tokens
            .last()
            .is_some_and(|tok| tok.line == self.line && tok.kind != TokKind::Semi)
    }

    fn line_comment(&mut self) {
        let end = self.rest.find('\n').unwrap_or(self.rest.len());
        self.out.comments.push(Comment {
            line: self.line,
            own_line: !self.token_on_line(),
            text: self.rest[..end].trim_end().to_owned(),
        });
        self.advance(end);
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let Some(end) = self.rest.find("*/") else {
            return Err(self.error("unterminated block comment"));
        };
        let body = &self.rest[..end];
        if body.contains('\n') {
            // A multi-line comment acts like a newline for semicolon
            // insertion; we do this before bumping past the body.
            self.newline();
            self.line += body.matches('\n').count() as u32 - 1;
        }
        self.advance(end + 2);
        Ok(())
    }

    fn ident(&mut self) {
        let end = self
            .rest
            .find(|c: char| !(unicode_ident::is_xid_continue(c) || c == '_'))
            .unwrap_or(self.rest.len());
        let text = &self.rest[..end];
        self.push(TokKind::Ident, text);
        self.advance(end);
    }

    fn number(&mut self) {
        let mut end = 0;
        let mut float = false;
        let bytes = self.rest.as_bytes();
        // Covers decimal, hex, octal, binary, underscores, and simple
        // float forms; exact numeric grammar doesn't matter because
        // constant values are never evaluated.
        while end < bytes.len() {
            match bytes[end] {
                b'0'..=b'9' | b'_' | b'a'..=b'f' | b'A'..=b'F' | b'x' | b'X' | b'o' | b'O'
                | b'b' | b'B' => end += 1,
                b'.' if !float => {
                    float = true;
                    end += 1;
                }
                b'+' | b'-' if end > 0 && matches!(bytes[end - 1], b'e' | b'E') => end += 1,
                _ => break,
            }
        }
        let kind = if float { TokKind::Float } else { TokKind::Int };
        self.push(kind, &self.rest[..end]);
        self.advance(end);
    }

    fn interpreted_string(&mut self) -> Result<(), LexError> {
        let mut decoded = String::new();
        let mut chars = self.rest[1..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.push(TokKind::Str, decoded);
                    self.advance(1 + i + 1);
                    return Ok(());
                }
                '\n' => return Err(self.error("newline in string literal")),
                '\\' => {
                    let Some((_, esc)) = chars.next() else {
                        return Err(self.error("unterminated string literal"));
                    };
                    decoded.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        'a' => '\x07',
                        'b' => '\x08',
                        'f' => '\x0c',
                        'v' => '\x0b',
                        '0' => '\0',
                        _ => return Err(self.error(format!("unsupported escape \\{esc}"))),
                    });
                }
                c => decoded.push(c),
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn raw_string(&mut self) -> Result<(), LexError> {
        let Some(end) = self.rest[1..].find('`') else {
            return Err(self.error("unterminated raw string literal"));
        };
        let body = &self.rest[1..1 + end];
        self.push(TokKind::RawStr, body);
        self.line += body.matches('\n').count() as u32;
        self.advance(end + 2);
        Ok(())
    }

    fn rune(&mut self) -> Result<(), LexError> {
        let mut prev_backslash = false;
        for (i, c) in self.rest[1..].char_indices() {
            match c {
                '\'' if !prev_backslash => {
                    self.push(TokKind::Rune, &self.rest[1..1 + i]);
                    self.advance(1 + i + 1);
                    return Ok(());
                }
                '\\' => prev_backslash = !prev_backslash,
                '\n' => break,
                _ => prev_backslash = false,
            }
        }
        Err(self.error("unterminated rune literal"))
    }

    fn operator(&mut self, c: char) -> Result<(), LexError> {
        for op in OPERATORS {
            if self.rest.starts_with(op) {
                self.push(TokKind::Punct, *op);
                self.advance(op.len());
                return Ok(());
            }
        }
        if "+-*/%&|^<>=!()[]{},.:~".contains(c) {
            self.push(TokKind::Punct, c.to_string());
            self.advance(c.len_utf8());
            return Ok(());
        }
        Err(self.error(format!("unexpected character {c:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokKind, String)> {
        lex(src)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn semicolons_inserted_at_line_ends() {
        let toks = kinds("package foo\ntype Bar int\n");
        let semis = toks.iter().filter(|(k, _)| *k == TokKind::Semi).count();
        assert_eq!(semis, 2);
        // One after `foo`, none after the `type` keyword itself.
        assert_eq!(toks[2], (TokKind::Semi, "\n".to_owned()));
        assert_eq!(toks[3], (TokKind::Ident, "type".to_owned()));
        assert_eq!(toks[4], (TokKind::Ident, "Bar".to_owned()));
    }

    #[test]
    fn no_semicolon_after_open_brace() {
        let toks = kinds("type Pet struct {\n\tID int64\n}\n");
        // `{` at end of line must not produce a semicolon.
        let brace = toks.iter().position(|(k, t)| *k == TokKind::Punct && t == "{");
        assert_eq!(toks[brace.unwrap() + 1].1, "ID");
    }

    #[test]
    fn comments_track_line_ownership() {
        let lexed = lex("// doc line\nconst A = 1 // trailing\n").unwrap();
        assert_eq!(lexed.comments.len(), 2);
        assert!(lexed.comments[0].own_line);
        assert_eq!(lexed.comments[0].text, "// doc line");
        assert!(!lexed.comments[1].own_line);
        assert_eq!(lexed.comments[1].text, "// trailing");
    }

    #[test]
    fn string_literals_decode() {
        let toks = kinds(r#"x = "a\tb""#);
        assert!(toks.iter().any(|(k, t)| *k == TokKind::Str && t == "a\tb"));

        let toks = kinds("tag := `json:\"id\"`");
        assert!(
            toks.iter()
                .any(|(k, t)| *k == TokKind::RawStr && t == "json:\"id\"")
        );
    }

    #[test]
    fn multi_char_operators() {
        let toks = kinds("a := b\nc <- d");
        assert!(toks.iter().any(|(_, t)| t == ":="));
        assert!(toks.iter().any(|(_, t)| t == "<-"));
    }
}
