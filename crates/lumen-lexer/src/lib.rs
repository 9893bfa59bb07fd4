//! lumen-lexer — analyse lexicale pour Lumen
//!
//! Faits saillants :
//! - `Scanner` : jetons produits à la demande (pas de `Vec` intermédiaire), un
//!   seul passage sur le source, lexèmes empruntés (`&'a str`)
//! - `TokenKind` : vocabulaire complet de la famille de langages (ponctuation,
//!   littéraux, mots-clés, `Error`, `Eof`), même si le compilateur n'en
//!   consomme qu'une partie
//! - Erreurs lexicales **dans le flux** : un jeton `Error` dont le lexème porte
//!   le message (`Unexpected character.`, `Unterminated string.`)
//! - `TokenSource` : la seule chose dont le compilateur a besoin
//!
//! Exemple éclair :
//! ```
//! use lumen_lexer::{Scanner, TokenKind, TokenSource};
//!
//! let mut sc = Scanner::new("1 + 2");
//! assert_eq!(sc.next_token().kind, TokenKind::Number);
//! assert_eq!(sc.next_token().kind, TokenKind::Plus);
//! assert_eq!(sc.next_token().lexeme, "2");
//! assert_eq!(sc.next_token().kind, TokenKind::Eof);
//! ```

#![deny(missing_docs)]

use core::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/* ─────────────────────────── Tokens ─────────────────────────── */

/// Genre de jeton lexical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum TokenKind {
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `;`
    Semicolon,
    /// `/`
    Slash,
    /// `*`
    Star,
    /// `!`
    Bang,
    /// `!=`
    BangEqual,
    /// `=`
    Equal,
    /// `==`
    EqualEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// Identifiant.
    Identifier,
    /// Chaîne entre guillemets (lexème avec les guillemets).
    String,
    /// Nombre `digits ('.' digits)?`.
    Number,
    /// `and`
    And,
    /// `class`
    Class,
    /// `else`
    Else,
    /// `false`
    False,
    /// `for`
    For,
    /// `fun`
    Fun,
    /// `if`
    If,
    /// `nil`
    Nil,
    /// `or`
    Or,
    /// `print`
    Print,
    /// `return`
    Return,
    /// `super`
    Super,
    /// `this`
    This,
    /// `true`
    True,
    /// `var`
    Var,
    /// `while`
    While,
    /// Erreur lexicale ; le lexème contient le message.
    Error,
    /// Fin de l'entrée (répété indéfiniment).
    Eof,
}

impl TokenKind {
    /// Vrai pour les mots-clés réservés.
    pub const fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Class
                | Self::Else
                | Self::False
                | Self::For
                | Self::Fun
                | Self::If
                | Self::Nil
                | Self::Or
                | Self::Print
                | Self::Return
                | Self::Super
                | Self::This
                | Self::True
                | Self::Var
                | Self::While
        )
    }
}

/// Jeton : genre, lexème emprunté au source, ligne (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Token<'a> {
    /// Genre.
    pub kind: TokenKind,
    /// Texte du jeton, ou message statique pour `TokenKind::Error`.
    pub lexeme: &'a str,
    /// Ligne d'origine.
    pub line: u32,
}

impl<'a> Token<'a> {
    /// Jeton d'erreur portant `message`.
    pub const fn error(message: &'static str, line: u32) -> Self {
        Self { kind: TokenKind::Error, lexeme: message, line }
    }

    /// Jeton de fin d'entrée.
    pub const fn eof(line: u32) -> Self {
        Self { kind: TokenKind::Eof, lexeme: "", line }
    }

    /// Vrai pour `Eof`.
    pub fn is_eof(&self) -> bool { self.kind == TokenKind::Eof }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:4} {:?} '{}'", self.line, self.kind, self.lexeme)
    }
}

/* ─────────────────────────── Messages ─────────────────────────── */

/// Message des caractères hors vocabulaire.
pub const UNEXPECTED_CHARACTER: &str = "Unexpected character.";
/// Message d'une chaîne sans guillemet fermant.
pub const UNTERMINATED_STRING: &str = "Unterminated string.";

/* ─────────────────────────── TokenSource ─────────────────────────── */

/// Fournisseur de jetons consommé par le compilateur.
///
/// Une fois l'entrée épuisée, chaque appel renvoie un jeton `Eof`.
pub trait TokenSource<'a> {
    /// Prochain jeton.
    fn next_token(&mut self) -> Token<'a>;
}

impl<'a, T: TokenSource<'a> + ?Sized> TokenSource<'a> for &mut T {
    fn next_token(&mut self) -> Token<'a> { (**self).next_token() }
}

/// Relecture d'une suite de jetons déjà produite (tests, outils).
///
/// Après le dernier jeton, répète `Eof` sur la ligne du dernier jeton vu.
#[derive(Debug, Clone)]
pub struct TokenBuffer<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
    last_line: u32,
}

impl<'a> TokenBuffer<'a> {
    /// Construit le tampon.
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self { tokens: tokens.into_iter(), last_line: 1 }
    }
}

impl<'a> TokenSource<'a> for TokenBuffer<'a> {
    fn next_token(&mut self) -> Token<'a> {
        match self.tokens.next() {
            Some(tok) => {
                self.last_line = tok.line;
                tok
            }
            None => Token::eof(self.last_line),
        }
    }
}

/* ─────────────────────────── Scanner ─────────────────────────── */

/// Analyseur lexical paresseux.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    /// Début du jeton en cours.
    start: usize,
    /// Position courante en bytes.
    off: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    /// Crée un scanner positionné au début de `src`, ligne 1.
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), start: 0, off: 0, line: 1 }
    }

    /// Ligne courante.
    pub fn line(&self) -> u32 { self.line }

    /// Produit tous les jetons jusqu'à `Eof` inclus.
    pub fn tokenize(mut self) -> Vec<Token<'a>> {
        let mut out = Vec::new();
        loop {
            let tok = self.scan_token();
            let end = tok.is_eof();
            out.push(tok);
            if end {
                return out;
            }
        }
    }

    /// Prochain jeton.
    pub fn scan_token(&mut self) -> Token<'a> {
        self.skip_ws_and_comments();
        self.start = self.off;

        let Some(c) = self.bump() else {
            return Token::eof(self.line);
        };

        if is_ident_start(c) {
            return self.lex_identifier();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }

        use TokenKind::*;
        match c {
            b'(' => self.make(LeftParen),
            b')' => self.make(RightParen),
            b'{' => self.make(LeftBrace),
            b'}' => self.make(RightBrace),
            b';' => self.make(Semicolon),
            b',' => self.make(Comma),
            b'.' => self.make(Dot),
            b'-' => self.make(Minus),
            b'+' => self.make(Plus),
            b'/' => self.make(Slash),
            b'*' => self.make(Star),
            b'!' => {
                let k = if self.eat(b'=') { BangEqual } else { Bang };
                self.make(k)
            }
            b'=' => {
                let k = if self.eat(b'=') { EqualEqual } else { Equal };
                self.make(k)
            }
            b'<' => {
                let k = if self.eat(b'=') { LessEqual } else { Less };
                self.make(k)
            }
            b'>' => {
                let k = if self.eat(b'=') { GreaterEqual } else { Greater };
                self.make(k)
            }
            b'"' => self.lex_string(),
            _ => {
                // avance jusqu'à la frontière UTF-8 suivante
                self.consume_while(|b| b & 0xC0 == 0x80);
                Token::error(UNEXPECTED_CHARACTER, self.line)
            }
        }
    }

    /* ────────── Primitives internes ────────── */

    #[inline] fn peek(&self) -> Option<u8> { self.bytes.get(self.off).copied() }
    #[inline] fn peek2(&self) -> Option<u8> { self.bytes.get(self.off + 1).copied() }
    #[inline] fn bump(&mut self) -> Option<u8> { let b = self.peek(); if b.is_some() { self.off += 1; } b }
    #[inline] fn eat(&mut self, want: u8) -> bool { if self.peek() == Some(want) { self.off += 1; true } else { false } }

    fn consume_while(&mut self, mut p: impl FnMut(u8) -> bool) {
        while let Some(b) = self.peek() {
            if !p(b) {
                break;
            }
            self.off += 1;
        }
    }

    fn make(&self, kind: TokenKind) -> Token<'a> {
        Token { kind, lexeme: &self.src[self.start..self.off], line: self.line }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\r' | b'\t') => self.off += 1,
                Some(b'\n') => {
                    self.line += 1;
                    self.off += 1;
                }
                Some(b'/') if self.peek2() == Some(b'/') => self.consume_while(|b| b != b'\n'),
                _ => return,
            }
        }
    }

    fn lex_string(&mut self) -> Token<'a> {
        loop {
            match self.bump() {
                Some(b'"') => return self.make(TokenKind::String),
                Some(b'\n') => self.line += 1,
                Some(_) => {}
                None => return Token::error(UNTERMINATED_STRING, self.line),
            }
        }
    }

    fn lex_number(&mut self) -> Token<'a> {
        self.consume_while(|b| b.is_ascii_digit());
        if self.peek() == Some(b'.') && self.peek2().is_some_and(|b| b.is_ascii_digit()) {
            self.off += 1;
            self.consume_while(|b| b.is_ascii_digit());
        }
        self.make(TokenKind::Number)
    }

    fn lex_identifier(&mut self) -> Token<'a> {
        self.consume_while(is_ident_continue);
        let kind = keyword_of(&self.src[self.start..self.off]).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }
}

impl<'a> TokenSource<'a> for Scanner<'a> {
    fn next_token(&mut self) -> Token<'a> {
        let tok = self.scan_token();
        #[cfg(feature = "trace")]
        log::trace!("token {tok}");
        tok
    }
}

/* ─────────────────────────── Helpers ─────────────────────────── */

#[inline]
const fn is_ident_start(b: u8) -> bool { b == b'_' || b.is_ascii_alphabetic() }

#[inline]
const fn is_ident_continue(b: u8) -> bool { b == b'_' || b.is_ascii_alphanumeric() }

fn keyword_of(s: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match s {
        "and" => And,
        "class" => Class,
        "else" => Else,
        "false" => False,
        "for" => For,
        "fun" => Fun,
        "if" => If,
        "nil" => Nil,
        "or" => Or,
        "print" => Print,
        "return" => Return,
        "super" => Super,
        "this" => This,
        "true" => True,
        "var" => Var,
        "while" => While,
        _ => return None,
    })
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::new(src).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn idents_keywords() {
        use TokenKind::*;
        let v = kinds("and class else false for fun if nil or print return super this true var while ident _x x1 classy");
        assert_eq!(
            v,
            vec![
                And, Class, Else, False, For, Fun, If, Nil, Or, Print, Return, Super, This, True, Var, While,
                Identifier, Identifier, Identifier, Identifier, Eof
            ]
        );
        assert!(v[..16].iter().all(|k| k.is_keyword()));
        assert!(!Identifier.is_keyword());
    }

    #[test]
    fn ops_punct() {
        use TokenKind::*;
        let v = kinds("( ) { } , . - + ; / * ! != = == > >= < <=");
        assert_eq!(
            v,
            vec![
                LeftParen, RightParen, LeftBrace, RightBrace, Comma, Dot, Minus, Plus, Semicolon, Slash, Star,
                Bang, BangEqual, Equal, EqualEqual, Greater, GreaterEqual, Less, LessEqual, Eof
            ]
        );
    }

    #[test]
    fn numbers_keep_their_lexeme() {
        let toks = Scanner::new("12 3.25 4. .5").tokenize();
        let lexemes: Vec<_> = toks.iter().map(|t| (t.kind, t.lexeme)).collect();
        assert_eq!(
            lexemes,
            vec![
                (TokenKind::Number, "12"),
                (TokenKind::Number, "3.25"),
                (TokenKind::Number, "4"),
                (TokenKind::Dot, "."),
                (TokenKind::Dot, "."),
                (TokenKind::Number, "5"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn comments_ws_and_lines() {
        let toks = Scanner::new("1 // un commentaire\n\t2\r\n\n3").tokenize();
        let lines: Vec<_> = toks.iter().map(|t| (t.lexeme, t.line)).collect();
        assert_eq!(lines, vec![("1", 1), ("2", 2), ("3", 4), ("", 4)]);
    }

    #[test]
    fn strings_span_lines() {
        let toks = Scanner::new("\"a\nb\" x").tokenize();
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].lexeme, "\"a\nb\"");
        assert_eq!(toks[1].line, 2);
    }

    #[test]
    fn lexical_errors_are_tokens() {
        let toks = Scanner::new("1 @ é \"open").tokenize();
        assert_eq!(toks[1], Token::error(UNEXPECTED_CHARACTER, 1));
        assert_eq!(toks[2], Token::error(UNEXPECTED_CHARACTER, 1));
        assert_eq!(toks[3], Token::error(UNTERMINATED_STRING, 1));
        assert!(toks[4].is_eof());
    }

    #[test]
    fn eof_is_idempotent() {
        let mut sc = Scanner::new("  ");
        for _ in 0..3 {
            assert_eq!(sc.next_token(), Token::eof(1));
        }
    }

    #[test]
    fn buffer_replays_then_repeats_eof() {
        let mut buf = TokenBuffer::new(vec![Token { kind: TokenKind::Number, lexeme: "7", line: 3 }]);
        assert_eq!(buf.next_token().lexeme, "7");
        assert_eq!(buf.next_token(), Token::eof(3));
        assert_eq!(buf.next_token(), Token::eof(3));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn tokens_serialize() {
        let json = serde_json::to_string(&Token::eof(2)).unwrap();
        assert_eq!(json, r#"{"kind":"Eof","lexeme":"","line":2}"#);
    }

    proptest! {
        #[test]
        fn never_panics_and_ends_with_eof(src in "\\PC{0,64}") {
            let toks = Scanner::new(&src).tokenize();
            prop_assert!(toks.last().is_some_and(Token::is_eof));
            prop_assert!(toks.windows(2).all(|w| w[0].line <= w[1].line));
        }
    }
}
