//! Tokenizer for command-line input.
//!
//! The input is treated as a flat byte buffer. Brackets and `=` are always
//! tokens of their own, whitespace separates tokens, and every other maximal
//! run of bytes is an [`TokenKind::Identifier`]. Interpretation of
//! identifiers (flag, value, number) is left to later stages.

use std::fmt;

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// A run of non-whitespace, non-bracket, non-`=` bytes.
    Identifier,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `=`
    Equals,
    /// End of input; its position is the buffer length.
    End,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Equals => "'='",
            TokenKind::End => "end of input",
        };
        f.write_str(text)
    }
}

/// A token with its source image and zero-based byte position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub image: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, image: &str, position: usize) -> Self {
        Self {
            kind,
            image: image.to_string(),
            position,
        }
    }

    fn end(position: usize) -> Self {
        Self::new(TokenKind::End, "", position)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Saved cursor position, see [`TokenStream::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(usize);

/// Eagerly produced token sequence with a movable cursor.
///
/// The sequence always ends with exactly one [`TokenKind::End`] token and the
/// cursor never moves past it, so [`peek`](Self::peek) is always valid.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    cursor: usize,
    input_len: usize,
}

impl TokenStream {
    fn new(tokens: Vec<Token>, input_len: usize) -> Self {
        Self {
            tokens,
            cursor: 0,
            input_len,
        }
    }

    /// All tokens, including the trailing End token.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Length in bytes of the (virtual) input buffer.
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Current token.
    pub fn peek(&self) -> &Token {
        &self.tokens[self.cursor]
    }

    pub fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    /// The token after the current one (End if there is none).
    pub fn lookahead(&self) -> &Token {
        let idx = (self.cursor + 1).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    /// Returns the current token and moves past it. At End the cursor stays put.
    pub fn advance(&mut self) -> Token {
        let token = self.tokens[self.cursor].clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    pub fn is_at_end(&self) -> bool {
        self.peek().is(TokenKind::End)
    }

    pub fn mark(&self) -> Mark {
        Mark(self.cursor)
    }

    pub fn rewind(&mut self, mark: Mark) {
        self.cursor = mark.0.min(self.tokens.len() - 1);
    }

    /// Advances until the current token has one of `kinds` (or is End) and
    /// returns the tokens skipped over.
    pub fn scan_until(&mut self, kinds: &[TokenKind]) -> Vec<Token> {
        let mut skipped = Vec::new();
        while !self.is_at_end() && !kinds.contains(&self.peek_kind()) {
            skipped.push(self.advance());
        }
        skipped
    }
}

/// Splits command lines into [`TokenStream`]s.
pub struct Tokenizer;

impl Tokenizer {
    /// Tokenizes a single command-line string.
    ///
    /// # Examples
    ///
    /// ```
    /// use flagtree_core::{TokenKind, Tokenizer};
    ///
    /// let stream = Tokenizer::tokenize("--name=John [ -x ]");
    /// let kinds: Vec<_> = stream.tokens().iter().map(|t| t.kind).collect();
    /// assert_eq!(kinds, vec![
    ///     TokenKind::Identifier, TokenKind::Equals, TokenKind::Identifier,
    ///     TokenKind::LBracket, TokenKind::Identifier, TokenKind::RBracket,
    ///     TokenKind::End,
    /// ]);
    /// assert_eq!(stream.tokens()[2].position, 7);
    /// ```
    pub fn tokenize(input: &str) -> TokenStream {
        let mut tokens = Vec::new();
        scan_segment(input, 0, true, &mut tokens);
        tokens.push(Token::end(input.len()));
        TokenStream::new(tokens, input.len())
    }

    /// Tokenizes an argv vector, skipping nothing.
    ///
    /// Elements are positioned as if joined by single spaces, but whitespace
    /// inside an element does not split it: `"hello world"` stays one
    /// identifier. Brackets and `=` still split.
    pub fn tokenize_argv<S: AsRef<str>>(args: &[S]) -> TokenStream {
        let mut tokens = Vec::new();
        let mut offset = 0;

        for (idx, arg) in args.iter().enumerate() {
            let arg = arg.as_ref();
            if idx > 0 {
                offset += 1;
            }
            if arg.is_empty() {
                tokens.push(Token::new(TokenKind::Identifier, "", offset));
            } else {
                scan_segment(arg, offset, false, &mut tokens);
            }
            offset += arg.len();
        }

        tokens.push(Token::end(offset));
        TokenStream::new(tokens, offset)
    }
}

fn scan_segment(text: &str, offset: usize, split_whitespace: bool, tokens: &mut Vec<Token>) {
    let mut start: Option<usize> = None;

    for (idx, byte) in text.bytes().enumerate() {
        let kind = match byte {
            b'[' => Some(TokenKind::LBracket),
            b']' => Some(TokenKind::RBracket),
            b'=' => Some(TokenKind::Equals),
            b' ' | b'\t' if split_whitespace => None,
            _ => {
                start.get_or_insert(idx);
                continue;
            }
        };

        if let Some(begin) = start.take() {
            tokens.push(Token::new(TokenKind::Identifier, &text[begin..idx], offset + begin));
        }
        if let Some(kind) = kind {
            tokens.push(Token::new(kind, &text[idx..idx + 1], offset + idx));
        }
    }

    if let Some(begin) = start {
        tokens.push(Token::new(TokenKind::Identifier, &text[begin..], offset + begin));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(stream: &TokenStream) -> Vec<&str> {
        stream.tokens().iter().map(|t| t.image.as_str()).collect()
    }

    #[test]
    fn test_whitespace_and_delimiters() {
        let stream = Tokenizer::tokenize("  --a\t1 [--b=2]");
        assert_eq!(images(&stream), vec!["--a", "1", "[", "--b", "=", "2", "]", ""]);
        let positions: Vec<_> = stream.tokens().iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![2, 6, 8, 9, 12, 13, 14, 15]);
    }

    #[test]
    fn test_end_token_reports_buffer_length() {
        let stream = Tokenizer::tokenize("");
        assert_eq!(stream.tokens().len(), 1);
        assert_eq!(stream.peek().kind, TokenKind::End);
        assert_eq!(stream.peek().position, 0);

        let stream = Tokenizer::tokenize("-x  ");
        assert_eq!(stream.tokens().last().map(|t| t.position), Some(4));
    }

    #[test]
    fn test_argv_preserves_inner_whitespace() {
        let stream = Tokenizer::tokenize_argv(&["--greeting", "hello world", "--n=3"]);
        assert_eq!(
            images(&stream),
            vec!["--greeting", "hello world", "--n", "=", "3", ""]
        );
        assert_eq!(stream.tokens()[1].position, 11);
        assert_eq!(stream.tokens()[2].position, 23);
        assert_eq!(stream.input_len(), "--greeting hello world --n=3".len());
    }

    #[test]
    fn test_argv_empty_element_is_identifier() {
        let stream = Tokenizer::tokenize_argv(&["--name", ""]);
        assert_eq!(stream.tokens()[1].kind, TokenKind::Identifier);
        assert_eq!(stream.tokens()[1].image, "");
        assert_eq!(stream.tokens()[1].position, 7);
    }

    #[test]
    fn test_cursor_mark_rewind_and_scan() {
        let mut stream = Tokenizer::tokenize("a b ] c");
        let mark = stream.mark();
        assert_eq!(stream.advance().image, "a");
        assert_eq!(stream.lookahead().kind, TokenKind::RBracket);

        let skipped = stream.scan_until(&[TokenKind::RBracket]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(stream.peek_kind(), TokenKind::RBracket);

        stream.rewind(mark);
        assert_eq!(stream.peek().image, "a");

        stream.scan_until(&[]);
        assert!(stream.is_at_end());
        stream.advance();
        assert!(stream.is_at_end());
    }

    #[test]
    fn test_retokenizing_joined_images_is_stable() {
        let inputs = ["--a=1 [ -b 2 ]", "x[y]z", "  = = --k\t[[]] ", "héllo [wörld]"];
        for input in inputs {
            let first = Tokenizer::tokenize(input);
            let joined = first
                .tokens()
                .iter()
                .filter(|t| !t.is(TokenKind::End))
                .map(|t| t.image.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let second = Tokenizer::tokenize(&joined);

            let kinds = |s: &TokenStream| {
                s.tokens()
                    .iter()
                    .map(|t| (t.kind, t.image.clone()))
                    .collect::<Vec<_>>()
            };
            assert_eq!(kinds(&first), kinds(&second), "input: {input}");
        }
    }
}
