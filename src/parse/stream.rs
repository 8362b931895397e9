use crate::{
    lex::{Token, TokenKind},
    source::Located,
};

/// Cursor sobre un flujo de tokens ya materializado.
///
/// El flujo debe terminar en [`Token::Eof`]; el cursor nunca avanza más
/// allá de ese token, de modo que siempre existe un token actual.
#[derive(Clone)]
pub struct TokenStream<'a> {
    tokens: &'a [Located<Token>],
    position: usize,
}

impl<'a> TokenStream<'a> {
    /// # Panics
    /// Si el flujo no termina en [`Token::Eof`].
    pub fn new(tokens: &'a [Located<Token>]) -> Self {
        assert!(
            matches!(tokens.last().map(Located::as_ref), Some(Token::Eof)),
            "token stream must end with Eof"
        );

        TokenStream {
            tokens,
            position: 0,
        }
    }

    /// Token actual.
    pub fn current(&self) -> &'a Located<Token> {
        &self.tokens[self.position]
    }

    /// Token siguiente al actual.
    pub fn peek(&self) -> &'a Located<Token> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.position + 1).min(last)]
    }

    /// Último token consumido, si lo hay.
    pub fn previous(&self) -> Option<&'a Located<Token>> {
        self.position.checked_sub(1).map(|index| &self.tokens[index])
    }

    /// Consume el token actual y lo retorna.
    pub fn advance(&mut self) -> &'a Located<Token> {
        let token = self.current();
        if self.has_next() {
            self.position += 1;
        }

        token
    }

    /// Determina si quedan tokens antes del fin del flujo.
    pub fn has_next(&self) -> bool {
        self.current().as_ref().kind() != TokenKind::Eof
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex;

    #[test]
    fn cursor_stops_at_eof() {
        let tokens = lex::tokenize("a ;", "<test>").unwrap();
        let mut stream = TokenStream::new(&tokens);

        assert!(stream.previous().is_none());
        assert_eq!(stream.peek().as_ref().kind(), TokenKind::Semicolon);

        stream.advance();
        stream.advance();
        assert!(!stream.has_next());
        assert_eq!(stream.peek().as_ref().kind(), TokenKind::Eof);

        stream.advance();
        assert_eq!(stream.position(), 2);
        assert_eq!(stream.current().as_ref().kind(), TokenKind::Eof);
        assert_eq!(stream.previous().unwrap().as_ref().kind(), TokenKind::Semicolon);
    }
}
