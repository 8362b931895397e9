//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido está asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores tanto en los mismos como en constructos
//! más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores sí incluyen su lexema
//! original. Las constantes literales se resuelven a sus valores en vez de
//! preservar sus lexemas. El flujo siempre termina con exactamente un
//! [`Token::Eof`], de modo que el parser nunca se queda sin token actual.
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje es case-insensitive, por lo cual tanto `struct` como
//!   `STRUCT` y `StRuct` resultan en la palabra clave [`Keyword::Struct`],
//!   y `foo` y `FOO` nombran al mismo símbolo.
//! - Los identificadores comienzan con una letra o `_`.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

// Case-insensitive
pub use unicase::Ascii as NoCase;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,

    /// Secuencia de escape desconocida en un literal de carácter.
    #[error("Unknown escape sequence '\\{0}'")]
    BadEscape(char),
}

/// Un identificador.
///
/// La igualdad y el hashing ignoran mayúsculas, pero se preserva
/// la escritura original para mensajes y nombres externos.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<NoCase<String>>);

impl Identifier {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Identifier(Rc::new(NoCase::new(name.into())))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_ref())
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::new(name)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(i64),

    /// Literal de carácter.
    CharLiteral(char),

    /// `=`
    Assign,

    /// `,`
    Comma,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `%`
    Percent,

    /// `^`
    Caret,

    /// `<`
    Less,

    /// `>`
    Greater,

    /// `->`
    Arrow,

    /// `...`
    Ellipsis,

    /// `@`
    At,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `{`
    OpenCurly,

    /// `)`
    CloseParen,

    /// `}`
    CloseCurly,

    /// Fin del flujo.
    Eof,
}

impl Token {
    /// Clasificación del token, sin su carga.
    pub fn kind(&self) -> TokenKind {
        use Token::*;

        match self {
            Id(_) => TokenKind::Id,
            Keyword(keyword) => TokenKind::Keyword(*keyword),
            IntLiteral(_) => TokenKind::IntLiteral,
            CharLiteral(_) => TokenKind::CharLiteral,
            Assign => TokenKind::Assign,
            Comma => TokenKind::Comma,
            Plus => TokenKind::Plus,
            Minus => TokenKind::Minus,
            Times => TokenKind::Times,
            Slash => TokenKind::Slash,
            Percent => TokenKind::Percent,
            Caret => TokenKind::Caret,
            Less => TokenKind::Less,
            Greater => TokenKind::Greater,
            Arrow => TokenKind::Arrow,
            Ellipsis => TokenKind::Ellipsis,
            At => TokenKind::At,
            Semicolon => TokenKind::Semicolon,
            OpenParen => TokenKind::OpenParen,
            OpenCurly => TokenKind::OpenCurly,
            CloseParen => TokenKind::CloseParen,
            CloseCurly => TokenKind::CloseCurly,
            Eof => TokenKind::Eof,
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(fmt, "identifier `{}`", id),
            Token::IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Token::CharLiteral(c) => write!(fmt, "literal {:?}", c),
            other => other.kind().fmt(fmt),
        }
    }
}

/// Clase de un token, sin lexema ni valor.
///
/// Esta es la granularidad a la que el parser compara y reporta tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Id,
    Keyword(Keyword),
    IntLiteral,
    CharLiteral,
    Assign,
    Comma,
    Plus,
    Minus,
    Times,
    Slash,
    Percent,
    Caret,
    Less,
    Greater,
    Arrow,
    Ellipsis,
    At,
    Semicolon,
    OpenParen,
    OpenCurly,
    CloseParen,
    CloseCurly,
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self {
            Id => fmt.write_str("identifier"),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral => fmt.write_str("integer literal"),
            CharLiteral => fmt.write_str("character literal"),
            Assign => fmt.write_str("`=`"),
            Comma => fmt.write_str("`,`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            Percent => fmt.write_str("`%`"),
            Caret => fmt.write_str("`^`"),
            Less => fmt.write_str("`<`"),
            Greater => fmt.write_str("`>`"),
            Arrow => fmt.write_str("`->`"),
            Ellipsis => fmt.write_str("`...`"),
            At => fmt.write_str("`@`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseParen => fmt.write_str("`)`"),
            CloseCurly => fmt.write_str("`}`"),
            Eof => fmt.write_str("end of input"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Module,
    Fn,
    Extern,
    Global,
    Struct,
    Let,
    Return,
    True,
    False,
    I8,
    I16,
    I32,
    I64,
    Bool,
    Char,
    Void,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Module => "module",
            Fn     => "fn",
            Extern => "extern",
            Global => "global",
            Struct => "struct",
            Let    => "let",
            Return => "return",
            True   => "true",
            False  => "false",
            I8     => "i8",
            I16    => "i16",
            I32    => "i32",
            I64    => "i64",
            Bool   => "bool",
            Char   => "char",
            Void   => "void",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(NoCase<&str>, Keyword)] = &[
            (NoCase::new("module"), Module),
            (NoCase::new("fn"),     Fn),
            (NoCase::new("extern"), Extern),
            (NoCase::new("global"), Global),
            (NoCase::new("struct"), Struct),
            (NoCase::new("let"),    Let),
            (NoCase::new("return"), Return),
            (NoCase::new("true"),   True),
            (NoCase::new("false"),  False),
            (NoCase::new("i8"),     I8),
            (NoCase::new("i16"),    I16),
            (NoCase::new("i32"),    I32),
            (NoCase::new("i64"),    I64),
            (NoCase::new("bool"),   Bool),
            (NoCase::new("char"),   Char),
            (NoCase::new("void"),   Void),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == NoCase::new(string))
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: std::iter::Peekable<S>,
    state: State,
    start: Location,
    next: Location,
    finished: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `/`.
    ///
    /// Si sigue otro `/` se entra en un comentario, de otro modo es
    /// el operador de división.
    Slash,

    /// Se encontró `-`, que puede iniciar `->`.
    Dash,

    /// Se han encontrado uno o dos `.` consecutivos.
    Dots(u8),

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(i64),

    /// Se encontró `'`, inicio de un literal de carácter.
    CharOpen,

    /// Se encontró `\` dentro de un literal de carácter.
    CharEscape,

    /// Literal de carácter que espera su `'` de cierre.
    CharBody(char),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let next = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            next,
            finished: false,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        tracing::debug!(tokens = tokens.len(), "lexing finished");
        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<(Token, Location)>, LexerError> {
        use {State::*, Token::*};

        let mut last_accepted = self.start.clone();
        let token = loop {
            // Se espera un siguiente carácter, fallando si hay error de E/S
            let next_char = match self.source.peek() {
                None => None,
                Some(Ok((c, _))) => Some(*c),
                Some(Err(_)) => match self.source.next() {
                    Some(Err(error)) => break Err(error.into()),
                    _ => unreachable!(),
                },
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.next.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('%')) => self.state = Complete(Percent),
                (Start, Some('^')) => self.state = Complete(Caret),
                (Start, Some('<')) => self.state = Complete(Less),
                (Start, Some('>')) => self.state = Complete(Greater),
                (Start, Some('@')) => self.state = Complete(At),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('}')) => self.state = Complete(CloseCurly),
                (Start, Some('=')) => self.state = Complete(Assign),
                (Start, Some('/')) => self.state = State::Slash,
                (Start, Some('-')) => self.state = Dash,
                (Start, Some('.')) => self.state = Dots(1),
                (Start, Some('\'')) => self.state = CharOpen,

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume
                // el entero, ya que esta lógica ya está implementada
                // en el respectivo caso para un estado de constante
                // entera para el cual el siguiente carácter es un
                // dígito. Por tanto, la constante es inicialmente cero.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(std::mem::replace(value, Eof)),

                // `//` inicia un comentario, `/` por sí solo divide
                (State::Slash, Some('/')) => self.state = Comment,
                (State::Slash, _) => break Ok(Token::Slash),

                (Dash, Some('>')) => self.state = Complete(Arrow),
                (Dash, _) => break Ok(Minus),

                // Solo `...` es válido
                (Dots(1), Some('.')) => self.state = Dots(2),
                (Dots(2), Some('.')) => self.state = Complete(Ellipsis),
                (Dots(_), _) => break Err(LexerError::Expected('.')),

                // Los comentarios descartan la línea donde ocurren
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = i64::from(digit as u8 - b'0');

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => break Err(LexerError::IntOverflow),
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => break Ok(IntLiteral(*integer)),

                // Literales de carácter
                (CharOpen, Some('\\')) => self.state = CharEscape,
                (CharOpen, Some(c)) if c != '\'' && c != '\n' => self.state = CharBody(c),
                (CharOpen, Some(c)) => break Err(LexerError::BadChar(c)),
                (CharOpen, None) => break Err(LexerError::Expected('\'')),

                (CharEscape, Some(c)) => {
                    let escaped = match c {
                        'n' => '\n',
                        't' => '\t',
                        '0' => '\0',
                        '\\' => '\\',
                        '\'' => '\'',
                        _ => break Err(LexerError::BadEscape(c)),
                    };

                    self.state = CharBody(escaped);
                }

                (CharEscape, None) => break Err(LexerError::Expected('\'')),

                (CharBody(c), Some('\'')) => self.state = Complete(CharLiteral(*c)),
                (CharBody(_), _) => break Err(LexerError::Expected('\'')),

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => {
                    word.push(c);
                }

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    if let Ok(keyword) = self::Keyword::from_str(word) {
                        break Ok(Keyword(keyword));
                    } else {
                        break Ok(Id(Identifier::new(std::mem::take(word))));
                    }
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, next_position))) = self.source.next() {
                last_accepted = std::mem::replace(&mut self.next, next_position);
            }
        };

        token.map(|token| Some((token, last_accepted)))
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.lex() {
            Ok(None) => {
                self.finished = true;
                Some(Ok(Located::at(Token::Eof, self.next.clone())))
            }

            Ok(Some((token, last_accepted))) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &last_accepted);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.next.clone())))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokeniza texto en memoria.
///
/// Atajo para herramientas y pruebas que no leen de un archivo.
pub fn tokenize(text: &str, name: &str) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
    let (start, stream) = crate::source::from_str(text, name);
    Lexer::new(start, stream).try_exhaustive()
}
