use crate::error::{SiftError, SiftResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Statement keywords
    Get,
    Put,
    Remove,
    Del,
    Select,
    From,
    Where,
    Order,
    By,
    Asc,
    Desc,
    Skip,
    Limit,
    Update,
    Insert,
    Delete,
    Ttl,

    // Condition keywords
    And,
    Or,
    Not,
    Between,
    In,
    Like,

    // Identifiers and literals
    Identifier(String),
    BindVar(String), // @name parameter placeholder
    Integer(i64),
    Float(f64),
    String(String),
    True,
    False,

    // Comparators
    Equal,         // =
    GreaterThan,   // >
    GreaterThanEq, // >=
    LessThan,      // <
    LessThanEq,    // <=

    // Delimiters
    Comma,        // ,
    Colon,        // :
    Dot,          // .
    LeftBrace,    // {
    RightBrace,   // }
    LeftParen,    // (
    RightParen,   // )

    // Special
    Eof,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self, negative: bool) -> SiftResult<Token> {
        let mut num_str = String::new();
        if negative {
            num_str.push('-');
        }
        let mut has_dot = false;

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| SiftError::Parse(format!("Invalid float number: {}", num_str)))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| SiftError::Parse(format!("Invalid integer number: {}", num_str)))
        }
    }

    fn read_string(&mut self, quote: char) -> SiftResult<Token> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(Token::String(result));
                }
                '\\' => {
                    self.advance();
                    match self.current_char {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(other) => {
                            return Err(SiftError::Parse(format!(
                                "Invalid escape sequence: \\{}",
                                other
                            )))
                        }
                        None => {
                            return Err(SiftError::Parse(
                                "Unterminated string: unexpected end of input".to_string(),
                            ))
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(SiftError::Parse(
            "Unterminated string: missing closing quote".to_string(),
        ))
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Map a bare word to its keyword token. Keywords are case-insensitive;
    /// anything unrecognized stays an identifier with its original casing.
    fn keyword_or_identifier(word: String) -> Token {
        match word.to_ascii_lowercase().as_str() {
            "get" => Token::Get,
            "put" => Token::Put,
            "remove" => Token::Remove,
            "del" => Token::Del,
            "select" => Token::Select,
            "from" => Token::From,
            "where" => Token::Where,
            "order" => Token::Order,
            "by" => Token::By,
            "asc" => Token::Asc,
            "desc" => Token::Desc,
            "skip" => Token::Skip,
            "limit" => Token::Limit,
            "update" => Token::Update,
            "insert" => Token::Insert,
            "delete" => Token::Delete,
            "ttl" => Token::Ttl,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "like" => Token::Like,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Identifier(word),
        }
    }

    pub fn next_token(&mut self) -> SiftResult<Token> {
        self.skip_whitespace();

        let ch = match self.current_char {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            '@' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(SiftError::Parse(
                        "Expected parameter name after '@'".to_string(),
                    ));
                }
                Ok(Token::BindVar(name))
            }
            '=' => {
                self.advance();
                Ok(Token::Equal)
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::GreaterThanEq)
                } else {
                    self.advance();
                    Ok(Token::GreaterThan)
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::LessThanEq)
                } else {
                    self.advance();
                    Ok(Token::LessThan)
                }
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            ':' => {
                self.advance();
                Ok(Token::Colon)
            }
            '.' => {
                self.advance();
                Ok(Token::Dot)
            }
            '{' => {
                self.advance();
                Ok(Token::LeftBrace)
            }
            '}' => {
                self.advance();
                Ok(Token::RightBrace)
            }
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            '"' => self.read_string('"'),
            '\'' => self.read_string('\''),
            '-' => {
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                    self.read_number(true)
                } else {
                    Err(SiftError::Parse(format!(
                        "Unexpected character '-' at position {}",
                        self.position
                    )))
                }
            }
            '+' => {
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                    self.read_number(false)
                } else {
                    Err(SiftError::Parse(format!(
                        "Unexpected character '+' at position {}",
                        self.position
                    )))
                }
            }
            c if c.is_ascii_digit() => self.read_number(false),
            c if c.is_alphabetic() || c == '_' => {
                let word = self.read_identifier();
                Ok(Self::keyword_or_identifier(word))
            }
            c => Err(SiftError::Parse(format!(
                "Unexpected character '{}' at position {}",
                c, self.position
            ))),
        }
    }

    pub fn tokenize(&mut self) -> SiftResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}
