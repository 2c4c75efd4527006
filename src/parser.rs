use std::time::Duration;

use crate::ast::*;
use crate::error::{SiftError, SiftResult};
use crate::lexer::{Lexer, Token};

/// Parse a complete statement from query text.
pub fn parse(input: &str) -> SiftResult<Statement> {
    Parser::new(input)?.parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(input: &str) -> SiftResult<Self> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
        })
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn peek_token(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: Token) -> SiftResult<()> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(SiftError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    fn expect_eof(&mut self) -> SiftResult<()> {
        if self.current_token() == &Token::Eof {
            Ok(())
        } else {
            Err(SiftError::Parse(format!(
                "Unexpected token after statement: {:?}",
                self.current_token()
            )))
        }
    }

    pub fn parse(&mut self) -> SiftResult<Statement> {
        let statement = match self.current_token() {
            Token::Get => {
                self.advance();
                Statement::Get(self.parse_get()?)
            }
            Token::Put => {
                self.advance();
                Statement::Put(self.parse_put()?)
            }
            Token::Remove | Token::Del => {
                self.advance();
                Statement::Remove(self.parse_remove()?)
            }
            Token::Select => {
                self.advance();
                Statement::Select(self.parse_select()?)
            }
            Token::Update => {
                self.advance();
                Statement::Update(self.parse_update()?)
            }
            Token::Insert => {
                self.advance();
                Statement::Insert(self.parse_insert()?)
            }
            Token::Delete => {
                self.advance();
                Statement::Delete(self.parse_delete()?)
            }
            other => {
                return Err(SiftError::Parse(format!(
                    "Expected a statement keyword, got {:?}",
                    other
                )))
            }
        };
        self.expect_eof()?;
        Ok(statement)
    }
}

// Key/value statements
impl Parser {
    fn parse_get(&mut self) -> SiftResult<GetQuery> {
        let keys = self.parse_key_list()?;
        Ok(GetQuery { keys })
    }

    fn parse_put(&mut self) -> SiftResult<PutQuery> {
        self.expect(Token::LeftBrace)?;
        let key = self.parse_value()?;
        self.expect(Token::Comma)?;
        let value = self.parse_value()?;
        self.expect(Token::RightBrace)?;
        let ttl = self.parse_ttl_clause()?;

        Ok(PutQuery { key, value, ttl })
    }

    fn parse_remove(&mut self) -> SiftResult<RemoveQuery> {
        let keys = self.parse_key_list()?;
        Ok(RemoveQuery { keys })
    }

    /// Keys are either a comma list of values or a single brace literal;
    /// an array literal contributes each element as a key, an object
    /// literal is a single composite key.
    fn parse_key_list(&mut self) -> SiftResult<Vec<QueryValue>> {
        if self.current_token() == &Token::LeftBrace {
            let literal = self.parse_brace_literal()?;
            return Ok(match literal {
                QueryValue::Array(elements) => elements,
                object => vec![object],
            });
        }

        let mut keys = vec![self.parse_value()?];
        while self.current_token() == &Token::Comma {
            self.advance();
            keys.push(self.parse_value()?);
        }
        Ok(keys)
    }
}

// Document statements
impl Parser {
    fn parse_select(&mut self) -> SiftResult<SelectQuery> {
        let mut fields = Vec::new();
        if self.current_token() != &Token::From {
            fields.push(self.parse_field_path()?);
            while self.current_token() == &Token::Comma {
                self.advance();
                fields.push(self.parse_field_path()?);
            }
        }

        self.expect(Token::From)?;
        let entity = self.parse_entity_name()?;

        let condition = if self.current_token() == &Token::Where {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        let sorts = if self.current_token() == &Token::Order {
            self.advance();
            self.expect(Token::By)?;
            self.parse_sort_list()?
        } else {
            Vec::new()
        };

        let skip = if self.current_token() == &Token::Skip {
            self.advance();
            self.parse_non_negative_integer("SKIP")?
        } else {
            0
        };

        let limit = if self.current_token() == &Token::Limit {
            self.advance();
            self.parse_non_negative_integer("LIMIT")?
        } else {
            0
        };

        Ok(SelectQuery {
            entity,
            fields,
            condition,
            sorts,
            skip,
            limit,
        })
    }

    fn parse_update(&mut self) -> SiftResult<UpdateQuery> {
        let entity = self.parse_entity_name()?;
        let fields = self.parse_entity_fields()?;
        Ok(UpdateQuery { entity, fields })
    }

    fn parse_insert(&mut self) -> SiftResult<InsertQuery> {
        let entity = self.parse_entity_name()?;
        let fields = self.parse_entity_fields()?;
        let ttl = self.parse_ttl_clause()?;
        Ok(InsertQuery {
            entity,
            fields,
            ttl,
        })
    }

    fn parse_delete(&mut self) -> SiftResult<DeleteQuery> {
        self.expect(Token::From)?;
        let entity = self.parse_entity_name()?;

        let condition = if self.current_token() == &Token::Where {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(DeleteQuery { entity, condition })
    }

    /// Entity fields come either as `(field = value, ...)` assignments or
    /// as a JSON-like object literal.
    fn parse_entity_fields(&mut self) -> SiftResult<Vec<(String, QueryValue)>> {
        match self.current_token() {
            Token::LeftParen => {
                self.advance();
                let mut fields = vec![self.parse_assignment()?];
                while self.current_token() == &Token::Comma {
                    self.advance();
                    fields.push(self.parse_assignment()?);
                }
                self.expect(Token::RightParen)?;
                Ok(fields)
            }
            Token::LeftBrace => match self.parse_brace_literal()? {
                QueryValue::Object(pairs) => Ok(pairs),
                _ => Err(SiftError::Parse(
                    "Expected an object literal with named fields".to_string(),
                )),
            },
            other => Err(SiftError::Parse(format!(
                "Expected '(' or '{{' to open entity fields, got {:?}",
                other
            ))),
        }
    }

    fn parse_assignment(&mut self) -> SiftResult<(String, QueryValue)> {
        let field = self.parse_field_path()?;
        self.expect(Token::Equal)?;
        let value = self.parse_value()?;
        Ok((field, value))
    }

    fn parse_sort_list(&mut self) -> SiftResult<Vec<Sort>> {
        let mut sorts = vec![self.parse_sort_entry()?];
        while self.current_token() == &Token::Comma {
            self.advance();
            sorts.push(self.parse_sort_entry()?);
        }
        Ok(sorts)
    }

    fn parse_sort_entry(&mut self) -> SiftResult<Sort> {
        let field = self.parse_field_path()?;
        let ascending = match self.current_token() {
            Token::Asc => {
                self.advance();
                true
            }
            Token::Desc => {
                self.advance();
                false
            }
            _ => true,
        };
        Ok(Sort { field, ascending })
    }

    fn parse_non_negative_integer(&mut self, clause: &str) -> SiftResult<u64> {
        match self.current_token().clone() {
            Token::Integer(n) if n >= 0 => {
                self.advance();
                Ok(n as u64)
            }
            other => Err(SiftError::Parse(format!(
                "Expected a non-negative integer after {}, got {:?}",
                clause, other
            ))),
        }
    }

    fn parse_entity_name(&mut self) -> SiftResult<String> {
        match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(SiftError::Parse(format!(
                "Expected an entity name, got {:?}",
                other
            ))),
        }
    }

    /// Field path: identifier segments joined by dots, e.g. `address.city`.
    fn parse_field_path(&mut self) -> SiftResult<String> {
        let mut path = match self.current_token().clone() {
            Token::Identifier(name) => {
                self.advance();
                name
            }
            other => {
                return Err(SiftError::Parse(format!(
                    "Expected a field name, got {:?}",
                    other
                )))
            }
        };

        while self.current_token() == &Token::Dot {
            self.advance();
            match self.current_token().clone() {
                Token::Identifier(segment) => {
                    self.advance();
                    path.push('.');
                    path.push_str(&segment);
                }
                other => {
                    return Err(SiftError::Parse(format!(
                        "Expected a field name after '.', got {:?}",
                        other
                    )))
                }
            }
        }

        Ok(path)
    }
}

// Conditions
impl Parser {
    /// `or` folds last: `a and b or c` is `(a and b) or c`.
    pub fn parse_condition(&mut self) -> SiftResult<Condition> {
        let mut operands = vec![self.parse_and_condition()?];

        while self.current_token() == &Token::Or {
            self.advance();
            operands.push(self.parse_and_condition()?);
        }

        if operands.len() == 1 {
            Ok(operands.remove(0))
        } else {
            Ok(Condition::Or(operands))
        }
    }

    fn parse_and_condition(&mut self) -> SiftResult<Condition> {
        let mut operands = vec![self.parse_unary_condition()?];

        while self.current_token() == &Token::And {
            self.advance();
            operands.push(self.parse_unary_condition()?);
        }

        if operands.len() == 1 {
            Ok(operands.remove(0))
        } else {
            Ok(Condition::And(operands))
        }
    }

    fn parse_unary_condition(&mut self) -> SiftResult<Condition> {
        match self.current_token() {
            Token::Not => {
                self.advance();
                let operand = self.parse_unary_condition()?;
                Ok(Condition::Not(Box::new(operand)))
            }
            Token::LeftParen => {
                self.advance();
                let condition = self.parse_condition()?;
                self.expect(Token::RightParen)?;
                Ok(condition)
            }
            _ => self.parse_leaf_condition(),
        }
    }

    fn parse_leaf_condition(&mut self) -> SiftResult<Condition> {
        let field = self.parse_field_path()?;

        let operator = match self.current_token() {
            Token::Equal => Operator::Eq,
            Token::GreaterThan => Operator::Gt,
            Token::GreaterThanEq => Operator::Gte,
            Token::LessThan => Operator::Lt,
            Token::LessThanEq => Operator::Lte,
            Token::Like => Operator::Like,
            Token::Between => Operator::Between,
            Token::In => Operator::In,
            other => {
                return Err(SiftError::Parse(format!(
                    "Expected a comparator after '{}', got {:?}",
                    field, other
                )))
            }
        };
        self.advance();

        // BETWEEN and IN also accept a parenthesized list as an array value
        let value = if matches!(operator, Operator::Between | Operator::In)
            && self.current_token() == &Token::LeftParen
        {
            self.parse_paren_list()?
        } else {
            self.parse_value()?
        };

        Ok(Condition::Leaf {
            field,
            operator,
            value,
        })
    }

    fn parse_paren_list(&mut self) -> SiftResult<QueryValue> {
        self.expect(Token::LeftParen)?;
        let mut elements = vec![self.parse_value()?];
        while self.current_token() == &Token::Comma {
            self.advance();
            elements.push(self.parse_value()?);
        }
        self.expect(Token::RightParen)?;
        Ok(QueryValue::Array(elements))
    }
}

// Values
impl Parser {
    pub fn parse_value(&mut self) -> SiftResult<QueryValue> {
        match self.current_token().clone() {
            Token::Integer(n) => {
                self.advance();
                Ok(QueryValue::Number(serde_json::Number::from(n)))
            }
            Token::Float(f) => {
                self.advance();
                serde_json::Number::from_f64(f)
                    .map(QueryValue::Number)
                    .ok_or_else(|| SiftError::Parse(format!("Invalid numeric literal: {}", f)))
            }
            Token::String(s) => {
                self.advance();
                Ok(QueryValue::Text(s))
            }
            Token::True => {
                self.advance();
                Ok(QueryValue::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(QueryValue::Bool(false))
            }
            Token::BindVar(name) => {
                self.advance();
                Ok(QueryValue::Parameter(name))
            }
            Token::LeftBrace => self.parse_brace_literal(),
            Token::Identifier(name) => {
                if self.peek_token(1) == &Token::LeftParen {
                    self.advance();
                    self.parse_function_call(name)
                } else {
                    Err(SiftError::Parse(format!(
                        "Unexpected identifier '{}' in value position (strings must be quoted)",
                        name
                    )))
                }
            }
            other => Err(SiftError::Parse(format!(
                "Expected a value, got {:?}",
                other
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> SiftResult<QueryValue> {
        self.expect(Token::LeftParen)?;

        let mut args = Vec::new();
        if self.current_token() != &Token::RightParen {
            args.push(self.parse_function_arg()?);
            while self.current_token() == &Token::Comma {
                self.advance();
                args.push(self.parse_function_arg()?);
            }
        }
        self.expect(Token::RightParen)?;

        Ok(QueryValue::FunctionCall { name, args })
    }

    /// A bare identifier argument is a type name, e.g. `convert(@age, integer)`.
    fn parse_function_arg(&mut self) -> SiftResult<QueryValue> {
        if let Token::Identifier(name) = self.current_token().clone() {
            if self.peek_token(1) != &Token::LeftParen {
                self.advance();
                return Ok(QueryValue::Text(name));
            }
        }
        self.parse_value()
    }

    /// Brace literal: an array `{a, b}` or an object `{name: value}`,
    /// told apart by the colon after the first key.
    fn parse_brace_literal(&mut self) -> SiftResult<QueryValue> {
        let is_object = matches!(
            self.peek_token(1),
            Token::Identifier(_) | Token::String(_)
        ) && self.peek_token(2) == &Token::Colon;

        if is_object {
            self.parse_object_literal()
        } else {
            self.parse_array_literal()
        }
    }

    fn parse_array_literal(&mut self) -> SiftResult<QueryValue> {
        self.expect(Token::LeftBrace)?;

        let mut elements = Vec::new();
        if self.current_token() != &Token::RightBrace {
            elements.push(self.parse_value()?);
            while self.current_token() == &Token::Comma {
                self.advance();
                elements.push(self.parse_value()?);
            }
        }
        self.expect(Token::RightBrace)?;

        Ok(QueryValue::Array(elements))
    }

    fn parse_object_literal(&mut self) -> SiftResult<QueryValue> {
        self.expect(Token::LeftBrace)?;

        let mut pairs = Vec::new();
        while self.current_token() != &Token::RightBrace {
            let key = match self.current_token().clone() {
                Token::Identifier(name) => name,
                Token::String(name) => name,
                other => {
                    return Err(SiftError::Parse(format!(
                        "Expected an object key, got {:?}",
                        other
                    )))
                }
            };
            self.advance();
            self.expect(Token::Colon)?;
            let value = self.parse_value()?;
            pairs.push((key, value));

            if self.current_token() != &Token::RightBrace {
                self.expect(Token::Comma)?;
            }
        }
        self.expect(Token::RightBrace)?;

        Ok(QueryValue::Object(pairs))
    }
}

// TTL clause
impl Parser {
    fn parse_ttl_clause(&mut self) -> SiftResult<Option<Duration>> {
        if self.current_token() != &Token::Ttl {
            return Ok(None);
        }
        self.advance();

        let amount = self.parse_non_negative_integer("TTL")?;

        let unit = match self.current_token().clone() {
            Token::Identifier(unit) => {
                self.advance();
                unit
            }
            other => {
                return Err(SiftError::Parse(format!(
                    "Expected a time unit after TTL value, got {:?}",
                    other
                )))
            }
        };

        let duration = match unit.to_ascii_lowercase().as_str() {
            "ns" | "nanosecond" | "nanoseconds" => Duration::from_nanos(amount),
            "us" | "microsecond" | "microseconds" => Duration::from_micros(amount),
            "ms" | "millisecond" | "milliseconds" => Duration::from_millis(amount),
            "s" | "second" | "seconds" => Duration::from_secs(amount),
            "m" | "minute" | "minutes" => ttl_seconds(amount, 60, &unit)?,
            "h" | "hour" | "hours" => ttl_seconds(amount, 3600, &unit)?,
            "d" | "day" | "days" => ttl_seconds(amount, 86400, &unit)?,
            other => {
                return Err(SiftError::Parse(format!(
                    "Unknown TTL unit '{}'; expected ns, us, ms, second, minute, hour or day",
                    other
                )))
            }
        };

        Ok(Some(duration))
    }
}

fn ttl_seconds(amount: u64, factor: u64, unit: &str) -> SiftResult<Duration> {
    amount
        .checked_mul(factor)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            SiftError::Parse(format!(
                "TTL value {} {} exceeds the supported range",
                amount, unit
            ))
        })
}
