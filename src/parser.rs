//! Recursive-descent parser producing `Command` values (spec §6). The
//! grammar only covers the statements the engine executes — no column
//! projection lists, no `ORDER BY`/`LIMIT`, no sub-queries (spec §1
//! non-goals); `SELECT` always projects every column.

use crate::ast::{Assignment, Command, JoinClause, JoinType, Literal, Operator, WhereCondition};
use crate::codec::ColumnDefinition;
use crate::lexer::Token;
use crate::value::ColumnType;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<(), String> {
        if *self.current_token() == expected {
            self.current += 1;
            Ok(())
        } else {
            Err(format!(
                "expected {:?}, found {:?}",
                expected,
                self.current_token()
            ))
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        self.current += 1;
        token
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(format!("expected an identifier, found {other:?}")),
        }
    }

    fn parse_statement(&mut self) -> Result<Command, String> {
        match self.current_token() {
            Token::Select => self.parse_select(),
            Token::Insert => self.parse_insert(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Create => self.parse_create(),
            Token::Begin => {
                self.advance();
                self.consume_optional(Token::Transaction);
                Ok(Command::Begin)
            }
            Token::Commit => {
                self.advance();
                self.consume_optional(Token::Transaction);
                Ok(Command::Commit)
            }
            Token::Rollback => {
                self.advance();
                self.consume_optional(Token::Transaction);
                Ok(Command::Rollback)
            }
            other => Err(format!("unexpected token: {other:?}")),
        }
    }

    fn consume_optional(&mut self, token: Token) {
        if *self.current_token() == token {
            self.advance();
        }
    }

    fn parse_create(&mut self) -> Result<Command, String> {
        self.consume(Token::Create)?;
        self.consume(Token::Table)?;
        let table = self.expect_identifier()?;
        self.consume(Token::LeftParen)?;
        let columns = self.parse_column_definitions()?;
        self.consume(Token::RightParen)?;
        Ok(Command::CreateTable { table, columns })
    }

    fn parse_column_definitions(&mut self) -> Result<Vec<ColumnDefinition>, String> {
        let mut columns = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let col_type = match self.advance() {
                Token::Integer => ColumnType::Integer,
                Token::Text => ColumnType::Text,
                other => return Err(format!("expected a column type, found {other:?}")),
            };
            let is_primary_key = if *self.current_token() == Token::Primary {
                self.advance();
                self.consume(Token::Key)?;
                true
            } else {
                false
            };
            columns.push(ColumnDefinition {
                name,
                col_type,
                is_primary_key,
            });

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(columns)
    }

    fn parse_insert(&mut self) -> Result<Command, String> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.expect_identifier()?;

        let columns = if *self.current_token() == Token::LeftParen {
            self.advance();
            let mut names = Vec::new();
            loop {
                names.push(self.expect_identifier()?);
                if *self.current_token() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.consume(Token::RightParen)?;
            Some(names)
        } else {
            None
        };

        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.consume(Token::RightParen)?;

        Ok(Command::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, String> {
        match self.advance() {
            Token::Null => Ok(Literal::Null),
            Token::Number(n) => Ok(Literal::Integer(n as i32)),
            Token::StringLiteral(s) => Ok(Literal::Text(s)),
            other => Err(format!("expected a literal, found {other:?}")),
        }
    }

    fn parse_select(&mut self) -> Result<Command, String> {
        self.consume(Token::Select)?;
        self.consume(Token::Star)?;
        self.consume(Token::From)?;
        let table = self.expect_identifier()?;

        let join = if self.is_join_start() {
            Some(self.parse_join()?)
        } else {
            None
        };

        let where_clause = self.parse_optional_where()?;

        Ok(Command::Select {
            table,
            join,
            where_clause,
        })
    }

    fn is_join_start(&self) -> bool {
        matches!(
            self.current_token(),
            Token::Join | Token::Inner | Token::Left
        )
    }

    fn parse_join(&mut self) -> Result<JoinClause, String> {
        let join_type = match self.current_token() {
            Token::Left => {
                self.advance();
                JoinType::Left
            }
            Token::Inner => {
                self.advance();
                JoinType::Inner
            }
            _ => JoinType::Inner,
        };
        self.consume(Token::Join)?;
        let table = self.expect_identifier()?;
        self.consume(Token::On)?;
        let left_ref = self.expect_identifier()?;
        let operator = self.parse_operator()?;
        let right_ref = self.expect_identifier()?;

        Ok(JoinClause {
            table,
            join_type,
            left_ref,
            operator,
            right_ref,
        })
    }

    fn parse_operator(&mut self) -> Result<Operator, String> {
        match self.advance() {
            Token::Equal => Ok(Operator::Eq),
            Token::LessThan => Ok(Operator::Lt),
            Token::GreaterThan => Ok(Operator::Gt),
            Token::LessThanOrEqual => Ok(Operator::Le),
            Token::GreaterThanOrEqual => Ok(Operator::Ge),
            other => Err(format!("expected a comparison operator, found {other:?}")),
        }
    }

    fn parse_optional_where(&mut self) -> Result<Vec<WhereCondition>, String> {
        if *self.current_token() != Token::Where {
            return Ok(Vec::new());
        }
        self.advance();

        let mut conditions = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            let operator = self.parse_operator()?;
            let value = self.parse_literal()?;
            conditions.push(WhereCondition {
                column,
                operator,
                value,
            });

            if *self.current_token() == Token::And {
                self.advance();
            } else {
                break;
            }
        }
        Ok(conditions)
    }

    fn parse_update(&mut self) -> Result<Command, String> {
        self.consume(Token::Update)?;
        let table = self.expect_identifier()?;
        self.consume(Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            self.consume(Token::Equal)?;
            let value = self.parse_literal()?;
            assignments.push(Assignment { column, value });

            if *self.current_token() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let where_clause = self.parse_optional_where()?;

        Ok(Command::Update {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<Command, String> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.expect_identifier()?;
        let where_clause = self.parse_optional_where()?;
        Ok(Command::Delete { table, where_clause })
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Command, String> {
    let mut parser = Parser::new(tokens);
    let command = parser.parse_statement()?;
    parser.consume_optional(Token::Semicolon);
    if *parser.current_token() != Token::Eof {
        return Err(format!(
            "unexpected trailing token: {:?}",
            parser.current_token()
        ));
    }
    Ok(command)
}
