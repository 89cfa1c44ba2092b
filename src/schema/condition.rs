/// Switch conditions: the three-token `field;operator;value` grammar.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Token separator inside a Switch choice label.
pub const SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("expected 3 tokens separated by ';', found {0}")]
    TokenCount(usize),
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error("value '{0}' is not an integer")]
    NotAnInteger(String),
    #[error("empty field name")]
    EmptyField,
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// Comparison applied between a stored field and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    GreaterThan,
    LessThan,
    Equal,
    Always,
}

impl Operator {
    /// Parse an operator token. Accepts both the symbol and the name.
    pub fn parse(token: &str) -> Option<Operator> {
        match token {
            ">" | "GreaterThan" => Some(Self::GreaterThan),
            "<" | "LessThan" => Some(Self::LessThan),
            "=" | "==" | "Equal" => Some(Self::Equal),
            "*" | "Always" => Some(Self::Always),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Equal => "==",
            Self::Always => "Always",
        }
    }

    /// Whether evaluating this operator needs the stored value at all.
    pub fn reads_field(&self) -> bool {
        !matches!(self, Self::Always)
    }

    pub fn holds(&self, stored: i64, literal: i64) -> bool {
        match self {
            Self::GreaterThan => stored > literal,
            Self::LessThan => stored < literal,
            Self::Equal => stored == literal,
            Self::Always => true,
        }
    }
}

/// A parsed Switch condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: i64,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: i64) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Parse a choice label of the form `field;operator;value`.
    ///
    /// Whitespace around each token is ignored. The field name is only
    /// required for operators that read the store.
    pub fn parse(label: &str) -> Result<Condition, ConditionError> {
        let tokens: Vec<&str> = label.split(SEPARATOR).map(str::trim).collect();
        if tokens.len() != 3 {
            return Err(ConditionError::TokenCount(tokens.len()));
        }

        let operator = Operator::parse(tokens[1])
            .ok_or_else(|| ConditionError::UnknownOperator(tokens[1].to_string()))?;
        let value: i64 = tokens[2]
            .parse()
            .map_err(|_| ConditionError::NotAnInteger(tokens[2].to_string()))?;
        if tokens[0].is_empty() && operator.reads_field() {
            return Err(ConditionError::EmptyField);
        }

        Ok(Condition {
            field: tokens[0].to_string(),
            operator,
            value,
        })
    }

    /// Encode back into a choice label.
    pub fn to_label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.field,
            SEPARATOR,
            self.operator.symbol(),
            SEPARATOR,
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbols_and_names() {
        assert_eq!(
            Condition::parse("hp;>;5").unwrap(),
            Condition::new("hp", Operator::GreaterThan, 5)
        );
        assert_eq!(
            Condition::parse("hp;LessThan;-2").unwrap(),
            Condition::new("hp", Operator::LessThan, -2)
        );
        assert_eq!(
            Condition::parse(" gold ; == ; 10 ").unwrap(),
            Condition::new("gold", Operator::Equal, 10)
        );
        assert_eq!(
            Condition::parse("x;Always;0").unwrap().operator,
            Operator::Always
        );
    }

    #[test]
    fn parse_wrong_token_count() {
        assert_eq!(
            Condition::parse("hp;>"),
            Err(ConditionError::TokenCount(2))
        );
        assert_eq!(
            Condition::parse("hp;>;5;6"),
            Err(ConditionError::TokenCount(4))
        );
    }

    #[test]
    fn parse_unknown_operator() {
        assert_eq!(
            Condition::parse("hp;??;5"),
            Err(ConditionError::UnknownOperator("??".to_string()))
        );
    }

    #[test]
    fn parse_non_integer_value() {
        assert!(matches!(
            Condition::parse("hp;>;five"),
            Err(ConditionError::NotAnInteger(v)) if v == "five"
        ));
    }

    #[test]
    fn empty_field_only_allowed_for_always() {
        assert_eq!(Condition::parse(";>;1"), Err(ConditionError::EmptyField));
        assert!(Condition::parse(";Always;0").is_ok());
    }

    #[test]
    fn operator_semantics() {
        assert!(Operator::GreaterThan.holds(10, 5));
        assert!(!Operator::GreaterThan.holds(5, 5));
        assert!(Operator::LessThan.holds(3, 5));
        assert!(Operator::Equal.holds(5, 5));
        assert!(Operator::Always.holds(i64::MIN, i64::MAX));
    }

    #[test]
    fn label_encoding_parses_back() {
        let c = Condition::new("trust", Operator::LessThan, 3);
        assert_eq!(c.to_label(), "trust;<;3");
        assert_eq!(Condition::parse(&c.to_label()).unwrap(), c);
    }
}
