//! Expressions usable in [ExpressionCondition](super::ExpressionCondition).
//!
//! Supported syntax:
//!
//! * `${name}` - value of property `name`
//! * literals - `'quoted'` or `"quoted"` strings and bare words (e.g. `prod`, `8080`, `true`)
//! * comparisons - `==`, `!=`, `<`, `<=`, `>`, `>=`; values which both parse as numbers are
//! compared numerically, others as strings; missing properties are not equal to anything
//! * logic - `&&`, `||`, `!` and parentheses
//!
//! A value used directly as a boolean is true only when equal to `true` (case-insensitive), e.g.
//! `${feature.enabled} && !${maintenance}`.

use crate::condition::ConditionContext;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};
use thiserror::Error;

/// Errors related to parsing expressions.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Unterminated string starting at position {0}")]
    UnterminatedString(usize),
    #[error("Unterminated property reference starting at position {0}")]
    UnterminatedProperty(usize),
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Expression nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("Expression exceeds {0} tokens")]
    TooLong(usize),
}

const MAX_DEPTH: usize = 32;
const MAX_TOKENS: usize = 512;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn test(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Token {
    LeftParen,
    RightParen,
    Not,
    And,
    Or,
    Compare(CompareOp),
    Property(String),
    Literal(String),
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Not => f.write_str("!"),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
            Token::Compare(op) => f.write_str(op.symbol()),
            Token::Property(name) => write!(f, "${{{name}}}"),
            Token::Literal(value) => write!(f, "'{value}'"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/' | '+')
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn next_if_eq(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<(), ExpressionError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((position, character)) => Err(ExpressionError::UnexpectedCharacter {
                character,
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn read_until(&mut self, terminator: char) -> Option<String> {
        let mut result = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == terminator {
                return Some(result);
            }

            result.push(c);
        }

        None
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = vec![];
        while let Some((position, c)) = self.chars.next() {
            let token = match c {
                c if c.is_whitespace() => continue,
                '(' => Token::LeftParen,
                ')' => Token::RightParen,
                '!' if self.next_if_eq('=') => Token::Compare(CompareOp::Ne),
                '!' => Token::Not,
                '=' => {
                    self.expect('=')?;
                    Token::Compare(CompareOp::Eq)
                }
                '<' if self.next_if_eq('=') => Token::Compare(CompareOp::Le),
                '<' => Token::Compare(CompareOp::Lt),
                '>' if self.next_if_eq('=') => Token::Compare(CompareOp::Ge),
                '>' => Token::Compare(CompareOp::Gt),
                '&' => {
                    self.expect('&')?;
                    Token::And
                }
                '|' => {
                    self.expect('|')?;
                    Token::Or
                }
                '$' => {
                    self.expect('{')?;
                    let name = self
                        .read_until('}')
                        .ok_or(ExpressionError::UnterminatedProperty(position))?;
                    Token::Property(name.trim().to_string())
                }
                '\'' | '"' => Token::Literal(
                    self.read_until(c)
                        .ok_or(ExpressionError::UnterminatedString(position))?,
                ),
                c if is_word_char(c) => {
                    let mut end = position + c.len_utf8();
                    while let Some((index, c)) = self.chars.next_if(|(_, c)| is_word_char(*c)) {
                        end = index + c.len_utf8();
                    }

                    Token::Literal(self.source[position..end].to_string())
                }
                character => {
                    return Err(ExpressionError::UnexpectedCharacter {
                        character,
                        position,
                    })
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }
}

#[derive(Clone, Debug)]
enum Node {
    Literal(String),
    Property(String),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare(Box<Node>, CompareOp, Box<Node>),
}

fn is_truthy(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn compare(left: Option<String>, op: CompareOp, right: Option<String>) -> bool {
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        _ => return op == CompareOp::Ne,
    };

    let ordering = match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(left), Ok(right)) => left.partial_cmp(&right),
        _ => Some(left.cmp(&right)),
    };

    ordering
        .map(|ordering| op.test(ordering))
        .unwrap_or(op == CompareOp::Ne)
}

impl Node {
    fn value(&self, context: &dyn ConditionContext) -> Option<String> {
        match self {
            Node::Literal(value) => Some(value.clone()),
            Node::Property(name) => context.property(name),
            node => Some(node.is_true(context).to_string()),
        }
    }

    fn is_true(&self, context: &dyn ConditionContext) -> bool {
        match self {
            Node::Literal(value) => is_truthy(value),
            Node::Property(name) => context
                .property(name)
                .map(|value| is_truthy(&value))
                .unwrap_or(false),
            Node::Not(node) => !node.is_true(context),
            Node::And(left, right) => left.is_true(context) && right.is_true(context),
            Node::Or(left, right) => left.is_true(context) || right.is_true(context),
            Node::Compare(left, op, right) => {
                compare(left.value(context), *op, right.value(context))
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn parse(mut self) -> Result<Node, ExpressionError> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }

        // evaluation recurses over the tree, so its size is bounded as well
        if self.tokens.len() > MAX_TOKENS {
            return Err(ExpressionError::TooLong(MAX_TOKENS));
        }

        let node = self.parse_or()?;
        match self.peek() {
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Ok(node),
        }
    }

    fn parse_or(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            node = Node::Or(Box::new(node), Box::new(self.parse_and()?));
        }

        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.position += 1;
            node = Node::And(Box::new(node), Box::new(self.parse_unary()?));
        }

        Ok(node)
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(ExpressionError::TooDeep(MAX_DEPTH))
        } else {
            Ok(())
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.position += 1;
            self.enter()?;
            let node = Node::Not(Box::new(self.parse_unary()?));
            self.depth -= 1;
            return Ok(node);
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node, ExpressionError> {
        let left = self.parse_primary()?;
        if let Some(Token::Compare(op)) = self.peek() {
            let op = *op;
            self.position += 1;
            return Ok(Node::Compare(
                Box::new(left),
                op,
                Box::new(self.parse_primary()?),
            ));
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        match self.next() {
            Some(Token::LeftParen) => {
                self.enter()?;
                let node = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RightParen) => Ok(node),
                    Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(Token::Property(name)) => Ok(Node::Property(name)),
            Some(Token::Literal(value)) => Ok(Node::Literal(value)),
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

/// Parsed expression, ready for evaluation.
#[derive(Clone, Debug)]
pub struct Expression {
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = Lexer::new(source).tokenize()?;
        Parser {
            tokens,
            position: 0,
            depth: 0,
        }
        .parse()
        .map(|root| Self { root })
    }

    /// Evaluates the expression using properties from given context.
    pub fn evaluate(&self, context: &dyn ConditionContext) -> bool {
        self.root.is_true(context)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use crate::condition::expression::{Expression, ExpressionError};
    use crate::condition::MockConditionContext;

    fn context(properties: &'static [(&'static str, &'static str)]) -> MockConditionContext {
        let mut context = MockConditionContext::new();
        context.expect_property().returning(move |name| {
            properties
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        });
        context
    }

    fn evaluate(source: &str, context: &MockConditionContext) -> bool {
        Expression::parse(source).unwrap().evaluate(context)
    }

    #[test]
    fn should_evaluate_property_references() {
        let context = context(&[("feature.enabled", "true"), ("maintenance", "false")]);

        assert!(evaluate("${feature.enabled}", &context));
        assert!(evaluate("${feature.enabled} && !${maintenance}", &context));
        assert!(!evaluate("${maintenance} || ${missing}", &context));
    }

    #[test]
    fn should_compare_values() {
        let context = context(&[("env", "prod"), ("port", "8080")]);

        assert!(evaluate("${env} == prod", &context));
        assert!(evaluate("${env} != 'dev'", &context));
        assert!(evaluate("${port} >= 1024 && ${port} < 65536", &context));
        assert!(evaluate("${port} == 8080.0", &context));
        assert!(!evaluate("${missing} == prod", &context));
        assert!(evaluate("${missing} != prod", &context));
    }

    #[test]
    fn should_respect_precedence() {
        let context = context(&[("a", "true")]);

        assert!(evaluate("${a} || ${b} && ${c}", &context));
        assert!(!evaluate("(${a} || ${b}) && ${c}", &context));
        assert!(evaluate("!(${b} && ${c})", &context));
    }

    #[test]
    fn should_report_errors() {
        assert_eq!(Expression::parse("  ").unwrap_err(), ExpressionError::Empty);
        assert_eq!(
            Expression::parse("${a").unwrap_err(),
            ExpressionError::UnterminatedProperty(0)
        );
        assert_eq!(
            Expression::parse("${a} == 'b").unwrap_err(),
            ExpressionError::UnterminatedString(8)
        );
        assert_eq!(
            Expression::parse("${a} = b").unwrap_err(),
            ExpressionError::UnexpectedCharacter {
                character: ' ',
                position: 6
            }
        );
        assert_eq!(
            Expression::parse("(${a}").unwrap_err(),
            ExpressionError::UnexpectedEnd
        );
        assert_eq!(
            Expression::parse("${a} ${b}").unwrap_err(),
            ExpressionError::UnexpectedToken("${b}".to_string())
        );
    }

    #[test]
    fn should_limit_nesting() {
        let context = context(&[("a", "true")]);

        let nested = format!("{}${{a}}{}", "(".repeat(32), ")".repeat(32));
        assert!(evaluate(&nested, &context));
        assert!(evaluate(&format!("{}${{a}}", "!!".repeat(16)), &context));

        assert_eq!(
            Expression::parse(&format!("{}${{a}}{}", "(".repeat(33), ")".repeat(33)))
                .unwrap_err(),
            ExpressionError::TooDeep(32)
        );
        assert_eq!(
            Expression::parse(&format!("{}${{a}}", "!".repeat(33))).unwrap_err(),
            ExpressionError::TooDeep(32)
        );
        assert_eq!(
            Expression::parse(&"(".repeat(100_000)).unwrap_err(),
            ExpressionError::TooLong(512)
        );
        assert_eq!(
            Expression::parse(&vec!["${a}"; 300].join(" && ")).unwrap_err(),
            ExpressionError::TooLong(512)
        );
    }
}
