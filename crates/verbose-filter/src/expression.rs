//! Expression filter: `&`, `|`, `!` and parentheses over subject/permission terms.
//!
//! A term matches when it equals the check subject (ignoring case) or is a case-insensitive
//! prefix of the permission. `!` binds tighter than `&`, which binds tighter than `|`.
//!
//! ```text
//! luck | (admin & !essentials.fly)
//! ```

use verbose_types::{CheckEvent, CheckFilter, FilterError};

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    Open,
    Close,
    Term(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::And => "&".to_string(),
            Token::Or => "|".to_string(),
            Token::Not => "!".to_string(),
            Token::Open => "(".to_string(),
            Token::Close => ")".to_string(),
            Token::Term(t) => t.clone(),
        }
    }
}

fn tokenize(expr: &str) -> Vec<(usize, Token)> {
    let mut tokens = Vec::new();
    let mut term = String::new();
    let mut term_start = 0;

    for (pos, c) in expr.char_indices() {
        let op = match c {
            '&' => Some(Token::And),
            '|' => Some(Token::Or),
            '!' => Some(Token::Not),
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            _ => None,
        };
        if op.is_some() || c.is_whitespace() {
            if !term.is_empty() {
                tokens.push((term_start, Token::Term(std::mem::take(&mut term))));
            }
            if let Some(op) = op {
                tokens.push((pos, op));
            }
            continue;
        }
        if term.is_empty() {
            term_start = pos;
        }
        term.extend(c.to_lowercase());
    }
    if !term.is_empty() {
        tokens.push((term_start, Token::Term(term)));
    }
    tokens
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Term(String),
    Not(Box<Node>),
    /// Operands of a flat `a & b & ...` chain; a chain never nests into itself.
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    /// `subject` and `permission` are already lowercased.
    fn eval(&self, subject: &str, permission: &str) -> bool {
        match self {
            Node::Term(t) => subject == t || permission.starts_with(t.as_str()),
            Node::Not(inner) => !inner.eval(subject, permission),
            Node::And(nodes) => nodes.iter().all(|n| n.eval(subject, permission)),
            Node::Or(nodes) => nodes.iter().any(|n| n.eval(subject, permission)),
        }
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn unexpected(&self) -> FilterError {
        match self.tokens.get(self.pos) {
            Some((position, token)) => FilterError::UnexpectedToken {
                token: token.describe(),
                position: *position,
            },
            None => FilterError::UnexpectedEnd,
        }
    }

    fn descend(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FilterError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse(mut self) -> Result<Node, FilterError> {
        let node = self.parse_or()?;
        match self.peek() {
            None => Ok(node),
            Some(Token::Close) => Err(FilterError::UnbalancedParens),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn parse_or(&mut self) -> Result<Node, FilterError> {
        let mut nodes = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            nodes.push(self.parse_and()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Node::Or(nodes)
        })
    }

    fn parse_and(&mut self) -> Result<Node, FilterError> {
        let mut nodes = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            nodes.push(self.parse_unary()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Node::And(nodes)
        })
    }

    fn parse_unary(&mut self) -> Result<Node, FilterError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Node::Not(Box::new(inner)))
            }
            Some(Token::Open) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(match self.peek() {
                        None => FilterError::UnbalancedParens,
                        Some(_) => self.unexpected(),
                    });
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Term(t)) => {
                let node = Node::Term(t.clone());
                self.pos += 1;
                Ok(node)
            }
            _ => Err(self.unexpected()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Compiled {
    Any,
    Nothing,
    Expr(Node),
}

/// Filter parsed once from an expression string.
///
/// An empty expression matches every check. A malformed one matches none.
#[derive(Debug, Clone)]
pub struct ExpressionFilter {
    expression: String,
    compiled: Compiled,
}

impl ExpressionFilter {
    /// Parse an expression; malformed input yields a filter that matches nothing.
    pub fn parse(expression: &str) -> Self {
        match Self::try_parse(expression) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::warn!(expression, error = %e, "malformed filter, matching nothing");
                Self {
                    expression: expression.trim().to_string(),
                    compiled: Compiled::Nothing,
                }
            }
        }
    }

    pub fn try_parse(expression: &str) -> Result<Self, FilterError> {
        let expression = expression.trim();
        let tokens = tokenize(expression);
        let compiled = if tokens.is_empty() {
            Compiled::Any
        } else {
            let parser = Parser {
                tokens,
                pos: 0,
                depth: 0,
            };
            Compiled::Expr(parser.parse()?)
        };
        Ok(Self {
            expression: expression.to_string(),
            compiled,
        })
    }
}

impl CheckFilter for ExpressionFilter {
    fn matches(&self, event: &CheckEvent) -> bool {
        match &self.compiled {
            Compiled::Any => true,
            Compiled::Nothing => false,
            Compiled::Expr(node) => node.eval(
                &event.subject.to_lowercase(),
                &event.permission.to_lowercase(),
            ),
        }
    }

    fn expression(&self) -> &str {
        &self.expression
    }
}

/// Whether `expression` parses; front-ends use this to reject a filter before recording.
pub fn is_valid_filter(expression: &str) -> bool {
    ExpressionFilter::try_parse(expression).is_ok()
}
