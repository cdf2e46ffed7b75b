//! Label selector compilation and matching
//!
//! A [`Selector`] is a conjunction of requirements over an instance's
//! labels. It can be compiled from the string form used for targeting
//! (`app=web,tier in (a,b),!canary`) or from the structured form that
//! disruption budgets carry. Both forms reject malformed input with a
//! [`SelectorError`] instead of degrading to "matches nothing".
//!
//! A value set must name at least one member; `()` is rejected. An empty
//! member after a comma, as in `(a,)`, stands for the empty value.

use crate::error::SelectorError;
use crate::models::{LabelSelectorSpec, Labels};
use std::collections::BTreeSet;
use std::fmt;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// A single clause over one label key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals(String),
    NotEquals(String),
    In(BTreeSet<String>),
    NotIn(BTreeSet<String>),
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
}

impl Requirement {
    fn matches(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.key);
        match &self.operator {
            Operator::Equals(v) => value == Some(v),
            Operator::NotEquals(v) => value != Some(v),
            Operator::In(set) => value.is_some_and(|v| set.contains(v)),
            Operator::NotIn(set) => !value.is_some_and(|v| set.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(",");
        match &self.operator {
            Operator::Equals(v) => write!(f, "{}={}", self.key, v),
            Operator::NotEquals(v) => write!(f, "{}!={}", self.key, v),
            Operator::In(set) => write!(f, "{} in ({})", self.key, join(set)),
            Operator::NotIn(set) => write!(f, "{} notin ({})", self.key, join(set)),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Compiled label selector; every requirement must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every label set
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Parse the string form of a selector
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(input);
        Parser { tokens, pos: 0 }.parse()
    }

    /// Compile the structured selector carried by a budget
    pub fn compile(spec: &LabelSelectorSpec) -> Result<Self, SelectorError> {
        let mut requirements =
            Vec::with_capacity(spec.match_labels.len() + spec.match_expressions.len());

        for (key, value) in &spec.match_labels {
            validate_key(key)?;
            validate_value(key, value)?;
            requirements.push(Requirement {
                key: key.clone(),
                operator: Operator::Equals(value.clone()),
            });
        }

        for expr in &spec.match_expressions {
            validate_key(&expr.key)?;
            let operator = match expr.operator.as_str() {
                "In" | "NotIn" => {
                    if expr.values.is_empty() {
                        return Err(SelectorError::EmptyValues {
                            key: expr.key.clone(),
                            operator: expr.operator.clone(),
                        });
                    }
                    let mut set = BTreeSet::new();
                    for value in &expr.values {
                        validate_value(&expr.key, value)?;
                        set.insert(value.clone());
                    }
                    if expr.operator == "In" {
                        Operator::In(set)
                    } else {
                        Operator::NotIn(set)
                    }
                }
                "Exists" | "DoesNotExist" => {
                    if !expr.values.is_empty() {
                        return Err(SelectorError::UnexpectedValues {
                            key: expr.key.clone(),
                            operator: expr.operator.clone(),
                        });
                    }
                    if expr.operator == "Exists" {
                        Operator::Exists
                    } else {
                        Operator::DoesNotExist
                    }
                }
                other => return Err(SelectorError::UnknownOperator(other.to_string())),
            };
            requirements.push(Requirement {
                key: expr.key.clone(),
                operator,
            });
        }

        Ok(Self { requirements })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word,
    Equals,
    DoubleEquals,
    NotEquals,
    Bang,
    OpenParen,
    CloseParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    position: usize,
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let single = move |kind: TokenKind| Token {
            kind,
            text: c.to_string(),
            position: i,
        };
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '(' => {
                tokens.push(single(TokenKind::OpenParen));
                i += 1;
            }
            ')' => {
                tokens.push(single(TokenKind::CloseParen));
                i += 1;
            }
            ',' => {
                tokens.push(single(TokenKind::Comma));
                i += 1;
            }
            '=' | '!' => {
                let doubled = chars.get(i + 1) == Some(&'=');
                let (kind, text) = match (c, doubled) {
                    ('=', true) => (TokenKind::DoubleEquals, "=="),
                    ('=', false) => (TokenKind::Equals, "="),
                    ('!', true) => (TokenKind::NotEquals, "!="),
                    _ => (TokenKind::Bang, "!"),
                };
                tokens.push(Token {
                    kind,
                    text: text.to_string(),
                    position: i,
                });
                i += if doubled { 2 } else { 1 };
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | ',' | '=' | '!')
                {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Word,
                    text: chars[start..i].iter().collect(),
                    position: start,
                });
            }
        }
    }

    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut requirements = Vec::new();
        if self.tokens.is_empty() {
            return Ok(Selector { requirements });
        }

        loop {
            requirements.push(self.requirement()?);
            match self.next() {
                None => break,
                Some(t) if t.kind == TokenKind::Comma => continue,
                Some(t) => return Err(unexpected(&t, "',' or end of selector")),
            }
        }

        Ok(Selector { requirements })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, SelectorError> {
        match self.next() {
            Some(t) if t.kind == kind => Ok(t),
            Some(t) => Err(unexpected(&t, expected)),
            None => Err(SelectorError::UnexpectedEnd { expected }),
        }
    }

    fn key(&mut self) -> Result<String, SelectorError> {
        let token = self.expect(TokenKind::Word, "label key")?;
        validate_key(&token.text)?;
        Ok(token.text)
    }

    fn requirement(&mut self) -> Result<Requirement, SelectorError> {
        if self.peek().is_some_and(|t| t.kind == TokenKind::Bang) {
            self.pos += 1;
            let key = self.key()?;
            return Ok(Requirement {
                key,
                operator: Operator::DoesNotExist,
            });
        }

        let key = self.key()?;
        let Some(op) = self.peek().cloned() else {
            return Ok(Requirement {
                key,
                operator: Operator::Exists,
            });
        };

        let operator = match op.kind {
            TokenKind::Comma => Operator::Exists,
            TokenKind::Equals | TokenKind::DoubleEquals => {
                self.pos += 1;
                Operator::Equals(self.single_value(&key)?)
            }
            TokenKind::NotEquals => {
                self.pos += 1;
                Operator::NotEquals(self.single_value(&key)?)
            }
            TokenKind::Word if op.text == "in" => {
                self.pos += 1;
                Operator::In(self.value_set(&key, "in")?)
            }
            TokenKind::Word if op.text == "notin" => {
                self.pos += 1;
                Operator::NotIn(self.value_set(&key, "notin")?)
            }
            _ => return Err(unexpected(&op, "operator")),
        };

        Ok(Requirement { key, operator })
    }

    /// Value after `=` or `!=`; an absent value is the empty string
    fn single_value(&mut self, key: &str) -> Result<String, SelectorError> {
        let value = match self.peek() {
            Some(t) if t.kind == TokenKind::Word => {
                let text = t.text.clone();
                self.pos += 1;
                text
            }
            Some(t) if t.kind != TokenKind::Comma => return Err(unexpected(t, "label value")),
            _ => String::new(),
        };
        validate_value(key, &value)?;
        Ok(value)
    }

    fn value_set(&mut self, key: &str, operator: &str) -> Result<BTreeSet<String>, SelectorError> {
        self.expect(TokenKind::OpenParen, "'('")?;
        let mut values = BTreeSet::new();

        if self.peek().is_some_and(|t| t.kind == TokenKind::CloseParen) {
            return Err(SelectorError::EmptyValues {
                key: key.to_string(),
                operator: operator.to_string(),
            });
        }

        let mut after_comma = false;
        loop {
            let empty_member = after_comma
                && self
                    .peek()
                    .is_some_and(|t| matches!(t.kind, TokenKind::Comma | TokenKind::CloseParen));
            if empty_member {
                values.insert(String::new());
            } else {
                let value = self.expect(TokenKind::Word, "label value")?;
                validate_value(key, &value.text)?;
                values.insert(value.text);
            }
            after_comma = true;
            match self.next() {
                Some(t) if t.kind == TokenKind::Comma => continue,
                Some(t) if t.kind == TokenKind::CloseParen => break,
                Some(t) => return Err(unexpected(&t, "',' or ')'")),
                None => return Err(SelectorError::UnexpectedEnd { expected: "')'" }),
            }
        }

        Ok(values)
    }
}

fn unexpected(token: &Token, expected: &'static str) -> SelectorError {
    SelectorError::UnexpectedToken {
        token: token.text.clone(),
        position: token.position,
        expected,
    }
}

fn is_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            s.len() <= MAX_NAME_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_subdomain(s: &str) -> bool {
    s.len() <= MAX_PREFIX_LEN
        && s.split('.').all(|part| {
            let bytes = part.as_bytes();
            !bytes.is_empty()
                && bytes[0].is_ascii_alphanumeric()
                && bytes[bytes.len() - 1].is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        })
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let valid = match key.split_once('/') {
        Some((prefix, name)) => is_dns_subdomain(prefix) && is_name(name),
        None => is_name(key),
    };
    if valid {
        Ok(())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

fn validate_value(key: &str, value: &str) -> Result<(), SelectorError> {
    if value.is_empty() || is_name(value) {
        Ok(())
    } else {
        Err(SelectorError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = Selector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("app", "web")])));

        let selector = Selector::parse("   ").unwrap();
        assert!(selector.is_empty());
    }

    #[test]
    fn test_equality_and_inequality() {
        let selector = Selector::parse("app=web, tier==frontend").unwrap();
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "frontend")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));

        let selector = Selector::parse("app!=web").unwrap();
        assert!(selector.matches(&labels(&[("app", "api")])));
        assert!(selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_set_membership() {
        let selector = Selector::parse("env in (prod, staging)").unwrap();
        assert!(selector.matches(&labels(&[("env", "prod")])));
        assert!(!selector.matches(&labels(&[("env", "dev")])));
        assert!(!selector.matches(&labels(&[])));

        let selector = Selector::parse("env notin (prod)").unwrap();
        assert!(selector.matches(&labels(&[("env", "dev")])));
        assert!(selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_existence_and_absence() {
        let selector = Selector::parse("app,!canary").unwrap();
        assert!(selector.matches(&labels(&[("app", "x")])));
        assert!(!selector.matches(&labels(&[("app", "x"), ("canary", "true")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_empty_value_equality() {
        let selector = Selector::parse("app=").unwrap();
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_prefixed_keys() {
        let selector = Selector::parse("app.kubernetes.io/name=web").unwrap();
        assert!(selector.matches(&labels(&[("app.kubernetes.io/name", "web")])));
    }

    #[test]
    fn test_malformed_selectors_are_errors() {
        for bad in [
            "app=web,",
            "app in ()",
            "app in (a",
            "app in a",
            "=web",
            "app=web=x",
            "app ~ web",
            "-app=web",
            "app=-web-",
            "Bad_Prefix/app=web",
            "!",
        ] {
            assert!(Selector::parse(bad).is_err(), "expected error for {:?}", bad);
        }
    }

    #[test]
    fn test_trailing_empty_member_in_value_set() {
        let selector = Selector::parse("app in (a,)").unwrap();
        assert!(selector.matches(&labels(&[("app", "a")])));
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("app", "b")])));

        let selector = Selector::parse("app notin (a,,b)").unwrap();
        assert!(!selector.matches(&labels(&[("app", "")])));
        assert!(selector.matches(&labels(&[("app", "c")])));

        assert!(Selector::parse("app in (,a)").is_err());
    }

    #[test]
    fn test_name_and_value_length_limits() {
        let name63 = "a".repeat(63);
        let name64 = "a".repeat(64);

        assert!(Selector::parse(&format!("{}=web", name63)).is_ok());
        assert!(matches!(
            Selector::parse(&format!("{}=web", name64)),
            Err(SelectorError::InvalidKey(_))
        ));

        assert!(Selector::parse(&format!("app={}", name63)).is_ok());
        assert!(matches!(
            Selector::parse(&format!("app={}", name64)),
            Err(SelectorError::InvalidValue { .. })
        ));

        assert!(Selector::parse(&format!("example.com/{}", name63)).is_ok());
        assert!(Selector::parse(&format!("example.com/{}", name64)).is_err());
    }

    #[test]
    fn test_prefix_length_limit() {
        // four labels of 63 plus three dots is 255
        let label = "a".repeat(63);
        let long_prefix = [label.as_str(); 4].join(".");
        assert!(long_prefix.len() > 253);
        assert!(matches!(
            Selector::parse(&format!("{}/app=web", long_prefix)),
            Err(SelectorError::InvalidKey(_))
        ));

        let prefix253 = format!("{}.{}", [label.as_str(); 3].join("."), "a".repeat(61));
        assert_eq!(prefix253.len(), 253);
        assert!(Selector::parse(&format!("{}/app=web", prefix253)).is_ok());
    }

    #[test]
    fn test_error_reports_position() {
        let err = Selector::parse("app in a").unwrap_err();
        assert_eq!(
            err,
            SelectorError::UnexpectedToken {
                token: "a".to_string(),
                position: 7,
                expected: "'('",
            }
        );
    }

    #[test]
    fn test_compile_structured_selector() {
        let spec = LabelSelectorSpec::default()
            .match_label("app", "web")
            .match_expression("env", "In", &["prod", "staging"])
            .match_expression("canary", "DoesNotExist", &[]);
        let selector = Selector::compile(&spec).unwrap();

        assert!(selector.matches(&labels(&[("app", "web"), ("env", "prod")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("env", "dev")])));
        assert!(!selector.matches(&labels(&[
            ("app", "web"),
            ("env", "prod"),
            ("canary", "1")
        ])));
        assert_eq!(selector.to_string(), "app=web,env in (prod,staging),!canary");
    }

    #[test]
    fn test_compile_empty_spec_matches_everything() {
        let selector = Selector::compile(&LabelSelectorSpec::default()).unwrap();
        assert!(selector.matches(&labels(&[("anything", "goes")])));
    }

    #[test]
    fn test_compile_rejects_invalid_expressions() {
        let unknown = LabelSelectorSpec::default().match_expression("app", "Matches", &["x"]);
        assert_eq!(
            Selector::compile(&unknown),
            Err(SelectorError::UnknownOperator("Matches".to_string()))
        );

        let empty_in = LabelSelectorSpec::default().match_expression("app", "In", &[]);
        assert!(matches!(
            Selector::compile(&empty_in),
            Err(SelectorError::EmptyValues { .. })
        ));

        let exists_with_values =
            LabelSelectorSpec::default().match_expression("app", "Exists", &["x"]);
        assert!(matches!(
            Selector::compile(&exists_with_values),
            Err(SelectorError::UnexpectedValues { .. })
        ));

        let bad_key = LabelSelectorSpec::default().match_label("bad key", "x");
        assert!(matches!(
            Selector::compile(&bad_key),
            Err(SelectorError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let selector = Selector::parse("app=web,env notin (dev,qa),!canary,tier").unwrap();
        let reparsed = Selector::parse(&selector.to_string()).unwrap();
        assert_eq!(selector, reparsed);
    }
}
