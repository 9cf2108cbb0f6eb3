//! Definition parsing.
//!
//! Plugin definitions are written as small s-expressions:
//!
//! ```text
//! (if-args (ssh-exec-parallel) (if-one-target (ssh-login) (tmux-cssh)))
//! ```
//!
//! An atom is any run of characters other than Unicode whitespace and
//! parentheses.
//! There is no quoting or escaping. Every list must be non-empty and start
//! with an atom, which names the plugin; the rest of the list are its
//! arguments.

use crate::error::{Result, SshfanError};
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, map},
    multi::many0,
    sequence::{delimited, preceded, terminated},
};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A bare token.
    Atom(String),
    /// A parenthesised sequence of expressions.
    List(Vec<Expr>),
}

impl Expr {
    /// Split a list into its head name and arguments.
    ///
    /// Returns `None` for atoms and for lists that do not start with an atom.
    pub fn as_form(&self) -> Option<(&str, &[Expr])> {
        match self {
            Expr::List(items) => match items.split_first() {
                Some((Expr::Atom(head), rest)) => Some((head.as_str(), rest)),
                _ => None,
            },
            Expr::Atom(_) => None,
        }
    }
}

/// Deepest list nesting a definition may use.
pub const MAX_DEPTH: usize = 64;

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')'
}

/// Any run of whitespace, using the same notion of whitespace that ends an atom.
fn separator(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace)(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    map(take_while1(is_atom_char), |s: &str| Expr::Atom(s.to_string()))(input)
}

fn list(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            char('('),
            many0(preceded(separator, expr)),
            preceded(separator, char(')')),
        ),
        Expr::List,
    )(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    alt((list, atom))(input)
}

/// Parse a definition into a single top-level list.
///
/// # Errors
///
/// Returns [`SshfanError::ParseError`] if parentheses are unbalanced or nest
/// deeper than [`MAX_DEPTH`], the definition is empty, contains more than one
/// top-level expression, is a bare atom, or contains a list that is empty or
/// not headed by an atom.
///
/// # Examples
///
/// ```
/// use sshfan::sexp::{parse, Expr};
///
/// let expr = parse("(ec2-instance-id us-east-1)").unwrap();
/// assert_eq!(
///     expr,
///     Expr::List(vec![
///         Expr::Atom("ec2-instance-id".into()),
///         Expr::Atom("us-east-1".into()),
///     ])
/// );
/// ```
pub fn parse(definition: &str) -> Result<Expr> {
    let fail = |reason: String| SshfanError::ParseError {
        definition: definition.to_string(),
        reason,
    };

    check_balance(definition).map_err(fail)?;

    let (_, parsed) = all_consuming(terminated(preceded(separator, expr), separator))(definition)
        .map_err(|_| fail("expected exactly one top-level expression".into()))?;

    if let Expr::Atom(token) = &parsed {
        return Err(fail(format!(
            "expected a parenthesised plugin definition, got bare token \"{}\"",
            token
        )));
    }
    check_forms(&parsed).map_err(fail)?;

    Ok(parsed)
}

/// Report unbalanced or too deeply nested parentheses with the offending offset.
fn check_balance(definition: &str) -> std::result::Result<(), String> {
    if definition.trim().is_empty() {
        return Err("definition is empty".into());
    }

    let mut depth = 0usize;
    for (offset, c) in definition.char_indices() {
        match c {
            '(' => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(format!(
                        "nesting deeper than {} levels at offset {}",
                        MAX_DEPTH, offset
                    ));
                }
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unexpected ')' at offset {}", offset))?;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(format!("{} unclosed '('", depth));
    }
    Ok(())
}

/// Every list must be non-empty and headed by an atom.
fn check_forms(expr: &Expr) -> std::result::Result<(), String> {
    match expr {
        Expr::Atom(_) => Ok(()),
        Expr::List(items) => match items.first() {
            None => Err("empty expression \"()\"".into()),
            Some(Expr::List(_)) => Err("plugin name must be a bare token".into()),
            Some(Expr::Atom(_)) => items.iter().skip(1).try_for_each(check_forms),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Expr {
        Expr::Atom(s.to_string())
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse("(id)").unwrap(), Expr::List(vec![atom("id")]));
    }

    #[test]
    fn test_parse_nested() {
        let parsed = parse("(if-args (ssh-exec)\n  (if-one-target (ssh-login) (csshx)))").unwrap();
        assert_eq!(
            parsed,
            Expr::List(vec![
                atom("if-args"),
                Expr::List(vec![atom("ssh-exec")]),
                Expr::List(vec![
                    atom("if-one-target"),
                    Expr::List(vec![atom("ssh-login")]),
                    Expr::List(vec![atom("csshx")]),
                ]),
            ])
        );
    }

    #[test]
    fn test_parse_whitespace_is_insignificant() {
        assert_eq!(
            parse("  ( list(id)  ( first ) )  ").unwrap(),
            parse("(list (id) (first))").unwrap()
        );
    }

    #[test]
    fn test_parse_atoms_keep_punctuation() {
        assert_eq!(
            parse("(ec2-instance-id eu-west-1)").unwrap(),
            Expr::List(vec![atom("ec2-instance-id"), atom("eu-west-1")])
        );
    }

    #[test]
    fn test_as_form() {
        let parsed = parse("(ec2-instance-id us-east-1)").unwrap();
        let (head, args) = parsed.as_form().unwrap();
        assert_eq!(head, "ec2-instance-id");
        assert_eq!(args, &[atom("us-east-1")]);
        assert!(atom("x").as_form().is_none());
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "   ",
            "(id",
            "id)",
            "((id)",
            "(id))",
            "()",
            "(list ())",
            "((id) x)",
            "id",
            "(id) (first)",
        ] {
            match parse(bad) {
                Err(SshfanError::ParseError { definition, .. }) => assert_eq!(definition, bad),
                other => panic!("expected parse error for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_parse_unicode_whitespace_separates() {
        assert_eq!(
            parse("(list\x0c(id)\u{a0}(first))").unwrap(),
            parse("(list (id) (first))").unwrap()
        );
        assert_eq!(
            parse("(ec2-instance-id\x0bus-east-1)").unwrap(),
            Expr::List(vec![atom("ec2-instance-id"), atom("us-east-1")])
        );
        assert_eq!(parse("\u{a0}(id)\x0c").unwrap(), Expr::List(vec![atom("id")]));
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let nested = |depth: usize| format!("{}id{}", "(a ".repeat(depth), ")".repeat(depth));

        assert!(parse(&nested(MAX_DEPTH)).is_ok());

        let deep = nested(20_000);
        match parse(&deep) {
            Err(SshfanError::ParseError { reason, .. }) => {
                assert!(reason.contains("nesting deeper than"), "{}", reason)
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_reason_names_offset() {
        let err = parse("(id))").unwrap_err();
        assert!(err.to_string().contains("offset 4"), "{}", err);
    }
}
