//! Lexical checks for the restricted expression grammar.
//!
//! The scanner walks an expression once and does two jobs: it rejects
//! anything outside the grammar, and it collects every dotted path the
//! expression reads so the resolver can verify references at load time.
//!
//! Accepted tokens are identifiers, `.` attribute access, string and number
//! literals, the comparisons `==` `!=` `<` `<=` `>` `>=`, the words `and`
//! `or` `not` `in`, parentheses, and `[...]` list literals. Everything else
//! (filters, calls, tests, subscripts, slices, arithmetic, concatenation,
//! inline `if`/`else`, map literals) is refused before evaluation.

use crate::error::ExprError;

/// Boolean and membership operators.
const OPERATORS: [&str; 4] = ["and", "or", "not", "in"];

/// Literal words, never variable names.
const LITERALS: [&str; 6] = ["true", "false", "none", "True", "False", "None"];

/// A variable path read by an expression.
///
/// Only the first two segments matter for dependency checks: `inputs.flag`
/// has root `inputs` and member `flag`; `mr.author.name` has root `mr` and
/// member `author`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
  pub root: String,
  pub member: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Ident(String),
  Literal,
  Dot,
  Compare,
  Comma,
  LParen,
  RParen,
  LBracket,
  RBracket,
}

impl Token {
  /// Whether the token closes an operand, so a following `(` or `[` would
  /// apply to it.
  fn ends_operand(&self) -> bool {
    match self {
      Token::Ident(word) => !OPERATORS.contains(&word.as_str()),
      Token::Literal | Token::RParen | Token::RBracket => true,
      _ => false,
    }
  }
}

/// Scan an expression, returning the paths it references.
pub fn scan_references(expr: &str) -> Result<Vec<Reference>, ExprError> {
  let unsupported = |construct: &'static str| ExprError::Unsupported {
    expr: expr.to_string(),
    construct,
  };

  let tokens = tokenize(expr)?;
  let mut references: Vec<Reference> = Vec::new();

  for (i, token) in tokens.iter().enumerate() {
    let prev = i.checked_sub(1).map(|p| &tokens[p]);
    match token {
      Token::LParen if prev.is_some_and(Token::ends_operand) => {
        return Err(unsupported("function calls"));
      }
      Token::LBracket if prev.is_some_and(Token::ends_operand) => {
        return Err(unsupported("subscripts"));
      }
      Token::Dot if !matches!(tokens.get(i + 1), Some(Token::Ident(_))) => {
        return Err(ExprError::Syntax {
          expr: expr.to_string(),
          message: "expected an attribute name after '.'".to_string(),
        });
      }
      // An identifier after a dot is an attribute, not a new path
      Token::Ident(_) if prev == Some(&Token::Dot) => {}
      Token::Ident(word) => match word.as_str() {
        "is" => return Err(unsupported("tests")),
        "if" | "else" => return Err(unsupported("conditional expressions")),
        w if OPERATORS.contains(&w) || LITERALS.contains(&w) => {}
        _ => {
          let member = match (tokens.get(i + 1), tokens.get(i + 2)) {
            (Some(Token::Dot), Some(Token::Ident(member))) => Some(member.clone()),
            _ => None,
          };
          let reference = Reference {
            root: word.clone(),
            member,
          };
          if !references.contains(&reference) {
            references.push(reference);
          }
        }
      },
      _ => {}
    }
  }

  Ok(references)
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
  let unsupported = |construct: &'static str| ExprError::Unsupported {
    expr: expr.to_string(),
    construct,
  };

  let chars: Vec<char> = expr.chars().collect();
  let mut tokens: Vec<Token> = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    let next = chars.get(i + 1).copied();
    if c.is_whitespace() {
      i += 1;
    } else if c == '\'' || c == '"' {
      i = skip_string(expr, &chars, i)?;
      tokens.push(Token::Literal);
    } else if c.is_ascii_digit()
      || (c == '-'
        && next.is_some_and(|n| n.is_ascii_digit())
        && !tokens.last().is_some_and(Token::ends_operand))
    {
      // A leading minus is a negative literal only where an operand starts
      if c == '-' {
        i += 1;
      }
      while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
        // Decimal point only when followed by a digit, so `1.x` is not a float
        if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
          i += 1;
        }
      }
      tokens.push(Token::Literal);
    } else if c.is_alphabetic() || c == '_' {
      let start = i;
      while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
      }
      tokens.push(Token::Ident(chars[start..i].iter().collect()));
    } else {
      let (token, width) = match (c, next) {
        ('=', Some('=')) | ('!', Some('=')) | ('<', Some('=')) | ('>', Some('=')) => {
          (Token::Compare, 2)
        }
        ('<' | '>', _) => (Token::Compare, 1),
        ('.', _) => (Token::Dot, 1),
        (',', _) => (Token::Comma, 1),
        ('(', _) => (Token::LParen, 1),
        (')', _) => (Token::RParen, 1),
        ('[', _) => (Token::LBracket, 1),
        (']', _) => (Token::RBracket, 1),
        ('|', _) => return Err(unsupported("filters")),
        ('~', _) => return Err(unsupported("string concatenation")),
        ('+' | '-' | '*' | '/' | '%', _) => return Err(unsupported("arithmetic operators")),
        (':', _) => return Err(unsupported("slices")),
        ('{' | '}', _) => return Err(unsupported("map literals")),
        _ => {
          return Err(ExprError::Syntax {
            expr: expr.to_string(),
            message: format!("unexpected character '{}'", c),
          });
        }
      };
      tokens.push(token);
      i += width;
    }
  }

  Ok(tokens)
}

/// Skip a quoted string literal starting at `start`, returning the index
/// just past the closing quote.
fn skip_string(expr: &str, chars: &[char], start: usize) -> Result<usize, ExprError> {
  let quote = chars[start];
  let mut i = start + 1;
  while i < chars.len() {
    match chars[i] {
      '\\' => i += 2,
      c if c == quote => return Ok(i + 1),
      _ => i += 1,
    }
  }
  Err(ExprError::Syntax {
    expr: expr.to_string(),
    message: "unterminated string literal".to_string(),
  })
}
