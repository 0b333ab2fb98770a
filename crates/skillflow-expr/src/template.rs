use crate::error::ExprError;

/// A piece of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
  /// Text copied through unchanged.
  Literal(&'a str),
  /// The trimmed expression inside a `{{ }}` marker.
  Expr(&'a str),
}

/// Split a template into literal text and `{{ expr }}` markers.
///
/// Block tags such as `{% if %}` are not markers and stay in the literal
/// text.
pub fn segments(template: &str) -> Result<Vec<Segment<'_>>, ExprError> {
  let mut out = Vec::new();
  let mut rest = template;

  while let Some(open) = rest.find("{{") {
    if open > 0 {
      out.push(Segment::Literal(&rest[..open]));
    }
    let after_open = &rest[open + 2..];
    let Some(close) = after_open.find("}}") else {
      return Err(ExprError::UnterminatedMarker {
        template: template.to_string(),
      });
    };
    let inner = after_open[..close].trim();
    if inner.is_empty() {
      return Err(ExprError::EmptyMarker {
        template: template.to_string(),
      });
    }
    out.push(Segment::Expr(inner));
    rest = &after_open[close + 2..];
  }

  if !rest.is_empty() {
    out.push(Segment::Literal(rest));
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_plain_text() {
    assert_eq!(segments("hello").unwrap(), vec![Segment::Literal("hello")]);
    assert!(segments("").unwrap().is_empty());
  }

  #[test]
  fn test_mixed() {
    let parts = segments("MR !{{ inputs.mr_id }} by {{author}}.").unwrap();
    assert_eq!(
      parts,
      vec![
        Segment::Literal("MR !"),
        Segment::Expr("inputs.mr_id"),
        Segment::Literal(" by "),
        Segment::Expr("author"),
        Segment::Literal("."),
      ]
    );
  }

  #[test]
  fn test_block_tags_are_literal() {
    let parts = segments("{% if x %}{{ x }}").unwrap();
    assert_eq!(parts, vec![Segment::Literal("{% if x %}"), Segment::Expr("x")]);
  }

  #[test]
  fn test_unterminated_marker() {
    assert!(matches!(
      segments("value: {{ x"),
      Err(ExprError::UnterminatedMarker { .. })
    ));
  }

  #[test]
  fn test_empty_marker() {
    assert!(matches!(segments("a {{  }} b"), Err(ExprError::EmptyMarker { .. })));
  }
}
