//! Parsing skill documents from text.

use std::path::Path;

use crate::error::ParseError;
use crate::skill::SkillDef;

/// Serialization format of a skill document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
  Yaml,
  Json,
}

impl DocumentFormat {
  /// File extensions recognised as skill documents, in lookup order.
  pub const EXTENSIONS: [&'static str; 3] = ["yaml", "yml", "json"];

  /// Detect the format from a file extension.
  pub fn from_path(path: &Path) -> Option<Self> {
    match path.extension().and_then(|e| e.to_str()) {
      Some("yaml") | Some("yml") => Some(Self::Yaml),
      Some("json") => Some(Self::Json),
      _ => None,
    }
  }
}

impl SkillDef {
  /// Parse a skill document in the given format.
  pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, ParseError> {
    match format {
      DocumentFormat::Yaml => Ok(serde_yaml::from_str(content)?),
      DocumentFormat::Json => Ok(serde_json::from_str(content)?),
    }
  }

  pub fn from_yaml(content: &str) -> Result<Self, ParseError> {
    Self::parse(content, DocumentFormat::Yaml)
  }

  pub fn from_json(content: &str) -> Result<Self, ParseError> {
    Self::parse(content, DocumentFormat::Json)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ArgValue, InputType, OnError};

  const REVIEW_SKILL: &str = r#"
name: review_mr
description: Review a merge request
inputs:
  - name: project
    type: string
    required: true
  - name: iid
    type: integer
    required: true
  - name: post_comment
    type: boolean
    default: false
steps:
  - name: fetch
    tool: gitlab_mr_view
    args:
      project: "{{ inputs.project }}"
      iid: "{{ inputs.iid }}"
    output: mr
  - name: summarize
    tool: compute
    compute: collect
    args:
      title: "{{ mr.title }}"
    output: summary
    on_error: continue
  - name: comment
    tool: gitlab_mr_comment
    condition: "inputs.post_comment and mr"
    args:
      body: "Reviewed {{ summary.title }}"
outputs:
  - name: title
    value: "{{ summary.title }}"
"#;

  #[test]
  fn test_parse_yaml_skill() {
    let skill = SkillDef::from_yaml(REVIEW_SKILL).unwrap();

    assert_eq!(skill.name, "review_mr");
    assert_eq!(skill.version, "1.0");
    assert_eq!(skill.inputs.len(), 3);
    assert_eq!(skill.inputs[1].input_type, InputType::Integer);
    assert_eq!(skill.inputs[2].default, Some(serde_json::json!(false)));
    assert_eq!(skill.steps.len(), 3);

    let summarize = &skill.steps[1];
    assert!(summarize.is_compute());
    assert_eq!(summarize.compute.as_deref(), Some("collect"));
    assert_eq!(summarize.on_error, OnError::Continue);
    assert_eq!(skill.steps[0].on_error, OnError::Fail);
    assert_eq!(
      skill.steps[2].args["body"],
      ArgValue::Template("Reviewed {{ summary.title }}".to_string())
    );
    assert_eq!(skill.outputs[0].value, "{{ summary.title }}");
  }

  #[test]
  fn test_parse_json_skill() {
    let content = r#"{
      "name": "status",
      "steps": [{ "name": "get", "tool": "get_status", "output": "s" }],
      "outputs": [{ "name": "ok", "value": "{{ s.success }}" }]
    }"#;

    let skill = SkillDef::from_json(content).unwrap();
    assert_eq!(skill.steps[0].output.as_deref(), Some("s"));
    assert!(skill.inputs.is_empty());
  }

  #[test]
  fn test_unknown_fields_rejected() {
    let content = "name: x\nsteps:\n  - name: a\n    tool: t\n    retries: 3\n";
    assert!(matches!(
      SkillDef::from_yaml(content),
      Err(ParseError::Yaml(_))
    ));
  }

  #[test]
  fn test_parse_is_deterministic() {
    let first = SkillDef::from_yaml(REVIEW_SKILL).unwrap();
    let second = SkillDef::from_yaml(REVIEW_SKILL).unwrap();
    assert_eq!(first, second);
  }

  #[test]
  fn test_format_from_path() {
    assert_eq!(
      DocumentFormat::from_path(Path::new("skills/a.yml")),
      Some(DocumentFormat::Yaml)
    );
    assert_eq!(
      DocumentFormat::from_path(Path::new("a.json")),
      Some(DocumentFormat::Json)
    );
    assert_eq!(DocumentFormat::from_path(Path::new("a.md")), None);
  }
}
