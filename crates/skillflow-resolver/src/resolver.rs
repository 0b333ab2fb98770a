use std::collections::{HashMap, HashSet};

use serde_json::Value;
use skillflow_config::{InputDef, InputType, SkillDef, StepDef};
use skillflow_expr::{Evaluator, ExprError, Reference};
use skillflow_workflow::{
  DefinitionError, Operation, OperationCatalog, RESERVED_NAMES, Step, WorkflowDefinition,
};

/// Resolver transforms a parsed skill document into a locked definition.
pub trait Resolver: Send + Sync {
  /// Validate a skill document and lock it.
  ///
  /// This process:
  /// 1. Checks inputs, step names and output names for uniqueness
  /// 2. Resolves every step's operation against the available catalog
  /// 3. Checks that conditions, arguments and outputs only read declared
  ///    inputs or outputs of earlier steps
  /// 4. Checks that fan-out groups are contiguous and internally independent
  fn resolve(&self, def: SkillDef, digest: String) -> Result<WorkflowDefinition, DefinitionError>;
}

/// Standard resolver implementation backed by an operation catalog.
pub struct StandardResolver<C: OperationCatalog> {
  catalog: C,
  evaluator: Evaluator,
}

/// Which names a step may read, tracked while walking steps in order.
#[derive(Default)]
struct Visibility {
  inputs: HashSet<String>,
  /// Outputs of steps that have fully completed before the current stage.
  available: HashSet<String>,
  /// Outputs of members of the fan-out group being walked.
  group: HashSet<String>,
  /// Every output name in the document, mapped to the declaring step index.
  declared: HashMap<String, usize>,
}

enum Site<'a> {
  Step(&'a str),
  Output(&'a str),
}

impl Site<'_> {
  fn error(&self, reason: String) -> DefinitionError {
    match self {
      Self::Step(step) => DefinitionError::at_step(*step, reason),
      Self::Output(name) => DefinitionError::new(format!("output '{}': {}", name, reason)),
    }
  }
}

impl<C: OperationCatalog> StandardResolver<C> {
  /// Create a new resolver with the given operation catalog.
  pub fn new(catalog: C) -> Self {
    Self {
      catalog,
      evaluator: Evaluator::new(),
    }
  }

  fn validate_inputs(&self, inputs: &[InputDef]) -> Result<HashSet<String>, DefinitionError> {
    let mut names = HashSet::new();
    for input in inputs {
      if input.name.is_empty() {
        return Err(DefinitionError::new("input with an empty name"));
      }
      if RESERVED_NAMES.contains(&input.name.as_str()) {
        return Err(DefinitionError::new(format!(
          "input name '{}' is reserved",
          input.name
        )));
      }
      if !names.insert(input.name.clone()) {
        return Err(DefinitionError::new(format!(
          "duplicate input name '{}'",
          input.name
        )));
      }
      if let Some(default) = &input.default
        && !default_matches(input.input_type, default)
      {
        return Err(DefinitionError::new(format!(
          "default for input '{}' is not a valid {}",
          input.name,
          input.input_type.as_str()
        )));
      }
    }
    Ok(names)
  }

  /// Collect step output names, rejecting duplicates and clashes.
  fn collect_outputs(
    &self,
    steps: &[StepDef],
    inputs: &HashSet<String>,
  ) -> Result<HashMap<String, usize>, DefinitionError> {
    let mut step_names = HashSet::new();
    let mut outputs = HashMap::new();

    for (index, step) in steps.iter().enumerate() {
      if step.name.is_empty() {
        return Err(DefinitionError::new(format!(
          "step {} has an empty name",
          index + 1
        )));
      }
      if !step_names.insert(step.name.as_str()) {
        return Err(DefinitionError::at_step(
          &step.name,
          format!("duplicate step name '{}'", step.name),
        ));
      }

      let Some(output) = &step.output else {
        continue;
      };
      if output.is_empty() {
        return Err(DefinitionError::at_step(&step.name, "empty output name"));
      }
      if RESERVED_NAMES.contains(&output.as_str()) {
        return Err(DefinitionError::at_step(
          &step.name,
          format!("output name '{}' is reserved", output),
        ));
      }
      if inputs.contains(output) {
        return Err(DefinitionError::at_step(
          &step.name,
          format!("output name '{}' shadows an input", output),
        ));
      }
      if outputs.insert(output.clone(), index).is_some() {
        return Err(DefinitionError::at_step(
          &step.name,
          format!("duplicate output name '{}'", output),
        ));
      }
    }

    Ok(outputs)
  }

  fn resolve_operation(&self, step: &StepDef) -> Result<Operation, DefinitionError> {
    if step.is_compute() {
      let Some(function) = &step.compute else {
        return Err(DefinitionError::at_step(
          &step.name,
          "compute step is missing a 'compute' function name",
        ));
      };
      if !self.catalog.has_compute(function) {
        return Err(DefinitionError::at_step(
          &step.name,
          format!("unknown compute function '{}'", function),
        ));
      }
      return Ok(Operation::Compute(function.clone()));
    }

    if step.compute.is_some() {
      return Err(DefinitionError::at_step(
        &step.name,
        format!("'compute' is only valid with tool '{}'", skillflow_config::COMPUTE_TOOL),
      ));
    }
    if step.tool.is_empty() {
      return Err(DefinitionError::at_step(&step.name, "missing tool"));
    }
    if !self.catalog.has_operation(&step.tool) {
      return Err(DefinitionError::at_step(
        &step.name,
        format!("unknown operation '{}'", step.tool),
      ));
    }
    Ok(Operation::External(step.tool.clone()))
  }

  /// Collect every reference a step reads from its condition and arguments.
  fn step_references(&self, step: &StepDef) -> Result<Vec<Reference>, DefinitionError> {
    let mut references = Vec::new();

    if let Some(condition) = &step.condition {
      let found = self
        .evaluator
        .check_expression(condition)
        .map_err(|e| expr_error(&step.name, "condition", e))?;
      references.extend(found);
    }

    for (name, arg) in &step.args {
      if !arg.is_template() {
        continue;
      }
      let found = self
        .evaluator
        .check_template(arg.as_str())
        .map_err(|e| expr_error(&step.name, &format!("argument '{}'", name), e))?;
      references.extend(found);
    }

    Ok(references)
  }

  fn check_reference(
    &self,
    site: &Site<'_>,
    index: usize,
    reference: &Reference,
    visibility: &Visibility,
  ) -> Result<(), DefinitionError> {
    match (reference.root.as_str(), reference.member.as_deref()) {
      ("inputs", Some(member)) => {
        if visibility.inputs.contains(member) {
          Ok(())
        } else {
          Err(site.error(format!("references undeclared input '{}'", member)))
        }
      }
      ("results", Some(member)) => self.check_output(site, index, member, visibility),
      (root @ ("inputs" | "results"), None) => Err(site.error(format!(
        "reads '{}' as a whole; name a member like '{}.<name>'",
        root, root
      ))),
      (root, _) if visibility.inputs.contains(root) => Ok(()),
      (root, _) => self.check_output(site, index, root, visibility),
    }
  }

  fn check_output(
    &self,
    site: &Site<'_>,
    index: usize,
    name: &str,
    visibility: &Visibility,
  ) -> Result<(), DefinitionError> {
    if visibility.available.contains(name) {
      return Ok(());
    }
    if visibility.group.contains(name) {
      return Err(site.error(format!(
        "reads '{}', which is produced in the same parallel group",
        name
      )));
    }
    match visibility.declared.get(name) {
      Some(declared) if *declared >= index => Err(site.error(format!(
        "references '{}' before the step that produces it",
        name
      ))),
      _ => Err(site.error(format!("references undeclared name '{}'", name))),
    }
  }
}

impl<C: OperationCatalog> Resolver for StandardResolver<C> {
  fn resolve(&self, def: SkillDef, digest: String) -> Result<WorkflowDefinition, DefinitionError> {
    if def.name.trim().is_empty() {
      return Err(DefinitionError::new("skill name is empty"));
    }

    let inputs = self.validate_inputs(&def.inputs)?;
    let declared = self.collect_outputs(&def.steps, &inputs)?;
    let mut visibility = Visibility {
      inputs,
      declared,
      ..Default::default()
    };

    let mut current_group: Option<&str> = None;
    let mut closed_groups: HashSet<&str> = HashSet::new();
    let mut steps = Vec::with_capacity(def.steps.len());

    for (index, step_def) in def.steps.iter().enumerate() {
      // A step outside the current group closes it and publishes its outputs
      if current_group.is_some() && current_group != step_def.parallel.as_deref() {
        if let Some(group) = current_group.take() {
          closed_groups.insert(group);
        }
        let finished: Vec<String> = visibility.group.drain().collect();
        visibility.available.extend(finished);
      }
      if let Some(group) = step_def.parallel.as_deref()
        && current_group.is_none()
      {
        if group.is_empty() {
          return Err(DefinitionError::at_step(&step_def.name, "empty parallel group name"));
        }
        if closed_groups.contains(group) {
          return Err(DefinitionError::at_step(
            &step_def.name,
            format!("parallel group '{}' is not contiguous", group),
          ));
        }
        current_group = Some(group);
      }

      let operation = self.resolve_operation(step_def)?;

      if step_def.timeout_ms == Some(0) {
        return Err(DefinitionError::at_step(
          &step_def.name,
          "timeout_ms must be greater than zero",
        ));
      }

      let site = Site::Step(&step_def.name);
      for reference in self.step_references(step_def)? {
        self.check_reference(&site, index, &reference, &visibility)?;
      }

      if let Some(output) = &step_def.output {
        if current_group.is_some() {
          visibility.group.insert(output.clone());
        } else {
          visibility.available.insert(output.clone());
        }
      }

      steps.push(Step {
        name: step_def.name.clone(),
        description: step_def.description.clone(),
        operation,
        args: step_def.args.clone(),
        condition: step_def.condition.clone(),
        output: step_def.output.clone(),
        on_error: step_def.on_error,
        parallel: step_def.parallel.clone(),
        timeout_ms: step_def.timeout_ms,
      });
    }

    let finished: Vec<String> = visibility.group.drain().collect();
    visibility.available.extend(finished);

    let mut output_names = HashSet::new();
    for output in &def.outputs {
      if output.name.is_empty() {
        return Err(DefinitionError::new("output with an empty name"));
      }
      if !output_names.insert(output.name.as_str()) {
        return Err(DefinitionError::new(format!(
          "duplicate skill output '{}'",
          output.name
        )));
      }
      let site = Site::Output(&output.name);
      let references = self
        .evaluator
        .check_template(&output.value)
        .map_err(|e| site.error(e.to_string()))?;
      for reference in references {
        self.check_reference(&site, def.steps.len(), &reference, &visibility)?;
      }
    }

    Ok(WorkflowDefinition {
      name: def.name,
      version: def.version,
      description: def.description,
      inputs: def.inputs,
      steps,
      outputs: def.outputs,
      digest,
    })
  }
}

fn expr_error(step: &str, what: &str, error: ExprError) -> DefinitionError {
  DefinitionError::at_step(step, format!("invalid {}: {}", what, error))
}

/// Whether a default value has the declared input type.
fn default_matches(input_type: InputType, value: &Value) -> bool {
  match input_type {
    InputType::String => value.is_string(),
    InputType::Integer => value.is_i64() || value.is_u64(),
    InputType::Boolean => value.is_boolean(),
    InputType::Array => value.is_array(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Catalog;

  impl OperationCatalog for Catalog {
    fn has_operation(&self, name: &str) -> bool {
      matches!(name, "get_mr" | "get_pipeline" | "lint" | "post_comment")
    }

    fn has_compute(&self, name: &str) -> bool {
      name == "collect"
    }
  }

  fn resolve(yaml: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def = SkillDef::from_yaml(yaml).unwrap();
    StandardResolver::new(Catalog).resolve(def, "sha256:test".to_string())
  }

  const REVIEW: &str = r#"
name: review_mr
inputs:
  - name: mr_id
    required: true
  - name: strict
    type: boolean
    default: false
steps:
  - name: fetch
    tool: get_mr
    args:
      id: "{{ inputs.mr_id }}"
    output: mr
  - name: pipeline
    tool: get_pipeline
    args:
      sha: "{{ mr.sha }}"
    parallel: checks
    output: pipeline
  - name: lint
    tool: lint
    condition: strict
    parallel: checks
    output: lint
  - name: summary
    tool: compute
    compute: collect
    args:
      state: "{{ results.pipeline.status }}"
      lint: "{{ lint }}"
    output: summary
outputs:
  - name: summary
    value: "{{ summary }}"
"#;

  #[test]
  fn test_resolve_valid_skill() {
    let def = resolve(REVIEW).unwrap();
    assert_eq!(def.name, "review_mr");
    assert_eq!(def.digest, "sha256:test");
    assert_eq!(def.steps.len(), 4);
    assert_eq!(def.steps[0].operation, Operation::External("get_mr".to_string()));
    assert_eq!(def.steps[3].operation, Operation::Compute("collect".to_string()));
    assert_eq!(def.plan().stages().len(), 3);
  }

  #[test]
  fn test_duplicate_output_rejected() {
    let err = resolve(
      r#"
name: dup
steps:
  - { name: a, tool: get_mr, output: mr }
  - { name: b, tool: lint, output: mr }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("b"));
    assert!(err.reason.contains("duplicate output name 'mr'"));
  }

  #[test]
  fn test_undeclared_input_in_condition() {
    let err = resolve(
      r#"
name: bad
steps:
  - { name: a, tool: get_mr, output: mr }
  - { name: b, tool: lint, condition: "inputs.flag == true" }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("b"));
    assert!(err.reason.contains("undeclared input 'flag'"));
  }

  #[test]
  fn test_forward_reference_rejected() {
    let err = resolve(
      r#"
name: fwd
steps:
  - { name: a, tool: lint, args: { v: "{{ mr.id }}" } }
  - { name: b, tool: get_mr, output: mr }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("a"));
    assert!(err.reason.contains("before the step that produces it"));
  }

  #[test]
  fn test_unknown_name_rejected() {
    let err = resolve(
      r#"
name: unknown
steps:
  - { name: a, tool: lint, condition: "ghost" }
"#,
    )
    .unwrap_err();
    assert!(err.reason.contains("undeclared name 'ghost'"));
  }

  #[test]
  fn test_unknown_operation_rejected() {
    let err = resolve("name: x\nsteps:\n  - { name: a, tool: deploy }\n").unwrap_err();
    assert!(err.reason.contains("unknown operation 'deploy'"));

    let err = resolve("name: x\nsteps:\n  - { name: a, tool: compute, compute: eval }\n").unwrap_err();
    assert!(err.reason.contains("unknown compute function 'eval'"));

    let err = resolve("name: x\nsteps:\n  - { name: a, tool: compute }\n").unwrap_err();
    assert!(err.reason.contains("missing a 'compute' function"));
  }

  #[test]
  fn test_intra_group_reference_rejected() {
    let err = resolve(
      r#"
name: group
steps:
  - { name: a, tool: get_mr, parallel: g, output: mr }
  - { name: b, tool: lint, parallel: g, condition: "mr" }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("b"));
    assert!(err.reason.contains("same parallel group"));
  }

  #[test]
  fn test_non_contiguous_group_rejected() {
    let err = resolve(
      r#"
name: group
steps:
  - { name: a, tool: get_mr, parallel: g }
  - { name: b, tool: lint }
  - { name: c, tool: lint, parallel: g }
"#,
    )
    .unwrap_err();
    assert!(err.reason.contains("not contiguous"));
  }

  #[test]
  fn test_adjacent_groups_allowed() {
    let def = resolve(
      r#"
name: groups
steps:
  - { name: a, tool: get_mr, parallel: g1, output: mr }
  - { name: b, tool: lint, parallel: g1, output: l }
  - { name: c, tool: lint, parallel: g2, condition: "mr and l" }
  - { name: d, tool: lint, parallel: g2 }
"#,
    )
    .unwrap();
    assert_eq!(def.plan().stages().len(), 2);
  }

  #[test]
  fn test_input_validation() {
    let err = resolve("name: x\ninputs:\n  - { name: results }\n").unwrap_err();
    assert!(err.reason.contains("reserved"));

    let err = resolve("name: x\ninputs:\n  - { name: a }\n  - { name: a }\n").unwrap_err();
    assert!(err.reason.contains("duplicate input"));

    let err = resolve("name: x\ninputs:\n  - { name: n, type: integer, default: abc }\n").unwrap_err();
    assert!(err.reason.contains("not a valid integer"));
  }

  #[test]
  fn test_output_shadowing_input_rejected() {
    let err = resolve(
      "name: x\ninputs:\n  - { name: mr }\nsteps:\n  - { name: a, tool: get_mr, output: mr }\n",
    )
    .unwrap_err();
    assert!(err.reason.contains("shadows an input"));
  }

  #[test]
  fn test_skill_output_references_checked() {
    let err = resolve(
      "name: x\nsteps:\n  - { name: a, tool: get_mr, output: mr }\noutputs:\n  - { name: o, value: \"{{ nope }}\" }\n",
    )
    .unwrap_err();
    assert!(err.step_name.is_none());
    assert!(err.reason.contains("output 'o'"));
  }

  #[test]
  fn test_invalid_condition_syntax() {
    let err = resolve("name: x\nsteps:\n  - { name: a, tool: lint, condition: \"a | upper\" }\n")
      .unwrap_err();
    assert!(err.reason.starts_with("invalid condition"));
  }

  #[test]
  fn test_subscript_references_rejected() {
    // Forward read of a later output
    let err = resolve(
      r#"
name: fwd
steps:
  - { name: a, tool: lint, condition: "results['later']" }
  - { name: b, tool: get_mr, output: later }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("a"));
    assert!(err.reason.contains("subscripts are not supported"));

    // Undeclared input
    let err = resolve(
      r#"
name: undeclared
steps:
  - { name: a, tool: lint, condition: "inputs['flag'] == true" }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("a"));
    assert!(err.reason.contains("subscripts are not supported"));

    // Sibling in the same parallel group
    let err = resolve(
      r#"
name: group
steps:
  - { name: a, tool: get_mr, parallel: g, output: mr }
  - { name: b, tool: lint, parallel: g, args: { v: "{{ results['mr'] }}" } }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("b"));
    assert!(err.reason.contains("subscripts are not supported"));
  }

  #[test]
  fn test_whole_namespace_reads_rejected() {
    let err = resolve(
      r#"
name: whole
steps:
  - { name: a, tool: lint, condition: "'later' in results" }
  - { name: b, tool: get_mr, output: later }
"#,
    )
    .unwrap_err();
    assert_eq!(err.step_name.as_deref(), Some("a"));
    assert!(err.reason.contains("reads 'results' as a whole"));

    let err = resolve("name: x\noutputs:\n  - { name: o, value: \"{{ inputs }}\" }\n").unwrap_err();
    assert!(err.reason.contains("reads 'inputs' as a whole"));
  }

  #[test]
  fn test_member_access_through_namespaces() {
    let def = resolve(
      r#"
name: ns
inputs:
  - { name: flag, type: boolean, default: false }
steps:
  - { name: a, tool: get_mr, output: mr }
  - { name: b, tool: lint, condition: "inputs.flag and results.mr.state == 'opened'" }
"#,
    )
    .unwrap();
    assert_eq!(def.steps.len(), 2);
  }

  #[test]
  fn test_zero_timeout_rejected() {
    let err = resolve("name: x\nsteps:\n  - { name: a, tool: lint, timeout_ms: 0 }\n").unwrap_err();
    assert!(err.reason.contains("timeout_ms"));
  }
}
