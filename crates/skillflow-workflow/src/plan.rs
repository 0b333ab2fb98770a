use crate::step::Step;

/// One unit of scheduling in an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
  /// A single step, run after everything before it is recorded.
  Sequential(usize),
  /// A contiguous run of independent steps, joined before the next stage.
  FanOut { group: String, steps: Vec<usize> },
}

impl Stage {
  /// Step indices covered by this stage, in declaration order.
  pub fn step_indices(&self) -> &[usize] {
    match self {
      Self::Sequential(index) => std::slice::from_ref(index),
      Self::FanOut { steps, .. } => steps,
    }
  }
}

/// Scheduling structure derived from a definition's step order.
///
/// Declaration order is the dependency order, so no graph analysis is
/// needed: stages run one after another, and only fan-out members run
/// concurrently with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
  stages: Vec<Stage>,
}

impl ExecutionPlan {
  /// Build the plan from steps in declaration order.
  ///
  /// Contiguous steps sharing a `parallel` group become one fan-out stage.
  /// A group with a single member runs as a sequential stage.
  pub fn new(steps: &[Step]) -> Self {
    let mut stages = Vec::new();
    let mut index = 0;

    while index < steps.len() {
      match &steps[index].parallel {
        Some(group) => {
          let start = index;
          while index < steps.len() && steps[index].parallel.as_ref() == Some(group) {
            index += 1;
          }
          if index - start == 1 {
            stages.push(Stage::Sequential(start));
          } else {
            stages.push(Stage::FanOut {
              group: group.clone(),
              steps: (start..index).collect(),
            });
          }
        }
        None => {
          stages.push(Stage::Sequential(index));
          index += 1;
        }
      }
    }

    Self { stages }
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  /// Step indices of every stage from `stage` onward.
  pub fn remaining_steps(&self, stage: usize) -> Vec<usize> {
    self
      .stages
      .iter()
      .skip(stage)
      .flat_map(|s| s.step_indices().iter().copied())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Operation;
  use skillflow_config::OnError;
  use std::collections::BTreeMap;

  fn step(name: &str, parallel: Option<&str>) -> Step {
    Step {
      name: name.to_string(),
      description: String::new(),
      operation: Operation::External("noop".to_string()),
      args: BTreeMap::new(),
      condition: None,
      output: Some(name.to_string()),
      on_error: OnError::Fail,
      parallel: parallel.map(str::to_string),
      timeout_ms: None,
    }
  }

  #[test]
  fn test_sequential_plan() {
    let plan = ExecutionPlan::new(&[step("a", None), step("b", None)]);
    assert_eq!(plan.stages(), &[Stage::Sequential(0), Stage::Sequential(1)]);
  }

  #[test]
  fn test_fan_out_group() {
    let plan = ExecutionPlan::new(&[
      step("setup", None),
      step("lint", Some("analysis")),
      step("test", Some("analysis")),
      step("audit", Some("analysis")),
      step("synthesize", None),
    ]);

    assert_eq!(
      plan.stages(),
      &[
        Stage::Sequential(0),
        Stage::FanOut {
          group: "analysis".to_string(),
          steps: vec![1, 2, 3],
        },
        Stage::Sequential(4),
      ]
    );
    assert_eq!(plan.remaining_steps(1), vec![1, 2, 3, 4]);
  }

  #[test]
  fn test_adjacent_groups_stay_separate() {
    let plan = ExecutionPlan::new(&[
      step("a", Some("one")),
      step("b", Some("one")),
      step("c", Some("two")),
      step("d", Some("two")),
    ]);

    assert_eq!(plan.stages().len(), 2);
    assert_eq!(plan.stages()[1].step_indices(), &[2, 3]);
  }

  #[test]
  fn test_single_member_group_is_sequential() {
    let plan = ExecutionPlan::new(&[step("a", Some("solo")), step("b", None)]);
    assert_eq!(plan.stages(), &[Stage::Sequential(0), Stage::Sequential(1)]);
  }
}
