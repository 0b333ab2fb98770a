use minijinja::Value;
use serde_json::{Map, Value as Json};

/// Variables visible to conditions and templates.
///
/// Every input and every successful step output is bound at top level,
/// and again under `inputs` and `results`. Outputs of failed or skipped
/// steps are absent, so paths through them evaluate to undefined.
#[derive(Debug, Clone)]
pub struct Scope {
  value: Value,
}

impl Scope {
  pub fn new(inputs: &Map<String, Json>, results: &Map<String, Json>) -> Self {
    let mut root = Map::with_capacity(inputs.len() + results.len() + 2);
    for (name, value) in inputs {
      root.insert(name.clone(), value.clone());
    }
    // Outputs shadow inputs; the resolver rejects such clashes anyway
    for (name, value) in results {
      root.insert(name.clone(), value.clone());
    }
    root.insert("inputs".to_string(), Json::Object(inputs.clone()));
    root.insert("results".to_string(), Json::Object(results.clone()));

    Self {
      value: Value::from_serialize(Json::Object(root)),
    }
  }

  pub fn empty() -> Self {
    Self::new(&Map::new(), &Map::new())
  }

  pub fn value(&self) -> &Value {
    &self.value
  }
}

impl Default for Scope {
  fn default() -> Self {
    Self::empty()
  }
}
