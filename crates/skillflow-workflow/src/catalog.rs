/// Lookup of the operations available to a skill at load time.
///
/// The resolver rejects any step naming an operation the catalog does not
/// know, so unknown operations surface as definition errors rather than
/// run-time surprises.
pub trait OperationCatalog: Send + Sync {
  /// Whether an external operation with this name is available.
  fn has_operation(&self, name: &str) -> bool;

  /// Whether an inline compute function with this name is registered.
  fn has_compute(&self, name: &str) -> bool;
}

impl<T: OperationCatalog + ?Sized> OperationCatalog for std::sync::Arc<T> {
  fn has_operation(&self, name: &str) -> bool {
    (**self).has_operation(name)
  }

  fn has_compute(&self, name: &str) -> bool {
    (**self).has_compute(name)
  }
}
