mod error;
mod fs_store;
mod memory;
mod store;

pub use error::StoreError;
pub use fs_store::FsSkillStore;
pub use memory::MemorySkillStore;
pub use store::{SkillSource, SkillStore};
