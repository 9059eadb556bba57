pub mod memory;
pub mod traits;

pub use memory::MemoryAuthorizationStore;
pub use traits::AuthorizationStore;
