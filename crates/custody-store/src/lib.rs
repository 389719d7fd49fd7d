pub mod error;
pub mod object_id;
pub mod store;

pub use error::{Result, StoreError};
pub use object_id::ObjectId;
pub use store::{ContentStore, HoldRegistry, StoredObject, CASE_ID_TAG};
