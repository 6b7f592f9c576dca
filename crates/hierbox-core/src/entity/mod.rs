//! Annotated objects and the records they are built from

pub mod object;
pub mod record;

pub use object::{HierObject, ObjectKey, Relations};
pub use record::{ObjectRecord, ToRecord};
