//! Hierarchy inference for independently annotated bounding boxes
//!
//! Objects are boxes tagged with an image and a class label. The engine finds
//! which annotations duplicate each other and which ones nest inside others,
//! such as an eye inside a face.
//!
//! ```
//! use hierbox_core::{resolve_hierarchy, LabelPair, ObjectRecord, ObjectStore, ResolveConfig};
//!
//! let mut store = ObjectStore::new();
//! store.insert(ObjectRecord::new("i1", "Object", 0.2, 0.3, 0.4, 0.5)).unwrap();
//! store.insert(ObjectRecord::new("i1", "Group", 0.1, 0.1, 0.5, 0.5)).unwrap();
//!
//! let pairs = [LabelPair::new("Object", "Group")];
//! resolve_hierarchy(&mut store, &pairs, &ResolveConfig::default()).unwrap();
//!
//! let image = store.image("i1").unwrap();
//! assert_eq!(image.objects("Object")[0].parent("Group"), Some(0));
//! ```

pub mod entity;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod overlap;
pub mod resolve;
pub mod store;

// Re-export commonly used types
pub use entity::{HierObject, ObjectKey, ObjectRecord, Relations, ToRecord};
pub use error::{BoxError, HierError, Result};
pub use geometry::Rect;
pub use hierarchy::{resolve_hierarchy, resolve_image, HierarchyReport, ImageReport};
pub use overlap::{index_overlaps, sort_for_parent, sort_iou, OverlapFact};
pub use resolve::{find_duplicates, find_parent, LabelPair, PairOutcome, ResolveConfig};
pub use store::{ImageObjects, ObjectStore};
