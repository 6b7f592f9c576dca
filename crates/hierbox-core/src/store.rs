//! Arena holding every object of a run
//!
//! Objects are grouped by image and then by label. The position of an object
//! inside its label bucket is its index, handed out at insertion time, so the
//! order records are inserted in decides every later tie-break.

use crate::entity::{HierObject, ObjectKey, ObjectRecord, ToRecord};
use crate::error::{HierError, Result};
use indexmap::IndexMap;
use tracing::trace;

/// Objects of a single image, grouped by label in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ImageObjects {
    image_id: String,
    labels: IndexMap<String, Vec<HierObject>>,
    pub(crate) state: PassState,
}

/// Which passes have already run on an image
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PassState {
    pub overlaps_indexed: bool,
    pub duplicates_resolved: bool,
    pub resolved_pairs: Vec<(String, String)>,
}

impl ImageObjects {
    fn new(image_id: String) -> Self {
        Self {
            image_id,
            labels: IndexMap::new(),
            state: PassState::default(),
        }
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Objects with `label`, ordered by index
    pub fn objects(&self, label: &str) -> &[HierObject] {
        self.labels.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, label: &str, index: usize) -> Option<&HierObject> {
        self.labels.get(label)?.get(index)
    }

    pub(crate) fn get_mut(&mut self, label: &str, index: usize) -> Option<&mut HierObject> {
        self.labels.get_mut(label)?.get_mut(index)
    }

    pub(crate) fn objects_mut(&mut self, label: &str) -> Option<&mut Vec<HierObject>> {
        self.labels.get_mut(label)
    }

    /// Labels present in this image, in first-seen order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Every object of the image, label bucket after label bucket
    pub fn iter(&self) -> impl Iterator<Item = &HierObject> {
        self.labels.values().flatten()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut HierObject> {
        self.labels.values_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.labels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, record: ObjectRecord) -> Result<ObjectKey> {
        if self.state.overlaps_indexed {
            return Err(HierError::OverlapsAlreadyIndexed {
                image_id: self.image_id.clone(),
            });
        }

        let index = self.objects(&record.label).len();
        let object = HierObject::new(record, index)?;
        let key = object.key();
        self.labels
            .entry(key.label.clone())
            .or_default()
            .push(object);

        trace!("inserted {}", key);
        Ok(key)
    }

    fn reset(&mut self) {
        for object in self.iter_mut() {
            object.relations = Default::default();
        }
        self.state = PassState::default();
    }
}

/// Every object of a run, keyed by image id then label
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    images: IndexMap<String, ImageObjects>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a record and append it to its image and label bucket.
    ///
    /// Returns the handle of the new object; its index is the number of
    /// objects with the same image and label inserted before it. A rejected
    /// record leaves the store untouched.
    pub fn insert(&mut self, record: ObjectRecord) -> Result<ObjectKey> {
        match self.images.get_mut(&record.image_id) {
            Some(image) => image.insert(record),
            None => {
                let mut image = ImageObjects::new(record.image_id.clone());
                let key = image.insert(record)?;
                self.images.insert(key.image_id.clone(), image);
                Ok(key)
            }
        }
    }

    /// Insert any annotation source that converts into a record
    pub fn insert_from<T: ToRecord>(&mut self, source: &T) -> std::result::Result<ObjectKey, T::Error> {
        let record = source.to_record()?;
        Ok(self.insert(record)?)
    }

    pub fn image(&self, image_id: &str) -> Option<&ImageObjects> {
        self.images.get(image_id)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&HierObject> {
        self.image(&key.image_id)?.get(&key.label, key.index)
    }

    /// Images in first-seen order
    pub fn images(&self) -> impl Iterator<Item = &ImageObjects> {
        self.images.values()
    }

    pub(crate) fn images_mut(&mut self) -> impl Iterator<Item = &mut ImageObjects> {
        self.images.values_mut()
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn images_map_mut(&mut self) -> &mut IndexMap<String, ImageObjects> {
        &mut self.images
    }

    /// Every object of every image
    pub fn iter(&self) -> impl Iterator<Item = &HierObject> {
        self.images.values().flat_map(ImageObjects::iter)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn len(&self) -> usize {
        self.images.values().map(ImageObjects::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop every relation found so far so the passes can run again
    pub fn reset_relations(&mut self) {
        for image in self.images.values_mut() {
            image.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_insertion_order() -> Result<()> {
        let mut store = ObjectStore::new();
        let a = store.insert(ObjectRecord::new("i1", "Object", 0.2, 0.3, 0.4, 0.5))?;
        let b = store.insert(ObjectRecord::new("i1", "Object", 0.1, 0.4, 0.3, 0.8))?;
        let g = store.insert(ObjectRecord::new("i1", "Group", 0.1, 0.1, 0.5, 0.5))?;
        let other = store.insert(ObjectRecord::new("i2", "Object", 0.1, 0.1, 0.5, 0.5))?;

        assert_eq!((a.index, b.index, g.index, other.index), (0, 1, 0, 0));
        assert_eq!(store.len(), 4);
        assert_eq!(store.image_count(), 2);
        assert_eq!(store.get(&b).map(HierObject::bbox), Some((0.1, 0.4, 0.3, 0.8)));

        let image = store.image("i1").unwrap();
        assert_eq!(image.labels().collect::<Vec<_>>(), vec!["Object", "Group"]);
        assert_eq!(image.objects("Object").len(), 2);
        assert!(image.objects("Missing").is_empty());
        Ok(())
    }

    #[test]
    fn test_rejected_record_does_not_consume_index() -> Result<()> {
        let mut store = ObjectStore::new();
        assert!(store
            .insert(ObjectRecord::new("i1", "eye", 0.3, 0.3, 0.3, 0.4))
            .is_err());
        assert!(store.is_empty());

        let key = store.insert(ObjectRecord::new("i1", "eye", 0.3, 0.3, 0.4, 0.4))?;
        assert_eq!(key.index, 0);
        Ok(())
    }

    #[test]
    fn test_insert_from_record_source() -> Result<()> {
        let mut store = ObjectStore::new();
        let record = ObjectRecord::new("i1", "face", 0.1, 0.1, 0.2, 0.2);
        let key = store.insert_from(&record)?;
        assert_eq!(store.get(&key).map(HierObject::label), Some("face"));
        Ok(())
    }
}
