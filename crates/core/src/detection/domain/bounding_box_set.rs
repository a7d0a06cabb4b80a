use std::sync::{Arc, PoisonError, RwLock};

use crate::detection::domain::detection_box::DetectionBox;

/// The latest detection result, shared between the detection loop (writer)
/// and the preview renderer (reader).
///
/// Updates swap the whole list in one assignment; a reader holds an
/// immutable snapshot and never sees a partially written set.
#[derive(Clone, Default)]
pub struct BoundingBoxSet {
    current: Arc<RwLock<Arc<Vec<DetectionBox>>>>,
}

impl BoundingBoxSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<DetectionBox>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, boxes: Vec<DetectionBox>) {
        let next = Arc::new(boxes);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
