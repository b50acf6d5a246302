//! Detect → identify → resolve pipeline for a single image.

use crate::client::{FaceApi, FaceApiError};
use crate::identity::IdentityStore;
use crate::types::{FaceList, ResolvedFace};

/// Turns an image into a [`FaceList`] using a person group and a local identity store.
#[derive(Debug, Clone)]
pub struct FaceProcessor {
    group: String,
    /// Minimum identify confidence, in percent.
    confidence_pct: f64,
    store: IdentityStore,
}

impl FaceProcessor {
    pub fn new(group: impl Into<String>, confidence_pct: f64, store: IdentityStore) -> Self {
        Self {
            group: group.into(),
            confidence_pct,
            store,
        }
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn replace_store(&mut self, store: IdentityStore) {
        self.store = store;
    }

    /// Detect faces, identify them against the group and resolve names.
    ///
    /// Only the top candidate of each face is used. Faces without
    /// candidates count toward `total_faces` but produce no entry.
    /// Any API failure aborts the whole run; no partial list is returned.
    pub fn process_image<A: FaceApi + ?Sized>(
        &self,
        api: &A,
        image: &[u8],
    ) -> Result<FaceList, FaceApiError> {
        let detected = api.detect(image)?;
        if detected.is_empty() {
            tracing::debug!("no faces detected");
            return Ok(FaceList::empty());
        }

        let face_ids: Vec<String> = detected.into_iter().map(|f| f.face_id).collect();
        let identified = api.identify(&face_ids, &self.group, self.confidence_pct)?;

        let mut list = FaceList::empty();
        for entry in &identified {
            list.total_faces += 1;
            let Some(candidate) = entry.top_candidate() else {
                continue;
            };
            let name = self.store.name_or_empty(&candidate.person_id);
            if name.is_empty() {
                tracing::debug!(person_id = %candidate.person_id, "candidate not in identity store");
            }
            list.faces.push(ResolvedFace::from_candidate(name, candidate));
        }

        tracing::debug!(
            detected = face_ids.len(),
            identified = list.faces.len(),
            total = list.total_faces,
            "image processed"
        );
        Ok(list)
    }

    /// Detect faces only; `total_faces` is the number of faces found.
    pub fn detect_only<A: FaceApi + ?Sized>(
        &self,
        api: &A,
        image: &[u8],
    ) -> Result<FaceList, FaceApiError> {
        let detected = api.detect(image)?;
        Ok(FaceList {
            faces: Vec::new(),
            total_faces: detected.len(),
        })
    }
}
