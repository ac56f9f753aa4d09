//! Working subsets and the preparation response.
//!
//! A working subset is an immutable grouping of requests of one kind, all
//! assigned to the same backend instance, produced once by preparation and
//! handed to exactly one executor invocation.

use std::collections::HashMap;
use uuid::Uuid;

use stowage_core::models::{FileCacheRequest, FileDeletionRequest, FileStorageRequest};

/// Common view over the three working subset kinds.
pub trait WorkingSubset {
    /// Storage location name every request in this subset targets.
    fn storage(&self) -> &str;
    fn request_ids(&self) -> Vec<Uuid>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! working_subset {
    ($name:ident, $request:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $name {
            storage: String,
            requests: Vec<$request>,
        }

        impl $name {
            pub fn new(storage: impl Into<String>, requests: Vec<$request>) -> Self {
                Self {
                    storage: storage.into(),
                    requests,
                }
            }

            pub fn requests(&self) -> &[$request] {
                &self.requests
            }

            pub fn into_requests(self) -> Vec<$request> {
                self.requests
            }
        }

        impl WorkingSubset for $name {
            fn storage(&self) -> &str {
                &self.storage
            }

            fn request_ids(&self) -> Vec<Uuid> {
                self.requests.iter().map(|r| r.id).collect()
            }

            fn len(&self) -> usize {
                self.requests.len()
            }
        }
    };
}

working_subset!(
    StorageWorkingSubset,
    FileStorageRequest,
    "Storage requests grouped for one backend `store` invocation."
);
working_subset!(
    DeletionWorkingSubset,
    FileDeletionRequest,
    "Deletion requests grouped for one backend `delete` invocation."
);
working_subset!(
    RestorationWorkingSubset,
    FileCacheRequest,
    "Restoration requests grouped for one backend `retrieve` invocation."
);

/// Output of request preparation: working subsets plus per-request
/// rejections.
///
/// Every input request appears either inside exactly one working subset or
/// as exactly one rejection entry, never both, never neither. Rejections are
/// non-fatal: the request stays eligible for re-submission.
#[derive(Debug, Clone)]
pub struct PreparationResponse<S> {
    working_subsets: Vec<S>,
    rejected: HashMap<Uuid, String>,
}

impl<S> PreparationResponse<S> {
    pub fn new() -> Self {
        Self {
            working_subsets: Vec::new(),
            rejected: HashMap::new(),
        }
    }

    pub fn add_working_subset(&mut self, subset: S) {
        self.working_subsets.push(subset);
    }

    pub fn reject(&mut self, request_id: Uuid, cause: impl Into<String>) {
        self.rejected.insert(request_id, cause.into());
    }

    /// Fold another response (e.g. from a different backend) into this one.
    pub fn merge(&mut self, other: PreparationResponse<S>) {
        self.working_subsets.extend(other.working_subsets);
        self.rejected.extend(other.rejected);
    }

    pub fn working_subsets(&self) -> &[S] {
        &self.working_subsets
    }

    pub fn rejected(&self) -> &HashMap<Uuid, String> {
        &self.rejected
    }

    pub fn into_parts(self) -> (Vec<S>, HashMap<Uuid, String>) {
        (self.working_subsets, self.rejected)
    }
}

impl<S> Default for PreparationResponse<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WorkingSubset> PreparationResponse<S> {
    /// Ids of every request accounted for, in subsets or rejections.
    pub fn accounted_ids(&self) -> Vec<Uuid> {
        self.working_subsets
            .iter()
            .flat_map(|s| s.request_ids())
            .chain(self.rejected.keys().copied())
            .collect()
    }
}
