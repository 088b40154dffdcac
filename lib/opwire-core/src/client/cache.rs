use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::response::CallResponse;

#[derive(Debug, Default)]
struct CacheState {
    /// Responses by request key (`GET:<url>`).
    results: HashMap<String, CallResponse>,
    /// Key of the last stored response of each operation.
    latest: HashMap<String, String>,
}

/// Successful `GET` responses, keyed by method and full URL.
///
/// Entries are never evicted.
#[derive(Debug, Default)]
pub(in crate::client) struct OperationCache {
    state: Mutex<CacheState>,
}

impl OperationCache {
    pub(in crate::client) fn get(&self, key: &str) -> Option<CallResponse> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.results.get(key).cloned()
    }

    pub(in crate::client) fn put(&self, operation_id: &str, key: String, response: CallResponse) {
        debug!(%key, operation_id, "caching response");
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.latest.insert(operation_id.to_string(), key.clone());
        state.results.insert(key, response);
    }

    /// The last response stored for the operation.
    pub(in crate::client) fn latest(&self, operation_id: &str) -> Option<CallResponse> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let key = state.latest.get(operation_id)?;
        state.results.get(key).cloned()
    }

    pub(in crate::client) fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.results.len()
    }
}
