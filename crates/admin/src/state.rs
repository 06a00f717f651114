//! Application state shared across handlers.

use std::sync::Arc;

use star_admin_core::UserId;

use crate::data::DataService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    data: Arc<dyn DataService>,
    admin_user_id: UserId,
}

impl AppState {
    pub fn new(data: Arc<dyn DataService>, admin_user_id: UserId) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                data,
                admin_user_id,
            }),
        }
    }

    /// Backend access for request handlers.
    pub fn data(&self) -> &dyn DataService {
        self.inner.data.as_ref()
    }

    /// Shared handle, for state that outlives the request (e.g. SSE streams).
    pub fn data_handle(&self) -> Arc<dyn DataService> {
        Arc::clone(&self.inner.data)
    }

    /// Identity the admin sends chat messages as.
    pub fn admin_user_id(&self) -> UserId {
        self.inner.admin_user_id
    }
}
