//! Notification badge counts derived from cached state.

use shareserve_sync::QueryState;

use crate::types::UserProfile;

/// Badge counts for the app chrome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationCounts {
    /// Unread tracking is not exposed by the backend yet; always zero.
    pub unread_messages: usize,
    pub pending_requests: usize,
}

impl NotificationCounts {
    /// Derive counts from the pending-requests query. A query that has
    /// not resolved yet (or is disabled) counts as zero rather than an
    /// error state.
    pub fn from_pending(pending: &QueryState<Vec<UserProfile>>) -> Self {
        Self {
            unread_messages: 0,
            pending_requests: pending.data.as_ref().map_or(0, |list| list.len()),
        }
    }
}
