//! Episode selection state.

use serde_json::Value;
use tokio::sync::Mutex;

use easeview_protocol::Episode;

use crate::error::QueryError;
use crate::query::QueryGateway;
use crate::transport::Connection;

/// Holds the active episode and runs its knowledge-base queries.
///
/// At most one episode is active; it is absent until the first selection and
/// survives reconnects until replaced.
#[derive(Default)]
pub struct EpisodeSelector {
    current: Mutex<Option<Episode>>,
}

impl EpisodeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Episode> {
        self.current.lock().await.clone()
    }

    pub async fn has_episode(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Store an episode without touching the backend. Used when no
    /// connection exists yet; the working set catches up on Ready.
    pub async fn set(&self, episode: Episode) {
        *self.current.lock().await = Some(episode);
    }

    /// Make `episode` the active one and resolve its opaque library handle.
    ///
    /// The episode is stored before the library query runs, so a failing
    /// query still leaves it selected; the working set catches up through
    /// re-assertion on the next Ready entry.
    pub async fn select(
        &self,
        gateway: &dyn QueryGateway,
        conn: &dyn Connection,
        episode: Episode,
    ) -> Result<Value, QueryError> {
        let library_query = library_query(&episode);
        *self.current.lock().await = Some(episode);
        gateway.query(conn, &library_query).await
    }

    /// Re-issue the working-set selection for the active episode, if any.
    ///
    /// Backend connections carry per-connection state; a fresh connection
    /// points at no episode until this runs.
    pub async fn reassert(
        &self,
        gateway: &dyn QueryGateway,
        conn: &dyn Connection,
    ) -> Result<(), QueryError> {
        let Some(episode) = self.current.lock().await.clone() else {
            return Ok(());
        };
        gateway.query(conn, &selection_query(&episode)).await?;
        Ok(())
    }
}

/// Query binding the backend working set to an episode's recorded data.
fn selection_query(episode: &Episode) -> String {
    format!("mng_db('roslog_{}_{}')", episode.category, episode.id)
}

/// Query resolving the interface library registered for an episode.
fn library_query(episode: &Episode) -> String {
    format!(
        "episode_library('{}', '{}', Lib)",
        episode.category, episode.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_texts_embed_the_episode() {
        let episode = Episode::new("pick-and-place", "ep-042");
        assert_eq!(
            selection_query(&episode),
            "mng_db('roslog_pick-and-place_ep-042')"
        );
        assert_eq!(
            library_query(&episode),
            "episode_library('pick-and-place', 'ep-042', Lib)"
        );
    }

    #[tokio::test]
    async fn test_selector_starts_empty() {
        let selector = EpisodeSelector::new();
        assert!(!selector.has_episode().await);
        assert_eq!(selector.current().await, None);
    }
}
