//! One-shot structured queries against the knowledge-base service.

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::QueryError;
use crate::transport::Connection;

/// The rosprolog service triple behind the gateway.
const QUERY_SERVICE: &str = "/json_prolog/simple_query";
const NEXT_SOLUTION_SERVICE: &str = "/json_prolog/next_solution";
const FINISH_SERVICE: &str = "/json_prolog/finish";

/// Trivial no-op query used as the readiness probe.
pub const PROBE_QUERY: &str = "true";

/// One-shot query capability. Also serves as the liveness probe while the
/// session waits for the query service to come up.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Issue `text` and return the first solution.
    async fn query(&self, conn: &dyn Connection, text: &str) -> Result<Value, QueryError>;
}

/// Gateway backed by the rosprolog service triple: open the query, take one
/// solution, release the query id.
#[derive(Debug, Default)]
pub struct PrologGateway;

impl PrologGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryGateway for PrologGateway {
    async fn query(&self, conn: &dyn Connection, text: &str) -> Result<Value, QueryError> {
        let id = Uuid::new_v4().simple().to_string();

        let opened = conn
            .call_service(QUERY_SERVICE, json!({ "id": id, "query": text, "mode": 0 }))
            .await?;
        if let Some(error) = error_of(&opened) {
            return Err(QueryError::Service(error));
        }

        let solution = conn
            .call_service(NEXT_SOLUTION_SERVICE, json!({ "id": id }))
            .await?;
        // Release the server-side query regardless of the solution outcome.
        let _ = conn.call_service(FINISH_SERVICE, json!({ "id": id })).await;

        match error_of(&solution) {
            Some(error) => Err(QueryError::Service(error)),
            None => Ok(solution),
        }
    }
}

fn error_of(reply: &Value) -> Option<String> {
    let error = reply.get("error")?;
    if error.is_null() {
        return None;
    }
    match error.as_str() {
        Some(text) if text.is_empty() => None,
        Some(text) => Some(text.to_string()),
        None => Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_of_reads_service_errors() {
        assert_eq!(error_of(&json!({"solution": {}})), None);
        assert_eq!(error_of(&json!({"error": null})), None);
        assert_eq!(error_of(&json!({"error": ""})), None);
        assert_eq!(
            error_of(&json!({"error": "no query service"})),
            Some("no query service".to_string())
        );
        assert_eq!(error_of(&json!({"error": true})), Some("true".to_string()));
    }
}
