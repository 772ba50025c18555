//! Operation Context
//!
//! Contains metadata about the current operation for audit and tracing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for a ledger operation, used for auditing and tracing.
///
/// `created_by` is stamped onto every posting the operation writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// User or system actor performing the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            created_by: None,
            correlation_id: None,
        }
    }

    /// Create context with a creator identity
    pub fn with_created_by(mut self, user_id: Uuid) -> Self {
        self.created_by = Some(user_id);
        self
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let user_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_created_by(user_id)
            .with_correlation_id(correlation_id);

        assert_eq!(context.created_by, Some(user_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert!(context.correlation_id.is_some());
        assert_eq!(context.correlation_id.unwrap(), id);

        // Calling again should return the same ID
        let id2 = context.ensure_correlation_id();
        assert_eq!(id, id2);
    }
}
