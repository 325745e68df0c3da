use async_trait::async_trait;
use drawboard_shared::DiagramEvent;

/// Addressing primitives over a live transport.
///
/// Delivery is best effort: implementations log failed sends per recipient
/// and never report them to the caller, so one unreachable peer cannot delay
/// or fail delivery to the rest.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn to_all(&self, event: &DiagramEvent);

    /// Every connection except `sender`.
    async fn to_others(&self, sender: &str, event: &DiagramEvent);

    async fn to_connection(&self, connection_id: &str, event: &DiagramEvent);

    async fn to_group(&self, group: &str, event: &DiagramEvent);

    /// Every connection attributed to `user_id`.
    async fn to_user(&self, user_id: &str, event: &DiagramEvent);

    async fn add_to_group(&self, connection_id: &str, group: &str);
}
