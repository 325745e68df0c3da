//! Connection lifecycle: replay the diagram to a newcomer, then announce the
//! new user count. The replay is addressed to the new connection only and
//! always precedes the count broadcast, so a counted user never sees an empty
//! canvas. Snapshot and replay happen under the frozen store gate, so no edit
//! lands between them.

use drawboard_shared::DiagramEvent;
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::store::DiagramStore;

pub async fn on_connect(
    store: &DiagramStore,
    dispatcher: &dyn Dispatcher,
    connection_id: &str,
) -> u64 {
    let shapes = {
        let _frozen = store.freeze().await;
        let snapshot = store.snapshot();
        let shapes = snapshot.shapes.len();
        for (id, shape) in snapshot.shapes {
            dispatcher
                .to_connection(connection_id, &DiagramEvent::ShapeUpdated { id, shape })
                .await;
        }
        if let Some(id) = snapshot.background_id {
            dispatcher
                .to_connection(connection_id, &DiagramEvent::BackgroundUpdated { id })
                .await;
        }
        shapes
    };
    let count = store.enter_user();
    dispatcher.to_all(&DiagramEvent::UserUpdated { count }).await;
    info!(conn = %connection_id, shapes, users = count, "resync complete");
    count
}

pub async fn on_disconnect(
    store: &DiagramStore,
    dispatcher: &dyn Dispatcher,
    connection_id: &str,
) -> u64 {
    let count = store.leave_user();
    dispatcher.to_all(&DiagramEvent::UserUpdated { count }).await;
    info!(conn = %connection_id, users = count, "user left");
    count
}
