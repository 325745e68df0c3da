use drawboard_shared::{valid_id, DiagramEvent};
use tracing::{debug, error, warn};

use crate::dispatch::Dispatcher;
use crate::error::EventError;
use crate::store::DiagramStore;

/// Applies one client event to the store and returns the event to relay to
/// every other connection.
pub fn apply_client_event(
    store: &DiagramStore,
    event: DiagramEvent,
) -> Result<DiagramEvent, EventError> {
    match event {
        DiagramEvent::ShapeUpdated { id, shape } => {
            if !valid_id(&id) {
                return Err(EventError::InvalidId);
            }
            let shape = shape
                .sanitized()
                .ok_or_else(|| EventError::OddCoordinates(id.clone()))?;
            store.upsert_shape(&id, shape.clone());
            Ok(DiagramEvent::ShapeUpdated { id, shape })
        }
        DiagramEvent::ShapePatched { id, data } => {
            if !valid_id(&id) {
                return Err(EventError::InvalidId);
            }
            if data.len() % 2 != 0 {
                return Err(EventError::OddCoordinates(id));
            }
            store.patch_shape(&id, &data)?;
            Ok(DiagramEvent::ShapePatched { id, data })
        }
        DiagramEvent::ShapeRemoved { id } => {
            if !valid_id(&id) {
                return Err(EventError::InvalidId);
            }
            if store.remove_shape(&id).is_none() {
                debug!(shape = %id, "remove for unknown shape");
            }
            Ok(DiagramEvent::ShapeRemoved { id })
        }
        DiagramEvent::Clear => {
            store.clear();
            Ok(DiagramEvent::Clear)
        }
        message @ DiagramEvent::NewMessage { .. } => Ok(message),
        server_only @ (DiagramEvent::BackgroundUpdated { .. } | DiagramEvent::UserUpdated { .. }) => {
            Err(EventError::ServerOnly(server_only.kind()))
        }
    }
}

async fn apply_and_relay(
    store: &DiagramStore,
    dispatcher: &dyn Dispatcher,
    sender: &str,
    event: DiagramEvent,
) -> Result<(), EventError> {
    let relay = apply_client_event(store, event)?;
    dispatcher.to_others(sender, &relay).await;
    Ok(())
}

/// Applies a client event and relays it. Rejected events are logged and
/// dropped; they never reach other connections.
///
/// The gate stays held until the relay is queued, so a concurrent resync
/// either includes the edit in its snapshot or is followed by the relay,
/// never both.
pub async fn handle_client_event(
    store: &DiagramStore,
    dispatcher: &dyn Dispatcher,
    sender: &str,
    event: DiagramEvent,
) {
    let kind = event.kind();
    let result = if matches!(event, DiagramEvent::Clear) {
        let _frozen = store.freeze().await;
        apply_and_relay(store, dispatcher, sender, event).await
    } else {
        let _editing = store.edit().await;
        apply_and_relay(store, dispatcher, sender, event).await
    };
    match result {
        Ok(()) => {}
        Err(EventError::Store(error)) => {
            error!(conn = %sender, event = kind, %error, "protocol violation, dropping event")
        }
        Err(error) => warn!(conn = %sender, event = kind, %error, "rejected event"),
    }
}

#[cfg(test)]
mod tests {
    use drawboard_shared::{Shape, ShapeKind, DEFAULT_COLOR};

    use super::*;
    use crate::dispatch::testing::{Recorder, Target};
    use crate::error::StoreError;

    fn shape(data: Vec<i32>) -> Shape {
        Shape::new(ShapeKind::Freehand, "#123456", 3, data)
    }

    #[test]
    fn update_then_patch_builds_the_shape() {
        let store = DiagramStore::new();
        apply_client_event(
            &store,
            DiagramEvent::ShapeUpdated {
                id: "s".into(),
                shape: shape(vec![1, 1]),
            },
        )
        .unwrap();
        let relay = apply_client_event(
            &store,
            DiagramEvent::ShapePatched {
                id: "s".into(),
                data: vec![2, 2, 3, 3],
            },
        )
        .unwrap();
        assert_eq!(
            relay,
            DiagramEvent::ShapePatched {
                id: "s".into(),
                data: vec![2, 2, 3, 3]
            }
        );
        assert_eq!(store.shape("s").unwrap().data, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn relayed_shape_is_sanitized() {
        let store = DiagramStore::new();
        let relay = apply_client_event(
            &store,
            DiagramEvent::ShapeUpdated {
                id: "s".into(),
                shape: Shape::new(ShapeKind::Line, "", 0, vec![0, 0, 5, 5]),
            },
        )
        .unwrap();
        let DiagramEvent::ShapeUpdated { shape, .. } = relay else {
            panic!("expected shapeUpdated");
        };
        assert_eq!(shape.color, DEFAULT_COLOR);
        assert_eq!(store.shape("s"), Some(shape));
    }

    #[test]
    fn rejects_malformed_events() {
        let store = DiagramStore::new();
        assert_eq!(
            apply_client_event(
                &store,
                DiagramEvent::ShapePatched {
                    id: "missing".into(),
                    data: vec![1, 1]
                }
            ),
            Err(EventError::Store(StoreError::ShapeNotFound("missing".into())))
        );
        assert_eq!(
            apply_client_event(&store, DiagramEvent::ShapeRemoved { id: String::new() }),
            Err(EventError::InvalidId)
        );
        assert_eq!(
            apply_client_event(
                &store,
                DiagramEvent::ShapeUpdated {
                    id: "odd".into(),
                    shape: shape(vec![1])
                }
            ),
            Err(EventError::OddCoordinates("odd".into()))
        );
        assert_eq!(
            apply_client_event(&store, DiagramEvent::UserUpdated { count: 99 }),
            Err(EventError::ServerOnly("userUpdated"))
        );
        assert_eq!(store.shape_count(), 0);
        assert_eq!(store.user_count(), 0);
    }

    #[tokio::test]
    async fn valid_events_go_to_others_and_rejected_ones_nowhere() {
        let store = DiagramStore::new();
        let recorder = Recorder::default();

        handle_client_event(
            &store,
            &recorder,
            "c1",
            DiagramEvent::ShapePatched {
                id: "nope".into(),
                data: vec![0, 0],
            },
        )
        .await;
        handle_client_event(
            &store,
            &recorder,
            "c1",
            DiagramEvent::NewMessage {
                author: "c1".into(),
                name: "ann".into(),
                text: "hi".into(),
            },
        )
        .await;
        handle_client_event(&store, &recorder, "c1", DiagramEvent::Clear).await;

        let sent = recorder.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|(target, _)| *target == Target::Others("c1".into())));
        assert_eq!(sent[1].1, DiagramEvent::Clear);
    }
}
