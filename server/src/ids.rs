use uuid::Uuid;

pub fn new_connection_id() -> String {
    Uuid::new_v4().to_string()
}

/// Background ids are time ordered so logs sort by upload.
pub fn new_background_id() -> String {
    Uuid::now_v7().simple().to_string()
}
