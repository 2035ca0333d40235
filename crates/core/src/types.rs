/// Primary keys are random UUIDs, matching the ids handed to the desktop client.
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
