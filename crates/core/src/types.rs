/// All primary keys are time-ordered UUIDv7 values.
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh time-ordered identifier.
pub fn new_id() -> DbId {
    uuid::Uuid::now_v7()
}
