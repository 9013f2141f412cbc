//! Identity types for FORGE entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Identifier of a finalized integration.
pub type IntegrationId = EntityId;

/// Identifier of a project (one conversation container).
pub type ProjectId = EntityId;

/// Identifier of a chat message.
pub type MessageId = EntityId;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Current wall-clock time as a [`Timestamp`].
pub fn now() -> Timestamp {
    Utc::now()
}
