//! JSON snapshot storage

mod format;
mod identity;
mod store;

pub use format::{
    classify_body, decode_body, is_json_media_type, BodyType, RecordedRequest, RecordedResponse,
    SnapshotRecord, CONTENT_ENCODING, CONTENT_TYPE,
};
pub use identity::{
    file_name_for, split_file_name, validate_scope, SnapshotFileIdentity, SNAPSHOT_EXTENSION,
};
pub use store::{load, SnapshotStore, StoreStats};
