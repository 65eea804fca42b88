//! Server routes, relative to the configured base URL.

pub const TEST_BEARER: &str = "test-bearer";

pub const SYNC_UPDATES: &str = "sync/updates";
pub const SYNC_TOMBSTONES: &str = "sync/tombstones";
/// Query parameter carrying the watermark for both pull routes
pub const EVENT_TIMESTAMP_PARAM: &str = "eventTimestamp";

pub const GET_FOLDER: &str = "folders/get";
pub const CREATE_FOLDER: &str = "folders/create";
pub const UPDATE_FOLDER: &str = "folders/update";
pub const DELETE_FOLDER: &str = "folders/delete";

pub const CREATE_LINK: &str = "links/create";
pub const UPDATE_LINK: &str = "links/update";
pub const DELETE_LINK: &str = "links/delete";

pub const CREATE_PANEL: &str = "panels/create";
pub const RENAME_PANEL: &str = "panels/rename";
pub const DELETE_PANEL: &str = "panels/delete";
pub const ADD_FOLDER_TO_PANEL: &str = "panels/add-folder";
pub const REMOVE_FOLDER_FROM_PANEL: &str = "panels/remove-folder";

/// Live event channel (WebSocket)
pub const EVENTS: &str = "events";
