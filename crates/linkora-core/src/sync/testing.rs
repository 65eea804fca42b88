//! Scripted transport and payload builders for sync tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

use super::dto::{FolderDto, IdBasedDto, LinkDto, PanelDto, PanelFolderDto};
use super::event::SyncEvent;
use super::routes;
use super::transport::{FrameStream, Transport};
use crate::error::{Error, Result};
use crate::models::{Correlation, LinkType, MediaType, RemoteId};

const CREATE_ROUTES: [&str; 4] = [
    routes::CREATE_FOLDER,
    routes::CREATE_LINK,
    routes::CREATE_PANEL,
    routes::ADD_FOLDER_TO_PANEL,
];

type LoggedGet = (String, Vec<(String, String)>);

#[derive(Default)]
struct Script {
    gets: Vec<LoggedGet>,
    posts: Vec<(String, Value)>,
    responses: HashMap<String, Value>,
    folders: HashMap<RemoteId, FolderDto>,
    next_id: RemoteId,
    frames: Vec<String>,
    hold_open: bool,
    reject_token: bool,
    refuse_socket: bool,
    failing_post: Option<String>,
    sockets_opened: usize,
}

/// In-memory [`Transport`] that records requests and serves canned answers.
///
/// Create routes answer with ids counting up from 42.
pub struct FakeTransport {
    script: Mutex<Script>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                next_id: 42,
                ..Script::default()
            }),
        }
    }

    /// Answer every `GET route` with `body`.
    pub fn respond(&self, route: &str, body: Value) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(route.to_string(), body);
    }

    /// Make the folder available to `folders/get`.
    pub fn serve_folder(&self, folder: FolderDto) {
        self.script
            .lock()
            .unwrap()
            .folders
            .insert(folder.id, folder);
    }

    /// Frames delivered by the next opened socket.
    pub fn socket_frames(&self, frames: impl IntoIterator<Item = String>) {
        self.script.lock().unwrap().frames = frames.into_iter().collect();
    }

    /// Keep sockets open after their frames are delivered.
    pub fn hold_socket_open(&self) {
        self.script.lock().unwrap().hold_open = true;
    }

    pub fn reject_token(&self) {
        self.script.lock().unwrap().reject_token = true;
    }

    pub fn refuse_socket(&self) {
        self.script.lock().unwrap().refuse_socket = true;
    }

    /// Fail posts to `route` with a server error.
    pub fn fail_post(&self, route: &str) {
        self.script.lock().unwrap().failing_post = Some(route.to_string());
    }

    pub fn gets(&self) -> Vec<LoggedGet> {
        self.script
            .lock()
            .unwrap()
            .gets
            .iter()
            .filter(|(route, _)| route != routes::TEST_BEARER)
            .cloned()
            .collect()
    }

    /// Accepted posts, in order.
    pub fn posts(&self) -> Vec<(String, Value)> {
        self.script.lock().unwrap().posts.clone()
    }

    pub fn sockets_opened(&self) -> usize {
        self.script.lock().unwrap().sockets_opened
    }
}

fn api_error(status: u16, message: &str) -> Error {
    Error::Api {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, route: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut script = self.script.lock().unwrap();
        script.gets.push((
            route.to_string(),
            query
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect(),
        ));

        if route == routes::TEST_BEARER && script.reject_token {
            return Err(api_error(401, "Unauthorized"));
        }
        if route == routes::GET_FOLDER {
            let id = query
                .iter()
                .find(|(key, _)| *key == "id")
                .and_then(|(_, value)| value.parse::<RemoteId>().ok());
            return match id.and_then(|id| script.folders.get(&id)) {
                Some(folder) => Ok(serde_json::to_value(folder)?),
                None => Err(api_error(404, "folder not found")),
            };
        }
        Ok(script.responses.get(route).cloned().unwrap_or(Value::Null))
    }

    async fn post(&self, route: &str, body: &Value) -> Result<Value> {
        let mut script = self.script.lock().unwrap();
        if script.failing_post.as_deref() == Some(route) {
            return Err(api_error(503, "unavailable"));
        }
        script.posts.push((route.to_string(), body.clone()));

        if CREATE_ROUTES.contains(&route) {
            let id = script.next_id;
            script.next_id += 1;
            return Ok(json!({ "id": id, "message": "created" }));
        }
        Ok(Value::Null)
    }

    async fn open_socket(&self, _route: &str) -> Result<FrameStream> {
        let mut script = self.script.lock().unwrap();
        if script.refuse_socket {
            return Err(Error::WebSocket("connection refused".to_string()));
        }
        script.sockets_opened += 1;

        let frames = stream::iter(std::mem::take(&mut script.frames).into_iter().map(Ok));
        if script.hold_open {
            Ok(frames.chain(stream::pending()).boxed())
        } else {
            Ok(frames.boxed())
        }
    }
}

/// Correlation from some other device.
pub fn foreign() -> Correlation {
    Correlation {
        id: "op-remote".to_string(),
        client_name: "other-device".to_string(),
    }
}

pub fn frame(event: &SyncEvent) -> String {
    serde_json::to_string(event).unwrap()
}

pub fn folder_dto(id: RemoteId, name: &str, parent: Option<RemoteId>) -> FolderDto {
    FolderDto {
        id,
        name: name.to_string(),
        note: String::new(),
        parent_folder_id: parent,
        is_archived: false,
        event_timestamp: 0,
        correlation: Some(foreign()),
    }
}

/// A folder link when `folder` is given, a saved link otherwise.
pub fn link_dto(id: RemoteId, folder: Option<RemoteId>) -> LinkDto {
    LinkDto {
        id,
        link_type: if folder.is_some() {
            LinkType::FolderLink
        } else {
            LinkType::SavedLink
        },
        title: format!("Link {id}"),
        url: format!("https://example.com/{id}"),
        img_url: String::new(),
        note: String::new(),
        id_of_linked_folder: folder,
        user_agent: None,
        marked_as_important: false,
        media_type: MediaType::Image,
        event_timestamp: 0,
        correlation: Some(foreign()),
    }
}

pub fn id_dto(id: RemoteId) -> IdBasedDto {
    IdBasedDto {
        id,
        event_timestamp: 0,
        correlation: Some(foreign()),
    }
}

pub fn panel_dto(id: RemoteId, name: &str) -> PanelDto {
    PanelDto {
        panel_id: id,
        panel_name: name.to_string(),
        event_timestamp: 0,
        correlation: Some(foreign()),
    }
}

pub fn panel_folder_dto(id: RemoteId, folder_id: RemoteId, panel_id: RemoteId) -> PanelFolderDto {
    PanelFolderDto {
        id,
        folder_id,
        panel_position: 0,
        folder_name: format!("Folder {folder_id}"),
        connected_panel_id: panel_id,
        event_timestamp: 0,
        correlation: Some(foreign()),
    }
}
