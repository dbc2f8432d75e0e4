//! Client state container and its reducer.
//!
//! `AppState` is a plain value; every change goes through [`AppState::reduce`]
//! so that a front-end can re-render from a snapshot after each action.

use std::fmt;

use crate::api::{DownloadedFile, FileEntry, PendingFile};

#[derive(Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub user_id: String,
    pub password: String,
    pub file: Option<PendingFile>,
    pub file_hash: String,
    pub search_query: String,
    pub search_results: Vec<FileEntry>,
    pub file_list: Vec<FileEntry>,
    pub last_download: Option<DownloadedFile>,
    pub is_logged_in: bool,
    pub token: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    SetUserId(String),
    SetPassword(String),
    SetFile(Option<PendingFile>),
    SetFileHash(String),
    SetSearchQuery(String),
    SetSearchResults(Vec<FileEntry>),
    SetFileList(Vec<FileEntry>),
    SetDownload(Option<DownloadedFile>),
    Login { token: String, user_id: String },
    Logout,
    SetError(Option<String>),
}

impl AppState {
    /// Initial state for a fresh run, given whatever token was persisted.
    pub fn restored(token: Option<String>) -> Self {
        let token = token.unwrap_or_default();
        Self {
            is_logged_in: !token.is_empty(),
            token,
            ..Self::default()
        }
    }

    pub fn reduce(mut self, action: Action) -> Self {
        match action {
            Action::SetUserId(user_id) => self.user_id = user_id,
            Action::SetPassword(password) => self.password = password,
            Action::SetFile(file) => self.file = file,
            Action::SetFileHash(hash) => self.file_hash = hash,
            Action::SetSearchQuery(query) => self.search_query = query,
            Action::SetSearchResults(results) => self.search_results = results,
            Action::SetFileList(files) => self.file_list = files,
            Action::SetDownload(download) => self.last_download = download,
            Action::Login { token, user_id } => {
                self.is_logged_in = true;
                self.token = token;
                self.user_id = user_id;
                self.error = None;
            }
            Action::Logout => return Self::default(),
            Action::SetError(error) => self.error = error.filter(|e| !e.is_empty()),
        }
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("user_id", &self.user_id)
            .field("password", &redacted(&self.password))
            .field("file", &self.file)
            .field("file_hash", &self.file_hash)
            .field("search_query", &self.search_query)
            .field("search_results", &self.search_results.len())
            .field("file_list", &self.file_list.len())
            .field("last_download", &self.last_download.as_ref().map(|d| &d.file_hash))
            .field("is_logged_in", &self.is_logged_in)
            .field("token", &redacted(&self.token))
            .field("error", &self.error)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}
