//! The client controller: checks preconditions, calls the API and folds the
//! outcome back into [`AppState`].
//!
//! Every operation follows the same shape. Preconditions are checked against a
//! snapshot of the state; a failed precondition never reaches the network. A
//! successful call dispatches its transitions and clears the error; any failure
//! is written to `error` and returned to the caller.
//!
//! Operations take `&self` and may run concurrently. Nothing orders their
//! responses, so the last one to land wins.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{
    Credentials, DownloadedFile, FileEntry, PendingFile, TokenResponse, UploadResponse,
    UploadedFile,
};
use crate::api_client::FileApi;
use crate::error::{
    ClientError, Result, CREDENTIALS_REQUIRED, FILE_REQUIRED, HASH_AND_FILE_REQUIRED,
    HASH_REQUIRED, QUERY_REQUIRED,
};
use crate::session_store::{SessionStore, TOKEN_KEY};
use crate::state::{Action, AppState};

#[derive(Clone, Copy)]
enum AuthKind {
    Register,
    Login,
}

pub struct Controller<A, S> {
    api: A,
    store: S,
    state: Arc<Mutex<AppState>>,
}

impl<A: FileApi, S: SessionStore> Controller<A, S> {
    /// Builds the controller, restoring the session from `store`. An
    /// unreadable store starts logged out so `logout` can still reset it.
    pub fn new(api: A, store: S) -> Self {
        let token = store.get(TOKEN_KEY).unwrap_or_else(|err| {
            warn!(error = %err, "stored session unreadable, starting logged out");
            None
        });
        Self {
            api,
            store,
            state: Arc::new(Mutex::new(AppState::restored(token))),
        }
    }

    pub fn state(&self) -> AppState {
        self.state.lock().clone()
    }

    pub fn dispatch(&self, action: Action) {
        let mut guard = self.state.lock();
        let current = std::mem::take(&mut *guard);
        *guard = current.reduce(action);
    }

    // ── Field setters ────────────────────────────────────────────────────────

    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.dispatch(Action::SetUserId(user_id.into()));
    }

    pub fn set_password(&self, password: impl Into<String>) {
        self.dispatch(Action::SetPassword(password.into()));
    }

    pub fn set_file(&self, file: Option<PendingFile>) {
        self.dispatch(Action::SetFile(file));
    }

    pub async fn select_file(&self, path: &Path) -> Result<()> {
        match PendingFile::read(path).await {
            Ok(file) => {
                self.set_file(Some(file));
                Ok(())
            }
            Err(err) => Err(self.fail("select file", ClientError::Io(err))),
        }
    }

    pub fn set_file_hash(&self, file_hash: impl Into<String>) {
        self.dispatch(Action::SetFileHash(file_hash.into()));
    }

    pub fn set_search_query(&self, query: impl Into<String>) {
        self.dispatch(Action::SetSearchQuery(query.into()));
    }

    // ── Session ──────────────────────────────────────────────────────────────

    pub async fn register(&self) -> Result<()> {
        self.authenticate(AuthKind::Register).await
    }

    pub async fn login(&self) -> Result<()> {
        self.authenticate(AuthKind::Login).await
    }

    async fn authenticate(&self, kind: AuthKind) -> Result<()> {
        let op = match kind {
            AuthKind::Register => "register",
            AuthKind::Login => "login",
        };
        let credentials = {
            let state = self.state.lock();
            if state.user_id.is_empty() || state.password.is_empty() {
                drop(state);
                return Err(self.fail(op, ClientError::Validation(CREDENTIALS_REQUIRED)));
            }
            Credentials {
                username: state.user_id.clone(),
                password: state.password.clone(),
            }
        };

        let res = match kind {
            AuthKind::Register => self.api.register(&credentials).await,
            AuthKind::Login => self.api.login(&credentials).await,
        };
        let token = match res.and_then(require_token) {
            Ok(token) => token,
            Err(err) => return Err(self.fail(op, err)),
        };
        if let Err(err) = self.store.set(TOKEN_KEY, &token) {
            return Err(self.fail(op, ClientError::Store(err)));
        }

        info!(user = %credentials.username, "{op} succeeded");
        self.dispatch(Action::Login {
            token,
            user_id: credentials.username,
        });
        Ok(())
    }

    /// Clears the session. In-memory state is always reset, even when the
    /// persisted token cannot be removed.
    pub fn logout(&self) -> Result<()> {
        let removed = self.store.remove(TOKEN_KEY);
        self.dispatch(Action::Logout);
        match removed {
            Ok(()) => {
                info!("logged out");
                Ok(())
            }
            Err(err) => Err(self.fail("logout", ClientError::Store(err))),
        }
    }

    // ── Files ────────────────────────────────────────────────────────────────

    pub async fn upload(&self) -> Result<UploadedFile> {
        let (token, file) = match self.with_session(|s| match &s.file {
            Some(file) => Ok(file.clone()),
            None => Err(ClientError::Validation(FILE_REQUIRED)),
        }) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("upload", err)),
        };

        match self.api.upload(&token, &file).await.and_then(require_file_hash) {
            Ok(res) => {
                let uploaded = UploadedFile {
                    file_name: res.file_name.unwrap_or_else(|| file.file_name.clone()),
                    file_hash: res.file_hash,
                };
                info!(file = %uploaded.file_name, hash = %uploaded.file_hash, "uploaded");
                self.dispatch(Action::SetFileHash(uploaded.file_hash.clone()));
                self.clear_error();
                Ok(uploaded)
            }
            Err(err) => Err(self.fail("upload", err)),
        }
    }

    pub async fn download(&self) -> Result<DownloadedFile> {
        let (token, file_hash) = match self.with_session(require_hash) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("download", err)),
        };

        match self.api.download(&token, &file_hash).await {
            Ok(res) => {
                let downloaded = DownloadedFile {
                    file_hash: res.file_hash.unwrap_or(file_hash),
                    file_name: res.file_name,
                    data: res.data,
                };
                self.dispatch(Action::SetDownload(Some(downloaded.clone())));
                self.clear_error();
                Ok(downloaded)
            }
            Err(err) => Err(self.fail("download", err)),
        }
    }

    /// Deletes the file named by `file_hash`, then refreshes the file list.
    pub async fn delete(&self) -> Result<Vec<FileEntry>> {
        let (token, file_hash) = match self.with_session(require_hash) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("delete", err)),
        };

        match self.api.delete(&token, &file_hash).await {
            Ok(res) if res.success => {
                info!(hash = %file_hash, "deleted");
                self.dispatch(Action::SetFileHash(String::new()));
                self.clear_error();
                self.list().await
            }
            Ok(_) => Err(self.fail("delete", ClientError::Rejected("Delete"))),
            Err(err) => Err(self.fail("delete", err)),
        }
    }

    /// Replaces the content behind `file_hash` with the selected file, then
    /// refreshes the file list.
    pub async fn update(&self) -> Result<Vec<FileEntry>> {
        let (token, (file_hash, file)) = match self.with_session(|s| match &s.file {
            Some(file) if !s.file_hash.is_empty() => Ok((s.file_hash.clone(), file.clone())),
            _ => Err(ClientError::Validation(HASH_AND_FILE_REQUIRED)),
        }) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("update", err)),
        };

        match self.api.update(&token, &file_hash, &file).await {
            Ok(res) if res.success => {
                info!(hash = %file_hash, file = %file.file_name, "updated");
                self.dispatch(Action::SetFileHash(String::new()));
                self.clear_error();
                self.list().await
            }
            Ok(_) => Err(self.fail("update", ClientError::Rejected("Update"))),
            Err(err) => Err(self.fail("update", err)),
        }
    }

    pub async fn search(&self) -> Result<Vec<FileEntry>> {
        let (token, query) = match self.with_session(|s| {
            if s.search_query.is_empty() {
                Err(ClientError::Validation(QUERY_REQUIRED))
            } else {
                Ok(s.search_query.clone())
            }
        }) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("search", err)),
        };

        match self.api.search(&token, &query).await {
            Ok(results) => {
                self.dispatch(Action::SetSearchResults(results.clone()));
                self.clear_error();
                Ok(results)
            }
            Err(err) => Err(self.fail("search", err)),
        }
    }

    pub async fn list(&self) -> Result<Vec<FileEntry>> {
        let (token, ()) = match self.with_session(|_| Ok(())) {
            Ok(v) => v,
            Err(err) => return Err(self.fail("list", err)),
        };

        match self.api.list(&token).await {
            Ok(files) => {
                self.dispatch(Action::SetFileList(files.clone()));
                self.clear_error();
                Ok(files)
            }
            Err(err) => Err(self.fail("list", err)),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Reads the token plus whatever `extract` needs in one lock.
    fn with_session<T, F>(&self, extract: F) -> Result<(String, T)>
    where
        F: FnOnce(&AppState) -> Result<T>,
    {
        let state = self.state.lock();
        if !state.is_logged_in {
            return Err(ClientError::NotLoggedIn);
        }
        let value = extract(&state)?;
        Ok((state.token.clone(), value))
    }

    fn clear_error(&self) {
        self.dispatch(Action::SetError(None));
    }

    fn fail(&self, op: &str, err: ClientError) -> ClientError {
        if err.is_local() {
            info!(op, error = %err, "precondition failed");
        } else {
            warn!(op, error = %err, "operation failed");
        }
        self.dispatch(Action::SetError(Some(err.to_string())));
        err
    }
}

fn require_hash(state: &AppState) -> Result<String> {
    if state.file_hash.is_empty() {
        Err(ClientError::Validation(HASH_REQUIRED))
    } else {
        Ok(state.file_hash.clone())
    }
}

fn require_file_hash(res: UploadResponse) -> Result<UploadResponse> {
    if res.file_hash.is_empty() {
        Err(ClientError::Decode("response carried no file hash".into()))
    } else {
        Ok(res)
    }
}

fn require_token(res: TokenResponse) -> Result<String> {
    res.token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::Decode("response carried no token".into()))
}
