use filedock_core::{AppState, FileEntry};
use std::fmt::Write;

const TITLE: &str = "File Storage App";

/// Text view of the state, the terminal analogue of one page render.
pub fn render(state: &AppState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {TITLE} ==");
    if let Some(err) = &state.error {
        let _ = writeln!(out, "! {err}");
    }

    if !state.is_logged_in {
        let user = if state.user_id.is_empty() {
            "(unset)"
        } else {
            state.user_id.as_str()
        };
        let password = if state.password.is_empty() {
            "(unset)"
        } else {
            "********"
        };
        let _ = writeln!(out, "Username: {user}");
        let _ = writeln!(out, "Password: {password}");
        let _ = writeln!(out, "Register or Login to continue.");
        return out;
    }

    if state.user_id.is_empty() {
        let _ = writeln!(out, "Welcome back!");
    } else {
        let _ = writeln!(out, "Welcome, {}!", state.user_id);
    }
    if let Some(file) = &state.file {
        let _ = writeln!(out, "Selected file: {} ({} bytes)", file.file_name, file.len());
    }
    if !state.file_hash.is_empty() {
        let _ = writeln!(out, "File Hash: {}", state.file_hash);
    }
    if let Some(download) = &state.last_download {
        let _ = writeln!(out, "Downloaded: {}", download.data);
    }
    section(&mut out, "Search Results", &state.search_results);
    section(&mut out, "Your Files", &state.file_list);
    out
}

fn section(out: &mut String, heading: &str, entries: &[FileEntry]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "-- {heading} --");
    for entry in entries {
        let _ = writeln!(out, "  {entry}");
    }
}

pub fn entries(entries: &[FileEntry]) -> String {
    if entries.is_empty() {
        return "No files.\n".to_string();
    }
    entries.iter().map(|e| format!("{e}\n")).collect()
}
