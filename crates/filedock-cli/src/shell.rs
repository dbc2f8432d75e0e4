use anyhow::Result;
use filedock_core::{Controller, FileApi, SessionStore};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::render::render;

const HELP: &str = "\
fields:  user <name> | password <pw> | file <path> | hash <hash> | query <text>
actions: register | login | logout | upload | download | delete | update | search | list
other:   state | help | quit
";

#[derive(Debug, PartialEq, Eq)]
pub enum ShellCommand {
    User(String),
    Password(String),
    File(PathBuf),
    Hash(String),
    Query(String),
    Register,
    Login,
    Logout,
    Upload,
    Download,
    Delete,
    Update,
    Search,
    List,
    State,
    Help,
    Quit,
}

/// Parses one input line. `Ok(None)` means the line was blank.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim().to_string()),
        None => (line, String::new()),
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "user" => ShellCommand::User(rest),
        "password" => ShellCommand::Password(rest),
        "hash" => ShellCommand::Hash(rest),
        "query" => ShellCommand::Query(rest),
        "file" if rest.is_empty() => return Err("usage: file <path>".into()),
        "file" => ShellCommand::File(PathBuf::from(rest)),
        "register" => ShellCommand::Register,
        "login" => ShellCommand::Login,
        "logout" => ShellCommand::Logout,
        "upload" => ShellCommand::Upload,
        "download" => ShellCommand::Download,
        "delete" => ShellCommand::Delete,
        "update" => ShellCommand::Update,
        "search" => ShellCommand::Search,
        "list" => ShellCommand::List,
        "state" => ShellCommand::State,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command {other:?}; type `help`")),
    };
    Ok(Some(cmd))
}

/// Reads commands until `quit` or end of input. Action failures land in the
/// rendered state and do not stop the loop.
pub async fn run<A, S, R, W>(ctl: &Controller<A, S>, input: R, mut output: W) -> Result<()>
where
    A: FileApi,
    S: SessionStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output.write_all(render(&ctl.state()).as_bytes()).await?;
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let cmd = match parse_line(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                output.write_all(format!("{msg}\n").as_bytes()).await?;
                continue;
            }
        };

        // Failures are already recorded in the state's error field.
        let rerender = match cmd {
            ShellCommand::User(v) => {
                ctl.set_user_id(v);
                false
            }
            ShellCommand::Password(v) => {
                ctl.set_password(v);
                false
            }
            ShellCommand::File(path) => ctl.select_file(&path).await.is_err(),
            ShellCommand::Hash(v) => {
                ctl.set_file_hash(v);
                false
            }
            ShellCommand::Query(v) => {
                ctl.set_search_query(v);
                false
            }
            ShellCommand::Register => {
                let _ = ctl.register().await;
                true
            }
            ShellCommand::Login => {
                let _ = ctl.login().await;
                true
            }
            ShellCommand::Logout => {
                let _ = ctl.logout();
                true
            }
            ShellCommand::Upload => {
                let _ = ctl.upload().await;
                true
            }
            ShellCommand::Download => {
                let _ = ctl.download().await;
                true
            }
            ShellCommand::Delete => {
                let _ = ctl.delete().await;
                true
            }
            ShellCommand::Update => {
                let _ = ctl.update().await;
                true
            }
            ShellCommand::Search => {
                let _ = ctl.search().await;
                true
            }
            ShellCommand::List => {
                let _ = ctl.list().await;
                true
            }
            ShellCommand::State => true,
            ShellCommand::Help => {
                output.write_all(HELP.as_bytes()).await?;
                false
            }
            ShellCommand::Quit => break,
        };
        if rerender {
            output.write_all(render(&ctl.state()).as_bytes()).await?;
        }
    }
    output.flush().await?;
    Ok(())
}
