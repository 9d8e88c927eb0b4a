//! Line-oriented view: reads commands from an input stream, forwards them to
//! the session, and renders rows and details as text.

use std::error::Error as _;
use std::io::Write;

use skiff_events::InfoHash;
use skiff_session::SessionHandle;
use skiff_torrent_core::TorrentRow;
use skiff_torrent_core::format::{detail_lines, render_table};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::error::{AppError, AppResult};

const HELP: &str = "\
commands:
  add <magnet>      track a magnet link
  select <t>        select a row number or info hash
  toggle [t]        pause or start (default: selected)
  remove [t]        remove (default: selected)
  show [t]          details (default: selected)
  up <kib/s>        upload limit, 0 for unlimited
  down <kib/s>      download limit, 0 for unlimited
  rows              print the torrent table
  help              this text
  quit              exit";

/// Torrent named by a console argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// 1-based row in the current table.
    Row(usize),
    /// Identity as 40 hex or 32 base32 characters.
    Hash(InfoHash),
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Blank line.
    Empty,
    /// Track a magnet link.
    Add(String),
    /// Select a torrent.
    Select(Target),
    /// Toggle a torrent, or the selection.
    Toggle(Option<Target>),
    /// Remove a torrent, or the selection.
    Remove(Option<Target>),
    /// Show details for a torrent, or the selection.
    Show(Option<Target>),
    /// Set the upload limit from KiB/s text.
    Upload(String),
    /// Set the download limit from KiB/s text.
    Download(String),
    /// Print the table.
    Rows,
    /// Print usage.
    Help,
    /// Exit the console.
    Quit,
}

/// Reasons a console line was not understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleParseError {
    /// First word is not a command.
    #[error("unknown command '{command}' (try 'help')")]
    UnknownCommand {
        /// Offending word.
        command: String,
    },
    /// Command needs an argument.
    #[error("'{command}' needs an argument")]
    MissingArgument {
        /// Command that was incomplete.
        command: &'static str,
    },
    /// Argument was neither a positive row number nor an info hash.
    #[error("'{value}' is not a row number or info hash")]
    InvalidTarget {
        /// Offending text.
        value: String,
    },
}

/// Parse one console line.
///
/// # Errors
///
/// Returns [`ConsoleParseError`] when the line is not a known command or
/// lacks a required argument.
pub fn parse_line(line: &str) -> Result<ConsoleCommand, ConsoleParseError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    let argument = |command: &'static str| {
        if rest.is_empty() {
            Err(ConsoleParseError::MissingArgument { command })
        } else {
            Ok(rest.to_string())
        }
    };
    let command = match word {
        "" => ConsoleCommand::Empty,
        "add" | "a" => ConsoleCommand::Add(argument("add")?),
        "select" => ConsoleCommand::Select(parse_target(&argument("select")?)?),
        "toggle" | "t" => ConsoleCommand::Toggle(optional_target(rest)?),
        "remove" | "rm" => ConsoleCommand::Remove(optional_target(rest)?),
        "show" => ConsoleCommand::Show(optional_target(rest)?),
        "up" => ConsoleCommand::Upload(argument("up")?),
        "down" => ConsoleCommand::Download(argument("down")?),
        "rows" | "ls" => ConsoleCommand::Rows,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => {
            return Err(ConsoleParseError::UnknownCommand {
                command: other.to_string(),
            });
        }
    };
    Ok(command)
}

fn parse_target(value: &str) -> Result<Target, ConsoleParseError> {
    if let Ok(index) = value.parse::<usize>() {
        if index > 0 {
            return Ok(Target::Row(index));
        }
    } else if let Ok(hash) = value.parse::<InfoHash>() {
        return Ok(Target::Hash(hash));
    }
    Err(ConsoleParseError::InvalidTarget {
        value: value.to_string(),
    })
}

fn optional_target(value: &str) -> Result<Option<Target>, ConsoleParseError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_target(value).map(Some)
    }
}

/// Whether the console keeps reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop reading.
    Quit,
}

/// Text front-end over a [`SessionHandle`].
pub struct Console<W> {
    handle: SessionHandle,
    out: W,
    selected: Option<InfoHash>,
}

impl<W: Write> Console<W> {
    /// Console writing to `out`.
    pub const fn new(handle: SessionHandle, out: W) -> Self {
        Self {
            handle,
            out,
            selected: None,
        }
    }

    /// Currently selected torrent.
    #[must_use]
    pub const fn selected(&self) -> Option<InfoHash> {
        self.selected
    }

    /// Consume the console and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Read and execute lines until `quit` or end of input. With `follow`,
    /// the table is printed whenever the session publishes new rows.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when reading input or writing output fails.
    pub async fn run<R>(&mut self, input: R, follow: bool) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut rows = self.handle.rows();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.map_err(|err| AppError::io("console.read", err))? else {
                        debug!("console input closed");
                        break;
                    };
                    match parse_line(&line) {
                        Ok(command) => {
                            if self.execute(command).await? == Flow::Quit {
                                break;
                            }
                        }
                        Err(err) => self.say(&format!("error: {err}"))?,
                    }
                }
                changed = rows.changed(), if follow => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = rows.borrow_and_update().clone();
                    self.print_table(&snapshot)?;
                }
            }
        }
        Ok(())
    }

    /// Execute one command. Session failures are printed, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when writing output fails.
    pub async fn execute(&mut self, command: ConsoleCommand) -> AppResult<Flow> {
        match command {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Help => self.say(HELP)?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
            ConsoleCommand::Rows => {
                let rows = self.handle.rows_snapshot();
                self.print_table(&rows)?;
            }
            ConsoleCommand::Add(uri) => match self.handle.add_magnet(uri).await {
                Ok(id) => {
                    self.selected = Some(id);
                    self.say(&format!("added {id}"))?;
                }
                Err(err) => self.report(&err)?,
            },
            ConsoleCommand::Select(target) => match self.target(Some(target)) {
                Some(id) => {
                    self.selected = Some(id);
                    self.say(&format!("selected {id}"))?;
                }
                None => self.say("error: no such row")?,
            },
            ConsoleCommand::Toggle(target) => {
                let Some(id) = self.target(target) else {
                    return self.nothing_selected();
                };
                match self.handle.toggle_want(id).await {
                    Ok(desired) => {
                        self.say(&format!("{id} [{}]", desired.action_label()))?;
                    }
                    Err(err) => self.report(&err)?,
                }
            }
            ConsoleCommand::Remove(target) => {
                let Some(id) = self.target(target) else {
                    return self.nothing_selected();
                };
                match self.handle.remove(id).await {
                    Ok(()) => {
                        if self.selected == Some(id) {
                            self.selected = None;
                        }
                        self.say(&format!("removed {id}"))?;
                    }
                    Err(err) => self.report(&err)?,
                }
            }
            ConsoleCommand::Show(target) => {
                let Some(id) = self.target(target) else {
                    return self.nothing_selected();
                };
                match self.handle.details(id).await {
                    Ok(Some(details)) => self.say(&detail_lines(&details).join("\n"))?,
                    Ok(None) => self.say("error: no such row")?,
                    Err(err) => self.report(&err)?,
                }
            }
            ConsoleCommand::Upload(text) => {
                let result = self.handle.apply_upload_limit_text(&text).await;
                self.limit_outcome("upload", &text, result)?;
            }
            ConsoleCommand::Download(text) => {
                let result = self.handle.apply_download_limit_text(&text).await;
                self.limit_outcome("download", &text, result)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn target(&self, target: Option<Target>) -> Option<InfoHash> {
        match target {
            None => self.selected,
            Some(Target::Hash(id)) => Some(id),
            Some(Target::Row(index)) => {
                let rows = self.handle.rows_snapshot();
                index
                    .checked_sub(1)
                    .and_then(|position| rows.get(position))
                    .map(|row| row.id)
            }
        }
    }

    fn nothing_selected(&mut self) -> AppResult<Flow> {
        self.say("error: no torrent selected")?;
        Ok(Flow::Continue)
    }

    fn limit_outcome(
        &mut self,
        direction: &str,
        text: &str,
        result: skiff_session::SessionResult<()>,
    ) -> AppResult<()> {
        match result {
            Ok(()) => self.say(&format!("{direction} limit set to {} KiB/s", text.trim())),
            Err(err) => self.report(&err),
        }
    }

    fn print_table(&mut self, rows: &[TorrentRow]) -> AppResult<()> {
        let table = render_table(rows);
        self.say(&table)
    }

    fn report(&mut self, err: &skiff_session::SessionError) -> AppResult<()> {
        let message = err.source().map_or_else(
            || format!("error: {err}"),
            |source| format!("error: {err}: {source}"),
        );
        self.say(&message)
    }

    fn say(&mut self, text: &str) -> AppResult<()> {
        writeln!(self.out, "{text}").map_err(|err| AppError::io("console.write", err))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skiff_events::EventBus;
    use skiff_session::{MemoryEngine, SessionConfig};
    use skiff_telemetry::Metrics;
    use skiff_test_support::fixtures;

    use super::*;

    fn console() -> (Arc<MemoryEngine>, Console<Vec<u8>>) {
        let engine = Arc::new(MemoryEngine::new());
        let handle = SessionHandle::spawn(
            engine.clone(),
            EventBus::new(),
            Metrics::new().expect("metrics"),
            SessionConfig {
                tick_interval: std::time::Duration::from_secs(3_600),
                command_buffer: 8,
            },
        );
        (engine, Console::new(handle, Vec::new()))
    }

    fn output(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_inner()).expect("utf8 output")
    }

    #[test]
    fn parses_commands_and_arguments() {
        assert_eq!(parse_line("   "), Ok(ConsoleCommand::Empty));
        assert_eq!(
            parse_line("add  magnet:?xt=urn:btih:abc "),
            Ok(ConsoleCommand::Add("magnet:?xt=urn:btih:abc".into()))
        );
        assert_eq!(parse_line("toggle"), Ok(ConsoleCommand::Toggle(None)));
        assert_eq!(
            parse_line("rm 2"),
            Ok(ConsoleCommand::Remove(Some(Target::Row(2))))
        );
        let hash = fixtures::info_hash(9);
        assert_eq!(
            parse_line(&format!("show {hash}")),
            Ok(ConsoleCommand::Show(Some(Target::Hash(hash))))
        );
        assert_eq!(parse_line("up -5"), Ok(ConsoleCommand::Upload("-5".into())));
        assert_eq!(
            parse_line("select 0"),
            Err(ConsoleParseError::InvalidTarget { value: "0".into() })
        );
        assert_eq!(
            parse_line("down"),
            Err(ConsoleParseError::MissingArgument { command: "down" })
        );
        assert!(matches!(
            parse_line("seed"),
            Err(ConsoleParseError::UnknownCommand { .. })
        ));
    }

    #[tokio::test]
    async fn scripted_session_renders_rows_and_details() -> AppResult<()> {
        let (engine, mut console) = console();
        let script = format!(
            "add {}\nrows\nshow\ntoggle\nup abc\nquit\nrows\n",
            fixtures::magnet_uri(1)
        );
        console.run(script.as_bytes(), false).await?;
        let id = console.selected().expect("selection");
        assert!(engine.contains(id));

        let text = output(console);
        assert!(text.contains(&format!("added {id}")));
        assert!(text.contains("status"));
        assert!(text.contains("starting"));
        assert!(text.contains("fixture-1"));
        assert!(text.contains("fetching metainfo..."));
        assert!(text.contains(&format!("{id} [start]")));
        assert!(text.contains("error: invalid rate limit"));
        assert_eq!(text.matches("status").count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn commands_without_selection_report_errors() -> AppResult<()> {
        let (_engine, mut console) = console();
        console
            .run(&b"toggle\nremove 3\nadd http://x\nbogus\n"[..], false)
            .await?;
        let text = output(console);
        assert!(text.contains("error: no torrent selected"));
        assert!(text.contains("error: invalid magnet uri"));
        assert!(text.contains("unknown command 'bogus'"));
        Ok(())
    }

    #[tokio::test]
    async fn remove_clears_selection() -> AppResult<()> {
        let (engine, mut console) = console();
        let script = format!("add {}\nremove 1\n", fixtures::magnet_uri(2));
        console.run(script.as_bytes(), false).await?;
        assert!(console.selected().is_none());
        assert!(!engine.contains(fixtures::info_hash(2)));
        Ok(())
    }
}
