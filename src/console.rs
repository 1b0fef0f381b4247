//! Line-oriented console: parses user input into loop commands and runs the
//! editor dialogs
//!
//! The console task owns the [`Editor`], so dialogs never block the poll
//! loop. It sees the current stand set through a watch channel published by
//! the dashboard and sends finished edits back as [`Command::ApplyEdit`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::editor::{Editor, EditorError, HeadingDraft, PositionAnswer, PositionPrompt, PromptService};
use crate::geometry::{GeoPoint, normalize_heading};
use crate::polling::Command;
use crate::render::RenderEvent;
use crate::stands::StandMap;

pub const HELP: &str = "\
r                  refresh now
t                  toggle timelapse
p                  play/pause timelapse
s <idx>            seek timelapse
sel <key>          select a card and fly to it
clear              clear selection
drag <key> <dx> <dy>
pan <dx> <dy>      pan the map in pixels
zoom <z>           set zoom
stand <name>       fly to a stand
e                  toggle edit mode
add <lat> <lng> [hdg]  start placing a stand
rot <notches>      turn the stand being placed (2° per notch)
place              name and save the stand being placed
edit <name>
rm <name>
q                  quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    /// Forwarded to the poll loop as is
    Loop(Command),
    ToggleEdit,
    Add { point: GeoPoint, heading_deg: u16 },
    Rotate(i32),
    Place,
    Edit(String),
    Remove(String),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    Unknown(String),
    MissingArgument(&'static str),
    InvalidNumber(String),
}

impl std::fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseCommandError::Unknown(cmd) => write!(f, "Unknown command '{}' (h for help)", cmd),
            ParseCommandError::MissingArgument(what) => write!(f, "Missing {}", what),
            ParseCommandError::InvalidNumber(raw) => write!(f, "Not a number: {}", raw),
        }
    }
}

impl std::error::Error for ParseCommandError {}

fn number<T: std::str::FromStr>(
    arg: Option<&str>,
    what: &'static str,
) -> Result<T, ParseCommandError> {
    let raw = arg.ok_or(ParseCommandError::MissingArgument(what))?;
    raw.parse()
        .map_err(|_| ParseCommandError::InvalidNumber(raw.to_string()))
}

fn word(arg: Option<&str>, what: &'static str) -> Result<String, ParseCommandError> {
    arg.map(str::to_string)
        .ok_or(ParseCommandError::MissingArgument(what))
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleAction>, ParseCommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut args = line.split_whitespace();
    let Some(cmd) = args.next() else {
        return Ok(None);
    };

    let action = match cmd.to_lowercase().as_str() {
        "r" | "refresh" => ConsoleAction::Loop(Command::Refresh),
        "t" | "timelapse" => ConsoleAction::Loop(Command::ToggleTimelapse),
        "p" | "play" => ConsoleAction::Loop(Command::TogglePlay),
        "s" | "seek" => ConsoleAction::Loop(Command::Seek(number(args.next(), "index")?)),
        "sel" => ConsoleAction::Loop(Command::Render(RenderEvent::Select {
            key: word(args.next(), "movement key")?,
            focus: true,
        })),
        "clear" => ConsoleAction::Loop(Command::Render(RenderEvent::ClearSelection)),
        "drag" => {
            let key = word(args.next(), "movement key")?;
            let dx = number(args.next(), "dx")?;
            let dy = number(args.next(), "dy")?;
            ConsoleAction::Loop(Command::Render(RenderEvent::CardDragged { key, dx, dy }))
        }
        "pan" => {
            let dx = number(args.next(), "dx")?;
            let dy = number(args.next(), "dy")?;
            ConsoleAction::Loop(Command::Pan { dx, dy })
        }
        "zoom" => ConsoleAction::Loop(Command::Zoom(number(args.next(), "zoom")?)),
        "stand" => ConsoleAction::Loop(Command::Render(RenderEvent::FocusStand {
            name: word(args.next(), "stand name")?,
        })),
        "e" | "edit-mode" => ConsoleAction::ToggleEdit,
        "add" => {
            let lat = number(args.next(), "latitude")?;
            let lng = number(args.next(), "longitude")?;
            let heading = match args.next() {
                Some(raw) => number::<i32>(Some(raw), "heading")?,
                None => 0,
            };
            ConsoleAction::Add {
                point: GeoPoint::new(lat, lng),
                heading_deg: normalize_heading(heading),
            }
        }
        "rot" => ConsoleAction::Rotate(number(args.next(), "notches")?),
        "place" => ConsoleAction::Place,
        "edit" => ConsoleAction::Edit(word(args.next(), "stand name")?),
        "rm" => ConsoleAction::Remove(word(args.next(), "stand name")?),
        "h" | "help" | "?" => ConsoleAction::Help,
        "q" | "quit" => ConsoleAction::Loop(Command::Quit),
        other => return Err(ParseCommandError::Unknown(other.to_string())),
    };
    Ok(Some(action))
}

/// Dialogs over a line reader/writer pair (stdin/stdout in the binary)
pub struct ConsolePrompts<R, W> {
    lines: Mutex<Lines<R>>,
    out: Mutex<W>,
}

impl<R, W> ConsolePrompts<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            out: Mutex::new(out),
        }
    }

    /// Next input line; `None` at end of input
    pub async fn next_line(&self) -> Result<Option<String>> {
        self.lines
            .lock()
            .await
            .next_line()
            .await
            .context("Failed to read console input")
    }

    pub async fn say(&self, text: &str) -> Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await.context("Failed to write console output")
    }

    async fn ask(&self, question: &str) -> Option<String> {
        {
            let mut out = self.out.lock().await;
            out.write_all(question.as_bytes()).await.ok()?;
            out.flush().await.ok()?;
        }
        self.next_line().await.ok().flatten().map(|l| l.trim().to_string())
    }
}

#[async_trait]
impl<R, W> PromptService for ConsolePrompts<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Empty input keeps the default; an empty name with no default cancels
    async fn prompt_position(&self, prompt: PositionPrompt) -> Option<PositionAnswer> {
        let name = self
            .ask(&format!("{} name [{}]: ", prompt.title, prompt.default_name))
            .await?;
        let name = if name.is_empty() {
            prompt.default_name
        } else {
            name
        };
        if name.is_empty() {
            return None;
        }

        let heading = self
            .ask(&format!("heading [{}]: ", prompt.default_heading))
            .await?;
        let heading_deg = if heading.is_empty() {
            i32::from(prompt.default_heading)
        } else {
            heading.parse::<f64>().ok()?.round() as i32
        };

        Some(PositionAnswer { name, heading_deg })
    }

    async fn prompt_password(&self, title: &str) -> Option<String> {
        self.ask(&format!("{}: password: ", title)).await
    }
}

fn describe_draft(draft: &HeadingDraft) -> String {
    let [from, to] = draft.ray();
    format!(
        "Placing stand at ({:.6}, {:.6}) heading {}° toward ({:.6}, {:.6})",
        from.lat, from.lng, draft.heading_deg, to.lat, to.lng
    )
}

/// Read console lines until quit, end of input or shutdown
pub async fn run_console<R, W>(
    prompts: ConsolePrompts<R, W>,
    mut editor: Editor,
    stands: watch::Receiver<StandMap>,
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut draft: Option<HeadingDraft> = None;
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = prompts.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("Console input closed");
            break;
        };

        let action = match parse_command(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) => {
                prompts.say(&e.to_string()).await?;
                continue;
            }
        };

        let command = match action {
            ConsoleAction::Loop(command) => Some(command),
            ConsoleAction::Help => {
                prompts.say(HELP).await?;
                None
            }
            ConsoleAction::ToggleEdit => match editor.toggle(&prompts).await {
                Ok(enabled) => Some(Command::SetEditing(enabled)),
                Err(e) => {
                    prompts.say(&e.to_string()).await?;
                    None
                }
            },
            ConsoleAction::Add { point, heading_deg } => {
                if editor.is_enabled() {
                    let pending = HeadingDraft::new(point, heading_deg);
                    prompts.say(&describe_draft(&pending)).await?;
                    draft = Some(pending);
                } else {
                    prompts.say(&EditorError::NotEditing.to_string()).await?;
                }
                None
            }
            ConsoleAction::Rotate(notches) => {
                match draft.as_mut() {
                    Some(pending) => {
                        pending.rotate(notches);
                        prompts.say(&describe_draft(pending)).await?;
                    }
                    None => prompts.say("No stand being placed (add first)").await?,
                }
                None
            }
            ConsoleAction::Place => match draft.take() {
                Some(pending) => {
                    info!(
                        "Placing stand at ({:.6}, {:.6}) heading {}°",
                        pending.point.lat, pending.point.lng, pending.heading_deg
                    );
                    match editor.create_at(pending, &prompts).await {
                        Ok(edit) => Some(Command::ApplyEdit(edit)),
                        Err(e) => {
                            prompts.say(&e.to_string()).await?;
                            None
                        }
                    }
                }
                None => {
                    prompts.say("No stand being placed (add first)").await?;
                    None
                }
            },
            ConsoleAction::Edit(name) => {
                let current = stands.borrow().clone();
                match editor.edit(&name, &current, &prompts).await {
                    Ok(edit) => Some(Command::ApplyEdit(edit)),
                    Err(e) => {
                        prompts.say(&e.to_string()).await?;
                        None
                    }
                }
            }
            ConsoleAction::Remove(name) => {
                let result = editor.delete(&name, &stands.borrow());
                match result {
                    Ok(edit) => Some(Command::ApplyEdit(edit)),
                    Err(e) => {
                        prompts.say(&e.to_string()).await?;
                        None
                    }
                }
            }
        };

        let Some(command) = command else {
            continue;
        };
        let quit = command == Command::Quit;
        if commands.send(command).await.is_err() {
            debug!("Poll loop gone, closing console");
            break;
        }
        if quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::StandEdit;
    use crate::stands::StandRecord;
    use tokio::io::BufReader;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("r"),
            Ok(Some(ConsoleAction::Loop(Command::Refresh)))
        );
        assert_eq!(
            parse_command("s 12"),
            Ok(Some(ConsoleAction::Loop(Command::Seek(12))))
        );
        assert_eq!(
            parse_command("drag  LV-AAA 10 -4.5"),
            Ok(Some(ConsoleAction::Loop(Command::Render(
                RenderEvent::CardDragged {
                    key: "LV-AAA".into(),
                    dx: 10.0,
                    dy: -4.5
                }
            ))))
        );
        assert_eq!(
            parse_command("add -34.82 -58.53 -10"),
            Ok(Some(ConsoleAction::Add {
                point: GeoPoint::new(-34.82, -58.53),
                heading_deg: 350
            }))
        );
        assert_eq!(parse_command("rot -3"), Ok(Some(ConsoleAction::Rotate(-3))));
        assert_eq!(parse_command("place"), Ok(Some(ConsoleAction::Place)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_command("s"),
            Err(ParseCommandError::MissingArgument("index"))
        );
        assert_eq!(
            parse_command("s x"),
            Err(ParseCommandError::InvalidNumber("x".into()))
        );
        assert_eq!(
            parse_command("fly"),
            Err(ParseCommandError::Unknown("fly".into()))
        );
    }

    fn prompts(input: &str) -> ConsolePrompts<BufReader<&[u8]>, Vec<u8>> {
        ConsolePrompts::new(BufReader::new(input.as_bytes()), Vec::new())
    }

    #[tokio::test]
    async fn test_position_prompt_defaults() {
        let p = prompts("\n\n");
        let answer = p
            .prompt_position(PositionPrompt {
                title: "Edit stand 7".into(),
                default_name: "7".into(),
                default_heading: 90,
            })
            .await;
        assert_eq!(
            answer,
            Some(PositionAnswer {
                name: "7".into(),
                heading_deg: 90
            })
        );

        // no default name and nothing typed cancels
        let p = prompts("\n");
        let answer = p
            .prompt_position(PositionPrompt {
                title: "New stand".into(),
                default_name: String::new(),
                default_heading: 0,
            })
            .await;
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn test_console_session_creates_stand() {
        let input = "e\n12345678\nadd -34.82 -58.53 40\nplace\n50B\n45\nrm 99\nq\n";
        let (tx, mut rx) = mpsc::channel(8);
        let (_stands_tx, stands_rx) = watch::channel(StandMap::new());

        run_console(
            prompts(input),
            Editor::new("12345678"),
            stands_rx,
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(Command::SetEditing(true)));
        assert_eq!(
            rx.recv().await,
            Some(Command::ApplyEdit(StandEdit::Upsert(StandRecord::new(
                "50B", -34.82, -58.53, 45
            ))))
        );
        // rm of an unknown stand only prints an error
        assert_eq!(rx.recv().await, Some(Command::Quit));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_rotated_draft_sets_default_heading() {
        // add before edit mode and rot/place without a draft are refused
        let input = "add 1 2
rot 1
place
e
12345678
add -34.82 -58.53 358
rot 3
rot -1
place
60

q
";
        let (tx, mut rx) = mpsc::channel(8);
        let (_stands_tx, stands_rx) = watch::channel(StandMap::new());

        run_console(
            prompts(input),
            Editor::new("12345678"),
            stands_rx,
            tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(rx.recv().await, Some(Command::SetEditing(true)));
        // 358 + 2 notches of 2° wraps to 2; the empty heading answer keeps it
        assert_eq!(
            rx.recv().await,
            Some(Command::ApplyEdit(StandEdit::Upsert(StandRecord::new(
                "60", -34.82, -58.53, 2
            ))))
        );
        assert_eq!(rx.recv().await, Some(Command::Quit));
    }
}
