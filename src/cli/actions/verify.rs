use crate::{
    cli::actions::Action,
    email_auth::{ClientConfig, EmailAuthApi, EmailAuthClient},
    otp::{
        CodeBuffer, Focus, InputEvent, KeyAction, Notice, SessionBoundary, SessionOutcome,
        SessionStatus, SessionView,
    },
};
use anyhow::{anyhow, bail, Result};
use std::{fmt::Write as _, io::Write, sync::Arc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};

const DUPLICATE_FALLBACK: &str = "This email is already registered.";

/// Handle the verify action
///
/// # Errors
///
/// Fails when the email is already registered, the session expires, or input
/// ends before a code matched.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Verify {
        email,
        api_url,
        timeout,
        session,
        skip_check,
    } = action;

    let config = ClientConfig {
        timeout,
        ..ClientConfig::new(api_url)
    };
    let client = EmailAuthClient::new(&config)?;
    let mut stdout = std::io::stdout();

    if !skip_check {
        request_code(&client, &email, &mut stdout).await?;
    }

    let session = SessionBoundary::open(email, Arc::new(client), session)?;
    let stdin = BufReader::new(tokio::io::stdin());

    drive(session, stdin, &mut stdout).await?;

    Ok(())
}

/// Asks the server to mail a code to `email`, refusing registered addresses.
#[instrument(skip_all)]
async fn request_code<A, W>(api: &A, email: &str, out: &mut W) -> Result<()>
where
    A: EmailAuthApi,
    W: Write,
{
    let check = api.check_email(email).await?;
    if check.is_duplicate {
        let message = if check.message.trim().is_empty() {
            DUPLICATE_FALLBACK.to_string()
        } else {
            check.message
        };
        bail!(message);
    }

    info!("verification code requested");
    writeln!(out, "A verification code was sent to {email}.")?;
    Ok(())
}

/// Feeds lines from `input` into `session` and writes every visible change to `out`.
///
/// When input ends, any verification still in progress is allowed to finish.
///
/// # Errors
///
/// Fails when the session expires, ends without a match, or `out` cannot be written.
pub async fn drive<R, W>(session: SessionBoundary, input: R, out: &mut W) -> Result<SessionOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut view = session.view();
    let mut input_open = true;
    let mut sent: u64 = 0;
    let mut applied: u64 = 0;
    let mut last_shown: Option<Shown> = None;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    // The loop only ends on its own after a match.
                    break;
                }

                let snapshot = view.borrow_and_update().clone();
                applied = snapshot.inputs_applied;
                let shown = Shown::from(&snapshot);
                if last_shown.as_ref() != Some(&shown) {
                    writeln!(out, "{}", render(&snapshot))?;
                    last_shown = Some(shown);
                }

                match snapshot.status {
                    SessionStatus::Verified => break,
                    SessionStatus::Expired if !snapshot.verifying => {
                        session.close().await?;
                        bail!(snapshot
                            .expired_message()
                            .unwrap_or("Verification time expired."));
                    }
                    _ if !input_open && settled(&snapshot, sent) => {
                        return finish_without_input(session).await;
                    }
                    _ => {}
                }
            }

            // Focus is read from the view, so wait until the last event landed.
            line = lines.next_line(), if input_open && applied >= sent => {
                let Some(line) = line? else {
                    debug!("input closed");
                    input_open = false;
                    if settled(&session.snapshot(), sent) {
                        return finish_without_input(session).await;
                    }
                    continue;
                };

                let focus = session.snapshot().focus;
                match parse_line(&line, focus) {
                    Ok(Some(event)) => {
                        session.send(event).await?;
                        sent += 1;
                    }
                    Ok(None) => {}
                    Err(message) => writeln!(out, "{message}")?,
                }
            }
        }
    }

    let outcome = session.finished().await?;
    writeln!(out, "Email verified.")?;
    Ok(outcome)
}

/// Every sent event was applied and no verification is outstanding.
fn settled(view: &SessionView, sent: u64) -> bool {
    view.inputs_applied >= sent && !view.verifying
}

async fn finish_without_input(session: SessionBoundary) -> Result<SessionOutcome> {
    match session.close().await? {
        SessionOutcome::Verified => Ok(SessionOutcome::Verified),
        SessionOutcome::Closed => Err(anyhow!("input ended before the code was verified")),
    }
}

/// What a rendered line depends on, minus the countdown.
#[derive(Debug, PartialEq)]
struct Shown {
    buffer: CodeBuffer,
    focus: Focus,
    status: SessionStatus,
    notice: Option<Notice>,
    verifying: bool,
    minutes: u64,
}

impl From<&SessionView> for Shown {
    fn from(view: &SessionView) -> Self {
        Self {
            buffer: view.buffer.clone(),
            focus: view.focus,
            status: view.status,
            notice: view.notice,
            verifying: view.verifying,
            minutes: view.remaining_seconds.div_ceil(60),
        }
    }
}

/// Turns one line of user input into an event for the focused cell.
///
/// `:left`, `:right` and `:back` act on the focused cell, `:focus N` moves to
/// cell `N` (1-based), a single character is typed and anything longer is pasted.
///
/// # Errors
///
/// Returns a user-facing message for unknown commands or when no cell is focused.
pub fn parse_line(line: &str, focus: Focus) -> Result<Option<InputEvent>, String> {
    let text = line.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(command) = text.strip_prefix(':') {
        let mut parts = command.split_whitespace();
        let action = match parts.next() {
            Some("left") => KeyAction::ArrowLeft,
            Some("right") => KeyAction::ArrowRight,
            Some("back") => KeyAction::Backspace,
            Some("focus") => {
                let index = parts
                    .next()
                    .and_then(|value| value.parse::<usize>().ok())
                    .and_then(|value| value.checked_sub(1))
                    .ok_or_else(|| "Usage: :focus N, where N starts at 1".to_string())?;
                return Ok(Some(InputEvent::Focus { index }));
            }
            _ => return Err(format!("Unknown command: {text}")),
        };
        let index = focused(focus)?;
        return Ok(Some(InputEvent::Key { index, action }));
    }

    let index = focused(focus)?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(Some(InputEvent::Digit { index, ch })),
        _ => Ok(Some(InputEvent::Paste {
            index,
            text: text.to_string(),
        })),
    }
}

fn focused(focus: Focus) -> Result<usize, String> {
    focus
        .index()
        .ok_or_else(|| "No cell is focused. Use :focus N first.".to_string())
}

/// One status line for the terminal, followed by any message.
#[must_use]
pub fn render(view: &SessionView) -> String {
    let mut text = format!("{} {}", view.buffer, view.countdown());

    if let Some(index) = view.focus.index() {
        let _ = write!(text, "  cell {}", index + 1);
    }
    if view.verifying {
        text.push_str("  verifying...");
    }
    if let Some(message) = view.expired_message() {
        let _ = write!(text, "\n{message}");
    }
    if let Some(notice) = view.notice {
        let _ = write!(text, "\n{notice}");
    }

    text
}
