// UI layer: an interactive menu built on `dialoguer`. It owns the session
// context, collects input, hands it to the orchestrator and prints the
// outcome. Failures are printed and the menu comes back.

use std::fmt::Display;
use std::io::stdout;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::event;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::gateway::Invoke;
use crate::posts::TimelineEntry;
use crate::session::{PendingWorkflow, SessionContext, WorkflowKind};
use crate::workflow::{Orchestrator, WorkflowError};

/// One menu entry. The list is rebuilt every round since labels follow the
/// session and pending workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ListPosts,
    FollowPosts,
    SignIn,
    Register,
    ResetPassword,
    Post,
    SignOut,
    DeleteAccount,
    DeletePost,
    CancelPending(WorkflowKind),
    Quit,
}

fn menu(ctx: &SessionContext) -> Vec<(Action, String)> {
    let register = match ctx.pending() {
        PendingWorkflow::AwaitingRegistrationCode { .. } => {
            "Finish registering (automatically signs you in)"
        }
        _ => "Register as new user",
    };
    let reset = match ctx.pending() {
        PendingWorkflow::AwaitingResetCode { .. } => "Finish resetting password",
        _ => "Reset password",
    };

    let mut items = vec![
        (Action::ListPosts, "List all posts".to_string()),
        (
            Action::FollowPosts,
            "Follow posts (refreshes until you press Enter)".to_string(),
        ),
        (Action::SignIn, "Sign in".to_string()),
        (Action::Register, register.to_string()),
        (Action::ResetPassword, reset.to_string()),
        (Action::Post, "Post a message (you must be signed in)".to_string()),
        (Action::SignOut, "Sign out".to_string()),
        (
            Action::DeleteAccount,
            "Delete your account (you must be signed in)".to_string(),
        ),
        (
            Action::DeletePost,
            "Delete a post (you must be signed in and it must be your post)".to_string(),
        ),
    ];
    if let Some(kind) = ctx.pending().kind() {
        items.push((Action::CancelPending(kind), format!("Cancel pending {kind}")));
    }
    items.push((Action::Quit, "Quit".to_string()));
    items
}

fn prompt(ctx: &SessionContext) -> String {
    match ctx.username() {
        Some(name) => format!("({name})>"),
        None => "(anonymous)>".to_string(),
    }
}

/// Main interactive loop. Runs until the user picks "Quit".
pub fn main_menu<I: Invoke>(orchestrator: Orchestrator<I>, config: &Config) -> Result<()> {
    let mut ctx = SessionContext::new();
    let debug = config.debug;
    let refresh = Duration::from_secs(config.refresh_seconds.max(1));

    loop {
        let items = menu(&ctx);
        let labels: Vec<&str> = items.iter().map(|(_, label)| label.as_str()).collect();
        let selection = Select::new()
            .with_prompt(prompt(&ctx))
            .items(&labels)
            .default(0)
            .interact()?;
        let Some(&(action, _)) = items.get(selection) else {
            continue;
        };

        if action == Action::Quit {
            break;
        }
        // Keep earlier output around when debugging.
        if !debug {
            clear_screen()?;
        }
        tracing::debug!(?action, "menu selection");

        let outcome = match action {
            Action::ListPosts => list_posts(&orchestrator),
            Action::FollowPosts => follow_posts(&orchestrator, refresh, debug),
            Action::SignIn => handle_sign_in(&orchestrator, &mut ctx),
            Action::Register => handle_register(&orchestrator, &mut ctx),
            Action::ResetPassword => handle_reset(&orchestrator, &mut ctx),
            Action::Post => handle_post(&orchestrator, &ctx),
            Action::SignOut => orchestrator
                .sign_out(&mut ctx)
                .map(|()| Some("You are signed out".to_string()))
                .map_err(Into::into),
            Action::DeleteAccount => handle_delete_account(&orchestrator, &mut ctx),
            Action::DeletePost => handle_delete_post(&orchestrator, &ctx),
            Action::CancelPending(_) => Ok(orchestrator
                .abandon_pending(&mut ctx)
                .map(|kind| format!("Cancelled pending {kind}"))),
            Action::Quit => Ok(None),
        };

        match outcome {
            Ok(Some(message)) => println!("{message}"),
            Ok(None) => {}
            Err(Failure::Workflow(err)) => println!("{err}"),
            Err(Failure::Terminal(err)) => return Err(err),
        }
        println!();
    }
    Ok(())
}

/// Workflow failures are shown to the user; terminal failures end the loop.
enum Failure {
    Workflow(WorkflowError),
    Terminal(anyhow::Error),
}

impl From<WorkflowError> for Failure {
    fn from(err: WorkflowError) -> Self {
        Failure::Workflow(err)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::Terminal(err.into())
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Terminal(err)
    }
}

type Outcome = std::result::Result<Option<String>, Failure>;

fn clear_screen() -> Result<()> {
    execute!(stdout(), Clear(ClearType::All), MoveTo(0, 0)).context("Failed to clear screen")
}

/// Show a spinner while `f` performs a remote call.
fn with_spinner<T>(message: impl Display, f: impl FnOnce() -> T) -> Result<T> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").context("Invalid spinner template")?,
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    let value = f();
    spinner.finish_and_clear();
    Ok(value)
}

fn ask(prompt: &str) -> std::io::Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map(|value| value.trim().to_string())
}

fn ask_secret(prompt: &str) -> std::io::Result<String> {
    Password::new().with_prompt(prompt).interact()
}

fn list_posts<I: Invoke>(orchestrator: &Orchestrator<I>) -> Outcome {
    let timeline = with_spinner("Getting posts...", || orchestrator.list_posts())??;
    if timeline.is_empty() {
        return Ok(Some("No posts yet".to_string()));
    }
    print_timeline(&timeline);
    Ok(None)
}

fn follow_posts<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    refresh: Duration,
    debug: bool,
) -> Outcome {
    loop {
        let timeline = orchestrator.list_posts()?;
        if !debug {
            clear_screen()?;
        }
        print_timeline(&timeline);
        println!("Refreshing every {}s, press Enter to stop", refresh.as_secs());

        if event::poll(refresh)? {
            // Consume the key press that stopped us.
            let _stop = event::read()?;
            return Ok(None);
        }
    }
}

fn print_timeline(timeline: &[TimelineEntry]) {
    for entry in timeline {
        match entry {
            TimelineEntry::DateSeparator(date) => {
                println!("=== {} ===", date.format("%A, %B %e %Y"));
                println!();
            }
            TimelineEntry::Post(item) => {
                let time = item
                    .posted_at
                    .map(|t| t.format("%-I:%M:%S %p UTC").to_string())
                    .unwrap_or_else(|| "???".to_string());
                println!("{}@{} <{}>:", item.post.author, time, item.post.timestamp_id);
                println!("{}", item.post.message);
                println!();
            }
        }
    }
}

fn handle_sign_in<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    ctx: &mut SessionContext,
) -> Outcome {
    if ctx.is_authenticated() {
        return Err(WorkflowError::AlreadySignedIn.into());
    }
    let username = ask("Enter your user name")?;
    let password = ask_secret("Enter your password")?;

    with_spinner("Signing in...", || {
        orchestrator.sign_in(ctx, &username, &password)
    })??;
    Ok(Some(format!("Welcome {username}!")))
}

/// Refuse a flow before any prompt when the session is signed in or the
/// other two-phase workflow is waiting for its code.
fn check_flow_available(ctx: &SessionContext, wanted: WorkflowKind) -> Result<(), WorkflowError> {
    if ctx.is_authenticated() {
        return Err(WorkflowError::AlreadySignedIn);
    }
    match ctx.pending().kind() {
        Some(kind) if kind != wanted => Err(WorkflowError::WorkflowPending(kind)),
        _ => Ok(()),
    }
}

fn handle_register<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    ctx: &mut SessionContext,
) -> Outcome {
    check_flow_available(ctx, WorkflowKind::Registration)?;

    if let PendingWorkflow::AwaitingRegistrationCode { username, .. } = ctx.pending() {
        let username = username.clone();
        let code = ask("Enter your confirmation code")?;
        with_spinner("Finishing registration...", || {
            orchestrator.finish_registration(ctx, &code)
        })??;
        return Ok(Some(format!("Registered and signed in as {username}")));
    }

    let username = ask("Enter your user name")?;
    let password = ask_secret("Enter a password with at least 6 characters")?;
    let email = ask("Enter your email address")?;

    let data = with_spinner("Registering...", || {
        orchestrator.start_registration(ctx, &username, &password, &email)
    })??;
    let note = if data.user_confirmed {
        "Your account is already confirmed; choose \"Finish registering\" to sign in"
    } else {
        "Check your email for a confirmation code, then choose \"Finish registering\""
    };
    Ok(Some(note.to_string()))
}

fn handle_reset<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    ctx: &mut SessionContext,
) -> Outcome {
    check_flow_available(ctx, WorkflowKind::PasswordReset)?;

    if let PendingWorkflow::AwaitingResetCode { .. } = ctx.pending() {
        let code = ask("Enter the confirmation code")?;
        let password = ask_secret("Enter your new password")?;
        with_spinner("Resetting password...", || {
            orchestrator.finish_reset(ctx, &code, &password)
        })??;
        return Ok(Some("Password reset; you are signed in".to_string()));
    }

    let username = ask("Enter your user name")?;
    let data = with_spinner("Requesting reset code...", || {
        orchestrator.start_reset(ctx, &username)
    })??;
    let destination = &data.code_delivery_details.destination;
    let note = if destination.is_empty() {
        "A confirmation code is on its way".to_string()
    } else {
        format!("A confirmation code was sent to {destination}")
    };
    Ok(Some(format!(
        "{note}; choose \"Finish resetting password\" to continue"
    )))
}

fn handle_post<I: Invoke>(orchestrator: &Orchestrator<I>, ctx: &SessionContext) -> Outcome {
    if !ctx.is_authenticated() {
        return Err(WorkflowError::NotSignedIn.into());
    }
    let message = ask("Enter the message to post")?;
    with_spinner("Posting...", || orchestrator.post_message(ctx, &message))??;
    Ok(Some("Message posted".to_string()))
}

fn handle_delete_account<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    ctx: &mut SessionContext,
) -> Outcome {
    if !ctx.is_authenticated() {
        return Err(WorkflowError::NotSignedIn.into());
    }
    let confirmed = Confirm::new()
        .with_prompt("Really delete your account?")
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(Some("Account kept".to_string()));
    }
    with_spinner("Deleting account...", || orchestrator.delete_account(ctx))??;
    Ok(Some("Your account has been deleted".to_string()))
}

fn handle_delete_post<I: Invoke>(
    orchestrator: &Orchestrator<I>,
    ctx: &SessionContext,
) -> Outcome {
    if !ctx.is_authenticated() {
        return Err(WorkflowError::NotSignedIn.into());
    }
    let id = ask(
        "Enter the ID of the post to delete (the long number at the end of the first line)",
    )?;
    with_spinner("Deleting post...", || orchestrator.delete_post(ctx, &id))??;
    Ok(Some("Post deleted".to_string()))
}
