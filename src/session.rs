// Session state.
//
// `SessionContext` owns the authentication status of one logical user
// session together with the two-phase workflow that may be in flight. It
// changes only through `SessionEvent`s, and every applied event is
// checked against the token/status invariant: an anonymous session has no
// token, an authenticated one always has a token.

use std::fmt;

use thiserror::Error;

/// Whether the session holds a usable bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    Anonymous,
    Authenticated,
}

/// The two multi-step workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Registration,
    PasswordReset,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowKind::Registration => f.write_str("registration"),
            WorkflowKind::PasswordReset => f.write_str("password reset"),
        }
    }
}

/// Workflow waiting for its confirmation code.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum PendingWorkflow {
    #[default]
    Idle,
    AwaitingRegistrationCode {
        username: String,
        password: String,
    },
    AwaitingResetCode {
        username: String,
    },
}

impl PendingWorkflow {
    pub fn kind(&self) -> Option<WorkflowKind> {
        match self {
            PendingWorkflow::Idle => None,
            PendingWorkflow::AwaitingRegistrationCode { .. } => Some(WorkflowKind::Registration),
            PendingWorkflow::AwaitingResetCode { .. } => Some(WorkflowKind::PasswordReset),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            PendingWorkflow::Idle => None,
            PendingWorkflow::AwaitingRegistrationCode { username, .. }
            | PendingWorkflow::AwaitingResetCode { username } => Some(username),
        }
    }
}

// Hand-written so the retained password never reaches a log line.
impl fmt::Debug for PendingWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingWorkflow::Idle => f.write_str("Idle"),
            PendingWorkflow::AwaitingRegistrationCode { username, .. } => f
                .debug_struct("AwaitingRegistrationCode")
                .field("username", username)
                .finish_non_exhaustive(),
            PendingWorkflow::AwaitingResetCode { username } => f
                .debug_struct("AwaitingResetCode")
                .field("username", username)
                .finish(),
        }
    }
}

/// Transitions the orchestrator may apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AuthenticateSucceeded { token: String, username: String },
    SignedOut,
    AccountDeleted,
    PendingWorkflowStarted(PendingWorkflow),
    PendingWorkflowResolved,
}

/// A transition that was refused. The context is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot authenticate with an empty token")]
    EmptyToken,

    #[error("not signed in")]
    NotAuthenticated,

    #[error("a {0} is already in progress")]
    WorkflowPending(WorkflowKind),

    #[error("no workflow to start")]
    IdleWorkflow,

    #[error("session invariant violated: {0}")]
    Invariant(&'static str),
}

/// Per-session authentication context, owned by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    status: AuthStatus,
    token: String,
    username: String,
    pending: PendingWorkflow,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// Bearer token, present only while authenticated.
    pub fn token(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated => Some(&self.token),
            AuthStatus::Anonymous => None,
        }
    }

    /// Name of the signed-in user, if any.
    pub fn username(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated => Some(&self.username),
            AuthStatus::Anonymous => None,
        }
    }

    pub fn pending(&self) -> &PendingWorkflow {
        &self.pending
    }

    /// Apply `event`, or refuse it without changing anything.
    pub fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let mut next = self.clone();
        match event {
            SessionEvent::AuthenticateSucceeded { token, username } => {
                if token.is_empty() {
                    return Err(SessionError::EmptyToken);
                }
                next.status = AuthStatus::Authenticated;
                next.token = token;
                next.username = username;
                next.pending = PendingWorkflow::Idle;
            }
            SessionEvent::SignedOut | SessionEvent::AccountDeleted => {
                if !self.is_authenticated() {
                    return Err(SessionError::NotAuthenticated);
                }
                next.status = AuthStatus::Anonymous;
                next.token.clear();
                next.username.clear();
            }
            SessionEvent::PendingWorkflowStarted(workflow) => {
                if let Some(kind) = self.pending.kind() {
                    return Err(SessionError::WorkflowPending(kind));
                }
                if workflow == PendingWorkflow::Idle {
                    return Err(SessionError::IdleWorkflow);
                }
                next.pending = workflow;
            }
            SessionEvent::PendingWorkflowResolved => {
                next.pending = PendingWorkflow::Idle;
            }
        }

        next.check_invariant()?;
        *self = next;
        Ok(())
    }

    fn check_invariant(&self) -> Result<(), SessionError> {
        match (self.status, self.token.is_empty()) {
            (AuthStatus::Anonymous, false) => {
                Err(SessionError::Invariant("anonymous session holds a token"))
            }
            (AuthStatus::Authenticated, true) => Err(SessionError::Invariant(
                "authenticated session has no token",
            )),
            _ => Ok(()),
        }
    }
}
