// Workflow orchestration.
//
// `Orchestrator` turns each user action into one or two remote calls,
// interprets the answers through `decode` and applies the
// resulting transition to the caller's `SessionContext`. A step that
// fails leaves the context exactly as the failure path prescribes: the
// session is never half-updated, and a failed `finish*` step drops the
// pending workflow so the caller starts over.

use std::fmt;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use thiserror::Error;

use crate::decode::{self, DecodeError};
use crate::gateway::{Gateway, GatewayError, Invoke};
use crate::posts::{build_timeline, Post, TimelineEntry};
use crate::protocol::{
    AddPostRequest, Credential, DeleteAccountRequest, DeletePostRequest, FinishRegisterRequest,
    FinishResetData, FinishResetRequest, GetPostsRequest, PostRecord, RemoteFunction, SignInData,
    StartRegisterData, StartRegisterRequest, StartResetData, StartResetRequest,
};
use crate::session::{PendingWorkflow, SessionContext, SessionError, SessionEvent, WorkflowKind};

/// Shortest password the registration flow accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// User-level step a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ListPosts,
    SignIn,
    StartRegistration,
    FinishRegistration,
    StartReset,
    FinishReset,
    PostMessage,
    DeletePost,
    DeleteAccount,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::ListPosts => "could not get posts",
            Step::SignIn => "could not sign in user",
            Step::StartRegistration => "could not start registering user",
            Step::FinishRegistration => "could not finish registering user",
            Step::StartReset => "could not start resetting password",
            Step::FinishReset => "could not reset password",
            Step::PostMessage => "message not posted",
            Step::DeletePost => "could not delete post",
            Step::DeleteAccount => "could not delete account",
        };
        f.write_str(text)
    }
}

/// What went wrong underneath a failed remote call.
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("you are already signed in; sign out first")]
    AlreadySignedIn,

    #[error("you must be signed in to do that")]
    NotSignedIn,

    #[error("a {0} is already in progress; finish or cancel it first")]
    WorkflowPending(WorkflowKind),

    #[error("no {0} is in progress")]
    NoPendingWorkflow(WorkflowKind),

    #[error("your password is too short, use at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("{step}: no access token in response")]
    MissingToken { step: Step },

    #[error("{step}: {source}")]
    Call {
        step: Step,
        #[source]
        source: CallError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl WorkflowError {
    /// Message reported by the backend, or the decoder's status fallback.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            WorkflowError::Call {
                source: CallError::Decode(err),
                ..
            } => err.remote_message(),
            _ => None,
        }
    }

    /// Step whose remote call failed, if this is a call failure.
    pub fn step(&self) -> Option<Step> {
        match self {
            WorkflowError::Call { step, .. } | WorkflowError::MissingToken { step } => Some(*step),
            _ => None,
        }
    }
}

/// Runs the user-facing operations against the backend.
pub struct Orchestrator<I> {
    gateway: Gateway<I>,
    max_posts: u32,
}

impl<I: Invoke> Orchestrator<I> {
    pub fn new(invoker: I, max_posts: u32) -> Self {
        Orchestrator {
            gateway: Gateway::new(invoker),
            max_posts,
        }
    }

    pub fn invoker(&self) -> &I {
        self.gateway.invoker()
    }

    fn call<R: Serialize, T: DeserializeOwned>(
        &self,
        step: Step,
        function: RemoteFunction,
        request: &R,
    ) -> Result<T, WorkflowError> {
        let wrap = |source: CallError| WorkflowError::Call { step, source };
        let raw = self
            .gateway
            .call(function, request)
            .map_err(|e| wrap(e.into()))?;
        decode::decode(&raw).map_err(|e| {
            tracing::debug!(%function, error = %e, "remote call failed");
            wrap(e.into())
        })
    }

    fn require_token(ctx: &SessionContext) -> Result<String, WorkflowError> {
        ctx.token()
            .map(str::to_owned)
            .ok_or(WorkflowError::NotSignedIn)
    }

    fn require_anonymous_and_idle(ctx: &SessionContext) -> Result<(), WorkflowError> {
        if ctx.is_authenticated() {
            return Err(WorkflowError::AlreadySignedIn);
        }
        match ctx.pending().kind() {
            Some(kind) => Err(WorkflowError::WorkflowPending(kind)),
            None => Ok(()),
        }
    }

    /// Fetch the latest posts and arrange them oldest-first with date
    /// separators. Works with or without a session.
    pub fn list_posts(&self) -> Result<Vec<TimelineEntry>, WorkflowError> {
        let records: Option<Vec<PostRecord>> = self.call(
            Step::ListPosts,
            RemoteFunction::GetPosts,
            &GetPostsRequest::newest(self.max_posts),
        )?;
        let posts: Vec<Post> = records
            .unwrap_or_default()
            .into_iter()
            .map(Post::from)
            .collect();
        tracing::debug!(count = posts.len(), "got posts");
        Ok(build_timeline(posts))
    }

    /// Sign in and authenticate the session. Refused without a remote call
    /// when the session is already authenticated.
    pub fn sign_in(
        &self,
        ctx: &mut SessionContext,
        username: &str,
        password: &str,
    ) -> Result<(), WorkflowError> {
        if ctx.is_authenticated() {
            return Err(WorkflowError::AlreadySignedIn);
        }
        let token = self.fetch_token(Step::SignIn, username, password)?;
        ctx.apply(SessionEvent::AuthenticateSucceeded {
            token,
            username: username.to_owned(),
        })?;
        tracing::info!(user = username, "signed in");
        Ok(())
    }

    fn fetch_token(
        &self,
        step: Step,
        username: &str,
        password: &str,
    ) -> Result<String, WorkflowError> {
        let credential = Credential {
            user_name: username.to_owned(),
            password: password.to_owned(),
        };
        let data: Option<SignInData> = self.call(step, RemoteFunction::SignIn, &credential)?;
        let token = data.unwrap_or_default().authentication_result.access_token;
        if token.is_empty() {
            return Err(WorkflowError::MissingToken { step });
        }
        Ok(token)
    }

    /// Registration step one. On success the session waits for the
    /// confirmation code; on failure nothing is retained.
    pub fn start_registration(
        &self,
        ctx: &mut SessionContext,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<StartRegisterData, WorkflowError> {
        Self::require_anonymous_and_idle(ctx)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(WorkflowError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }

        let request = StartRegisterRequest {
            user_name: username.to_owned(),
            password: password.to_owned(),
            email: email.to_owned(),
        };
        // Result-only replies are a plain success.
        let data: Option<StartRegisterData> =
            self.call(Step::StartRegistration, RemoteFunction::StartRegister, &request)?;

        ctx.apply(SessionEvent::PendingWorkflowStarted(
            PendingWorkflow::AwaitingRegistrationCode {
                username: username.to_owned(),
                password: password.to_owned(),
            },
        ))?;
        tracing::info!(user = username, "registration started");
        Ok(data.unwrap_or_default())
    }

    /// Registration step two: confirm the code, then sign in with the
    /// password kept from step one. Any failure drops the pending workflow.
    pub fn finish_registration(
        &self,
        ctx: &mut SessionContext,
        confirmation_code: &str,
    ) -> Result<(), WorkflowError> {
        let (username, password) = match ctx.pending() {
            PendingWorkflow::AwaitingRegistrationCode { username, password } => {
                (username.clone(), password.clone())
            }
            _ => return Err(WorkflowError::NoPendingWorkflow(WorkflowKind::Registration)),
        };

        let outcome = self
            .call::<_, IgnoredAny>(
                Step::FinishRegistration,
                RemoteFunction::FinishRegister,
                &FinishRegisterRequest {
                    user_name: username.clone(),
                    confirmation_code: confirmation_code.to_owned(),
                },
            )
            .and_then(|_| self.fetch_token(Step::FinishRegistration, &username, &password));

        match outcome {
            Ok(token) => {
                ctx.apply(SessionEvent::AuthenticateSucceeded {
                    token,
                    username: username.clone(),
                })?;
                tracing::info!(user = %username, "registration finished, signed in");
                Ok(())
            }
            Err(err) => {
                ctx.apply(SessionEvent::PendingWorkflowResolved)?;
                Err(err)
            }
        }
    }

    /// Password reset step one: ask the backend to send a code.
    pub fn start_reset(
        &self,
        ctx: &mut SessionContext,
        username: &str,
    ) -> Result<StartResetData, WorkflowError> {
        Self::require_anonymous_and_idle(ctx)?;

        let data: StartResetData = self
            .call::<_, Option<StartResetData>>(
                Step::StartReset,
                RemoteFunction::StartReset,
                &StartResetRequest {
                    user_name: username.to_owned(),
                },
            )?
            .unwrap_or_default();

        ctx.apply(SessionEvent::PendingWorkflowStarted(
            PendingWorkflow::AwaitingResetCode {
                username: username.to_owned(),
            },
        ))?;
        tracing::info!(
            user = username,
            destination = %data.code_delivery_details.destination,
            "password reset started"
        );
        Ok(data)
    }

    /// Password reset step two. The token returned by this call signs the
    /// user in; no separate sign-in is made.
    pub fn finish_reset(
        &self,
        ctx: &mut SessionContext,
        confirmation_code: &str,
        new_password: &str,
    ) -> Result<(), WorkflowError> {
        let username = match ctx.pending() {
            PendingWorkflow::AwaitingResetCode { username } => username.clone(),
            _ => return Err(WorkflowError::NoPendingWorkflow(WorkflowKind::PasswordReset)),
        };

        let outcome = self
            .call::<_, Option<FinishResetData>>(
                Step::FinishReset,
                RemoteFunction::FinishReset,
                &FinishResetRequest {
                    user_name: username.clone(),
                    confirmation_code: confirmation_code.to_owned(),
                    new_password: new_password.to_owned(),
                },
            )
            .and_then(|data| {
                data.and_then(|data| data.authentication_result)
                    .map(|auth| auth.access_token)
                    .filter(|token| !token.is_empty())
                    .ok_or(WorkflowError::MissingToken {
                        step: Step::FinishReset,
                    })
            });

        match outcome {
            Ok(token) => {
                ctx.apply(SessionEvent::AuthenticateSucceeded {
                    token,
                    username: username.clone(),
                })?;
                tracing::info!(user = %username, "password reset, signed in");
                Ok(())
            }
            Err(err) => {
                ctx.apply(SessionEvent::PendingWorkflowResolved)?;
                Err(err)
            }
        }
    }

    /// Drop a pending workflow without contacting the backend.
    pub fn abandon_pending(&self, ctx: &mut SessionContext) -> Option<WorkflowKind> {
        let kind = ctx.pending().kind()?;
        // Resolving is always accepted.
        ctx.apply(SessionEvent::PendingWorkflowResolved).ok()?;
        tracing::debug!(%kind, "pending workflow abandoned");
        Some(kind)
    }

    pub fn post_message(&self, ctx: &SessionContext, message: &str) -> Result<(), WorkflowError> {
        let access_token = Self::require_token(ctx)?;
        self.call::<_, IgnoredAny>(
            Step::PostMessage,
            RemoteFunction::AddPost,
            &AddPostRequest {
                access_token,
                message: message.to_owned(),
            },
        )?;
        Ok(())
    }

    /// Delete the post identified by `timestamp_id`. Ownership is enforced
    /// by the backend only.
    pub fn delete_post(
        &self,
        ctx: &SessionContext,
        timestamp_id: &str,
    ) -> Result<(), WorkflowError> {
        let access_token = Self::require_token(ctx)?;
        self.call::<_, IgnoredAny>(
            Step::DeletePost,
            RemoteFunction::DeletePost,
            &DeletePostRequest {
                access_token,
                timestamp_of_post: timestamp_id.trim().to_owned(),
            },
        )?;
        Ok(())
    }

    /// Delete the signed-in account; the session becomes anonymous.
    pub fn delete_account(&self, ctx: &mut SessionContext) -> Result<(), WorkflowError> {
        let access_token = Self::require_token(ctx)?;
        self.call::<_, IgnoredAny>(
            Step::DeleteAccount,
            RemoteFunction::DeleteAccount,
            &DeleteAccountRequest { access_token },
        )?;
        ctx.apply(SessionEvent::AccountDeleted)?;
        tracing::info!("account deleted");
        Ok(())
    }

    /// Local-only sign out.
    pub fn sign_out(&self, ctx: &mut SessionContext) -> Result<(), WorkflowError> {
        if !ctx.is_authenticated() {
            return Err(WorkflowError::NotSignedIn);
        }
        ctx.apply(SessionEvent::SignedOut)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Unreachable;

    impl Invoke for Unreachable {
        fn invoke(&self, function: &str, _: &[u8]) -> Result<Vec<u8>, GatewayError> {
            Err(GatewayError::Transport {
                function: function.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    #[rstest]
    fn transport_error_is_surfaced_with_step() {
        let orchestrator = Orchestrator::new(Unreachable, 20);
        let mut ctx = SessionContext::new();

        let err = orchestrator.sign_in(&mut ctx, "doug", "pw").unwrap_err();
        assert_eq!(err.step(), Some(Step::SignIn));
        assert_eq!(err.remote_message(), None);
        assert_eq!(
            err.to_string(),
            "could not sign in user: error calling SignInCognitoUser: connection refused"
        );
        assert!(!ctx.is_authenticated());
    }

    #[rstest]
    fn short_password_is_rejected_before_calling() {
        let orchestrator = Orchestrator::new(Unreachable, 20);
        let mut ctx = SessionContext::new();

        let err = orchestrator
            .start_registration(&mut ctx, "doug", "12345", "d@example.com")
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PasswordTooShort { min: 6 }));
        assert_eq!(ctx.pending(), &PendingWorkflow::Idle);
    }

    #[rstest]
    fn finish_without_start_is_rejected() {
        let orchestrator = Orchestrator::new(Unreachable, 20);
        let mut ctx = SessionContext::new();

        assert!(matches!(
            orchestrator.finish_registration(&mut ctx, "123"),
            Err(WorkflowError::NoPendingWorkflow(WorkflowKind::Registration))
        ));
        assert!(matches!(
            orchestrator.finish_reset(&mut ctx, "123", "newpass"),
            Err(WorkflowError::NoPendingWorkflow(WorkflowKind::PasswordReset))
        ));
    }

    #[rstest]
    fn sign_out_while_anonymous_is_rejected() {
        let orchestrator = Orchestrator::new(Unreachable, 20);
        let mut ctx = SessionContext::new();
        assert!(matches!(
            orchestrator.sign_out(&mut ctx),
            Err(WorkflowError::NotSignedIn)
        ));
    }
}
