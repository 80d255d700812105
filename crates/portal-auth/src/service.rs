//! Authentication service: registration, login, session validation,
//! logout and the admin gate.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, TimeDelta, Utc};
use portal_core::clock::{Clock, SystemClock};
use portal_core::error::{PortalError, PortalResult};
use portal_core::models::member::{CreateMember, Member, Rank, UpdateMember};
use portal_core::models::session::{CreateSession, Session};
use portal_core::repository::{MemberRepository, SessionRepository};
use portal_core::validation::RequiredFields;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::session;

/// Input for registering a new member.
pub struct RegisterMember {
    pub first_name: String,
    pub last_name: String,
    pub rank: Option<Rank>,
    pub username: String,
    pub password: String,
    pub supervisor_id: Option<Uuid>,
    pub admin: bool,
}

impl fmt::Debug for RegisterMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterMember")
            .field("username", &self.username)
            .field("rank", &self.rank)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

/// Partial change to a member. A non-empty `password` is checked against
/// the policy and rehashed.
#[derive(Default)]
pub struct ChangeMember {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub rank: Option<Rank>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub supervisor_id: Option<Option<Uuid>>,
    pub admin: Option<bool>,
}

impl fmt::Debug for ChangeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeMember")
            .field("username", &self.username)
            .field("rank", &self.rank)
            .field(
                "password_changed",
                &self.password.as_deref().is_some_and(|p| !p.is_empty()),
            )
            .finish_non_exhaustive()
    }
}

/// Input for the login flow.
pub struct LoginInput {
    pub username: String,
    pub password: String,
    /// Device fingerprint the session is bound to (the user agent).
    pub fingerprint: String,
}

impl fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginInput")
            .field("username", &self.username)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    pub member: Member,
    /// Raw opaque session token (return to client, not stored).
    pub session_token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// What a client presents on every authenticated request.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub member_id: Uuid,
    pub session_token: String,
    pub fingerprint: String,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<M: MemberRepository, S: SessionRepository> {
    member_repo: M,
    session_repo: S,
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    /// Hash verified against when the username is unknown.
    dummy_hash: OnceLock<String>,
}

impl<M: MemberRepository, S: SessionRepository> AuthService<M, S> {
    pub fn new(member_repo: M, session_repo: S, config: AuthConfig) -> Self {
        Self::with_clock(member_repo, session_repo, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        member_repo: M,
        session_repo: S,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            member_repo,
            session_repo,
            config,
            clock,
            dummy_hash: OnceLock::new(),
        }
    }

    /// Spend the same Argon2 work on an unknown username as on a known one.
    fn verify_against_dummy(&self, plaintext: &str) {
        let dummy = self.dummy_hash.get_or_init(|| {
            password::hash_password("portal-unknown-member", &self.config).unwrap_or_default()
        });
        let _ = password::verify_password(plaintext, dummy, self.config.pepper.as_deref());
    }

    fn hash_new_password(&self, plaintext: &str) -> Result<String, AuthError> {
        password::check_policy(plaintext, &self.config)?;
        password::hash_password(plaintext, &self.config)
    }

    /// Register a new member. The password is hashed before it reaches
    /// the repository.
    pub async fn register(&self, input: RegisterMember) -> PortalResult<Member> {
        let rank = RequiredFields::new()
            .text("first_name", &input.first_name)
            .text("last_name", &input.last_name)
            .present("rank", input.rank.as_ref())
            .text("username", &input.username)
            .text("password", &input.password)
            .check()
            .and_then(|()| {
                input.rank.ok_or_else(|| PortalError::MissingArgs {
                    fields: vec!["rank"],
                })
            })?;

        let password_hash = self.hash_new_password(&input.password)?;

        let member = self
            .member_repo
            .create(CreateMember {
                first_name: input.first_name,
                last_name: input.last_name,
                rank,
                username: input.username,
                password_hash,
                supervisor_id: input.supervisor_id,
                admin: input.admin,
            })
            .await?;

        info!(member_id = %member.id, username = %member.username, "Member registered");
        Ok(member)
    }

    /// Apply a partial change to a member, rehashing a new password. An
    /// empty password leaves the stored hash alone.
    pub async fn update_member(&self, id: Uuid, input: ChangeMember) -> PortalResult<Member> {
        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(plaintext) => Some(self.hash_new_password(plaintext)?),
            None => None,
        };

        let member = self
            .member_repo
            .update(
                id,
                UpdateMember {
                    first_name: input.first_name,
                    last_name: input.last_name,
                    rank: input.rank,
                    username: input.username,
                    password_hash,
                    supervisor_id: input.supervisor_id,
                    admin: input.admin,
                },
            )
            .await?;

        debug!(member_id = %member.id, "Member updated");
        Ok(member)
    }

    /// Authenticate a member with username + password and open a session
    /// bound to the caller's fingerprint.
    pub async fn login(&self, input: LoginInput) -> PortalResult<LoginOutput> {
        RequiredFields::new()
            .text("fingerprint", &input.fingerprint)
            .check()?;

        let member = match self.member_repo.get_by_username(&input.username).await {
            Ok(m) => m,
            Err(PortalError::NotFound { .. }) => {
                self.verify_against_dummy(&input.password);
                debug!("Login rejected: unknown username");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &member.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            debug!(member_id = %member.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let raw_token = session::generate_session_token();
        let token_hash = session::hash_session_token(&raw_token);
        let expires_at = i64::try_from(self.config.session_lifetime_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| PortalError::Internal("session lifetime out of range".into()))?;

        let created = self
            .session_repo
            .create(CreateSession {
                member_id: member.id,
                token_hash,
                fingerprint: input.fingerprint,
                expires_at,
            })
            .await?;

        info!(member_id = %member.id, session_id = %created.id, "Member logged in");

        Ok(LoginOutput {
            member,
            session_token: raw_token,
            session_id: created.id,
            expires_at: created.expires_at,
        })
    }

    /// Check a presented session. Any failed check deletes the stored
    /// session, if one was found, before failing.
    pub async fn validate_session(&self, creds: &SessionCredentials) -> PortalResult<Session> {
        let token_hash = session::hash_session_token(&creds.session_token);
        let stored = match self.session_repo.get_by_token_hash(&token_hash).await {
            Ok(s) => s,
            Err(PortalError::NotFound { .. }) => {
                return Err(AuthError::InvalidSession.into());
            }
            Err(e) => return Err(e),
        };

        let rejection = if stored.member_id != creds.member_id {
            Some("member mismatch")
        } else if stored.fingerprint != creds.fingerprint {
            Some("fingerprint mismatch")
        } else if self.clock.now() >= stored.expires_at {
            Some("expired")
        } else {
            None
        };

        if let Some(reason) = rejection {
            self.session_repo.delete(stored.id).await?;
            warn!(session_id = %stored.id, reason, "Session rejected and purged");
            return Err(AuthError::InvalidSession.into());
        }

        Ok(stored)
    }

    /// Validate the session and load its member.
    pub async fn authenticated_member(&self, creds: &SessionCredentials) -> PortalResult<Member> {
        let stored = self.validate_session(creds).await?;
        match self.member_repo.get_by_id(stored.member_id).await {
            Ok(member) => Ok(member),
            Err(PortalError::NotFound { .. }) => Err(AuthError::InvalidSession.into()),
            Err(e) => Err(e),
        }
    }

    /// Validate the session and require the admin flag.
    ///
    /// Every rejection cause surfaces as `Unauthorized`; storage failures
    /// still propagate as themselves.
    pub async fn require_admin(&self, creds: &SessionCredentials) -> PortalResult<Member> {
        match self.authenticated_member(creds).await {
            Ok(member) if member.admin => Ok(member),
            Ok(member) => {
                debug!(member_id = %member.id, "Admin gate: member is not an admin");
                Err(AuthError::NotAdmin.into())
            }
            Err(e) if e.is_internal() => Err(e),
            Err(_) => Err(AuthError::NotAdmin.into()),
        }
    }

    /// End the session identified by the raw token. Unknown tokens are
    /// ignored.
    pub async fn logout(&self, session_token: &str) -> PortalResult<()> {
        let token_hash = session::hash_session_token(session_token);
        match self.session_repo.get_by_token_hash(&token_hash).await {
            Ok(stored) => {
                self.session_repo.delete(stored.id).await?;
                info!(session_id = %stored.id, member_id = %stored.member_id, "Member logged out");
                Ok(())
            }
            Err(PortalError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Delete every session whose expiry has passed.
    pub async fn purge_expired_sessions(&self) -> PortalResult<u64> {
        let removed = self.session_repo.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "Expired sessions purged");
        }
        Ok(removed)
    }
}
