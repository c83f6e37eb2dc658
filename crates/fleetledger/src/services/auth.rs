//! Sessions: password login, bearer tokens and logout.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::PasswordScheme;
use crate::broadcast::CredentialVerifier;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::models::{entity, Actor, AuditAction, NewAuditEntry, Principal, Role};
use crate::storage::Storage;

/// Claims carried in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id.
    pub sub: String,
    /// Login name at issue time.
    pub username: String,
    /// Role at issue time. Informational; requests use the stored role.
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
}

/// A successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Bearer token for later requests.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// The authenticated account.
    pub actor: Actor,
}

/// Issues and checks session tokens.
#[derive(Clone)]
pub struct AuthService {
    storage: Arc<Storage>,
    ledger: Ledger,
    passwords: Arc<dyn PasswordScheme>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    decoy_hash: Arc<OnceLock<String>>,
}

/// Plaintext behind the hash checked for unknown usernames.
const DECOY_PASSWORD: &str = "fleetledger-no-such-account";

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Create the service with an HMAC secret and token lifetime.
    #[must_use]
    pub fn new(
        storage: Arc<Storage>,
        ledger: Ledger,
        passwords: Arc<dyn PasswordScheme>,
        secret: &str,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            ledger,
            passwords,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// A hash from the configured scheme, checked in place of an account's
    /// hash when the username is unknown.
    fn decoy_hash(&self) -> Result<&str> {
        if let Some(hash) = self.decoy_hash.get() {
            return Ok(hash.as_str());
        }
        let hash = self.passwords.hash(DECOY_PASSWORD)?;
        Ok(self.decoy_hash.get_or_init(|| hash).as_str())
    }

    /// Check a username and password and open a session.
    ///
    /// Unknown accounts, inactive accounts and wrong passwords all yield
    /// the same [`Error::InvalidCredentials`], after one password
    /// verification each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] on any mismatch, or
    /// [`Error::Unaudited`] if the login could not be recorded.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        source_address: Option<&str>,
    ) -> Result<Session> {
        let found = self.storage.find_actor_by_username(username)?;
        let actor = match found {
            Some(actor) => {
                let matched = self.passwords.verify(password, &actor.password_hash)?;
                (matched && actor.is_active).then_some(actor)
            }
            None => {
                self.passwords.verify(password, self.decoy_hash()?)?;
                None
            }
        };
        let Some(actor) = actor else {
            warn!(username, "Login failed");
            return Err(Error::InvalidCredentials);
        };

        let (token, expires_at) = self.issue_token(&actor)?;
        self.ledger.record(
            NewAuditEntry::new(AuditAction::Login, entity::USER, "User logged in")
                .by(actor.id)
                .subject(actor.id)
                .from_address(source_address),
        )?;

        info!(id = actor.id, username = %actor.username, "User logged in");
        Ok(Session {
            token,
            expires_at,
            actor,
        })
    }

    /// Record the end of a session.
    ///
    /// Tokens are stateless and stay valid until they expire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unaudited`] if the logout could not be recorded.
    pub fn logout(&self, principal: &Principal, source_address: Option<&str>) -> Result<()> {
        self.ledger.record(
            NewAuditEntry::new(AuditAction::Logout, entity::USER, "User logged out")
                .by(principal.actor_id)
                .subject(principal.actor_id)
                .from_address(source_address),
        )?;
        info!(id = principal.actor_id, "User logged out");
        Ok(())
    }

    /// Sign a token for `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_token(&self, actor: &Actor) -> Result<(String, DateTime<Utc>)> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let exp = iat.saturating_add(ttl);
        let claims = Claims {
            sub: actor.id.to_string(),
            username: actor.username.clone(),
            role: actor.role,
            iat,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::internal(format!("token signing failed: {e}")))?;
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok((token, expires_at))
    }

    /// Resolve a bearer token to the principal it belongs to.
    ///
    /// The role is read from the stored account, so a role change or
    /// deactivation takes effect on the next request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] for a bad, expired or orphaned token,
    /// or one whose account is inactive.
    pub fn authenticate(&self, token: &str) -> Result<Principal> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::credential("token expired"),
                _ => Error::credential(format!("invalid token: {e}")),
            })?;

        let actor_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| Error::credential("invalid token subject"))?;
        let actor = self
            .storage
            .get_actor(actor_id)?
            .ok_or_else(|| Error::credential("account no longer exists"))?;
        if !actor.is_active {
            return Err(Error::credential("account is inactive"));
        }
        Ok(actor.principal())
    }
}

impl CredentialVerifier for AuthService {
    fn verify(&self, credential: &str) -> Result<Principal> {
        self.authenticate(credential)
    }
}
