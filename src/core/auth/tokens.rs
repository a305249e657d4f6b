//! Access/refresh token lifecycle
//!
//! A refresh token is 15 random alphanumeric characters, an underscore, and the last
//! six characters of the access token minted alongside it. That shared suffix (the
//! pairing tag) lets a mismatched pair be rejected before any store lookup. It is a
//! correlation check only; ownership is proven by comparing against the digest stored
//! on the user record, and authenticity by the access token signature.
//!
//! Each user holds at most one live refresh token. Login overwrites it, rotation
//! replaces it with a compare-and-swap so that two refreshes racing on the same pair
//! cannot both succeed.

use std::sync::{Arc, Mutex};

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::auth::error::AuthError;
use crate::core::auth::jwt::JwtService;
use crate::core::db::models::User;
use crate::core::db::store::CredentialStore;

/// Number of random characters at the start of a refresh token
pub const REFRESH_TOKEN_RANDOM_LEN: usize = 15;

/// Length of the suffix shared by a refresh token and its access token
pub const PAIRING_TAG_LEN: usize = 6;

const PAIRING_DELIMITER: char = '_';

/// An access token and the refresh token paired with it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token expiration (Unix timestamp)
    pub expires_at: i64,
}

/// Last [`PAIRING_TAG_LEN`] characters of `token`, or `None` if it is shorter
pub fn pairing_tag(token: &str) -> Option<&str> {
    token
        .char_indices()
        .rev()
        .nth(PAIRING_TAG_LEN - 1)
        .map(|(start, _)| &token[start..])
}

/// SHA-256 hex digest under which a refresh token is stored
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mints, validates and rotates token pairs against the credential store
pub struct TokenManager {
    jwt: JwtService,
    store: Arc<dyn CredentialStore>,
    rng: Mutex<StdRng>,
}

impl TokenManager {
    /// Create a manager that draws refresh tokens from `rng`
    pub fn new(jwt: JwtService, store: Arc<dyn CredentialStore>, rng: StdRng) -> Self {
        Self {
            jwt,
            store,
            rng: Mutex::new(rng),
        }
    }

    /// Create a manager with a generator seeded from operating system entropy
    pub fn from_entropy(jwt: JwtService, store: Arc<dyn CredentialStore>) -> Self {
        Self::new(jwt, store, StdRng::from_entropy())
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Mint a fresh pair for `subject`. Nothing is persisted.
    pub fn mint(&self, subject: &str) -> Result<TokenPair, AuthError> {
        let access = self.jwt.generate_access_token(subject)?;
        let tag = pairing_tag(&access.token)
            .ok_or_else(|| AuthError::InternalError("access token too short".to_string()))?;

        let random: String = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| AuthError::InternalError("token generator poisoned".to_string()))?;
            (&mut *rng)
                .sample_iter(&Alphanumeric)
                .take(REFRESH_TOKEN_RANDOM_LEN)
                .map(char::from)
                .collect()
        };

        let mut refresh_token =
            String::with_capacity(REFRESH_TOKEN_RANDOM_LEN + 1 + PAIRING_TAG_LEN);
        refresh_token.push_str(&random);
        refresh_token.push(PAIRING_DELIMITER);
        refresh_token.push_str(tag);

        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: access.expires_at,
        })
    }

    /// Mint a pair for `subject` and make its refresh token the user's only live one.
    ///
    /// The record updated is the one named by the new access token's subject claim.
    pub async fn issue(&self, subject: &str) -> Result<TokenPair, AuthError> {
        let pair = self.mint(subject)?;

        let claimed = self.jwt.peek_subject(&pair.access_token)?;
        let user = self.store.find_by_username(&claimed).await?.ok_or_else(|| {
            AuthError::InternalError(format!("no user for token subject {claimed}"))
        })?;

        self.store
            .set_refresh_token(user.id, &fingerprint(&pair.refresh_token))
            .await?;

        tracing::debug!("Issued token pair for user {}", user.id);
        Ok(pair)
    }

    /// Check that `refresh_token` and `access_token` form a live pair.
    pub async fn validate(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<bool, AuthError> {
        Ok(self.owner_of(refresh_token, access_token).await?.is_some())
    }

    /// Exchange a live pair for a new one, superseding the presented refresh token.
    pub async fn rotate(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let Some(user) = self.owner_of(refresh_token, access_token).await? else {
            tracing::warn!("Rejected refresh attempt with invalid token pair");
            return Err(AuthError::InvalidToken);
        };

        let pair = self.mint(&user.username)?;

        let swapped = self
            .store
            .swap_refresh_token(
                user.id,
                &fingerprint(refresh_token),
                &fingerprint(&pair.refresh_token),
            )
            .await?;

        if !swapped {
            tracing::warn!("Refresh token for user {} was superseded concurrently", user.id);
            return Err(AuthError::InvalidToken);
        }

        tracing::info!("Rotated token pair for user {}", user.id);
        Ok(pair)
    }

    /// Run the pairing, ownership and signature checks in that order and return the
    /// owning user if all pass.
    async fn owner_of(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<Option<User>, AuthError> {
        match (pairing_tag(refresh_token), pairing_tag(access_token)) {
            (Some(refresh_tag), Some(access_tag)) if refresh_tag == access_tag => {}
            _ => {
                tracing::debug!("Token pair rejected: pairing tag mismatch");
                return Ok(None);
            }
        }

        let Ok(subject) = self.jwt.peek_subject(access_token) else {
            tracing::debug!("Token pair rejected: unreadable access token");
            return Ok(None);
        };

        let Some(user) = self.store.find_by_username(&subject).await? else {
            tracing::debug!("Token pair rejected: unknown subject");
            return Ok(None);
        };

        if user.refresh_token_hash.as_deref() != Some(fingerprint(refresh_token).as_str()) {
            tracing::debug!("Token pair rejected: refresh token not current for user {}", user.id);
            return Ok(None);
        }

        if let Err(e) = self.jwt.validate_token(access_token) {
            tracing::debug!("Token pair rejected: {}", e);
            return Ok(None);
        }

        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::core::auth::jwt::JwtConfig;
    use crate::core::db::memory::InMemoryCredentialStore;
    use crate::core::db::models::{CreateUser, ROLE_USER, Role};
    use crate::core::db::store::StoreError;

    const SECRET: &str = "test_secret_key_for_testing_only_32bytes!";

    fn jwt() -> JwtService {
        JwtService::new(JwtConfig::new(SECRET))
    }

    fn manager(store: Arc<dyn CredentialStore>) -> TokenManager {
        TokenManager::new(jwt(), store, StdRng::seed_from_u64(7))
    }

    async fn store_with_user(username: &str) -> (Arc<InMemoryCredentialStore>, User) {
        let store = Arc::new(InMemoryCredentialStore::with_default_roles());
        let role = store.add_role(ROLE_USER);
        let user = store
            .create_user(CreateUser {
                name: "Test".to_string(),
                username: username.to_string(),
                email: format!("{username}@mail.com"),
                password_hash: "hash".to_string(),
                role_ids: vec![role.id],
            })
            .await
            .unwrap();
        (store, user)
    }

    /// Store whose every operation fails; proves a code path never reaches persistence.
    struct UnreachableStore;

    #[async_trait]
    impl CredentialStore for UnreachableStore {
        async fn find_by_id(&self, _: i64) -> Result<Option<User>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn find_by_username(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn find_by_email(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn find_by_username_or_email(&self, _: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn exists_by_username(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn exists_by_email(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn find_role_by_name(&self, _: &str) -> Result<Option<Role>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn create_user(&self, _: CreateUser) -> Result<User, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn set_refresh_token(&self, _: i64, _: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
        async fn swap_refresh_token(&self, _: i64, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn health_check(&self) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    #[test]
    fn test_pairing_tag() {
        assert_eq!(pairing_tag("abcdefgh"), Some("cdefgh"));
        assert_eq!(pairing_tag("abcdef"), Some("abcdef"));
        assert_eq!(pairing_tag("abcde"), None);
        assert_eq!(pairing_tag(""), None);
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let digest = fingerprint("token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, fingerprint("token"));
        assert_ne!(digest, fingerprint("token2"));
    }

    #[test]
    fn test_mint_shape() {
        let manager = manager(Arc::new(InMemoryCredentialStore::new()));

        for _ in 0..20 {
            let pair = manager.mint("user").unwrap();
            let (random, suffix) = pair.refresh_token.split_once('_').unwrap();

            assert_eq!(random.len(), REFRESH_TOKEN_RANDOM_LEN);
            assert!(random.chars().all(|c| c.is_ascii_alphanumeric()));
            assert_eq!(Some(suffix), pairing_tag(&pair.access_token));
            assert_eq!(pair.token_type, "Bearer");
        }
    }

    #[test]
    fn test_mint_subject_round_trips() {
        let manager = manager(Arc::new(InMemoryCredentialStore::new()));
        let pair = manager.mint("alice").unwrap();

        let claims = manager.jwt().validate_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, pair.expires_at);
    }

    #[test]
    fn test_mint_produces_distinct_refresh_tokens() {
        let manager = manager(Arc::new(InMemoryCredentialStore::new()));
        let first = manager.mint("user").unwrap();
        let second = manager.mint("user").unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn test_issue_persists_refresh_digest() {
        let (store, user) = store_with_user("user").await;
        let manager = manager(store.clone());

        let pair = manager.issue("user").await.unwrap();

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(
            stored.refresh_token_hash,
            Some(fingerprint(&pair.refresh_token))
        );
        assert!(manager.validate(&pair.refresh_token, &pair.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_issue_for_unknown_subject_fails() {
        let store = Arc::new(InMemoryCredentialStore::with_default_roles());
        let manager = manager(store);

        assert!(matches!(
            manager.issue("ghost").await,
            Err(AuthError::InternalError(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_tag_mismatch_without_store() {
        let minting = manager(Arc::new(InMemoryCredentialStore::new()));
        let pair = minting.mint("user").unwrap();
        let other = minting.mint("user").unwrap();

        let manager = manager(Arc::new(UnreachableStore));

        assert!(!manager.validate(&other.refresh_token, &pair.access_token).await.unwrap());
        assert!(!manager.validate("short", &pair.access_token).await.unwrap());
        assert!(matches!(
            manager.rotate(&other.refresh_token, &pair.access_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_token_not_stored() {
        let (store, _) = store_with_user("user").await;
        let manager = manager(store);

        // Minted but never persisted
        let pair = manager.mint("user").unwrap();
        assert!(!manager.validate(&pair.refresh_token, &pair.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_validate_rejects_forged_access_token() {
        let (store, user) = store_with_user("user").await;
        let manager = manager(store.clone());

        let forger = TokenManager::new(
            JwtService::new(JwtConfig::new("some_other_secret")),
            store.clone(),
            StdRng::seed_from_u64(1),
        );
        let forged = forger.mint("user").unwrap();

        // Pairing and ownership both pass; only the signature is wrong
        store
            .set_refresh_token(user.id, &fingerprint(&forged.refresh_token))
            .await
            .unwrap();
        assert!(!manager.validate(&forged.refresh_token, &forged.access_token).await.unwrap());
        assert!(matches!(
            manager.rotate(&forged.refresh_token, &forged.access_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_validate_rejects_expired_access_token() {
        let (store, _) = store_with_user("user").await;
        let manager = TokenManager::new(
            JwtService::new(JwtConfig::new(SECRET).access_token_expiration(-1)),
            store,
            StdRng::seed_from_u64(3),
        );

        let pair = manager.issue("user").await.unwrap();
        assert!(!manager.validate(&pair.refresh_token, &pair.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_rotate_supersedes_previous_pair() {
        let (store, user) = store_with_user("user").await;
        let manager = manager(store.clone());
        let first = manager.issue("user").await.unwrap();

        let second = manager
            .rotate(&first.refresh_token, &first.access_token)
            .await
            .unwrap();

        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(
            second.refresh_token.split_once('_').unwrap().1,
            pairing_tag(&second.access_token).unwrap()
        );
        assert!(manager.validate(&second.refresh_token, &second.access_token).await.unwrap());
        assert!(!manager.validate(&first.refresh_token, &first.access_token).await.unwrap());

        assert!(matches!(
            manager.rotate(&first.refresh_token, &first.access_token).await,
            Err(AuthError::InvalidToken)
        ));

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(
            stored.refresh_token_hash,
            Some(fingerprint(&second.refresh_token))
        );
    }

    #[tokio::test]
    async fn test_failed_rotate_leaves_store_untouched() {
        let (store, user) = store_with_user("user").await;
        let manager = manager(store.clone());
        let pair = manager.issue("user").await.unwrap();
        let other = manager.mint("user").unwrap();

        let result = manager.rotate(&other.refresh_token, &pair.access_token).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash, Some(fingerprint(&pair.refresh_token)));
    }

    #[tokio::test]
    async fn test_new_login_supersedes_old_pair() {
        let (store, _) = store_with_user("user").await;
        let manager = manager(store);

        let first = manager.issue("user").await.unwrap();
        let second = manager.issue("user").await.unwrap();

        assert!(!manager.validate(&first.refresh_token, &first.access_token).await.unwrap());
        assert!(manager.validate(&second.refresh_token, &second.access_token).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_rotations_single_winner() {
        let (store, _) = store_with_user("user").await;
        let manager = Arc::new(manager(store));
        let pair = manager.issue("user").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let pair = pair.clone();
            handles.push(tokio::spawn(async move {
                manager.rotate(&pair.refresh_token, &pair.access_token).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, AuthError::InvalidToken)),
            }
        }
        assert_eq!(winners, 1);
    }
}
