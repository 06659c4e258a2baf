use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::Config,
    entities::user,
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the HMAC kept in a confirmation code.
const CODE_MAC_LEN: usize = 16;
const CODE_DOMAIN: &[u8] = b"yamdb.confirmation-code";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i32,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Signs bearer tokens and one-time confirmation codes with the server secret.
///
/// A confirmation code is `<issued-at>-<mac>` where the MAC covers the issue time and
/// the user's state fingerprint. Changing any fingerprinted field (notably `last_login`,
/// which a successful exchange bumps) invalidates outstanding codes.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    access_lifetime_secs: i64,
    code_timeout_secs: i64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_lifetime_secs", &self.access_lifetime_secs)
            .field("code_timeout_secs", &self.code_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, access_lifetime_secs: i64, code_timeout_secs: i64) -> Self {
        Self { secret: secret.as_ref().to_vec(), access_lifetime_secs, code_timeout_secs }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.secret_key,
            config.access_token_lifetime_minutes * 60,
            config.confirmation_code_timeout_secs,
        )
    }

    pub fn issue_access_token(&self, user: &user::Model) -> AppResult<String> {
        let now = jiff::Timestamp::now().as_second();
        let claims = Claims {
            user_id: user.id,
            iat: now,
            exp: now + self.access_lifetime_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(&self.secret))?)
    }

    pub fn decode_access_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected bearer token");
                AppError::AuthenticationRequired
            })
    }

    pub fn make_confirmation_code(&self, user: &user::Model) -> String {
        self.make_confirmation_code_at(user, jiff::Timestamp::now().as_second())
    }

    pub fn make_confirmation_code_at(&self, user: &user::Model, issued_at: i64) -> String {
        let mac = self.code_mac(user, issued_at).finalize().into_bytes();
        format!("{issued_at}-{}", URL_SAFE_NO_PAD.encode(&mac[..CODE_MAC_LEN]))
    }

    pub fn check_confirmation_code(&self, user: &user::Model, code: &str) -> bool {
        let Some((issued, mac)) = code.split_once('-') else {
            return false;
        };
        let Ok(issued_at) = issued.parse::<i64>() else {
            return false;
        };
        let Ok(tag) = URL_SAFE_NO_PAD.decode(mac) else {
            return false;
        };
        if tag.len() != CODE_MAC_LEN {
            return false;
        }

        let age = jiff::Timestamp::now().as_second() - issued_at;
        if age < 0 || age > self.code_timeout_secs {
            return false;
        }

        self.code_mac(user, issued_at).verify_truncated_left(&tag).is_ok()
    }

    fn code_mac(&self, user: &user::Model, issued_at: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(CODE_DOMAIN);
        for part in fingerprint(user, issued_at) {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part.as_bytes());
        }
        mac
    }
}

fn fingerprint(user: &user::Model, issued_at: i64) -> [String; 7] {
    [
        user.id.to_string(),
        user.username.clone(),
        user.email.clone(),
        format!("{:?}", user.role),
        user.is_staff.to_string(),
        user.last_login.map(|t| t.to_string()).unwrap_or_default(),
        issued_at.to_string(),
    ]
}
