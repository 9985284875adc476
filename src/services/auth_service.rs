//! Telegram Web App init-data verification.

use std::time::{Duration, SystemTime};

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::{
    clock::{elapsed_between, unix_seconds},
    config::AuthConfig,
    dao::models::PlayerId,
};

type HmacSha256 = Hmac<Sha256>;

/// Scheme prefix of the `Authorization` header.
pub const AUTH_SCHEME: &str = "Telegram ";

const SECRET_KEY_SALT: &[u8] = b"WebAppData";

/// Identity carried by validated init data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramUserData {
    /// Telegram user id.
    pub id: PlayerId,
    /// Telegram username; empty when the user has none.
    pub username: String,
    /// When Telegram signed the data.
    pub auth_date: SystemTime,
}

/// Reasons init data is rejected.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("authorization header is required")]
    MissingHeader,
    /// Header without the `Telegram ` scheme.
    #[error("invalid authorization format")]
    InvalidScheme,
    /// A required init-data field is absent.
    #[error("init data is missing `{0}`")]
    MissingField(&'static str),
    /// The hash does not match the payload.
    #[error("invalid telegram auth data")]
    SignatureMismatch,
    /// `auth_date` is older than the accepted TTL.
    #[error("telegram auth data expired")]
    Expired,
    /// A field could not be parsed.
    #[error("invalid telegram data: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct InitDataUser {
    id: PlayerId,
    #[serde(default)]
    username: String,
}

/// Check the signature and freshness of `init_data` against `bot_token`.
pub fn validate_init_data(
    init_data: &str,
    bot_token: &str,
    ttl: Duration,
    now: SystemTime,
) -> Result<(), AuthError> {
    let mut hash = None;
    let mut auth_date = None;
    let mut pairs = Vec::new();
    for (key, value) in form_urlencoded::parse(init_data.as_bytes()) {
        if key == "hash" {
            hash = Some(value.into_owned());
            continue;
        }
        if key == "auth_date" {
            auth_date = Some(parse_auth_date(&value)?);
        }
        pairs.push((key, value));
    }

    let hash = hash.ok_or(AuthError::MissingField("hash"))?;
    let auth_date = auth_date.ok_or(AuthError::MissingField("auth_date"))?;

    let expected = hex::decode(hash).map_err(|_| AuthError::SignatureMismatch)?;
    let mut mac = signing_mac(bot_token)?;
    mac.update(data_check_string(pairs).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| AuthError::SignatureMismatch)?;

    if !ttl.is_zero() && elapsed_between(auth_date, now) > ttl {
        return Err(AuthError::Expired);
    }
    Ok(())
}

/// Read the user identity out of `init_data` without checking its signature.
pub fn extract_user(init_data: &str) -> Result<TelegramUserData, AuthError> {
    let mut user = None;
    let mut auth_date = None;
    for (key, value) in form_urlencoded::parse(init_data.as_bytes()) {
        match key.as_ref() {
            "user" => user = Some(value.into_owned()),
            "auth_date" => auth_date = Some(parse_auth_date(&value)?),
            _ => {}
        }
    }

    let user = user.ok_or(AuthError::MissingField("user"))?;
    let auth_date = auth_date.ok_or(AuthError::MissingField("auth_date"))?;
    let user: InitDataUser =
        serde_json::from_str(&user).map_err(|err| AuthError::Malformed(err.to_string()))?;

    Ok(TelegramUserData {
        id: user.id,
        username: user.username,
        auth_date,
    })
}

/// Authenticate an `Authorization` header value.
///
/// In debug mode the signature is not checked, but the payload must still parse.
pub fn authenticate(
    header: Option<&str>,
    config: &AuthConfig,
    now: SystemTime,
) -> Result<TelegramUserData, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let init_data = header
        .strip_prefix(AUTH_SCHEME)
        .ok_or(AuthError::InvalidScheme)?;

    if !config.debug_mode {
        validate_init_data(init_data, &config.bot_token, config.init_data_ttl, now)?;
    }

    let user = extract_user(init_data)?;
    debug!(
        player_id = user.id,
        auth_date = unix_seconds(user.auth_date),
        "telegram user authenticated"
    );
    Ok(user)
}

fn signing_mac(bot_token: &str) -> Result<HmacSha256, AuthError> {
    let mut secret = HmacSha256::new_from_slice(SECRET_KEY_SALT)
        .map_err(|err| AuthError::Malformed(err.to_string()))?;
    secret.update(bot_token.as_bytes());
    let secret = secret.finalize().into_bytes();
    HmacSha256::new_from_slice(&secret).map_err(|err| AuthError::Malformed(err.to_string()))
}

/// `key=value` lines sorted by key and joined with `\n`.
fn data_check_string<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = pairs.into_iter().collect();
    pairs.sort_by(|(left, _), (right, _)| left.as_ref().cmp(right.as_ref()));
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key.as_ref(), value.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_auth_date(raw: &str) -> Result<SystemTime, AuthError> {
    let secs: u64 = raw
        .parse()
        .map_err(|_| AuthError::Malformed(format!("auth_date `{raw}`")))?;
    Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

/// Sign `fields` the way Telegram does and return the url-encoded init data.
///
/// Used by tests and local tooling to forge valid headers.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let hash = match signing_mac(bot_token) {
        Ok(mut mac) => {
            mac.update(data_check_string(fields.iter().copied()).as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:test-token";
    const USER: &str = r#"{"id":42,"first_name":"Ann","username":"ann"}"#;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn config(debug_mode: bool) -> AuthConfig {
        AuthConfig {
            bot_token: TOKEN.into(),
            debug_mode,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn signed_init_data_is_accepted() {
        let init_data = sign_init_data(
            &[("auth_date", "1700000000"), ("query_id", "AAF"), ("user", USER)],
            TOKEN,
        );
        let header = format!("Telegram {init_data}");

        let user = authenticate(Some(&header), &config(false), at(1_700_000_100)).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username, "ann");
        assert_eq!(user.auth_date, at(1_700_000_000));
    }

    #[test]
    fn tampered_field_breaks_signature() {
        let init_data = sign_init_data(&[("auth_date", "1700000000"), ("user", USER)], TOKEN)
            .replace("ann", "bob");
        let err = validate_init_data(&init_data, TOKEN, Duration::ZERO, at(1_700_000_000))
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn wrong_bot_token_is_rejected() {
        let init_data = sign_init_data(&[("auth_date", "1700000000"), ("user", USER)], "other");
        let err = validate_init_data(&init_data, TOKEN, Duration::ZERO, at(1_700_000_000))
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn stale_auth_date_is_rejected() {
        let init_data = sign_init_data(&[("auth_date", "1700000000"), ("user", USER)], TOKEN);
        let ttl = Duration::from_secs(24 * 60 * 60);
        assert!(validate_init_data(&init_data, TOKEN, ttl, at(1_700_086_400)).is_ok());
        let err = validate_init_data(&init_data, TOKEN, ttl, at(1_700_086_401)).unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn header_must_use_telegram_scheme() {
        let err = authenticate(Some("Bearer abc"), &config(true), at(0)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidScheme));
        let err = authenticate(None, &config(true), at(0)).unwrap_err();
        assert!(matches!(err, AuthError::MissingHeader));
    }

    #[test]
    fn debug_mode_skips_signature_but_still_parses() {
        let init_data = form_urlencoded::Serializer::new(String::new())
            .append_pair("auth_date", "1700000000")
            .append_pair("user", USER)
            .finish();
        let header = format!("Telegram {init_data}");
        assert_eq!(
            authenticate(Some(&header), &config(true), at(1_800_000_000))
                .unwrap()
                .id,
            42
        );
        assert!(authenticate(Some(&header), &config(false), at(1_700_000_000)).is_err());
        assert!(authenticate(Some("Telegram auth_date=1"), &config(true), at(0)).is_err());
    }
}
