//! Token payloads and the issuer response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long an issued token stays valid.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60);

/// Map layers granted when no claims are configured.
pub const DEFAULT_MAP_LAYERS: &[&str] = &["beaches", "barbeque"];

/// Map database granted when no claims are configured.
pub const DEFAULT_MAP_DATABASE: &str = "hkopendata";

/// Signed token payload.
///
/// ```json
/// {
///   "exp": 1700000060,
///   "pid": 0,
///   "uid": "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
///   "ml": ["beaches", "barbeque"],
///   "md": "hkopendata"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiration time (seconds since epoch).
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// Policy identifier.
    #[serde(rename = "pid")]
    pub policy_id: i8,
    /// Authenticated subject: the checksummed sender address.
    #[serde(rename = "uid")]
    pub user_id: String,
    /// Map layers the subject may read.
    #[serde(rename = "ml")]
    pub map_layers: Vec<String>,
    /// Map database the subject may read.
    #[serde(rename = "md")]
    pub map_database: String,
}

impl Claims {
    /// Combines a subject and its authorization metadata.
    #[must_use]
    pub fn new(user_id: impl Into<String>, expires_at: i64, grant: &AuthorizationClaims) -> Self {
        Self {
            expires_at,
            policy_id: grant.policy_id,
            user_id: user_id.into(),
            map_layers: grant.map_layers.clone(),
            map_database: grant.map_database.clone(),
        }
    }

    /// The authorization metadata carried by these claims.
    #[must_use]
    pub fn authorization(&self) -> AuthorizationClaims {
        AuthorizationClaims {
            policy_id: self.policy_id,
            map_layers: self.map_layers.clone(),
            map_database: self.map_database.clone(),
        }
    }
}

/// Authorization metadata stamped into every issued token.
///
/// Opaque to this crate; consumers of the token interpret it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationClaims {
    /// Policy identifier.
    #[builder(default)]
    pub policy_id: i8,
    /// Map layers the subject may read.
    #[builder(default = default_map_layers())]
    pub map_layers: Vec<String>,
    /// Map database the subject may read.
    #[builder(into, default = DEFAULT_MAP_DATABASE.to_owned())]
    pub map_database: String,
}

fn default_map_layers() -> Vec<String> {
    DEFAULT_MAP_LAYERS.iter().map(|layer| (*layer).to_owned()).collect()
}

impl Default for AuthorizationClaims {
    fn default() -> Self {
        Self {
            policy_id: 0,
            map_layers: default_map_layers(),
            map_database: DEFAULT_MAP_DATABASE.to_owned(),
        }
    }
}

/// The only token type this service issues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    /// RFC 6750 bearer token.
    #[default]
    Bearer,
}

/// Issuer response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Always `"Bearer"`.
    pub token_type: TokenType,
    /// Compact JWS.
    pub access_token: String,
    /// Absolute expiry (seconds since epoch), equal to the token's `exp`.
    pub expires_in: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_authorization_claims() {
        let claims = AuthorizationClaims::default();
        assert_eq!(claims.policy_id, 0);
        assert_eq!(claims.map_layers, ["beaches", "barbeque"]);
        assert_eq!(claims.map_database, "hkopendata");
        assert_eq!(AuthorizationClaims::builder().build(), claims);
    }

    #[test]
    fn test_claims_wire_names() {
        let claims = Claims::new("0xabc", 1_700_000_060, &AuthorizationClaims::default());
        assert_eq!(
            serde_json::to_value(&claims).unwrap(),
            json!({
                "exp": 1_700_000_060,
                "pid": 0,
                "uid": "0xabc",
                "ml": ["beaches", "barbeque"],
                "md": "hkopendata",
            })
        );
    }

    #[test]
    fn test_authorization_claims_partial_config() {
        let claims: AuthorizationClaims =
            serde_json::from_value(json!({ "policy_id": 3 })).unwrap();
        assert_eq!(claims.policy_id, 3);
        assert_eq!(claims.map_database, DEFAULT_MAP_DATABASE);

        let unknown = serde_json::from_value::<AuthorizationClaims>(json!({ "pid": 3 }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_auth_token_wire_format() {
        let token = AuthToken {
            token_type: TokenType::Bearer,
            access_token: "a.b.c".into(),
            expires_in: 42,
        };
        assert_eq!(
            serde_json::to_string(&token).unwrap(),
            r#"{"token_type":"Bearer","access_token":"a.b.c","expires_in":42}"#
        );
    }
}
