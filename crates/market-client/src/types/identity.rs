//! Account types returned by the `/auth` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The logged-in user as reported by `GET /auth/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Me {
    /// Numeric user id.
    #[serde(default)]
    pub id: Option<i64>,

    /// Username.
    #[serde(default, alias = "name")]
    pub username: Option<String>,

    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
}

impl Me {
    /// Extract the user from a `/auth/me` body.
    ///
    /// Accepts both the flat `{id, username}` form and the wrapped
    /// `{user: {...}}` form. Returns `None` when the body names no user,
    /// including `{user: null}`.
    pub fn from_body(body: Value) -> Option<Me> {
        let candidate = match body {
            Value::Object(mut map) if map.contains_key("user") => map.remove("user")?,
            other => other,
        };
        let me: Me = serde_json::from_value(candidate).ok()?;
        // Zero and empty names are not identities.
        let me = Me {
            id: me.id.filter(|id| *id != 0),
            username: me.username.filter(|name| !name.is_empty()),
            email: me.email,
        };
        if me.id.is_none() && me.username.is_none() {
            None
        } else {
            Some(me)
        }
    }
}

/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Acknowledgement body of the `/auth` mutations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthAck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_body() {
        let me = Me::from_body(json!({"id": 4, "username": "alice"})).unwrap();
        assert_eq!(me.id, Some(4));
        assert_eq!(me.username.as_deref(), Some("alice"));
    }

    #[test]
    fn wrapped_body() {
        let me = Me::from_body(json!({
            "user": {"id": 9, "username": "bob", "email": "bob@nyu.edu"}
        }))
        .unwrap();
        assert_eq!(me.id, Some(9));
        assert_eq!(me.email.as_deref(), Some("bob@nyu.edu"));
    }

    #[test]
    fn null_user_is_anonymous() {
        assert!(Me::from_body(json!({"user": null})).is_none());
        assert!(Me::from_body(json!({})).is_none());
        assert!(Me::from_body(json!("nope")).is_none());
    }

    #[test]
    fn name_only_is_enough() {
        let me = Me::from_body(json!({"username": "carol"})).unwrap();
        assert!(me.id.is_none());
        assert_eq!(me.username.as_deref(), Some("carol"));
    }
}
