use serde::{Deserialize, Serialize};

/// JWT claims carried by trigger callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
    /// Issued-at timestamp (seconds since epoch)
    pub iat: i64,
    /// Whether the caller is a club admin
    #[serde(default)]
    pub is_admin: bool,
}

impl Claims {
    pub fn new(sub: impl Into<String>, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.into(),
            exp: now + ttl_seconds,
            iat: now,
            is_admin: false,
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_builder() {
        let claims = Claims::new("user-123", 3600);
        assert_eq!(claims.sub, "user-123");
        assert!(!claims.is_admin);
        assert!(claims.exp > claims.iat);

        let admin = Claims::new("user-456", 3600).admin();
        assert!(admin.is_admin);
    }
}
