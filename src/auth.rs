//! Authorization for the control endpoint.
//!
//! Control requests carry a shared secret in the `Authorization` header,
//! either as `api-key <KEY>` or `Bearer <KEY>`.

use crate::error::{FridgeError, Result};

pub trait Authorizer: Send + Sync {
    /// check the raw `Authorization` header value, if any
    fn authorize(&self, header: Option<&str>) -> Result<()>;
}

pub struct ApiKeyAuthorizer {
    key: Option<String>,
}

impl ApiKeyAuthorizer {
    /// with no key every request is refused
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
        }
    }

    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }
}

impl Authorizer for ApiKeyAuthorizer {
    fn authorize(&self, header: Option<&str>) -> Result<()> {
        let (Some(expected), Some(header)) = (self.key.as_deref(), header) else {
            return Err(FridgeError::Unauthorized);
        };

        let presented = header
            .strip_prefix("api-key ")
            .or_else(|| header.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => Err(FridgeError::Unauthorized),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
