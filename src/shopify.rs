//! Commerce platform auth for a custom app.
//!
//! Custom apps receive their admin token at install time, so there is no OAuth
//! exchange: authentication hands back the configured static token.

use axum::http::StatusCode;
use serde::Serialize;

use crate::config::ShopifyConfig;

/// Admin API version the app is pinned to.
pub const SHOPIFY_API_VERSION: &str = "2025-04";

/// Body returned by [`login`].
pub const LOGIN_MESSAGE: &str = "Custom app - no login needed";

/// Admin credentials for the configured shop.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    /// Static admin access token, if configured.
    pub access_token: Option<String>,
    /// Shop domain.
    pub shop: String,
}

/// Result of admin authentication.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AdminContext {
    /// Admin session.
    pub admin: AdminSession,
}

/// Result of unauthenticated admin access: there is none.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UnauthenticatedAdmin {
    /// Always `None` for custom apps.
    pub admin: Option<()>,
}

/// Authenticate an admin request.
#[must_use]
pub fn authenticate_admin(config: &ShopifyConfig) -> AdminContext {
    tracing::debug!(shop = %config.shop, "Authenticating admin request with static token");
    AdminContext {
        admin: AdminSession {
            access_token: config.admin_access_token.clone(),
            shop: config.shop.clone(),
        },
    }
}

/// Unauthenticated admin access.
#[must_use]
pub const fn unauthenticated_admin() -> UnauthenticatedAdmin {
    UnauthenticatedAdmin { admin: None }
}

/// Login entry point; always succeeds.
#[must_use]
pub const fn login() -> (StatusCode, &'static str) {
    (StatusCode::OK, LOGIN_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate_admin_uses_configured_token() {
        let config = ShopifyConfig {
            shop: "example.myshopify.com".to_string(),
            admin_access_token: Some("shpat_abc".to_string()),
            storefront_access_token: None,
        };

        let context = authenticate_admin(&config);
        assert_eq!(context.admin.shop, "example.myshopify.com");
        assert_eq!(context.admin.access_token.as_deref(), Some("shpat_abc"));

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["admin"]["accessToken"], "shpat_abc");
    }

    #[test]
    fn test_login_and_unauthenticated() {
        assert_eq!(login(), (StatusCode::OK, LOGIN_MESSAGE));
        assert!(unauthenticated_admin().admin.is_none());
    }
}
