#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub sandbox_api_url: String,
    pub sandbox: bool,
    pub auth_path: String,
    pub auth_cache_timeout_secs: u64,
    pub auth_cache_key: String,
    pub orders_path: String,
    pub webhooks_path: String,
    pub verify_path: String,
    pub root_url: String,
    pub success_url: String,
    pub cancellation_url: String,
    pub webhook_listener: Option<String>,
    pub relaxed_verification: bool,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PAYPAL_API_URL")
            && !value.is_empty()
        {
            config.api_url = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_SANDBOX_API_URL")
            && !value.is_empty()
        {
            config.sandbox_api_url = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_SANDBOX")
            && let Ok(parsed) = value.parse::<bool>()
        {
            config.sandbox = parsed;
        }
        if let Ok(value) = std::env::var("PAYPAL_AUTH_PATH")
            && !value.is_empty()
        {
            config.auth_path = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_AUTH_CACHE_TIMEOUT")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.auth_cache_timeout_secs = parsed.max(1);
        }
        if let Ok(value) = std::env::var("PAYPAL_AUTH_CACHE_KEY")
            && !value.is_empty()
        {
            config.auth_cache_key = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_ORDERS_PATH")
            && !value.is_empty()
        {
            config.orders_path = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_WEBHOOKS_PATH")
            && !value.is_empty()
        {
            config.webhooks_path = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_VERIFY_PATH")
            && !value.is_empty()
        {
            config.verify_path = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_ROOT_URL") {
            config.root_url = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_SUCCESS_URL")
            && !value.is_empty()
        {
            config.success_url = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_CANCELLATION_URL")
            && !value.is_empty()
        {
            config.cancellation_url = value;
        }
        if let Ok(value) = std::env::var("PAYPAL_WEBHOOK_LISTENER")
            && !value.is_empty()
        {
            config.webhook_listener = Some(value);
        }
        if let Ok(value) = std::env::var("PAYPAL_RELAXED_VERIFICATION")
            && let Ok(parsed) = value.parse::<bool>()
        {
            config.relaxed_verification = parsed;
        }

        config
    }

    /// Live or sandbox base URL depending on the sandbox flag.
    pub fn effective_api_url(&self) -> &str {
        if self.sandbox {
            &self.sandbox_api_url
        } else {
            &self.api_url
        }
    }

    /// Absolutizes site-relative URLs against the configured root URL.
    pub fn full_uri(&self, url: &str) -> String {
        if url.starts_with('/') && !self.root_url.is_empty() {
            format!("{}{}", self.root_url, url)
        } else {
            url.to_string()
        }
    }

    pub fn token_cache_key(&self, auth_hash: &str) -> String {
        self.auth_cache_key.replace("{auth_hash}", auth_hash)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api-m.paypal.com".to_string(),
            sandbox_api_url: "https://api-m.sandbox.paypal.com".to_string(),
            sandbox: true,
            auth_path: "/v1/oauth2/token".to_string(),
            auth_cache_timeout_secs: 600,
            auth_cache_key: "paypal-auth-{auth_hash}".to_string(),
            orders_path: "/v2/checkout/orders".to_string(),
            webhooks_path: "/v1/notifications/webhooks".to_string(),
            verify_path: "/v1/notifications/verify-webhook-signature".to_string(),
            root_url: String::new(),
            success_url: "/".to_string(),
            cancellation_url: "/".to_string(),
            webhook_listener: None,
            relaxed_verification: false,
        }
    }
}
