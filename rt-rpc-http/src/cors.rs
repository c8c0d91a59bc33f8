//! CORS configuration for the positional-RPC transport.

#[derive(Debug, Clone)]
pub struct Cors {
    pub allow_origin: String,
    pub allow_credentials: bool,
}

impl Cors {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Cors { allow_origin: allow_origin.into(), allow_credentials: false }
    }

    pub fn with_credentials(mut self) -> Self {
        self.allow_credentials = true;
        self
    }

    /// Header set for an `OPTIONS` preflight response.
    pub fn preflight_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Access-Control-Allow-Methods", "OPTIONS, POST".to_string()),
            ("Access-Control-Allow-Origin", self.allow_origin.clone()),
            ("Access-Control-Allow-Headers", "*".to_string()),
        ];
        if self.allow_credentials {
            headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_headers_carry_configured_origin() {
        let cors = Cors::new("https://example.com");
        let headers = cors.preflight_headers();
        assert!(headers.contains(&("Access-Control-Allow-Origin", "https://example.com".to_string())));
        assert!(headers.contains(&("Access-Control-Allow-Methods", "OPTIONS, POST".to_string())));
    }
}
