//! Shared HTTP client
//!
//! One lazily built client so every classification request reuses pooled
//! connections and TLS sessions.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Request timeout for a single chat-completions call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Global HTTP client for OpenAI-compatible API calls
pub static OPENAI_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create OpenAI HTTP client")
});

/// Get the global OpenAI HTTP client
#[inline]
pub fn openai_client() -> &'static Client {
    &OPENAI_CLIENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_same_instance() {
        let client1 = openai_client();
        let client2 = openai_client();
        assert!(std::ptr::eq(client1, client2));
    }
}
