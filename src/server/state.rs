//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{ClaudeError, ClaudeService};
use crate::store::ConversationStore;

/// Shared application state.
pub struct AppState {
    /// Conversation persistence.
    pub store: Arc<ConversationStore>,
    /// Loaded configuration.
    pub config: AppConfig,
    claude: Option<Arc<ClaudeService>>,
}

impl AppState {
    /// Create the state with the process-wide conversation store.
    pub async fn new(config: AppConfig) -> Arc<Self> {
        let store = ConversationStore::shared(&config.storage).await;
        tracing::info!("Conversation store backend: {}", store.backend());
        Self::with_store(config, store)
    }

    /// Create the state around an explicit store.
    #[must_use]
    pub fn with_store(config: AppConfig, store: Arc<ConversationStore>) -> Arc<Self> {
        let claude = match ClaudeService::from_config(&config.claude) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Claude client unavailable: {e}");
                None
            }
        };
        Arc::new(Self {
            store,
            config,
            claude,
        })
    }

    /// Client built at startup, or the reason it could not be built.
    ///
    /// # Errors
    /// Returns the construction error when no client is cached.
    pub fn claude(&self) -> Result<Arc<ClaudeService>, ClaudeError> {
        match &self.claude {
            Some(service) => Ok(Arc::clone(service)),
            None => ClaudeService::from_config(&self.config.claude).map(Arc::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_client_is_cached_when_key_is_set() {
        let mut config = AppConfig::default();
        config.claude.api_key = Some("sk-test".to_string());
        let state = AppState::with_store(config, Arc::new(ConversationStore::null()));

        let first = state.claude().unwrap();
        let second = state.claude().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_key_reports_error() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(ConversationStore::null()));
        assert!(matches!(state.claude(), Err(ClaudeError::MissingApiKey)));
    }
}
