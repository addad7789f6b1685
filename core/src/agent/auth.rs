use std::env;

use crate::error::AgentError;
use crate::prompt::Provider;

/// Environment variables consulted for a provider's credentials, in order.
pub fn credential_env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAI => &["OPENAI_API_KEY"],
        Provider::Anthropic => &["ANTHROPIC_API_KEY"],
        Provider::Gemini | Provider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        Provider::Vertex => &["GOOGLE_APPLICATION_CREDENTIALS", "VERTEX_API_KEY"],
        Provider::Undefined => &[],
    }
}

/// First non-empty credential for `provider`, or `MissingAuthentication`.
pub fn resolve_api_key(provider: Provider) -> Result<String, AgentError> {
    credential_env_vars(provider)
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .ok_or(AgentError::MissingAuthentication { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_provider_never_authenticates() {
        let err = resolve_api_key(Provider::Undefined).unwrap_err();
        assert_eq!(
            err,
            AgentError::MissingAuthentication {
                provider: Provider::Undefined
            }
        );
        assert_eq!(err.error_code(), crate::error::ErrorCode::AuthError);
    }

    #[test]
    fn test_env_lookup_order() {
        assert_eq!(credential_env_vars(Provider::Google)[0], "GEMINI_API_KEY");
        assert!(credential_env_vars(Provider::OpenAI).contains(&"OPENAI_API_KEY"));
    }
}
