//! Terminal implementation of the OAuth authorization step.

use async_trait::async_trait;
use dialoguer::Input;
use url::Url;

use flowdash_core::{Authorizer, CoreError};

/// Prints the authorize URL and reads the redirect URL back from stdin.
#[derive(Debug, Default)]
pub struct TerminalAuthorizer;

#[async_trait]
impl Authorizer for TerminalAuthorizer {
    async fn authorize(&self, authorize_url: &Url) -> Result<Url, CoreError> {
        eprintln!("Open this URL in a browser and approve access:\n\n  {authorize_url}\n");

        let pasted = tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt("Paste the URL you were redirected to")
                .interact_text()
        })
        .await
        .map_err(|e| CoreError::Config {
            message: format!("prompt task failed: {e}"),
        })?
        .map_err(|_| CoreError::AuthorizationRequired)?;

        parse_redirect(&pasted)
    }
}

fn parse_redirect(pasted: &str) -> Result<Url, CoreError> {
    Url::parse(pasted.trim()).map_err(|_| CoreError::AuthorizationCodeMissing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pasted_redirect_is_trimmed() {
        let url = parse_redirect("  https://example.com/callback?code=abc&state=xyz\n").unwrap();
        assert_eq!(url.query(), Some("code=abc&state=xyz"));
    }

    #[test]
    fn garbage_is_a_missing_code() {
        assert!(matches!(
            parse_redirect("not a url"),
            Err(CoreError::AuthorizationCodeMissing)
        ));
    }
}
