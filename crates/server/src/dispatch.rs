use crate::auth::AuthMode;
use genrelay_core::error::GatewayError;
use genrelay_core::metrics::Metrics;
use genrelay_core::store::ConfigStore;
use genrelay_provider::{Credential, KeySelector};

/// Runs one logical upstream call (non-streaming or streaming) through the
/// credential-selection and retry machinery. `attempt` is handed the chosen
/// credential and returns either a usable result or an error that decides
/// whether another credential is worth trying.
///
/// Pool mode walks the fallback credential (if the model is in the fallback
/// set) then the primary pool, bounded by the configured retry budget and
/// never repeating a credential already tried. Passthrough mode tries the
/// caller's own credential exactly once.
pub async fn with_credential<T, F, Fut>(
    store: &dyn ConfigStore,
    metrics: &Metrics,
    auth: &AuthMode,
    model: &str,
    mut attempt: F,
) -> Result<T, GatewayError>
where
    F: FnMut(Credential) -> Fut,
    Fut: std::future::Future<Output = Result<T, GatewayError>>,
{
    match auth {
        AuthMode::Passthrough { credential } => {
            metrics.record_passthrough_hit();
            let cred = Credential { id: "passthrough".to_string(), api_key: credential.clone(), base_url: None };
            attempt(cred).await
        }
        AuthMode::Pool => {
            let selector = KeySelector::new(store);
            let retry_budget = selector.retry_budget().await;
            let mut tried: Vec<String> = Vec::new();
            let mut last_err: Option<GatewayError> = None;

            if let Some(cred) = selector.pick_fallback_if_applicable(model).await {
                metrics.record_fallback_hit();
                match attempt(cred).await {
                    Ok(v) => return Ok(v),
                    Err(e) => last_err = Some(e),
                }
            }

            for _ in 0..retry_budget {
                let Some(cred) = selector.pick_from_pool(&tried).await else {
                    break;
                };
                tried.push(cred.id.clone());
                metrics.record_pool_hit();
                match attempt(cred).await {
                    Ok(v) => return Ok(v),
                    Err(e) => {
                        let retryable = matches!(e, GatewayError::UpstreamTransient { .. } | GatewayError::Network(_));
                        last_err = Some(e);
                        if !retryable {
                            break;
                        }
                    }
                }
            }

            metrics.record_pool_exhausted();
            let last_upstream_body = last_err.map(|e| match e {
                GatewayError::UpstreamTransient { body, .. } => body,
                other => other.to_string(),
            });
            Err(GatewayError::PoolExhausted { model: model.to_string(), last_upstream_body })
        }
    }
}
