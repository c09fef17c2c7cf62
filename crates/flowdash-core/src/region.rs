// ── Region discovery ──
//
// The fleet API is split across regional hosts. All candidates are asked
// for the account's region at once; the first usable answer wins and the
// rest are dropped. Each probe is bounded by its own timeout, so the
// whole race never takes longer than one timeout.

use std::time::Duration;

use flowdash_api::FleetClient;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, info, warn};
use url::Url;

/// Race every candidate and return the authoritative base URL.
///
/// Returns `None` when no candidate answers with a usable
/// `fleet_api_base_url`; callers keep their configured default.
pub async fn resolve_base_url(
    fleet: &FleetClient,
    candidates: &[Url],
    timeout: Duration,
) -> Option<Url> {
    let mut probes: FuturesUnordered<_> = candidates
        .iter()
        .map(|candidate| async move {
            let result =
                tokio::time::timeout(timeout, fleet.probe_region(candidate, timeout)).await;
            (candidate, result)
        })
        .collect();

    while let Some((candidate, result)) = probes.next().await {
        match result {
            Ok(Ok(region)) => {
                let Some(raw) = region.fleet_api_base_url.as_deref() else {
                    debug!(%candidate, "region response without base URL");
                    continue;
                };
                match Url::parse(raw) {
                    Ok(url) => {
                        info!(%url, region = ?region.region, "resolved fleet region");
                        return Some(url);
                    }
                    Err(e) => debug!(%candidate, error = %e, "unusable fleet base URL"),
                }
            }
            Ok(Err(e)) => debug!(%candidate, error = %e, "region probe failed"),
            Err(_) => debug!(%candidate, "region probe timed out"),
        }
    }

    warn!("no fleet region responded; keeping configured base URL");
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client() -> FleetClient {
        let fleet = FleetClient::new(
            Url::parse("https://unused.example").unwrap(),
            &flowdash_api::TransportConfig::default(),
        )
        .unwrap();
        fleet.set_access_token(SecretString::from("token".to_string()));
        fleet
    }

    #[tokio::test]
    async fn responsive_candidate_wins_over_slow_and_failing_ones() {
        let slow = MockServer::start().await;
        let failing = MockServer::start().await;
        let good = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/1/users/region"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "region": "na", "fleet_api_base_url": "https://slow.example" } }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&slow)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/1/users/region"))
            .respond_with(ResponseTemplate::new(421).set_body_string("wrong region"))
            .mount(&failing)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/1/users/region"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "region": "eu", "fleet_api_base_url": "https://fleet-api.prd.eu.vn.cloud.tesla.com" }
            })))
            .mount(&good)
            .await;

        let candidates = [slow.uri(), failing.uri(), good.uri()]
            .iter()
            .map(|u| Url::parse(u).unwrap())
            .collect::<Vec<_>>();

        let started = std::time::Instant::now();
        let resolved = resolve_base_url(&client(), &candidates, Duration::from_secs(2)).await;

        assert_eq!(
            resolved.map(|u| u.to_string()),
            Some("https://fleet-api.prd.eu.vn.cloud.tesla.com/".to_owned())
        );
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn no_usable_candidate_is_not_fatal() {
        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/1/users/region"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": { "region": "na" }
            })))
            .mount(&empty)
            .await;

        let candidates = vec![
            Url::parse(&empty.uri()).unwrap(),
            Url::parse("http://127.0.0.1:9").unwrap(),
        ];
        let resolved =
            resolve_base_url(&client(), &candidates, Duration::from_millis(500)).await;
        assert!(resolved.is_none());
    }
}
