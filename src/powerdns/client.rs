use crate::powerdns::types::*;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thin client for the PowerDNS authoritative HTTP API, scoped to one server.
#[derive(Clone)]
pub struct PowerDnsClient {
    http: Client,
    base_url: String, // e.g. "http://127.0.0.1:8081/api/v1"
    api_key: String,
    server_id: String, // usually "localhost"
}

#[derive(Deserialize)]
struct PdnsErrorBody {
    error: String,
}

impl PowerDnsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            server_id: server_id.into(),
        }
    }

    fn zones_url(&self, zone: Option<&str>) -> String {
        let base = format!("{}/servers/{}/zones", self.base_url, self.server_id);
        match zone {
            Some(zone) => format!("{base}/{zone}"),
            None => base,
        }
    }

    async fn send(&self, op: &str, req: RequestBuilder) -> anyhow::Result<Response> {
        let res = req.header("X-API-Key", &self.api_key).send().await?;
        debug!(op, status = %res.status(), "powerdns response");
        Ok(res)
    }

    /// Turn a non-2xx answer into an error carrying PowerDNS's own message.
    async fn ensure_success(op: &str, res: Response) -> anyhow::Result<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let text = res.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<PdnsErrorBody>(&text)
            .map(|e| e.error)
            .unwrap_or(text);
        anyhow::bail!("PowerDNS {op} failed with {status}: {detail}");
    }

    /// Look up a zone by its canonical name. `None` when PowerDNS does not
    /// know the zone.
    pub async fn find_zone(&self, name: &str) -> anyhow::Result<Option<PdnsZone>> {
        let res = self
            .send("find_zone", self.http.get(self.zones_url(Some(name))))
            .await?;
        // some versions answer 422 for unknown zone ids
        if matches!(
            res.status(),
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            return Ok(None);
        }
        let res = Self::ensure_success("find_zone", res).await?;
        Ok(Some(res.json::<PdnsZone>().await?))
    }

    pub async fn create_zone(&self, z: &PdnsZoneCreate) -> anyhow::Result<PdnsZone> {
        let res = self
            .send("create_zone", self.http.post(self.zones_url(None)).json(z))
            .await?;
        let res = Self::ensure_success("create_zone", res).await?;
        Ok(res.json::<PdnsZone>().await?)
    }

    /// Apply rrset changes to a zone in one request.
    pub async fn patch_rrsets(&self, zone_name: &str, rrsets: &[PdnsRrset]) -> anyhow::Result<()> {
        #[derive(Serialize)]
        struct PatchBody<'a> {
            rrsets: &'a [PdnsRrset],
        }

        let req = self
            .http
            .patch(self.zones_url(Some(zone_name)))
            .json(&PatchBody { rrsets });
        let res = self.send("patch_rrsets", req).await?;
        Self::ensure_success("patch_rrsets", res).await?;
        Ok(())
    }
}
