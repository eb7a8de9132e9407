//! HTTP client for a running board service
//!
//! CLI commands other than `run` go through this client so that every
//! request reaches the one engine owning the drawing state. Rejections come
//! back as [`Error::Rejected`], exactly as the engine returned them.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::engine::{DrawStatus, EntryToggle, LotterySummary};
use crate::error::{Error, Result};
use crate::models::{Adjacency, BoardEntry, Member};
use crate::occupancy::CheckOutcome;
use crate::server::{BorderBody, CheckBody, ErrorBody, HealthResponse, MemberBody, UserBody};
use crate::storage::RecordedOrder;

/// Client for the board service API
#[derive(Debug, Clone)]
pub struct BoardClient {
    base: Url,
    http: Client,
}

impl BoardClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid service url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("invalid service url '{base_url}'")));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("invalid service url '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.http.get(self.endpoint(&["api", "health"])?).send().await?;
        decode(response).await
    }

    pub async fn board(&self) -> Result<Vec<BoardEntry>> {
        let response = self.http.get(self.endpoint(&["api", "board"])?).send().await?;
        decode(response).await
    }

    pub async fn attempt_check(
        &self,
        location: &str,
        user: &str,
        guest: Option<&str>,
    ) -> Result<CheckOutcome> {
        let body = CheckBody {
            location: location.to_string(),
            user: user.to_string(),
            guest: guest.map(str::to_string),
        };
        let response = self
            .http
            .post(self.endpoint(&["api", "check"])?)
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn toggle_entry(&self, user: &str) -> Result<EntryToggle> {
        let response = self
            .http
            .post(self.endpoint(&["api", "entry"])?)
            .json(&UserBody {
                user: user.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn skip_turn(&self, user: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&["api", "skip"])?)
            .json(&UserBody {
                user: user.to_string(),
            })
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn current_status(&self, user: &str) -> Result<DrawStatus> {
        let response = self
            .http
            .get(self.endpoint(&["api", "status", user])?)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn last_order(&self) -> Result<Option<RecordedOrder>> {
        let response = self
            .http
            .get(self.endpoint(&["api", "draws", "latest"])?)
            .send()
            .await?;
        decode(response).await
    }

    /// Start a drawing now; `None` when the service did not start one
    pub async fn start_lottery(&self) -> Result<Option<LotterySummary>> {
        let response = self.http.post(self.endpoint(&["api", "draws"])?).send().await?;
        decode(response).await
    }

    pub async fn add_adjacency(&self, a: &str, b: &str) -> Result<Adjacency> {
        let response = self
            .http
            .post(self.endpoint(&["api", "border"])?)
            .json(&BorderBody {
                a: a.to_string(),
                b: b.to_string(),
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn upsert_member(
        &self,
        user: &str,
        contact: Option<&str>,
        priority: bool,
    ) -> Result<Member> {
        let response = self
            .http
            .post(self.endpoint(&["api", "members"])?)
            .json(&MemberBody {
                user: user.to_string(),
                contact: contact.map(str::to_string),
                priority,
            })
            .send()
            .await?;
        decode(response).await
    }
}

/// Turn a non-success response into the matching error
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            rejection: Some(reason),
            ..
        }) => Err(Error::Rejected(reason)),
        Ok(body) => Err(Error::Service {
            status: status.as_u16(),
            message: body.error,
        }),
        Err(_) => Err(Error::Service {
            status: status.as_u16(),
            message: text,
        }),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}
