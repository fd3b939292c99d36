//! Batch submission: one POST per batch, no retries.

use bankfeed_core::{ImportConfig, SubmissionBatch, SubmissionError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::envelope::encode_batch;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// What the service acknowledged for an accepted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub status: u16,
    /// Transactions sent in the batch
    pub submitted: usize,
    /// Ids the service created; empty if the response did not list them
    pub transaction_ids: Vec<String>,
    /// Import ids the service already knew and ignored
    pub duplicate_import_ids: Vec<String>,
}

impl Confirmation {
    fn from_response(submitted: usize, response: &HttpResponse) -> Self {
        #[derive(Deserialize, Default)]
        struct Resp {
            #[serde(default)]
            data: Data,
        }

        #[derive(Deserialize, Default)]
        struct Data {
            #[serde(default)]
            transaction_ids: Vec<String>,
            #[serde(default)]
            duplicate_import_ids: Vec<String>,
        }

        let parsed: Resp = serde_json::from_str(&response.body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "response body is not a transaction list");
            Resp::default()
        });

        Self {
            status: response.status,
            submitted,
            transaction_ids: parsed.data.transaction_ids,
            duplicate_import_ids: parsed.data.duplicate_import_ids,
        }
    }
}

pub struct BatchSubmitter<'a, C: HttpClient + ?Sized> {
    client: &'a C,
    config: &'a ImportConfig,
}

impl<'a, C: HttpClient + ?Sized> BatchSubmitter<'a, C> {
    pub fn new(client: &'a C, config: &'a ImportConfig) -> Self {
        Self { client, config }
    }

    /// `{base}/budgets/{budget_id}/transactions`
    pub fn endpoint(&self, budget_id: &str) -> String {
        format!(
            "{}/budgets/{}/transactions",
            self.config.base_url.trim_end_matches('/'),
            budget_id
        )
    }

    pub fn build_request(&self, batch: &SubmissionBatch) -> Result<HttpRequest, SubmissionError> {
        let token = self.config.access_token.expose();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            SubmissionError::Encode("access token is not a valid header value".to_string())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(HttpRequest {
            url: self.endpoint(&batch.budget_id),
            headers,
            body: encode_batch(batch, self.config.amount_format)?,
        })
    }

    /// Submit the whole batch as a single request.
    /// A non-2xx answer is `SubmissionError::Rejected` carrying status and body.
    pub fn submit(&self, batch: &SubmissionBatch) -> Result<Confirmation, SubmissionError> {
        let request = self.build_request(batch)?;
        tracing::info!(
            source = %batch.source,
            transactions = batch.len(),
            url = %request.url,
            "submitting batch"
        );

        let response = self.client.post(&request)?;
        if !response.is_success() {
            tracing::warn!(status = response.status, body = %response.body, "batch rejected");
            return Err(SubmissionError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let confirmation = Confirmation::from_response(batch.len(), &response);
        tracing::info!(
            status = confirmation.status,
            created = confirmation.transaction_ids.len(),
            duplicates = confirmation.duplicate_import_ids.len(),
            "batch accepted"
        );
        Ok(confirmation)
    }
}
