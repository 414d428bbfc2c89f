use crate::debtor::DebtorContextProvider;
use crate::instructions;
use crate::openai::{OpenAiClient, RawResponse, UpstreamError};

/// Ephemeral realtime session credential, exactly as the endpoint sent it.
pub type SessionToken = RawResponse;

#[derive(Debug, Clone)]
pub struct SessionTokenIssuer {
    client: OpenAiClient,
}

impl SessionTokenIssuer {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }

    pub async fn issue(&self, instructions: &str) -> Result<SessionToken, UpstreamError> {
        let token = self.client.create_realtime_session(instructions).await?;
        tracing::info!(
            status = token.status,
            bytes = token.body.len(),
            model = %self.client.config().realtime_model,
            "Issued realtime session token"
        );
        Ok(token)
    }

    /// Resolve the next debtor, compose the agent instructions and issue a
    /// token for them.
    pub async fn issue_for_next_call(
        &self,
        debtors: &DebtorContextProvider,
    ) -> Result<SessionToken, UpstreamError> {
        let context = debtors.resolve().await;
        let instructions = instructions::compose(&context);
        self.issue(&instructions).await
    }
}
