pub mod config;
pub mod debtor;
pub mod error;
pub mod events;
pub mod instructions;
pub mod normalizer;
pub mod openai;
pub mod session;
pub mod summary;

pub use config::DunningConfig;
pub use debtor::{
    or_fallback, select_eligible, DebtorContextProvider, DebtorRecord, DebtorRow, DebtorSource,
    ResolutionFailure, SheetsConfig, SheetsDebtorSource,
};
pub use error::DunningError;
pub use events::{EventKind, RawSessionEvent};
pub use instructions::compose;
pub use normalizer::{normalize, NormalizedMessage, NormalizerPolicy, Role, Transcript};
pub use openai::{ChatMessage, OpenAiClient, OpenAiConfig, RawResponse, UpstreamError};
pub use session::{SessionToken, SessionTokenIssuer};
pub use summary::{SummaryRequester, SummaryResult, NO_SUMMARY};
