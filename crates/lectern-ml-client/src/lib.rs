//! Client for the external ML service.
//!
//! The service transcribes media ranges, summarizes windows and embeds text.
//! It is optional: without `ML_SERVICE_URL` the pipeline falls back to
//! placeholder collaborators.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{
    EmbedRequest, EmbedResponse, HealthResponse, SummarizeRequest, SummarizeResponse,
    TranscribeRequest, TranscribeResponse,
};
