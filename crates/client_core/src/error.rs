use thiserror::Error;

use crate::transport::TransportError;

/// Why a remote graph refresh left the local graph untouched.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no transitions metadata endpoint configured")]
    NoMetadataEndpoint,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("metadata endpoint did not return a transition graph")]
    MissingGraph,
}
