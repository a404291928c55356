use geofile::GeofileError;
use link::LinkError;
use mission::{StoreError, SubmitError};
use thiserror::Error;

/// Failure of a panel action, already turned into status text by the panel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Geofile(#[from] GeofileError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
