//! Conversions between a live [`Brain`] and a [`BrainDocument`].
//!
//! [`decompose`] copies every committed neuron and link out of a brain.
//! [`recompose`] validates a document and rebuilds a brain from it; an
//! invalid document never produces a brain.

use cortex_core::{Brain, BrainConfig, CancelToken};

use crate::document::BrainDocument;
use crate::error::StorageError;

/// Copies a brain into a document. Temporaries are skipped.
///
/// Each neuron is read under its own locks, so the image is only
/// consistent when the brain is quiescent.
pub fn decompose(brain: &Brain) -> Result<BrainDocument, StorageError> {
    let (neurons, links) = brain.export_parts()?;
    Ok(BrainDocument::new(brain.next_id(), neurons, links))
}

/// Validates `document` and rebuilds the brain it describes.
pub fn recompose(document: BrainDocument, config: BrainConfig, cancel: &CancelToken) -> Result<Brain, StorageError> {
    document.validate(cancel)?;
    let BrainDocument {
        next_id,
        neurons,
        links,
        ..
    } = document;
    Ok(Brain::from_parts(config, next_id, neurons, links))
}
