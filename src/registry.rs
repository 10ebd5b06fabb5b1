// src/registry.rs
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AddressEntry, Blockchain, NewAddress};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Blockchain and address are required.")]
    MissingField,

    #[error("Invalid blockchain type.")]
    InvalidBlockchain(String),

    #[error("Address already exists in your portfolio.")]
    DuplicateAddress,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Address not found: {0}")]
pub struct NotFoundError(pub Uuid);

/// Validate `candidate` and return the set with it appended.
///
/// Blockchain ids are compared lowercased, addresses exactly.
pub fn add_address(
    existing: &[AddressEntry],
    candidate: NewAddress,
) -> Result<Vec<AddressEntry>, ValidationError> {
    if candidate.blockchain.is_empty() || candidate.address.is_empty() {
        return Err(ValidationError::MissingField);
    }

    let blockchain = Blockchain::parse(&candidate.blockchain);
    if !blockchain.is_supported() {
        return Err(ValidationError::InvalidBlockchain(candidate.blockchain));
    }

    let duplicate = existing
        .iter()
        .any(|e| e.blockchain == blockchain && e.address == candidate.address);
    if duplicate {
        return Err(ValidationError::DuplicateAddress);
    }

    let mut updated = existing.to_vec();
    updated.push(AddressEntry {
        id: Uuid::new_v4(),
        blockchain,
        address: candidate.address,
    });
    Ok(updated)
}

/// Return the set without the entry identified by `id`
pub fn delete_address(
    existing: &[AddressEntry],
    id: Uuid,
) -> Result<Vec<AddressEntry>, NotFoundError> {
    if !existing.iter().any(|e| e.id == id) {
        return Err(NotFoundError(id));
    }
    Ok(existing.iter().filter(|e| e.id != id).cloned().collect())
}
