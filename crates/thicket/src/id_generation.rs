//! Hash-based ID generation.
//!
//! IDs are derived from SHA-256 over a caller-supplied seed, the current time
//! in nanoseconds, and a retry nonce:
//!
//! - tickets: `{code}-{6 base36 chars}` (e.g. `TH-k3x9q0`)
//! - comments: `{code}-c{6 hex chars}` (e.g. `TH-c1f0a2b`)
//! - dependencies: `{code}-d{6 hex chars}` (e.g. `TH-d77be10`)
//!
//! # Example
//!
//! ```
//! use thicket::domain::ProjectCode;
//! use thicket::id_generation::IdGenerator;
//!
//! let mut generator = IdGenerator::new(ProjectCode::new("TH").unwrap());
//! let id = generator.ticket_id("Fix login redirect").unwrap();
//! assert!(id.validate().is_ok());
//! ```

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

use crate::domain::{CommentId, DependencyId, ProjectCode, TicketId};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const ID_LENGTH: usize = 6;

/// Errors that can occur during ID generation
#[derive(Debug, Error)]
pub enum IdGenerationError {
    /// Every nonce produced an ID that is already taken
    #[error("Unable to generate unique ID after {attempts} attempts")]
    CollisionExhausted {
        /// Number of nonces tried
        attempts: u32,
    },
}

/// Hash-based ID generator with collision detection.
///
/// The generator remembers every ID it has handed out or been told about via
/// [`register_id`](Self::register_id). Seed it from the store's known IDs
/// before generating.
pub struct IdGenerator {
    project: ProjectCode,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Creates a generator for the given project.
    #[must_use]
    pub fn new(project: ProjectCode) -> Self {
        Self {
            project,
            existing_ids: HashSet::new(),
        }
    }

    /// Creates a generator that avoids every ID in `existing`.
    pub fn with_existing<I, S>(project: ProjectCode, existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut generator = Self::new(project);
        for id in existing {
            generator.register_id(id);
        }
        generator
    }

    /// Returns the project code IDs are prefixed with.
    #[must_use]
    pub fn project(&self) -> &ProjectCode {
        &self.project
    }

    /// Register an existing ID to prevent collisions
    pub fn register_id(&mut self, id: impl Into<String>) {
        self.existing_ids.insert(id.into());
    }

    /// Generates a fresh ticket ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError::CollisionExhausted`] if every nonce collides.
    pub fn ticket_id(&mut self, seed: &str) -> Result<TicketId, IdGenerationError> {
        self.generate(seed, "", encode_base36).map(TicketId::new)
    }

    /// Generates a fresh comment ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError::CollisionExhausted`] if every nonce collides.
    pub fn comment_id(&mut self, seed: &str) -> Result<CommentId, IdGenerationError> {
        self.generate(seed, "c", encode_hex).map(CommentId::new)
    }

    /// Generates a fresh dependency ID.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError::CollisionExhausted`] if every nonce collides.
    pub fn dependency_id(&mut self, seed: &str) -> Result<DependencyId, IdGenerationError> {
        self.generate(seed, "d", encode_hex).map(DependencyId::new)
    }

    fn generate(
        &mut self,
        seed: &str,
        marker: &str,
        encode: fn(&[u8]) -> String,
    ) -> Result<String, IdGenerationError> {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        for nonce in 0..MAX_NONCE {
            let mut hasher = Sha256::new();
            hasher.update(format!("{seed}|{timestamp}|{nonce}").as_bytes());
            let hash = hasher.finalize();

            let id = format!("{}-{marker}{}", self.project, encode(&hash));
            if !self.existing_ids.contains(&id) {
                if nonce > 0 {
                    debug!(nonce, %id, "Generated unique ID after collision retries");
                }
                self.existing_ids.insert(id.clone());
                return Ok(id);
            }
        }

        Err(IdGenerationError::CollisionExhausted {
            attempts: MAX_NONCE,
        })
    }
}

/// Encodes the first eight hash bytes as six base36 characters.
fn encode_base36(hash: &[u8]) -> String {
    let mut num: u64 = 0;
    for &byte in hash.iter().take(8) {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::with_capacity(ID_LENGTH);
    while result.len() < ID_LENGTH {
        // Remainder is < 36 so the index is always in range.
        let remainder = usize::try_from(num % 36).unwrap_or_default();
        result.push(char::from(BASE36_CHARS[remainder]));
        num /= 36;
    }
    result.iter().rev().collect()
}

/// Encodes the first three hash bytes as six lowercase hex characters.
fn encode_hex(hash: &[u8]) -> String {
    hash.iter()
        .take(ID_LENGTH / 2)
        .fold(String::with_capacity(ID_LENGTH), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
