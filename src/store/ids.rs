//! Document id generation

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of auto-generated document ids
pub const DOCUMENT_ID_LEN: usize = 20;

/// Generates a 20-character alphanumeric document id from the OS RNG.
pub fn generate_document_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}
