//! File identity generation
//!
//! A file id is also the secret in its share link, so it must be unguessable.

use rand::Rng;

/// Bytes of randomness per id.
pub const FILE_ID_BYTES: usize = 16;

/// Length of the hex-encoded id.
pub const FILE_ID_LEN: usize = FILE_ID_BYTES * 2;

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> String;
}

/// 128 random bits from the thread-local CSPRNG, lowercase hex.
///
/// Ids are not checked against the metadata store before use. At 128 bits the
/// chance of a collision is negligible; if one ever happened the blob store
/// refuses to overwrite the existing key and the upload fails with a conflict
/// instead of clobbering someone else's file.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_id(&self) -> String {
        let mut rng = rand::rng();
        let bytes: [u8; FILE_ID_BYTES] = rng.random();
        hex::encode(bytes)
    }
}

/// Whether `id` has the shape of a generated file id.
pub fn is_valid_file_id(id: &str) -> bool {
    id.len() == FILE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
