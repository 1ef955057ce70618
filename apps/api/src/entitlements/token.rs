use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes per token; the hex form is twice as long.
pub const TOKEN_BYTES: usize = 16;

/// Generates an unguessable, fixed-length, lowercase hex token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
