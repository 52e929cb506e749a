use rand::{rngs::OsRng, RngCore};

/// Reset tokens carry 256 bits from the OS RNG.
pub const RESET_TOKEN_BYTES: usize = 32;

/// Produces a fresh hex-encoded reset token. Fails only if the OS entropy
/// source is unavailable.
pub fn generate_reset_token() -> Result<String, rand::Error> {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
