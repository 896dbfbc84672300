pub mod fingerprint;
pub mod seal;

pub use fingerprint::token_fingerprint;
pub use seal::{open_token, seal_token, SealError, TokenCodec, SEALED_PREFIX};
