pub mod ai;
pub mod ai_types;
pub mod encoding;
pub mod fingerprint;
pub mod pipeline;
pub mod storage;
pub mod walker;
