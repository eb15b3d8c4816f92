pub mod digest_use_case;
pub mod ports;

pub use digest_use_case::{DigestRunSummary, DigestUseCase};
