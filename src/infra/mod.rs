pub mod digest_output_adapter;
pub mod json_source_adapter;

pub use digest_output_adapter::FileDigestOutputAdapter;
pub use json_source_adapter::JsonFileEventSource;
