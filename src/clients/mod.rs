pub mod backend_client;
pub mod llm_client;

pub use backend_client::BackendClient;
pub use llm_client::LlmClient;
