pub mod classifier;
pub mod credentials;
pub mod http_client;
pub mod openai;
pub mod prompts;
pub mod vision;

pub use classifier::*;
pub use credentials::CredentialManager;
pub use openai::OpenAiClassifier;
