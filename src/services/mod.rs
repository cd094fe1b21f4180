pub mod answer_resolver;
pub mod image_service;
pub mod llm_service;
pub mod region_prompter;

pub use answer_resolver::{normalize_freeform, parse_index, AnswerResolver};
pub use image_service::{EncodedImage, ImageCompressor};
pub use llm_service::{Credential, CredentialRotator, InferenceClient, LlmService};
pub use region_prompter::RegionPrompter;
