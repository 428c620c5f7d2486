pub mod api;
pub mod models;
pub mod types;
pub mod utils;

pub use api::{analyze_fn, generate_fn, send_analyze_request, send_generate_request};
pub use types::{
    AnalyzeFn, BoxFuture, GenerateFn, GenerateRequest, GenerateResponse, StudioClient, TokenUsage, UploadFile,
};
