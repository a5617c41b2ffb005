pub mod backend;
pub mod config_store;

pub use backend::{BackendClient, GenerationApi, StepResponse};
pub use config_store::{ConfigAction, ConfigObject, ConfigScope, ConfigStoreApi};
