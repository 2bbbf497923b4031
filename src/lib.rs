pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod translate;

pub use channel::{ChannelDescriptor, ChannelPreset};
pub use config::GatewayConfig;
pub use error::{ConvertError, Result};
pub use logging::SharedJournal;
pub use server::{build_router, AppState};
pub use translate::Protocol;
