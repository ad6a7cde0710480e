pub mod api;
pub mod error;

use crate::agent::ChatEngine;
use crate::cli::Args;
use crate::history::ConversationStore;
use std::error::Error;
use std::sync::Arc;

use self::api::AppState;

pub struct Server {
    args: Args,
    state: AppState,
}

impl Server {
    pub fn new(args: Args, engine: Arc<dyn ChatEngine>, store: Arc<ConversationStore>) -> Self {
        Self {
            args,
            state: AppState { store, engine },
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.args, self.state.clone()).await
    }
}
