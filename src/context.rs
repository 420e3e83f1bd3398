use std::sync::Arc;

use crate::config::Config;
use crate::replication::Replication;
use crate::store::Store;

/// Everything a command may need while executing. Cloning is cheap, every clone shares the same
/// store and replication state.
#[derive(Clone)]
pub struct Context {
    pub store: Store,
    pub replication: Replication,
    pub config: Arc<Config>,
}

impl Context {
    /// Must be called from within a Tokio runtime, see [`Store::new`].
    pub fn new(config: Config) -> Context {
        Context {
            store: Store::new(),
            replication: Replication::new(config.replicaof.clone()),
            config: Arc::new(config),
        }
    }
}
