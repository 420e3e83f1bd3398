use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strum_macros::Display;
use uuid::Uuid;

use crate::config::ReplicaOf;

pub mod handshake;

pub use handshake::{FullResync, Handshake, HandshakeError, HandshakeState};

const REPLID_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

/// Replication state of this process. The role and id are fixed at startup, the offset grows
/// with every write command that goes through the append-only file.
#[derive(Debug, Clone)]
pub struct Replication {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    replid: String,
    offset: AtomicU64,
    master: Option<ReplicaOf>,
}

impl Replication {
    pub fn new(master: Option<ReplicaOf>) -> Replication {
        Replication {
            inner: Arc::new(Inner {
                replid: generate_replid(),
                offset: AtomicU64::new(0),
                master,
            }),
        }
    }

    pub fn role(&self) -> Role {
        match self.inner.master {
            Some(_) => Role::Slave,
            None => Role::Master,
        }
    }

    /// The master this process replicates from, if any.
    pub fn master(&self) -> Option<&ReplicaOf> {
        self.inner.master.as_ref()
    }

    pub fn replid(&self) -> &str {
        &self.inner.replid
    }

    pub fn offset(&self) -> u64 {
        self.inner.offset.load(Ordering::Acquire)
    }

    /// Advances the offset by `bytes` and returns the new value.
    pub fn advance(&self, bytes: u64) -> u64 {
        self.inner.offset.fetch_add(bytes, Ordering::AcqRel) + bytes
    }
}

// 40 lowercase hex characters, like the ids Redis hands out.
fn generate_replid() -> String {
    let mut replid = Uuid::new_v4().simple().to_string();
    replid.push_str(&Uuid::new_v4().simple().to_string());
    replid.truncate(REPLID_LEN);
    replid
}
