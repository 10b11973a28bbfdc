// SPDX-FileCopyrightText: 2026 Agilekey Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key agent calls forwarded over a channel.
//!
//! [`KeyAgentServer`] owns the real agent and serves [`AgentCall`]s one at a
//! time. [`RpcKeyAgent`] is the client half and implements [`KeyAgent`], so
//! a vault can use a key agent living in another task without knowing it.

use std::sync::Arc;

use agilekey_core::{CryptoParams, KeyAgent, KeychainError, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Buffered calls before senders start waiting.
const CALL_BUFFER: usize = 32;

/// A request to the key agent.
pub enum AgentCall {
    AddKey { id: String, key: Zeroizing<Vec<u8>> },
    ListKeys,
    ForgetKeys,
    Encrypt {
        id: String,
        data: Vec<u8>,
        params: CryptoParams,
    },
    Decrypt {
        id: String,
        data: Vec<u8>,
        params: CryptoParams,
    },
}

impl AgentCall {
    fn name(&self) -> &'static str {
        match self {
            Self::AddKey { .. } => "add_key",
            Self::ListKeys => "list_keys",
            Self::ForgetKeys => "forget_keys",
            Self::Encrypt { .. } => "encrypt",
            Self::Decrypt { .. } => "decrypt",
        }
    }
}

/// The successful result of an [`AgentCall`].
#[derive(Debug, PartialEq, Eq)]
pub enum AgentReply {
    Done,
    Keys(Vec<String>),
    Data(Vec<u8>),
}

struct Envelope {
    call: AgentCall,
    reply: oneshot::Sender<Result<AgentReply>>,
}

/// Serves calls for a wrapped key agent.
pub struct KeyAgentServer {
    agent: Arc<dyn KeyAgent>,
    calls: mpsc::Receiver<Envelope>,
}

impl KeyAgentServer {
    /// Create a server and the client connected to it.
    pub fn new(agent: Arc<dyn KeyAgent>) -> (Self, RpcKeyAgent) {
        let (tx, rx) = mpsc::channel(CALL_BUFFER);
        (Self { agent, calls: rx }, RpcKeyAgent { calls: tx })
    }

    /// Start serving on a background task.
    ///
    /// The task ends once every client handle has been dropped.
    pub fn spawn(agent: Arc<dyn KeyAgent>) -> (RpcKeyAgent, JoinHandle<()>) {
        let (server, client) = Self::new(agent);
        let handle = tokio::spawn(server.run());
        (client, handle)
    }

    /// Serve calls until all clients disconnect.
    pub async fn run(mut self) {
        info!("key agent server started");
        while let Some(Envelope { call, reply }) = self.calls.recv().await {
            let name = call.name();
            let result = self.dispatch(call).await;
            if reply.send(result).is_err() {
                debug!(call = name, "key agent caller went away before reply");
            }
        }
        info!("key agent server stopped");
    }

    async fn dispatch(&self, call: AgentCall) -> Result<AgentReply> {
        match call {
            AgentCall::AddKey { id, key } => {
                self.agent.add_key(&id, key.to_vec()).await?;
                Ok(AgentReply::Done)
            }
            AgentCall::ListKeys => Ok(AgentReply::Keys(self.agent.list_keys().await?)),
            AgentCall::ForgetKeys => {
                self.agent.forget_keys().await?;
                Ok(AgentReply::Done)
            }
            AgentCall::Encrypt { id, data, params } => {
                Ok(AgentReply::Data(self.agent.encrypt(&id, &data, params).await?))
            }
            AgentCall::Decrypt { id, data, params } => {
                Ok(AgentReply::Data(self.agent.decrypt(&id, &data, params).await?))
            }
        }
    }
}

/// Client half of a [`KeyAgentServer`].
#[derive(Debug, Clone)]
pub struct RpcKeyAgent {
    calls: mpsc::Sender<Envelope>,
}

impl RpcKeyAgent {
    async fn call(&self, call: AgentCall) -> Result<AgentReply> {
        let name = call.name();
        let (reply, response) = oneshot::channel();
        self.calls
            .send(Envelope { call, reply })
            .await
            .map_err(|_| KeychainError::Internal(format!("key agent closed before `{name}`")))?;
        response
            .await
            .map_err(|_| KeychainError::Internal(format!("key agent dropped `{name}` call")))?
    }

    fn unexpected(name: &str, reply: AgentReply) -> KeychainError {
        let kind = match reply {
            AgentReply::Done => "done",
            AgentReply::Keys(_) => "keys",
            AgentReply::Data(_) => "data",
        };
        KeychainError::Internal(format!("unexpected `{kind}` reply to `{name}`"))
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("call", &self.call.name())
            .finish()
    }
}

#[async_trait]
impl KeyAgent for RpcKeyAgent {
    async fn add_key(&self, id: &str, key: Vec<u8>) -> Result<()> {
        let call = AgentCall::AddKey {
            id: id.to_string(),
            key: Zeroizing::new(key),
        };
        match self.call(call).await? {
            AgentReply::Done => Ok(()),
            other => Err(Self::unexpected("add_key", other)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        match self.call(AgentCall::ListKeys).await? {
            AgentReply::Keys(keys) => Ok(keys),
            other => Err(Self::unexpected("list_keys", other)),
        }
    }

    async fn forget_keys(&self) -> Result<()> {
        match self.call(AgentCall::ForgetKeys).await? {
            AgentReply::Done => Ok(()),
            other => Err(Self::unexpected("forget_keys", other)),
        }
    }

    async fn encrypt(&self, id: &str, plaintext: &[u8], params: CryptoParams) -> Result<Vec<u8>> {
        let call = AgentCall::Encrypt {
            id: id.to_string(),
            data: plaintext.to_vec(),
            params,
        };
        match self.call(call).await? {
            AgentReply::Data(data) => Ok(data),
            other => Err(Self::unexpected("encrypt", other)),
        }
    }

    async fn decrypt(&self, id: &str, ciphertext: &[u8], params: CryptoParams) -> Result<Vec<u8>> {
        let call = AgentCall::Decrypt {
            id: id.to_string(),
            data: ciphertext.to_vec(),
            params,
        };
        match self.call(call).await? {
            AgentReply::Data(data) => Ok(data),
            other => Err(Self::unexpected("decrypt", other)),
        }
    }
}
