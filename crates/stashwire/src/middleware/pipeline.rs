// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use bytes::Bytes;
use stashwire_types::{Metadata, Status};

use super::{CallHandler, HookError, Middleware};
use crate::CallInfo;

/// The handlers of one logical call, in registration order.
pub(crate) struct HookPipeline {
    handlers: Vec<Box<dyn CallHandler>>,
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPipeline").field("handlers", &self.handlers.len()).finish()
    }
}

impl HookPipeline {
    pub(crate) fn start(middlewares: &[Arc<dyn Middleware>], call: &CallInfo) -> Self {
        Self {
            handlers: middlewares.iter().map(|m| m.on_new_call(call)).collect(),
        }
    }

    pub(crate) async fn outgoing(&mut self, mut metadata: Metadata, mut body: Bytes) -> Result<(Metadata, Bytes), HookError> {
        for handler in &mut self.handlers {
            metadata = handler.on_outgoing_metadata(metadata).await?;
        }

        for handler in &mut self.handlers {
            body = handler.on_outgoing_body(body).await?;
        }

        Ok((metadata, body))
    }

    pub(crate) async fn incoming(
        &mut self,
        mut metadata: Metadata,
        mut body: Option<Bytes>,
        mut status: Status,
    ) -> Result<(Metadata, Option<Bytes>, Status), HookError> {
        for handler in self.handlers.iter_mut().rev() {
            metadata = handler.on_incoming_metadata(metadata).await?;
        }

        if let Some(mut value) = body.take() {
            for handler in self.handlers.iter_mut().rev() {
                value = handler.on_incoming_body(value).await?;
            }
            body = Some(value);
        }

        for handler in self.handlers.iter_mut().rev() {
            status = handler.on_incoming_status(status).await?;
        }

        Ok((metadata, body, status))
    }
}
