// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete stores and adapters selected by configuration

use async_trait::async_trait;
use keel_adapters::{
    DirectoryError, HttpProjectDirectory, HttpProvisionAdapter, NoOpProjectDirectory,
    NoOpProvisionAdapter, ProjectDirectory, ProvisionAdapter, ProvisionError, ProvisionRequest,
};
use keel_core::{Step, TraceId, WorkflowId};
use keel_daemon::config::{ServicesSection, StoreSection};
use keel_daemon::StoreBackend;
use keel_storage::{ChannelSubscription, CoordinationStore, MemoryCoordinationStore, StoreError};
use std::collections::HashMap;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// The coordination store the daemon was configured with
pub enum CoordinationBackend {
    Memory(MemoryCoordinationStore),
    #[cfg(feature = "redis")]
    Redis(keel_storage::RedisCoordinationStore),
}

impl CoordinationBackend {
    pub async fn connect(section: &StoreSection) -> Result<Self, LifecycleError> {
        match section.backend {
            StoreBackend::Memory => Ok(Self::Memory(MemoryCoordinationStore::new())),
            #[cfg(feature = "redis")]
            StoreBackend::Redis => Ok(Self::Redis(
                keel_storage::RedisCoordinationStore::connect(&section.url, &section.key_prefix)
                    .await?,
            )),
            #[cfg(not(feature = "redis"))]
            StoreBackend::Redis => Err(LifecycleError::Unsupported(
                "store.backend = \"redis\" needs keeld built with the redis feature".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "redis")]
            Self::Redis(_) => "redis",
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            CoordinationBackend::Memory($store) => $call,
            #[cfg(feature = "redis")]
            CoordinationBackend::Redis($store) => $call,
        }
    };
}

#[async_trait]
impl CoordinationStore for CoordinationBackend {
    async fn remove_expired(&self, key: &str, cutoff: u64) -> Result<usize, StoreError> {
        delegate!(self, s => s.remove_expired(key, cutoff).await)
    }

    async fn insert_if_below(
        &self,
        key: &str,
        member: &str,
        score: u64,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        delegate!(self, s => s.insert_if_below(key, member, score, limit, ttl).await)
    }

    async fn touch(
        &self,
        key: &str,
        member: &str,
        score: u64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        delegate!(self, s => s.touch(key, member, score, ttl).await)
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        delegate!(self, s => s.remove(key, member).await)
    }

    async fn count(&self, key: &str) -> Result<usize, StoreError> {
        delegate!(self, s => s.count(key).await)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        delegate!(self, s => s.publish(channel, message).await)
    }

    async fn subscribe(&self, channel: &str) -> Result<ChannelSubscription, StoreError> {
        delegate!(self, s => s.subscribe(channel).await)
    }

    async fn record_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<HashMap<String, String>, StoreError> {
        delegate!(self, s => s.record_field(key, field, value, ttl).await)
    }

    async fn claim(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        delegate!(self, s => s.claim(key, ttl).await)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        delegate!(self, s => s.delete(key).await)
    }
}

/// Project directory: HTTP when a URL is configured, otherwise every project exists
#[derive(Clone)]
pub enum Directory {
    Http(HttpProjectDirectory),
    NoOp(NoOpProjectDirectory),
}

impl Directory {
    pub fn from_config(services: &ServicesSection) -> Self {
        match &services.projects_url {
            Some(url) => Self::Http(HttpProjectDirectory::new(url, services.request_timeout)),
            None => Self::NoOp(NoOpProjectDirectory::new()),
        }
    }
}

#[async_trait]
impl ProjectDirectory for Directory {
    async fn exists(&self, id: &WorkflowId, trace_id: &TraceId) -> Result<bool, DirectoryError> {
        match self {
            Self::Http(d) => d.exists(id, trace_id).await,
            Self::NoOp(d) => d.exists(id, trace_id).await,
        }
    }
}

/// Provisioning: HTTP when any step URL is configured, otherwise every step succeeds
#[derive(Clone)]
pub enum Provisioner {
    Http(HttpProvisionAdapter),
    NoOp(NoOpProvisionAdapter),
}

impl Provisioner {
    pub fn from_config(services: &ServicesSection) -> Self {
        if services.tasks_url.is_none() && services.notifications_url.is_none() {
            return Self::NoOp(NoOpProvisionAdapter::new());
        }
        Self::Http(HttpProvisionAdapter::new(
            services.tasks_url.clone(),
            services.notifications_url.clone(),
            services.request_timeout,
        ))
    }
}

#[async_trait]
impl ProvisionAdapter for Provisioner {
    async fn provision(
        &self,
        step: Step,
        request: &ProvisionRequest,
        trace_id: &TraceId,
    ) -> Result<(), ProvisionError> {
        match self {
            Self::Http(p) => p.provision(step, request, trace_id).await,
            Self::NoOp(p) => p.provision(step, request, trace_id).await,
        }
    }
}
