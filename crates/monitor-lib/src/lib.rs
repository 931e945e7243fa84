//! Host monitoring library
//!
//! This crate provides the core functionality for:
//! - CPU and memory sampling from `/proc`
//! - Threshold notifications over chat
//! - Remote start/stop/usage/status commands
//! - Health checks and observability

pub mod commands;
pub mod error;
pub mod gauge;
pub mod health;
pub mod lifecycle;
pub mod messaging;
pub mod models;
pub mod notify;
pub mod observability;
pub mod sampler;
pub mod settings;

pub use commands::{Command, CommandDispatcher, CommandPoller, Reply};
pub use error::{ConfigError, MessagingError, SourceError};
pub use gauge::UsageGauge;
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry};
pub use lifecycle::LifecycleController;
pub use messaging::{IncomingMessage, Messenger, TelegramClient, UpdateSource};
pub use models::*;
pub use notify::NotificationWatcher;
pub use observability::StructuredLogger;
pub use sampler::{CpuProbe, MemoryProbe, ProcFs, Sampler, SamplerConfig, UsageProbe};
pub use settings::{Settings, ThresholdConfig};
