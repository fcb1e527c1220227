//! # Coursegen
//!
//! A resilient orchestration engine for multi-stage educational content
//! generation workloads.
//!
//! This library provides the scheduling core that turns one content-generation
//! request (a **job**) into a dependency graph of **tasks** (lesson sections,
//! assessments, module quizzes, a final exam, auxiliary media) and drives them
//! to completion against a slow, flaky external content service.
//!
//! ## Core Problem Solved
//!
//! Generation workloads have different failure characteristics than typical
//! web services:
//!
//! - **Long-running upstream calls**: a single content call can take minutes,
//!   so a hung call must be bounded by a hard deadline, never awaited forever
//! - **Dependent stages**: an assessment cannot be generated before its lesson
//!   text exists; quizzes depend on assessments; the exam depends on quizzes
//! - **Flaky upstream**: transient failures must be retried with backoff and
//!   isolated by a circuit breaker so one bad dependency does not amplify load
//! - **Crash recovery**: a crashed or wedged worker leaves tasks stuck in
//!   `running`; the engine must detect and repair this, not require an operator
//!
//! ## Key Features
//!
//! - **Dependency-graph scheduling**: tasks run only once every dependency has
//!   reached a terminal status; a failed dependency is deliberately treated as
//!   satisfied so one bad lesson never stalls its siblings
//! - **Optimistic dispatch**: batches claim tasks through compare-and-set
//!   status transitions, so two poll iterations never double-run a task
//! - **Circuit breakers**: one per external dependency, counting only
//!   dependency-level failures (timeouts, 5xx, network), never caller mistakes
//! - **Retry with backoff**: classified errors, exponential delay, capped
//! - **Rate limiting**: per-user minute/hour/day windows plus concurrency
//!   ceilings, and global admission control
//! - **Resilience monitor**: stall/stuck/abandoned classification with bounded
//!   automatic recovery (resume or restart)
//! - **Guaranteed status writes**: a triple-fallback write path so a task can
//!   never remain `running` forever because one store write failed
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coursegen::config::OrchestratorConfig;
//! use coursegen::core::graph::CourseOutline;
//! use coursegen::core::limiter::Role;
//! use coursegen::infra::store::memory::InMemoryJobStore;
//! use coursegen::runtime::{Orchestrator, TokioSpawner};
//!
//! let orchestrator = Orchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(my_generator), // implements ContentGenerator
//!     TokioSpawner::new(tokio::runtime::Handle::current()),
//! );
//!
//! let job_id = orchestrator.submit_job("user-1", Role::Instructor, &outline).await?;
//! let health = orchestrator.get_job_health(&job_id).await?;
//! ```
//!
//! For complete examples, see:
//! - `tests/orchestration_test.rs` - Full scheduler integration tests
//! - `tests/recovery_test.rs` - Health classification and recovery tests

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core domain model and engine: jobs, tasks, scheduler, breaker, retry,
/// rate limiter, resilience monitor.
pub mod core;
/// Configuration models for the scheduler, breaker, retry, limits, monitor.
pub mod config;
/// Builders to construct an orchestrator from configuration.
pub mod builders;
/// Infrastructure adapters: the job store contract and reference backends.
pub mod infra;
/// Runtime adapters and the job-control API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
