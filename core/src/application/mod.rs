// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod deduplication;
pub mod lifecycle;
pub mod repository_factory;
pub mod review;

// Re-export use cases for convenience
pub use deduplication::{DeduplicationError, DeduplicationOrchestrator, PatternFailure, RunSummary};
pub use lifecycle::{LifecycleError, LifecycleService, StandardLifecycleService};
pub use repository_factory::{create_repositories, Repositories};
pub use review::{ListSuggestionsRequest, ReviewError, ReviewQueries, SuggestionListing, SuggestionSummary};
