// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference [`parley_engine::ProviderAdapter`] implementations shipped
//! with the CLI: a deterministic [`mock`] for offline runs, and a
//! generic [`http`] transport for any provider behind a JSON completion
//! endpoint.

pub mod http;
pub mod mock;

use std::sync::Arc;

use parley_engine::{EngineConfig, ProviderAdapter};

/// Resolve a provider identifier from `--agent1`/`--agent2` into a
/// concrete adapter. `"mock"` is always available; any other name is
/// treated as an HTTP-backed provider reachable at
/// `PARLEY_<NAME>_URL` (falling back to `https://api.<name>.invalid`,
/// which only the mock provider can usefully stand in for in tests).
pub fn resolve(name: &str, model: Option<&str>) -> Arc<dyn ProviderAdapter> {
    if name.eq_ignore_ascii_case("mock") {
        let default_model = model.unwrap_or("mock-1").to_owned();
        return Arc::new(mock::MockAdapter::new("mock", default_model));
    }

    let base_url = std::env::var(format!("PARLEY_{}_URL", name.to_uppercase()))
        .unwrap_or_else(|_| format!("https://api.{}.invalid", name.to_lowercase()));
    let api_key = EngineConfig::api_key_for(name);
    let default_model = model.unwrap_or("default").to_owned();
    Arc::new(http::HttpAdapter::new(name.to_owned(), default_model, base_url, api_key))
}

/// Whether `resolve`'s adapter for this provider name requires a
/// credential to be present before the run starts.
pub fn requires_credential(name: &str) -> bool {
    !name.eq_ignore_ascii_case("mock")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
