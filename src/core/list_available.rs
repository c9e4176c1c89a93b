//! Available Services Listing (SPEC_FULL.md §4.10), grounded in
//! `original_source/internal/service/list_available.go`: lists every
//! baseline key with at least one sample and groups it by service, without
//! bucket detail.

use crate::core::error::CoreResult;
use crate::core::keys::parse_baseline_key;
use crate::core::model::AvailableServicesResponse;
use crate::core::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ListAvailable {
    store: Arc<dyn Store>,
}

impl ListAvailable {
    pub fn new(store: Arc<dyn Store>) -> Self {
        ListAvailable { store }
    }

    pub async fn list(&self) -> CoreResult<AvailableServicesResponse> {
        let keys = self.store.list_baseline_keys(1).await?;

        let mut trace_endpoints: HashMap<String, Vec<String>> = HashMap::new();
        let mut span_names: HashMap<String, Vec<String>> = HashMap::new();

        for key in &keys {
            let Some(parsed) = parse_baseline_key(key) else {
                continue;
            };
            let bucket = if parsed.is_span {
                span_names.entry(parsed.service).or_default()
            } else {
                trace_endpoints.entry(parsed.service).or_default()
            };
            if !bucket.contains(&parsed.leaf) {
                bucket.push(parsed.leaf);
            }
        }

        for endpoints in trace_endpoints.values_mut() {
            endpoints.sort();
        }
        for names in span_names.values_mut() {
            names.sort();
        }

        Ok(AvailableServicesResponse {
            trace_endpoints,
            span_names,
        })
    }
}
