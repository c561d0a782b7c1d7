//! Per-query evaluation state
//!
//! Owned by exactly one query execution and dropped with it. Holds bind
//! parameters, the per-operator result cache and a handle to the shared
//! metrics registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::bitmap::Bitmap;
use crate::config::EvalConfig;
use crate::observability::MetricsRegistry;
use crate::segment::RowRange;

use super::expr::ExprId;

#[derive(Debug)]
pub struct EvalContext {
    query_id: Uuid,
    params: HashMap<String, Value>,
    current_range: Option<RowRange>,
    cache: HashMap<(ExprId, RowRange), Bitmap>,
    cache_enabled: bool,
    metrics: Arc<MetricsRegistry>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(MetricsRegistry::new()))
    }

    /// Context reporting into a registry shared with other queries
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            params: HashMap::new(),
            current_range: None,
            cache: HashMap::new(),
            cache_enabled: true,
            metrics,
        }
    }

    pub fn from_config(config: &EvalConfig, metrics: Arc<MetricsRegistry>) -> Self {
        let mut ctx = Self::with_metrics(metrics);
        ctx.cache_enabled = config.cache_results;
        ctx
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    /// Bind `$name` for compare operators
    pub fn bind_param(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Window the scheduler is currently evaluating
    pub fn current_range(&self) -> Option<RowRange> {
        self.current_range
    }

    pub fn set_current_range(&mut self, range: RowRange) {
        self.current_range = Some(range);
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.cache.clear();
        }
    }

    /// Run `f` with result caching off, keeping existing entries
    pub fn without_cache<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let enabled = std::mem::replace(&mut self.cache_enabled, false);
        let result = f(self);
        self.cache_enabled = enabled;
        result
    }

    /// Previously computed result of `expr` over exactly `range`
    pub fn cached_result(&self, expr: ExprId, range: RowRange) -> Option<Bitmap> {
        if !self.cache_enabled {
            return None;
        }
        let hit = self.cache.get(&(expr, range)).cloned();
        if hit.is_some() {
            self.metrics.increment_cache_hits();
        }
        hit
    }

    pub fn store_result(&mut self, expr: ExprId, range: RowRange, result: &Bitmap) {
        if self.cache_enabled {
            self.cache.insert((expr, range), result.clone());
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drop cached results, e.g. after rebinding parameters
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}
