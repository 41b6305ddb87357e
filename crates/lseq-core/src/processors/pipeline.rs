//! Runs a request's processors and combines their results.

use std::collections::BTreeSet;

use tracing::debug;

use super::trait_def::OutlineProcessor;
use crate::data::{CourseOutlineData, OverlayData, User};
use crate::error::{OutlineError, Result};
use crate::keys::{CourseKey, UsageKey};

/// Processors instantiated for one (course, user) request, in run order.
#[derive(Default)]
pub struct ProcessorPipeline {
    processors: Vec<(String, Box<dyn OutlineProcessor>)>,
}

impl ProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, processor: Box<dyn OutlineProcessor>) {
        self.processors.push((name.into(), processor));
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Load every processor, in order. The first failure aborts the request.
    pub async fn load(&mut self, course_key: &CourseKey, user: &User) -> Result<()> {
        for (name, processor) in &mut self.processors {
            processor
                .load(course_key, user)
                .await
                .map_err(|source| OutlineError::ExternalLoad {
                    processor: name.clone(),
                    source,
                })?;
            debug!(processor = %name, course_key = %course_key, user = user.id, "processor loaded");
        }
        Ok(())
    }

    /// Union of every processor's hide set.
    pub fn hide_set(&self, outline: &CourseOutlineData) -> BTreeSet<UsageKey> {
        self.processors
            .iter()
            .flat_map(|(_, processor)| processor.hide_set(outline))
            .collect()
    }

    /// Every processor's overlay merged into one record per key.
    pub fn data_to_add(&self, outline: &CourseOutlineData) -> OverlayData {
        let mut merged = OverlayData::new();
        for (name, processor) in &self.processors {
            merge_overlay(&mut merged, processor.data_to_add(outline), name);
        }
        merged
    }
}

/// Merge `incoming` into `merged` field by field. On a field present in
/// both, the incoming value wins.
pub fn merge_overlay(merged: &mut OverlayData, incoming: OverlayData, processor: &str) {
    for (key, fields) in incoming {
        let record = merged.entry(key).or_default();
        for (field, value) in fields {
            if let Some(previous) = record.insert(field.clone(), value) {
                debug!(processor, field = %field, ?previous, "overlay field overwritten");
            }
        }
    }
}
