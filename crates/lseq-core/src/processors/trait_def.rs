//! The `OutlineProcessor` trait -- the interface every overlay processor
//! implements.
//!
//! The trait is object-safe so processors can be held as
//! `Box<dyn OutlineProcessor>` in a [`super::ProcessorPipeline`].

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::data::{CourseOutlineData, OverlayData, User};
use crate::keys::{CourseKey, UsageKey};

/// Computes user-specific annotations and exclusions for an outline.
///
/// An instance serves exactly one (course, user) pair: [`load`] is called
/// once, then [`hide_set`] and [`data_to_add`] read what was loaded.
///
/// [`load`]: OutlineProcessor::load
/// [`hide_set`]: OutlineProcessor::hide_set
/// [`data_to_add`]: OutlineProcessor::data_to_add
#[async_trait]
pub trait OutlineProcessor: Send + Sync {
    /// Fetch everything this processor needs for the course and user.
    async fn load(&mut self, course_key: &CourseKey, user: &User) -> Result<()>;

    /// Content keys that should be hidden from this user.
    fn hide_set(&self, _outline: &CourseOutlineData) -> BTreeSet<UsageKey> {
        BTreeSet::new()
    }

    /// Overlay fields to attach, restricted to sequences the outline contains.
    fn data_to_add(&self, outline: &CourseOutlineData) -> OverlayData;
}

const _: () = {
    fn _assert_object_safe(_: &dyn OutlineProcessor) {}
};
