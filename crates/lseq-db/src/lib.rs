//! Relational projection store for course outlines.
//!
//! Four tables (`learning_contexts`, `learning_sequences`, `course_sections`,
//! `course_section_sequences`) hold the queryable form of a course outline.
//! This crate is pure persistence: connection setup, embedded migrations, row
//! models, and one query module per table. Business rules live in `lseq-core`.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
