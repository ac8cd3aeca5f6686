//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod generated_music_repo;

pub use generated_music_repo::GeneratedMusicRepo;
