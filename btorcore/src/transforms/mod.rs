pub mod cast_resolution;
