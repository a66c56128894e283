pub mod generator;

pub use generator::{SofGenerator, TemplateError};
