#![doc = include_str!("../README.md")]

pub mod config;
pub mod reflect;

pub use config::{Config, ConfigValue, DataTranslator, GenericValue};
pub use reflect::{Reflected, Type, TypeKind, TypeRegistry, Typed};
