#![doc = "oldp-toolkit-core: conversion pipeline for Open Legal Data dumps."]

//! This crate holds the record pipeline and every output target. It has no network
//! client: hub uploads go through the [`contract::HubUploader`] trait, implemented by
//! the CLI crate and mocked in tests.
//!
//! # Usage
//! Build a [`config::ConvertConfig`] and call [`convert::convert`].

pub mod batch;
pub mod config;
pub mod contract;
pub mod convert;
pub mod enrich;
pub mod error;
pub mod reader;
pub mod refs;
pub mod sink;
pub mod window;

pub use config::ConvertConfig;
pub use convert::{convert, convert_with_enricher, convert_with_progress, Progress, Summary};
pub use error::{ConvertError, EnrichmentWarning};
pub use sink::OutputFormat;
pub use window::Window;
