//! Core library for morsel: the item/recipe data model, the key/value
//! store, nutrient math, the recipe composition graph, and the bundle
//! share/import pipeline. The CLI (and any other frontend) sits on top
//! of [`service::MorselService`].

pub mod bundle;
pub mod error;
pub mod graph;
pub mod import;
pub mod merge;
pub mod models;
pub mod nutrients;
pub mod service;
pub mod store;
