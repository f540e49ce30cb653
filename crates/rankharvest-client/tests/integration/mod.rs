pub mod common;
mod elasticsearch_tests;
