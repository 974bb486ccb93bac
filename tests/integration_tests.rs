//! Integration tests for the marksmith document store

mod integration;
