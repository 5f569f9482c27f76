// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify ordering properties that must
//! hold for every dependency graph a deployment unit can declare.

mod property;
