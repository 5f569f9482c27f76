// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of dependency ordering that must hold for every graph, not
//! just the two shipped units.

mod ordering;
