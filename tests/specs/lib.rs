// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specs for the `runq` binary.
//!
//! The files under `cli/` are compiled as test targets of the `runq`
//! package, so they can build queue fixtures through its library.
