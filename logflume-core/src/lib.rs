// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared building blocks for the logflume daemon.

pub mod cirq;
pub mod record;
pub mod resolve;
pub mod socket;
