// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! TCP-adjacent types

pub mod port;
