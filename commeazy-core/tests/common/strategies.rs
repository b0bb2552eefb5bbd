// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable proptest strategies for property-based testing.

use proptest::prelude::*;

/// Arbitrary content, empty included.
pub fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Recipient counts on both sides of the mode threshold.
pub fn recipient_count_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 2usize..=8, 9usize..=24]
}

/// Numeric PINs of 4 to 8 digits.
pub fn pin_strategy() -> impl Strategy<Value = String> {
    "[0-9]{4,8}"
}
