//! Global allocator.
//!
//! Key derivation, envelope framing and container parsing churn through many
//! short-lived buffers; mimalloc handles that pattern better than the system
//! allocator.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
