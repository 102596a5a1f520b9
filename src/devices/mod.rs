// MIT License - Copyright (c) 2026 Peter Wright
// Devices

pub mod cover;

pub use cover::{AssumedState, Cover, CoverAction, CoverFeatures, CoverStatus};
