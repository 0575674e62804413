// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use core::fmt::Debug;

/// The standard bound for values travelling through a flow.
///
/// This trait aggregates what every operator needs from an element type:
/// it can move between threads (`Send`), it can be reported to the
/// dropped-signal sink (`Debug`), and it owns its data (`'static`).
///
/// Operators that structurally need more (a shared source vector, a
/// multicast hub) add `Clone` or `Sync` bounds locally.
///
/// # Automatic Implementation
///
/// This trait is automatically implemented for any type that satisfies the
/// bounds.
pub trait Element: Send + Debug + 'static {}

impl<T> Element for T where T: Send + Debug + 'static {}
