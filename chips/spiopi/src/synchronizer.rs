// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Multi-stage synchronizer for asynchronous inputs.

/// `N`-flop synchronizer. Stage 0 samples the asynchronous input, stage
/// `N - 1` is the synchronized output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Synchronizer<const N: usize> {
    stages: [bool; N],
}

impl<const N: usize> Synchronizer<N> {
    /// All stages start at `reset`.
    pub const fn new(reset: bool) -> Synchronizer<N> {
        Synchronizer { stages: [reset; N] }
    }

    pub fn output(&self) -> bool {
        match self.stages.last() {
            Some(level) => *level,
            None => false,
        }
    }

    pub fn next(&self, input: bool) -> Synchronizer<N> {
        let mut stages = [input; N];
        stages[1..].copy_from_slice(&self.stages[..N.saturating_sub(1)]);
        Synchronizer { stages }
    }
}

#[cfg(test)]
mod test {
    use super::Synchronizer;

    #[test]
    fn two_stage_latency() {
        let sync = Synchronizer::<2>::new(true);
        let sync = sync.next(false);
        assert!(sync.output());
        let sync = sync.next(true);
        assert!(!sync.output());
        let sync = sync.next(true);
        assert!(sync.output());
    }

    #[test]
    fn single_stage_follows_input() {
        let sync = Synchronizer::<1>::new(false).next(true);
        assert!(sync.output());
    }
}
