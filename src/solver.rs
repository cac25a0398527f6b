//! Colour-to-stack solver
//!
//! Every target colour is matched against a precomputed table of achievable
//! [`LayerStack`]s. Layer counts are integers, so the table is finite and the
//! search is exhaustive over it. Pixel art has few distinct colours, so the
//! solver works per palette entry rather than per pixel.
//!
//! Ranking uses CIE76 ΔE in CIELAB. Ties go to the stack with fewer total
//! layers, then fewer White layers, then the lexicographically smallest
//! (cyan, magenta, yellow) counts; the candidate table is sorted in exactly
//! that order so the first best match wins.
//!
//! For flat faces every column must be exactly as tall as the tallest solved
//! stack. Those colours are solved again over the stacks of that height, with
//! White filling whatever the colour layers leave, rather than padding the
//! free solution.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{Lab, Srgb};
use crate::config::{GeometryConfig, SolverConfig};
use crate::error::Result;
use crate::filament::{Channel, FilamentSet};
use crate::raster::ColorKey;
use crate::transmission::TransmissionModel;

/// Layer counts of one printed column, White base first
///
/// Colour layers sit on the base in the fixed order Cyan, Magenta, Yellow.
/// The derived ordering compares (white, cyan, magenta, yellow).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LayerStack {
    /// White base layers
    pub white: u32,
    /// Cyan layers
    pub cyan: u32,
    /// Magenta layers
    pub magenta: u32,
    /// Yellow layers
    pub yellow: u32,
}

impl LayerStack {
    /// Create a new stack
    pub const fn new(white: u32, cyan: u32, magenta: u32, yellow: u32) -> Self {
        Self {
            white,
            cyan,
            magenta,
            yellow,
        }
    }

    /// Layers of one channel (the spacer never appears in a stack)
    pub fn count(&self, channel: Channel) -> u32 {
        match channel {
            Channel::White => self.white,
            Channel::Cyan => self.cyan,
            Channel::Magenta => self.magenta,
            Channel::Yellow => self.yellow,
            Channel::Spacer => 0,
        }
    }

    /// `(channel, count)` pairs from base to top
    pub fn layers(&self) -> [(Channel, u32); 4] {
        [
            (Channel::White, self.white),
            (Channel::Cyan, self.cyan),
            (Channel::Magenta, self.magenta),
            (Channel::Yellow, self.yellow),
        ]
    }

    /// Sum of all layer counts
    pub fn total_layers(&self) -> u32 {
        self.white + self.cyan + self.magenta + self.yellow
    }

    /// Printed height in millimetres
    pub fn height_mm(&self, layer_height: f64) -> f64 {
        self.total_layers() as f64 * layer_height
    }

    /// Channel of layer `z`, counted from the base, or `None` above the top
    pub fn channel_at(&self, z: u32) -> Option<Channel> {
        let mut top = 0;
        for (channel, count) in self.layers() {
            top += count;
            if z < top {
                return Some(channel);
            }
        }
        None
    }

    /// The same stack with extra White base layers up to `total` layers
    ///
    /// Stacks already at or above `total` are returned unchanged.
    pub fn padded_to(&self, total: u32) -> Self {
        let extra = total.saturating_sub(self.total_layers());
        Self {
            white: self.white + extra,
            ..*self
        }
    }
}

impl std::fmt::Display for LayerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "W{} C{} M{} Y{}",
            self.white, self.cyan, self.magenta, self.yellow
        )
    }
}

/// Best stack found for one target colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// Stack to print
    pub stack: LayerStack,
    /// Colour the stack is predicted to show
    pub predicted: Srgb,
    /// CIE76 ΔE between target and prediction
    pub error: f64,
    /// `error` exceeds the configured threshold
    pub clipped: bool,
}

/// Solved stacks keyed by colour
pub type Palette = BTreeMap<ColorKey, Solution>;

#[derive(Debug, Clone)]
struct Candidate {
    stack: LayerStack,
    lab: Lab,
}

/// Exhaustive stack search over a precomputed candidate table
#[derive(Debug, Clone)]
pub struct StackSolver {
    model: TransmissionModel,
    max_total_layers: u32,
    min_base_layers: u32,
    max_layers_per_channel: u32,
    error_threshold: f64,
    candidates: Vec<Candidate>,
}

impl StackSolver {
    /// Create a solver for a filament set, geometry and search bounds
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if the
    /// geometry's layer budget cannot hold the mandatory White base.
    pub fn new(
        filaments: &FilamentSet,
        geometry: &GeometryConfig,
        config: &SolverConfig,
    ) -> Result<Self> {
        Self::with_model(
            TransmissionModel::new(filaments, geometry),
            config,
            geometry.max_total_layers(),
        )
    }

    /// Create a solver around an existing transmission model
    pub fn with_model(
        model: TransmissionModel,
        config: &SolverConfig,
        max_total_layers: u32,
    ) -> Result<Self> {
        config.validate(max_total_layers)?;

        let max_white = config.max_base_layers.min(max_total_layers);
        let per_channel = config.max_layers_per_channel;
        let mut stacks = Vec::new();
        for white in config.min_base_layers..=max_white {
            for_each_color_split(per_channel, max_total_layers - white, |cyan, magenta, yellow| {
                stacks.push(LayerStack::new(white, cyan, magenta, yellow));
            });
        }

        let candidates = simulate_sorted(&model, stacks);

        Ok(Self {
            model,
            max_total_layers,
            min_base_layers: config.min_base_layers,
            max_layers_per_channel: per_channel,
            error_threshold: config.error_threshold,
            candidates,
        })
    }

    /// Number of stacks searched per colour
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Layer budget of one column
    pub fn max_total_layers(&self) -> u32 {
        self.max_total_layers
    }

    /// Underlying optical model
    pub fn model(&self) -> &TransmissionModel {
        &self.model
    }

    /// Find the best stack for `target`
    pub fn solve(&self, target: Srgb) -> Solution {
        self.best_of(target, &self.candidates)
            .unwrap_or_else(|| self.evaluate(target, LayerStack::new(self.min_base_layers, 0, 0, 0)))
    }

    /// Find the best stack for `target` among stacks exactly `depth` layers tall
    ///
    /// Colour layers stay within the per-channel cap and White fills the rest
    /// of the column, which may take the base past its configured maximum.
    pub fn solve_at_depth(&self, target: Srgb, depth: u32) -> Solution {
        let candidates = self.candidates_at_depth(depth);
        self.best_of(target, &candidates)
            .unwrap_or_else(|| self.evaluate(target, LayerStack::new(depth, 0, 0, 0)))
    }

    fn candidates_at_depth(&self, depth: u32) -> Vec<Candidate> {
        let mut stacks = Vec::new();
        if let Some(budget) = depth.checked_sub(self.min_base_layers) {
            for_each_color_split(self.max_layers_per_channel, budget, |cyan, magenta, yellow| {
                stacks.push(LayerStack::new(0, cyan, magenta, yellow).padded_to(depth));
            });
        }
        simulate_sorted(&self.model, stacks)
    }

    fn best_of(&self, target: Srgb, candidates: &[Candidate]) -> Option<Solution> {
        let target_lab = Lab::from(target);
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in candidates {
            let distance = target_lab.delta_e_squared(candidate.lab);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
        best.map(|(candidate, _)| self.evaluate(target, candidate.stack))
    }

    /// Score a specific stack against `target`
    pub fn evaluate(&self, target: Srgb, stack: LayerStack) -> Solution {
        let predicted = self.model.simulate(&stack);
        let error = Lab::from(target).delta_e(Lab::from(predicted));
        Solution {
            stack,
            predicted: Srgb::from(predicted),
            error,
            clipped: error > self.error_threshold,
        }
    }

    /// Solve every colour of a palette in parallel
    pub fn solve_palette(&self, colors: &BTreeSet<ColorKey>) -> Palette {
        colors
            .par_iter()
            .map(|&key| {
                let solution = self.solve(Srgb::from_bytes(key));
                tracing::debug!(
                    color = %Srgb::from_bytes(key),
                    stack = %solution.stack,
                    error = solution.error,
                    "Solved colour"
                );
                (key, solution)
            })
            .collect()
    }

    /// Solve every colour again with all stacks exactly `depth` layers tall
    ///
    /// Used for flat faces. The depth table is built once and shared by all
    /// colours.
    pub fn solve_palette_at_depth(&self, colors: &BTreeSet<ColorKey>, depth: u32) -> Palette {
        let candidates = self.candidates_at_depth(depth);
        colors
            .par_iter()
            .map(|&key| {
                let target = Srgb::from_bytes(key);
                let solution = self
                    .best_of(target, &candidates)
                    .unwrap_or_else(|| self.evaluate(target, LayerStack::new(depth, 0, 0, 0)));
                tracing::debug!(
                    color = %target,
                    stack = %solution.stack,
                    error = solution.error,
                    depth,
                    "Solved colour at fixed depth"
                );
                (key, solution)
            })
            .collect()
    }
}

/// Call `f` for every (cyan, magenta, yellow) split with each count at most
/// `per_channel` and the sum at most `budget`
fn for_each_color_split(per_channel: u32, budget: u32, mut f: impl FnMut(u32, u32, u32)) {
    for cyan in 0..=per_channel.min(budget) {
        let left = budget - cyan;
        for magenta in 0..=per_channel.min(left) {
            for yellow in 0..=per_channel.min(left - magenta) {
                f(cyan, magenta, yellow);
            }
        }
    }
}

/// Simulate stacks and sort them into tie-break order
fn simulate_sorted(model: &TransmissionModel, mut stacks: Vec<LayerStack>) -> Vec<Candidate> {
    stacks.sort_by_key(|s| (s.total_layers(), *s));
    stacks
        .into_iter()
        .map(|stack| Candidate {
            stack,
            lab: Lab::from(model.simulate(&stack)),
        })
        .collect()
}

/// Tallest stack in a palette, in layers
pub fn palette_depth(palette: &Palette) -> u32 {
    palette
        .values()
        .map(|s| s.stack.total_layers())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::LinearRgb;

    fn solver(config: &SolverConfig, max_total: u32) -> StackSolver {
        let model = TransmissionModel::with_dimensions(&FilamentSet::default(), 0.08, 1.0);
        StackSolver::with_model(model, config, max_total).unwrap()
    }

    #[test]
    fn test_channel_at_walks_base_to_top() {
        let stack = LayerStack::new(2, 1, 0, 2);
        let channels: Vec<_> = (0..6).map(|z| stack.channel_at(z)).collect();
        assert_eq!(
            channels,
            vec![
                Some(Channel::White),
                Some(Channel::White),
                Some(Channel::Cyan),
                Some(Channel::Yellow),
                Some(Channel::Yellow),
                None,
            ]
        );
        assert_eq!(stack.total_layers(), 5);
        assert!((stack.height_mm(0.1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_padding_adds_white_only() {
        let stack = LayerStack::new(1, 2, 0, 0);
        assert_eq!(stack.padded_to(6), LayerStack::new(4, 2, 0, 0));
        assert_eq!(stack.padded_to(2), stack);
    }

    #[test]
    fn test_base_that_does_not_fit_is_configuration_error() {
        let model = TransmissionModel::with_dimensions(&FilamentSet::default(), 0.08, 1.0);
        let config = SolverConfig::new().with_base_layers(4, 6);
        let err = StackSolver::with_model(model, &config, 3).unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));
    }

    #[test]
    fn test_candidates_respect_layer_budget() {
        let config = SolverConfig::new().with_max_layers_per_channel(4);
        let s = solver(&config, 6);
        assert!(s.candidate_count() > 0);
        for target in [[255, 0, 0], [0, 0, 0], [12, 200, 90], [255, 255, 255]] {
            let solution = s.solve(Srgb::from_bytes(target));
            assert!(solution.stack.total_layers() <= 6);
            assert!(solution.stack.white >= 1);
        }
    }

    #[test]
    fn test_exact_match_prefers_fewest_layers() {
        let s = solver(&SolverConfig::new(), 25);
        let target = Srgb::from(s.model().simulate(&LayerStack::new(1, 0, 0, 0)));
        let solution = s.solve(target);
        assert_eq!(solution.stack, LayerStack::new(1, 0, 0, 0));
        assert!(solution.error < 0.5);
        assert!(!solution.clipped);
    }

    #[test]
    fn test_reproduces_simulated_colour() {
        let s = solver(&SolverConfig::new(), 25);
        let stack = LayerStack::new(6, 2, 0, 1);
        let target = Srgb::from(s.model().simulate(&stack));
        let solution = s.solve(target);
        assert!(solution.error < 1.0, "error {}", solution.error);
    }

    #[test]
    fn test_unreachable_colour_is_clipped_not_fatal() {
        let config = SolverConfig::new().with_error_threshold(1.0);
        let s = solver(&config, 25);
        // Pure saturated green is far outside the default CMY gamut
        let solution = s.solve(Srgb::from(LinearRgb::new(0.0, 1.0, 0.0)));
        assert!(solution.clipped);
        assert!(solution.error > 1.0);
    }

    #[test]
    fn test_palette_at_depth_is_flat() {
        let s = solver(&SolverConfig::new(), 25);
        let colors: BTreeSet<ColorKey> = [[255, 255, 255], [0, 134, 214], [40, 40, 40]]
            .into_iter()
            .collect();
        let palette = s.solve_palette(&colors);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette, s.solve_palette(&colors));

        let depth = palette_depth(&palette);
        let flat = s.solve_palette_at_depth(&colors, depth);
        for solution in flat.values() {
            assert_eq!(solution.stack.total_layers(), depth);
            assert!(solution.stack.white >= 1);
        }
    }

    #[test]
    fn test_fixed_depth_beats_white_padding() {
        let s = solver(&SolverConfig::new(), 25);
        let colors: BTreeSet<ColorKey> = [[255, 255, 255], [90, 90, 90], [0, 110, 170]]
            .into_iter()
            .collect();
        let palette = s.solve_palette(&colors);
        let depth = palette_depth(&palette);
        let flat = s.solve_palette_at_depth(&colors, depth);

        for (key, solution) in &palette {
            let target = Srgb::from_bytes(*key);
            let padded = s.evaluate(target, solution.stack.padded_to(depth));
            let printed = flat[key];
            assert_eq!(printed.stack.total_layers(), depth);
            assert!(
                printed.error <= padded.error + 1e-9,
                "{:?}: {} vs padded {}",
                key,
                printed.error,
                padded.error
            );

            // No other stack of the same height does better
            for cyan in 0..=5 {
                for magenta in 0..=5 {
                    for yellow in 0..=5 {
                        let Some(white) = depth.checked_sub(cyan + magenta + yellow) else {
                            continue;
                        };
                        if white == 0 {
                            continue;
                        }
                        let other = s.evaluate(target, LayerStack::new(white, cyan, magenta, yellow));
                        assert!(printed.error <= other.error + 1e-9);
                    }
                }
            }
        }

        // A well-matched dark grey must not turn into a tall white column
        let grey = [90, 90, 90];
        if palette[&grey].stack.total_layers() < depth {
            let padded = s.evaluate(Srgb::from_bytes(grey), palette[&grey].stack.padded_to(depth));
            assert!(flat[&grey].error < padded.error);
        }
    }

    #[test]
    fn test_depth_below_base_falls_back_to_white() {
        let config = SolverConfig::new().with_base_layers(3, 6);
        let s = solver(&config, 25);
        let solution = s.solve_at_depth(Srgb::from_bytes([10, 20, 30]), 2);
        assert_eq!(solution.stack, LayerStack::new(2, 0, 0, 0));
    }

    #[test]
    fn test_per_channel_cap_beyond_budget_is_pruned() {
        let capped = solver(&SolverConfig::new().with_max_layers_per_channel(25), 25);
        let huge = solver(&SolverConfig::new().with_max_layers_per_channel(u32::MAX), 25);
        assert_eq!(capped.candidate_count(), huge.candidate_count());

        let target = Srgb::from_bytes([200, 80, 40]);
        assert_eq!(capped.solve(target).stack, huge.solve(target).stack);
        assert_eq!(huge.solve_at_depth(target, 25).stack.total_layers(), 25);
    }
}
