//! The set of curves traced over an image stack.

use crate::curve::{Curve, Geometry};
use crate::math::Point2d;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Uniquely identifies a curve in a [`CurveCollection`].
    pub struct CurveId;
}

/// An ordered collection of curves with a selection.
///
/// Curves are stored in a slot map and referenced by [`CurveId`]; insertion
/// order is preserved separately for iteration and export. Adding a curve
/// makes it the sole selection, matching interactive tracing where the newest
/// curve is the one being worked on.
#[derive(Default)]
pub struct CurveCollection {
    curves: SlotMap<CurveId, Curve>,
    /// Curve ids in insertion order.
    order: Vec<CurveId>,
    /// Ids of the selected curves, in insertion order.
    selected: Vec<CurveId>,
    /// Running counter for generated curve names; never reused.
    name_counter: usize,
}

impl CurveCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of curves.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the collection holds no curves.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Generates the next automatic curve name.
    pub fn next_name(&mut self) -> String {
        self.name_counter += 1;
        format!("CURVE {}", self.name_counter)
    }

    /// Adds a curve and selects it, deselecting everything else.
    pub fn add(&mut self, curve: Curve) -> CurveId {
        let id = self.curves.insert(curve);
        self.order.push(id);
        self.selected.clear();
        self.selected.push(id);
        id
    }

    /// Removes a curve. Returns it if the id was live.
    pub fn remove(&mut self, id: CurveId) -> Option<Curve> {
        let curve = self.curves.remove(id)?;
        self.order.retain(|&o| o != id);
        self.selected.retain(|&s| s != id);
        Some(curve)
    }

    /// Removes every curve and resets the selection. The name counter keeps
    /// running.
    pub fn clear(&mut self) {
        self.curves.clear();
        self.order.clear();
        self.selected.clear();
    }

    pub fn get(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id)
    }

    pub fn get_mut(&mut self, id: CurveId) -> Option<&mut Curve> {
        self.curves.get_mut(id)
    }

    /// Iterates over all curves in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (CurveId, &Curve)> {
        self.order.iter().map(|&id| (id, &self.curves[id]))
    }

    /// The ids of all curves in insertion order.
    pub fn ids(&self) -> &[CurveId] {
        &self.order
    }

    /// The ids of the selected curves.
    pub fn selected(&self) -> &[CurveId] {
        &self.selected
    }

    /// Iterates over the selected curves.
    pub fn selected_curves(&self) -> impl Iterator<Item = (CurveId, &Curve)> {
        self.selected.iter().map(|&id| (id, &self.curves[id]))
    }

    pub fn is_selected(&self, id: CurveId) -> bool {
        self.selected.contains(&id)
    }

    /// Adds a curve to the selection.
    pub fn select(&mut self, id: CurveId) {
        if self.curves.contains_key(id) && !self.selected.contains(&id) {
            self.selected.push(id);
        }
    }

    /// Removes a curve from the selection.
    pub fn deselect(&mut self, id: CurveId) {
        self.selected.retain(|&s| s != id);
    }

    /// Replaces the selection.
    pub fn set_selection(&mut self, ids: &[CurveId]) {
        self.selected.clear();
        for &id in ids {
            self.select(id);
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.order.clone();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Finds the topmost curve whose body contains the given point.
    /// Curves added later sit on top.
    pub fn curve_at(&self, point: Point2d) -> Option<CurveId> {
        self.order
            .iter()
            .rev()
            .copied()
            .find(|&id| self.curves[id].is_on_curve(point))
    }

    /// Moves every curve to the given frame, interpolating between
    /// keyframes.
    pub fn change_frame(&mut self, frame: i32) {
        for curve in self.curves.values_mut() {
            curve.translate_to_frame(frame);
        }
    }

    /// Rescales every curve about the image origin, recording keyframes at
    /// the given frame. Used when the image resolution changes.
    pub fn rescale(&mut self, factor: f64, frame: i32) {
        for curve in self.curves.values_mut() {
            curve.scale(factor, frame);
        }
    }

    /// The mean of the per-curve average curvatures, in 1/px.
    pub fn avg_average_curvature(&self, selected_only: bool) -> Option<f64> {
        self.aggregate(selected_only, |c| c.average_curvature())
    }

    /// The mean of the per-curve lengths, in px.
    pub fn avg_length(&self, selected_only: bool) -> Option<f64> {
        self.aggregate(selected_only, |c| c.length())
    }

    /// The mean curvature at the given sample index across curves, in 1/px.
    pub fn avg_point_curvature(&self, index: usize, selected_only: bool) -> Option<f64> {
        self.aggregate(selected_only, |c| c.point(index).k)
    }

    /// The standard deviation of the per-curve average curvatures.
    pub fn std_dev_of_avg_curvature(&self, selected_only: bool) -> Option<f64> {
        let mu = self.avg_average_curvature(selected_only)?;
        let ids = if selected_only {
            &self.selected
        } else {
            &self.order
        };
        if ids.len() < 2 {
            return None;
        }
        let variance: f64 = ids
            .iter()
            .map(|&id| {
                let k = self.curves[id].average_curvature();
                (k - mu) * (k - mu)
            })
            .sum();
        Some((variance / (ids.len() - 1) as f64).sqrt())
    }

    /// The number of curves that are composite B-splines.
    pub fn spline_count(&self) -> usize {
        self.curves
            .values()
            .filter(|c| matches!(c.geometry(), Geometry::Spline(_)))
            .count()
    }

    fn aggregate(&self, selected_only: bool, f: impl Fn(&Curve) -> f64) -> Option<f64> {
        let ids = if selected_only {
            &self.selected
        } else {
            &self.order
        };
        if ids.is_empty() {
            return None;
        }
        let total: f64 = ids.iter().map(|&id| f(&self.curves[id])).sum();
        Some(total / ids.len() as f64)
    }
}
