use crate::response::Journey;

/// A set of pairwise non-dominated journeys.
///
/// Same add/dominates/remove surface as the per-stop fronts the engine's
/// ancestors use, concretized for [`Journey`]'s dominance order.
#[derive(Debug, Default)]
pub struct JourneyFront {
    elements: Vec<Journey>,
}

impl JourneyFront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn dominates(&self, candidate: &Journey) -> bool {
        self.elements
            .iter()
            .any(|journey| journey.dominates(candidate) || journey == candidate)
    }

    fn remove_elements_dominated_by(&mut self, candidate: &Journey) {
        self.elements.retain(|journey| !candidate.dominates(journey));
    }

    /// Inserts `candidate` unless it is dominated (or already present),
    /// evicting everything it dominates.
    pub fn add(&mut self, candidate: Journey) {
        if self.dominates(&candidate) {
            return;
        }
        self.remove_elements_dominated_by(&candidate);
        self.elements.push(candidate);
    }

    pub fn merge_with(&mut self, other: Self) {
        for journey in other.elements {
            self.add(journey);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Journey> {
        self.elements.iter()
    }

    /// Consumes the front into the deterministic presentation order.
    pub fn into_sorted_vec(mut self) -> Vec<Journey> {
        self.elements.sort();
        self.elements
    }
}
