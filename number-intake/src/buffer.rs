use crate::record::Number;

/// Unique numbers in first-seen order, waiting to be persisted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccumulationBuffer {
    numbers: Vec<Number>,
}

impl AccumulationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, number: Number) {
        self.numbers.push(number);
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Number> {
        self.numbers.iter()
    }
}

impl FromIterator<Number> for AccumulationBuffer {
    fn from_iter<I: IntoIterator<Item = Number>>(iter: I) -> Self {
        Self {
            numbers: iter.into_iter().collect(),
        }
    }
}
