use std::ops::Deref;

/// Read-only wrapper for parameter sets which must not change after construction
#[derive(Debug, Clone)]
pub struct Immutable<T> {
    value: T,
}

impl<T> Immutable<T> {
    pub fn new(value: T) -> Self { Self { value } }
}

impl<T> Deref for Immutable<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target { &self.value }
}
