pub mod cuckoo;
pub mod hash_set;

/// Common surface of the cuckoo filter and the cuckoo hash set.
pub trait SetMembership<T: ?Sized> {
    type InsertError;

    fn contains(&self, item: &T) -> bool;
    fn insert(&mut self, item: &T) -> Result<(), Self::InsertError>;
    fn remove(&mut self, item: &T) -> bool;
}
