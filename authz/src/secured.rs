//! Capability-checked views over collections of access-controlled objects.
//!
//! One generic core, [`SecuredView`], pairs a checker with the privilege
//! required to view an element; the collection wrappers around it filter
//! element retrieval only. Every accessor that would hand back a stored
//! element instead returns [`SecuredView::reveal`]'s result: a clone when
//! the subject holds the privilege on that element, otherwise a freshly
//! constructed placeholder of the same type carrying the access-denied
//! display name. Structural operations (len, insert, remove, clear,
//! membership tests) pass through untouched, so wrapping never changes a
//! collection's size or ordering. Sub-range views carry the same check, so
//! no navigation path escapes it.
//!
//! The views carry no locking; they are meant for a single request's
//! rendering pipeline.

use std::collections::{btree_map, btree_set, BTreeMap, BTreeSet};
use std::ops::{Range, RangeBounds};

use crate::checker::PermissionChecker;
use crate::object::SecuredObject;

/// The reveal-or-placeholder core shared by all wrappers.
#[derive(Clone)]
pub struct SecuredView<'c> {
    checker: &'c PermissionChecker,
    privilege: String,
}

impl<'c> SecuredView<'c> {
    pub fn new(checker: &'c PermissionChecker, privilege: impl Into<String>) -> Self {
        Self {
            checker,
            privilege: privilege.into(),
        }
    }

    /// A clone of `item` when the subject may view it, otherwise the
    /// same-type access-denied placeholder.
    pub fn reveal<T: SecuredObject>(&self, item: &T) -> T {
        if self.checker.is_permitted_on(&self.privilege, item) {
            item.clone()
        } else {
            T::access_denied()
        }
    }

    /// Wrap an arbitrary iterator of borrowed elements.
    pub fn wrap<I>(&self, inner: I) -> SecuredIter<'c, I> {
        SecuredIter {
            view: self.clone(),
            inner,
        }
    }
}

/// Iterator adapter yielding revealed elements.
pub struct SecuredIter<'c, I> {
    view: SecuredView<'c>,
    inner: I,
}

impl<'a, 'c, I, T> Iterator for SecuredIter<'c, I>
where
    I: Iterator<Item = &'a T>,
    T: SecuredObject + 'a,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next().map(|item| self.view.reveal(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Entry iterator adapter for map wrappers; keys pass through, values are
/// revealed.
pub struct SecuredEntries<'c, I> {
    view: SecuredView<'c>,
    inner: I,
}

impl<'a, 'c, I, K, T> Iterator for SecuredEntries<'c, I>
where
    I: Iterator<Item = (&'a K, &'a T)>,
    K: 'a,
    T: SecuredObject + 'a,
{
    type Item = (&'a K, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, item)| (key, self.view.reveal(item)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Secured wrapper over a `Vec` of access-controlled objects.
pub struct SecuredList<'c, T: SecuredObject> {
    view: SecuredView<'c>,
    items: Vec<T>,
}

impl<'c, T: SecuredObject> SecuredList<'c, T> {
    pub fn new(
        checker: &'c PermissionChecker,
        privilege: impl Into<String>,
        items: Vec<T>,
    ) -> Self {
        Self {
            view: SecuredView::new(checker, privilege),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item);
    }

    /// Remove the element at `index`; the returned element is revealed.
    pub fn remove(&mut self, index: usize) -> T {
        let removed = self.items.remove(index);
        self.view.reveal(&removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).map(|item| self.view.reveal(item))
    }

    pub fn iter<'a>(&'a self) -> SecuredIter<'c, std::slice::Iter<'a, T>> {
        self.view.wrap(self.items.iter())
    }

    /// Sub-range view; carries the same check as the parent.
    pub fn slice<'a>(&'a self, range: Range<usize>) -> SecuredSlice<'a, 'c, T> {
        SecuredSlice {
            view: self.view.clone(),
            items: &self.items[range],
        }
    }
}

/// Borrowed sub-range of a [`SecuredList`].
pub struct SecuredSlice<'a, 'c, T: SecuredObject> {
    view: SecuredView<'c>,
    items: &'a [T],
}

impl<'a, 'c, T: SecuredObject> SecuredSlice<'a, 'c, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.items.get(index).map(|item| self.view.reveal(item))
    }

    pub fn iter(&self) -> SecuredIter<'c, std::slice::Iter<'a, T>> {
        self.view.wrap(self.items.iter())
    }

    /// Narrow further; the check still applies.
    pub fn slice(&self, range: Range<usize>) -> SecuredSlice<'a, 'c, T> {
        SecuredSlice {
            view: self.view.clone(),
            items: &self.items[range],
        }
    }
}

/// Secured wrapper over an ordered set of access-controlled objects.
pub struct SecuredSet<'c, T: SecuredObject + Ord> {
    view: SecuredView<'c>,
    items: BTreeSet<T>,
}

impl<'c, T: SecuredObject + Ord> SecuredSet<'c, T> {
    pub fn new(
        checker: &'c PermissionChecker,
        privilege: impl Into<String>,
        items: BTreeSet<T>,
    ) -> Self {
        Self {
            view: SecuredView::new(checker, privilege),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    pub fn remove(&mut self, item: &T) -> bool {
        self.items.remove(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter<'a>(&'a self) -> SecuredIter<'c, btree_set::Iter<'a, T>> {
        self.view.wrap(self.items.iter())
    }

    pub fn first(&self) -> Option<T> {
        self.items.first().map(|item| self.view.reveal(item))
    }

    pub fn last(&self) -> Option<T> {
        self.items.last().map(|item| self.view.reveal(item))
    }

    /// Range view over the underlying ordering; elements are revealed.
    pub fn range<'a, R>(&'a self, range: R) -> SecuredIter<'c, btree_set::Range<'a, T>>
    where
        R: RangeBounds<T>,
    {
        self.view.wrap(self.items.range(range))
    }
}

/// Secured wrapper over an ordered map whose values are access-controlled.
pub struct SecuredMap<'c, K: Ord, T: SecuredObject> {
    view: SecuredView<'c>,
    items: BTreeMap<K, T>,
}

impl<'c, K: Ord, T: SecuredObject> SecuredMap<'c, K, T> {
    pub fn new(
        checker: &'c PermissionChecker,
        privilege: impl Into<String>,
        items: BTreeMap<K, T>,
    ) -> Self {
        Self {
            view: SecuredView::new(checker, privilege),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a value; a displaced previous value is revealed.
    pub fn insert(&mut self, key: K, item: T) -> Option<T> {
        let displaced = self.items.insert(key, item);
        displaced.map(|item| self.view.reveal(&item))
    }

    /// Remove a value; the removed value is revealed.
    pub fn remove(&mut self, key: &K) -> Option<T> {
        let removed = self.items.remove(key);
        removed.map(|item| self.view.reveal(&item))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    pub fn get(&self, key: &K) -> Option<T> {
        self.items.get(key).map(|item| self.view.reveal(item))
    }

    pub fn iter<'a>(&'a self) -> SecuredEntries<'c, btree_map::Iter<'a, K, T>> {
        SecuredEntries {
            view: self.view.clone(),
            inner: self.items.iter(),
        }
    }

    /// Range view over the key ordering; values are revealed.
    pub fn range<'a, R>(&'a self, range: R) -> SecuredEntries<'c, btree_map::Range<'a, K, T>>
    where
        R: RangeBounds<K>,
    {
        SecuredEntries {
            view: self.view.clone(),
            inner: self.items.range(range),
        }
    }

    pub fn first_key_value(&self) -> Option<(&K, T)> {
        self.items
            .first_key_value()
            .map(|(key, item)| (key, self.view.reveal(item)))
    }

    pub fn last_key_value(&self) -> Option<(&K, T)> {
        self.items
            .last_key_value()
            .map(|(key, item)| (key, self.view.reveal(item)))
    }
}
