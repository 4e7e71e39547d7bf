//! Additional impls for `RawCc<T, O>` to make it easier to use like a
//! plain `&T`.
use crate::cc::RawCc;
use crate::collect::AbstractObjectSpace;
use crate::Cc;
use crate::Trace;
use std::cmp::Ordering;

impl<T: Default + Trace> Default for Cc<T> {
    #[inline]
    fn default() -> Cc<T> {
        Self::new(Default::default())
    }
}

impl<T: PartialEq + ?Sized, O: AbstractObjectSpace> PartialEq for RawCc<T, O> {
    #[inline]
    fn eq(&self, other: &RawCc<T, O>) -> bool {
        **self == **other
    }

    #[inline]
    fn ne(&self, other: &RawCc<T, O>) -> bool {
        **self != **other
    }
}

impl<T: Eq + ?Sized, O: AbstractObjectSpace> Eq for RawCc<T, O> {}

impl<T: PartialOrd + ?Sized, O: AbstractObjectSpace> PartialOrd for RawCc<T, O> {
    #[inline]
    fn partial_cmp(&self, other: &RawCc<T, O>) -> Option<Ordering> {
        (**self).partial_cmp(&**other)
    }

    #[inline]
    fn lt(&self, other: &RawCc<T, O>) -> bool {
        **self < **other
    }

    #[inline]
    fn le(&self, other: &RawCc<T, O>) -> bool {
        **self <= **other
    }

    #[inline]
    fn gt(&self, other: &RawCc<T, O>) -> bool {
        **self > **other
    }

    #[inline]
    fn ge(&self, other: &RawCc<T, O>) -> bool {
        **self >= **other
    }
}

impl<T: Ord + ?Sized, O: AbstractObjectSpace> Ord for RawCc<T, O> {
    #[inline]
    fn cmp(&self, other: &RawCc<T, O>) -> Ordering {
        (**self).cmp(&**other)
    }
}

impl<T: ?Sized + std::fmt::Debug, O: AbstractObjectSpace> std::fmt::Debug for RawCc<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + std::fmt::Display, O: AbstractObjectSpace> std::fmt::Display for RawCc<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&**self, f)
    }
}
