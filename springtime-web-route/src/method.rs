//! HTTP method sets identifying routes.

use axum::routing::MethodFilter;
use std::fmt::{Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

/// Set of HTTP methods a route responds to. Single methods can be combined with `|`, e.g.
/// `RequestMethod::GET | RequestMethod::HEAD`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RequestMethod(u32);

impl RequestMethod {
    pub const GET: Self = Self(0x0001);
    pub const HEAD: Self = Self(0x0002);
    pub const POST: Self = Self(0x0004);
    pub const PUT: Self = Self(0x0008);
    pub const PATCH: Self = Self(0x0010);
    pub const DELETE: Self = Self(0x0020);
    pub const CONNECT: Self = Self(0x0040);
    pub const OPTIONS: Self = Self(0x0080);
    pub const TRACE: Self = Self(0x0100);

    pub const GET_POST: Self = Self(Self::GET.0 | Self::POST.0);
    pub const ANY: Self = Self(0xffff);

    const NAMED: [(RequestMethod, &'static str); 9] = [
        (Self::GET, "GET"),
        (Self::HEAD, "HEAD"),
        (Self::POST, "POST"),
        (Self::PUT, "PUT"),
        (Self::PATCH, "PATCH"),
        (Self::DELETE, "DELETE"),
        (Self::CONNECT, "CONNECT"),
        (Self::OPTIONS, "OPTIONS"),
        (Self::TRACE, "TRACE"),
    ];

    /// Creates a method set from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns raw bits of this set.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Checks if all methods from `other` are present in this set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Converts this set into an axum [MethodFilter]. Returns `None` if no method in the set has an
    /// axum counterpart (axum cannot filter on `CONNECT`).
    pub fn method_filter(self) -> Option<MethodFilter> {
        [
            (Self::GET, MethodFilter::GET),
            (Self::HEAD, MethodFilter::HEAD),
            (Self::POST, MethodFilter::POST),
            (Self::PUT, MethodFilter::PUT),
            (Self::PATCH, MethodFilter::PATCH),
            (Self::DELETE, MethodFilter::DELETE),
            (Self::OPTIONS, MethodFilter::OPTIONS),
            (Self::TRACE, MethodFilter::TRACE),
        ]
        .into_iter()
        .filter(|(method, _)| self.contains(*method))
        .map(|(_, filter)| filter)
        .reduce(|result, filter| result | filter)
    }
}

impl BitOr for RequestMethod {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RequestMethod {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for RequestMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if *self == Self::ANY {
            return f.write_str("ANY");
        }

        let mut first = true;
        for (method, name) in Self::NAMED {
            if self.contains(method) {
                if !first {
                    f.write_str("|")?;
                }

                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::method::RequestMethod;
    use axum::routing::MethodFilter;

    #[test]
    fn should_combine_methods() {
        let method = RequestMethod::GET | RequestMethod::POST;
        assert_eq!(method, RequestMethod::GET_POST);
        assert!(method.contains(RequestMethod::GET));
        assert!(!method.contains(RequestMethod::PUT));
        assert_eq!(method.to_string(), "GET|POST");
    }

    #[test]
    fn should_convert_to_method_filter() {
        assert_eq!(
            RequestMethod::GET_POST.method_filter(),
            Some(MethodFilter::GET | MethodFilter::POST)
        );
        assert_eq!(RequestMethod::CONNECT.method_filter(), None);
        assert_eq!(
            (RequestMethod::CONNECT | RequestMethod::DELETE).method_filter(),
            Some(MethodFilter::DELETE)
        );
    }
}
