//! Pending request queue.

use std::collections::VecDeque;

use crate::types::GeocodeRequest;

/// Ordered queue of requests waiting to be submitted.
///
/// Requests only leave through [`take_up_to`](Self::take_up_to); a slice
/// taken for a submission that later fails is not put back.
#[derive(Debug, Default)]
pub struct BatchQueue {
    pending: VecDeque<GeocodeRequest>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request at the tail.
    pub fn push(&mut self, request: GeocodeRequest) {
        self.pending.push_back(request);
    }

    /// Remove and return the first `min(n, len)` requests, in order.
    pub fn take_up_to(&mut self, n: usize) -> Vec<GeocodeRequest> {
        let n = n.min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeocodeRequest> {
        self.pending.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeocodeAddress;

    fn queue_of(n: usize) -> BatchQueue {
        let mut q = BatchQueue::new();
        for i in 0..n {
            q.push(GeocodeRequest::new(i.to_string(), GeocodeAddress::default()));
        }
        q
    }

    fn ids(reqs: impl IntoIterator<Item = GeocodeRequest>) -> Vec<String> {
        reqs.into_iter().map(|r| r.id).collect()
    }

    #[test]
    fn take_prefix_preserves_order() {
        let mut q = queue_of(5);
        assert_eq!(ids(q.take_up_to(2)), ["0", "1"]);
        assert_eq!(q.len(), 3);
        assert_eq!(ids(q.take_up_to(10)), ["2", "3", "4"]);
        assert!(q.is_empty());
    }

    #[test]
    fn take_zero_and_from_empty() {
        let mut q = queue_of(2);
        assert!(q.take_up_to(0).is_empty());
        assert_eq!(q.len(), 2);

        let mut empty = BatchQueue::new();
        assert!(empty.take_up_to(3).is_empty());
    }

    #[test]
    fn remaining_keep_relative_order() {
        let mut q = queue_of(4);
        q.take_up_to(1);
        q.push(GeocodeRequest::new("x", GeocodeAddress::default()));
        let rest: Vec<_> = q.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rest, ["1", "2", "3", "x"]);
    }
}
