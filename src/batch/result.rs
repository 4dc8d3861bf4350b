//! Outcome of one committed async group.

use crate::pipeline::CallResult;
use crate::Error;
use std::time::Duration;

/// Every call of a committed group, one entry per enqueue, in enqueue order.
#[derive(Debug)]
pub struct SettledGroup {
    pub name: String,
    pub outcomes: Vec<Result<CallResult, Error>>,
    /// Wall time spent waiting in `commit`.
    pub elapsed: Duration,
}

impl SettledGroup {
    pub(crate) fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Fulfilled calls with their enqueue index.
    pub fn fulfilled(&self) -> impl Iterator<Item = (usize, &CallResult)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().ok().map(|r| (i, r)))
    }

    /// Rejected calls with their enqueue index.
    pub fn rejected(&self) -> impl Iterator<Item = (usize, &Error)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.as_ref().err().map(|e| (i, e)))
    }

    pub fn rejected_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    pub fn all_fulfilled(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ResponseSource;
    use std::collections::BTreeMap;

    fn fulfilled_call(body: &str) -> CallResult {
        CallResult {
            call_id: uuid::Uuid::new_v4(),
            status: 200,
            headers: BTreeMap::new(),
            raw_body: body.to_string(),
            source: ResponseSource::Network,
            region: "euw".to_string(),
            deprecation: None,
        }
    }

    #[test]
    fn test_indexes_follow_enqueue_order() {
        let settled = SettledGroup {
            name: "summoners".to_string(),
            outcomes: vec![
                Ok(fulfilled_call("a")),
                Err(Error::aborted("vetoed")),
                Ok(fulfilled_call("c")),
            ],
            elapsed: Duration::from_millis(5),
        };

        assert_eq!(settled.len(), 3);
        assert!(!settled.all_fulfilled());
        assert_eq!(settled.rejected_count(), 1);
        let bodies: Vec<(usize, &str)> = settled
            .fulfilled()
            .map(|(i, r)| (i, r.raw_body.as_str()))
            .collect();
        assert_eq!(bodies, vec![(0, "a"), (2, "c")]);
        assert_eq!(settled.rejected().next().map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_empty_group() {
        let settled = SettledGroup::empty("nobody");
        assert!(settled.is_empty());
        assert!(settled.all_fulfilled());
    }
}
