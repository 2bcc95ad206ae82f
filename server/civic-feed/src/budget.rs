//! Per-request cap on scoring provider calls.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
  limit: usize,
  spent: usize,
}

impl CallBudget {
  pub fn new(limit: usize) -> Self {
    Self { limit, spent: 0 }
  }

  /// Reserves one call. Returns false once the limit is reached.
  pub fn try_spend(&mut self) -> bool {
    if self.spent >= self.limit {
      return false;
    }
    self.spent += 1;
    true
  }

  pub fn spent(&self) -> usize {
    self.spent
  }

  pub fn is_exhausted(&self) -> bool {
    self.spent >= self.limit
  }
}
