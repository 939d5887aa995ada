//! # Access Control
//!
//! Operator and manager roles checked explicitly at each admin entry point.

use serde::{Deserialize, Serialize};

use crate::errors::{MagicError, MagicResult};
use crate::types::Address;

/// Role holders for administrative operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    /// Day-to-day administration: strategies, routes, harvest wiring
    pub operator: Address,
    /// Protocol parameters and operator rotation
    pub manager: Address,
}

impl Roles {
    pub fn new(operator: Address, manager: Address) -> Self {
        Self { operator, manager }
    }

    pub fn require_operator(&self, caller: Address) -> MagicResult<()> {
        if caller != self.operator {
            return Err(MagicError::Unauthorized);
        }
        Ok(())
    }

    pub fn require_manager(&self, caller: Address) -> MagicResult<()> {
        if caller != self.manager {
            return Err(MagicError::Unauthorized);
        }
        Ok(())
    }

    /// Replace the operator; manager only
    pub fn set_operator(&mut self, caller: Address, operator: Address) -> MagicResult<()> {
        self.require_manager(caller)?;
        if operator.is_zero() {
            return Err(MagicError::invalid_parameter("operator", "zero address", "nonzero address"));
        }
        self.operator = operator;
        Ok(())
    }
}
