//! Resolution context boundary
//!
//! The core never builds a context. Drivers hand one to deferred values,
//! overrides and resolvers so they can read the contract being resolved
//! and recurse into nested resolution.

use crate::{Contract, Result, Type, Value};

/// Re-entrant view of an in-flight resolution.
pub trait ResolveContext {
    /// Contract currently being resolved.
    fn contract(&self) -> &Contract;

    /// Resolve a nested dependency.
    fn resolve(&mut self, ty: &Type, name: Option<&str>) -> Result<Value>;

    /// Resolve a nested dependency by contract.
    fn resolve_contract(&mut self, contract: &Contract) -> Result<Value> {
        let ty = contract.ty().clone();
        self.resolve(&ty, contract.name())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal context for unit tests.

    use super::*;
    use crate::{ResolutionError, value::Instance};
    use std::collections::HashMap;

    pub struct MapContext {
        pub contract: Contract,
        pub values: HashMap<Contract, Instance>,
        pub requests: Vec<Contract>,
    }

    impl MapContext {
        pub fn new(ty: &Type) -> Self {
            Self {
                contract: Contract::new(ty),
                values: HashMap::new(),
                requests: Vec::new(),
            }
        }

        pub fn with(mut self, contract: Contract, value: Instance) -> Self {
            self.values.insert(contract, value);
            self
        }
    }

    impl ResolveContext for MapContext {
        fn contract(&self) -> &Contract {
            &self.contract
        }

        fn resolve(&mut self, ty: &Type, name: Option<&str>) -> Result<Value> {
            let contract = match name {
                Some(name) => Contract::named(ty, name),
                None => Contract::new(ty),
            };
            self.requests.push(contract.clone());
            self.values
                .get(&contract)
                .cloned()
                .map(Some)
                .ok_or_else(|| ResolutionError::NotRegistered {
                    contract: contract.to_string(),
                })
        }
    }
}
