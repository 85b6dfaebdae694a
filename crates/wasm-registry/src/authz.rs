// Action-level authorization. Permission semantics live in `AccessConfig`;
// policies only decide which config and which actor are checked.

use crate::address::Address;
use crate::types::AccessConfig;

/// Access configs in force for a single code upload
#[derive(Clone, Debug, PartialEq)]
pub struct ChainAccessConfigs {
    pub upload: AccessConfig,
    /// Module default instantiate permission bound to the uploader
    pub instantiate: AccessConfig,
}

impl ChainAccessConfigs {
    pub fn new(upload: AccessConfig, instantiate: AccessConfig) -> Self {
        Self { upload, instantiate }
    }
}

pub trait AuthorizationPolicy {
    fn can_create_code(&self, chain_configs: &ChainAccessConfigs, actor: &Address, contract_config: &AccessConfig) -> bool;

    fn can_instantiate_contract(&self, config: &AccessConfig, actor: &Address) -> bool;

    fn can_modify_contract(&self, admin: Option<&Address>, actor: &Address) -> bool;

    fn can_modify_code_access_config(&self, creator: &Address, actor: &Address, is_subset: bool) -> bool;

    fn name(&self) -> &'static str;
}

/// Permission checks applied to ordinary transactions
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAuthorizationPolicy;

impl AuthorizationPolicy for DefaultAuthorizationPolicy {
    fn can_create_code(&self, chain_configs: &ChainAccessConfigs, actor: &Address, contract_config: &AccessConfig) -> bool {
        chain_configs.upload.allowed(actor) && contract_config.is_subset(&chain_configs.instantiate)
    }

    fn can_instantiate_contract(&self, config: &AccessConfig, actor: &Address) -> bool {
        config.allowed(actor)
    }

    fn can_modify_contract(&self, admin: Option<&Address>, actor: &Address) -> bool {
        admin == Some(actor)
    }

    fn can_modify_code_access_config(&self, creator: &Address, actor: &Address, is_subset: bool) -> bool {
        creator == actor && is_subset
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

/// Policy for governance proposals, which may perform any action
#[derive(Clone, Copy, Debug, Default)]
pub struct GovAuthorizationPolicy;

impl AuthorizationPolicy for GovAuthorizationPolicy {
    fn can_create_code(&self, _: &ChainAccessConfigs, _: &Address, _: &AccessConfig) -> bool {
        true
    }

    fn can_instantiate_contract(&self, _: &AccessConfig, _: &Address) -> bool {
        true
    }

    fn can_modify_contract(&self, _: Option<&Address>, _: &Address) -> bool {
        true
    }

    fn can_modify_code_access_config(&self, _: &Address, _: &Address, _: bool) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "governance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessType;

    fn addr(n: u8) -> Address {
        Address::new(vec![n; 20]).unwrap()
    }

    #[test]
    fn test_default_can_create_code() {
        let policy = DefaultAuthorizationPolicy;
        let creator = addr(1);
        let configs = ChainAccessConfigs::new(
            AccessType::AnyOfAddresses.with(&[creator.clone()]).unwrap(),
            AccessType::AnyOfAddresses.bind_to(&creator).unwrap(),
        );

        // a narrower instantiate config than the default is fine
        assert!(policy.can_create_code(&configs, &creator, &AccessConfig::Nobody));
        assert!(policy.can_create_code(&configs, &creator, &configs.instantiate));
        // wider is not
        assert!(!policy.can_create_code(&configs, &creator, &AccessConfig::Everybody));
        // uploader outside the upload list
        assert!(!policy.can_create_code(&configs, &addr(2), &AccessConfig::Nobody));
    }

    #[test]
    fn test_default_modify_rules() {
        let policy = DefaultAuthorizationPolicy;
        let (admin, other) = (addr(1), addr(2));

        assert!(policy.can_modify_contract(Some(&admin), &admin));
        assert!(!policy.can_modify_contract(Some(&admin), &other));
        assert!(!policy.can_modify_contract(None, &admin));

        assert!(policy.can_modify_code_access_config(&admin, &admin, true));
        assert!(!policy.can_modify_code_access_config(&admin, &admin, false));
        assert!(!policy.can_modify_code_access_config(&admin, &other, true));
    }

    #[test]
    fn test_gov_policy_allows_everything() {
        let policy = GovAuthorizationPolicy;
        let configs = ChainAccessConfigs::new(AccessConfig::Nobody, AccessConfig::Nobody);

        assert!(policy.can_create_code(&configs, &addr(1), &AccessConfig::Everybody));
        assert!(policy.can_instantiate_contract(&AccessConfig::Nobody, &addr(1)));
        assert!(policy.can_modify_contract(None, &addr(1)));
        assert!(policy.can_modify_code_access_config(&addr(1), &addr(2), false));
    }
}
