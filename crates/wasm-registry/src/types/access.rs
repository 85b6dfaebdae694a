/// Access Control Types
///
/// `AccessConfig` defines who can perform a gated action (code upload or
/// instantiation). All permission decisions go through `AccessConfig::allowed`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::address::{verify_address_format, Address};
use crate::error::{Result, WasmError};

/// Discriminant of an access config, persisted as a protobuf enumeration
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, prost::Enumeration,
)]
#[repr(i32)]
pub enum AccessType {
    Unspecified = 0,
    Nobody = 1,
    /// Superseded by `AnyOfAddresses`; kept so older records still decode
    OnlyAddress = 2,
    Everybody = 3,
    AnyOfAddresses = 4,
}

/// AccessConfig binds an access type to its concrete addresses
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessConfig {
    Nobody,
    OnlyAddress(Address),
    Everybody,
    AnyOfAddresses(BTreeSet<Address>),
}

impl AccessType {
    pub const ALL: [AccessType; 4] = [
        AccessType::Nobody,
        AccessType::OnlyAddress,
        AccessType::Everybody,
        AccessType::AnyOfAddresses,
    ];

    /// Build an access config of this type bound to `addresses`
    pub fn with(self, addresses: &[Address]) -> Result<AccessConfig> {
        match self {
            AccessType::Unspecified => Err(WasmError::InvalidPolicyShape("type: empty".to_string())),
            AccessType::Nobody | AccessType::Everybody => {
                if !addresses.is_empty() {
                    return Err(WasmError::InvalidPolicyShape(format!(
                        "{} does not take addresses",
                        self
                    )));
                }
                Ok(if self == AccessType::Nobody {
                    AccessConfig::Nobody
                } else {
                    AccessConfig::Everybody
                })
            }
            AccessType::OnlyAddress => match addresses {
                [addr] => {
                    verify_address_format(addr.as_bytes())?;
                    Ok(AccessConfig::OnlyAddress(addr.clone()))
                }
                [] => Err(WasmError::InvalidPolicyShape("only address: empty".to_string())),
                _ => Err(WasmError::InvalidPolicyShape(
                    "only address: takes exactly one address".to_string(),
                )),
            },
            AccessType::AnyOfAddresses => {
                Ok(AccessConfig::AnyOfAddresses(unique_addresses(addresses.iter().cloned())?))
            }
        }
    }

    /// Bind this type to a single actor, the way module defaults are applied to a creator.
    /// Types without addresses ignore the actor.
    pub fn bind_to(self, actor: &Address) -> Result<AccessConfig> {
        match self {
            AccessType::Nobody | AccessType::Everybody | AccessType::Unspecified => self.with(&[]),
            AccessType::OnlyAddress | AccessType::AnyOfAddresses => {
                self.with(std::slice::from_ref(actor))
            }
        }
    }

    /// Whether every actor allowed by `self` is also allowed by `super_set`, at type level
    pub fn is_subset(self, super_set: AccessType) -> bool {
        match super_set {
            AccessType::Everybody => true,
            AccessType::Nobody => self == AccessType::Nobody,
            AccessType::AnyOfAddresses | AccessType::OnlyAddress => matches!(
                self,
                AccessType::Nobody | AccessType::AnyOfAddresses | AccessType::OnlyAddress
            ),
            AccessType::Unspecified => false,
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessType::Unspecified => "Unspecified",
            AccessType::Nobody => "Nobody",
            AccessType::OnlyAddress => "OnlyAddress",
            AccessType::Everybody => "Everybody",
            AccessType::AnyOfAddresses => "AnyOfAddresses",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for AccessType {
    type Err = WasmError;

    fn from_str(s: &str) -> Result<Self> {
        AccessType::ALL
            .into_iter()
            .find(|t| t.to_string() == s)
            .ok_or_else(|| WasmError::InvalidPolicyShape(format!("unknown type: {:?}", s)))
    }
}

impl AccessConfig {
    pub fn access_type(&self) -> AccessType {
        match self {
            AccessConfig::Nobody => AccessType::Nobody,
            AccessConfig::OnlyAddress(_) => AccessType::OnlyAddress,
            AccessConfig::Everybody => AccessType::Everybody,
            AccessConfig::AnyOfAddresses(_) => AccessType::AnyOfAddresses,
        }
    }

    /// Returns true when `actor` is permitted by this config
    pub fn allowed(&self, actor: &Address) -> bool {
        match self {
            AccessConfig::Nobody => false,
            AccessConfig::Everybody => true,
            AccessConfig::OnlyAddress(addr) => addr == actor,
            AccessConfig::AnyOfAddresses(addrs) => addrs.contains(actor),
        }
    }

    /// Check the shape invariants of a config built outside `AccessType::with`
    pub fn validate(&self) -> Result<()> {
        match self {
            AccessConfig::Nobody | AccessConfig::Everybody => Ok(()),
            AccessConfig::OnlyAddress(addr) => verify_address_format(addr.as_bytes()),
            AccessConfig::AnyOfAddresses(addrs) => {
                if addrs.is_empty() {
                    return Err(WasmError::InvalidPolicyShape("addresses: empty".to_string()));
                }
                addrs.iter().try_for_each(|a| verify_address_format(a.as_bytes()))
            }
        }
    }

    /// Whether every actor allowed by `self` is also allowed by `super_set`
    pub fn is_subset(&self, super_set: &AccessConfig) -> bool {
        match (super_set, self) {
            (AccessConfig::Everybody, _) => true,
            (_, AccessConfig::Nobody) => true,
            (AccessConfig::Nobody, _) => false,
            (_, AccessConfig::Everybody) => false,
            (sup, sub) => sub.authorized_addresses().iter().all(|a| sup.allowed(a)),
        }
    }

    /// Addresses explicitly named by the config, in canonical order
    pub fn authorized_addresses(&self) -> Vec<Address> {
        match self {
            AccessConfig::Nobody | AccessConfig::Everybody => Vec::new(),
            AccessConfig::OnlyAddress(addr) => vec![addr.clone()],
            AccessConfig::AnyOfAddresses(addrs) => addrs.iter().cloned().collect(),
        }
    }

    /// Collapse the legacy single address variant into its allow-list form
    pub fn normalized(&self) -> AccessConfig {
        match self {
            AccessConfig::OnlyAddress(addr) => {
                AccessConfig::AnyOfAddresses(BTreeSet::from([addr.clone()]))
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for AccessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addrs = self.authorized_addresses();
        if addrs.is_empty() {
            write!(f, "{}", self.access_type())
        } else {
            let list: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
            write!(f, "{}[{}]", self.access_type(), list.join(","))
        }
    }
}

/// Collect addresses into a set, rejecting empty lists, malformed entries and duplicates
pub(crate) fn unique_addresses(addrs: impl IntoIterator<Item = Address>) -> Result<BTreeSet<Address>> {
    let mut set = BTreeSet::new();
    for addr in addrs {
        verify_address_format(addr.as_bytes())?;
        if !set.insert(addr.clone()) {
            return Err(WasmError::InvalidPolicyShape(format!("duplicate address: {}", addr)));
        }
    }
    if set.is_empty() {
        return Err(WasmError::InvalidPolicyShape("addresses: empty".to_string()));
    }
    Ok(set)
}
