// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Fabric Value Objects with Validation Invariants
//!
//! A fabric is the virtual network every cluster, connector and instance
//! binds to: an address space, an ordered list of subnets, and a set of
//! reachability rules.
//!
//! # Invariants
//!
//! - Every subnet lies inside the fabric's address space
//! - Subnets do not overlap
//! - A fabric has at least one subnet

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::errors::ConfigError;

/// CIDR block value object
///
/// # Examples
///
/// ```rust
/// use msk_connect_infrastructure::domain::Cidr;
///
/// let vpc = Cidr::new("10.0.0.0/16").unwrap();
/// let subnet = Cidr::new("10.0.64.0/18").unwrap();
/// assert!(vpc.contains(&subnet));
/// assert_eq!(vpc.prefix_length(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    address: IpAddr,
    prefix_length: u8,
}

impl Cidr {
    /// Parse CIDR notation (e.g. `10.0.0.0/16`)
    ///
    /// # Invariants
    /// - Valid IP address
    /// - Prefix length 0-32 for IPv4, 0-128 for IPv6
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, ConfigError> {
        let cidr = cidr.as_ref();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| ConfigError::InvalidCidr(cidr.to_string()))?;

        let address =
            IpAddr::from_str(addr_str).map_err(|_| ConfigError::InvalidCidr(cidr.to_string()))?;
        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: IpAddr, prefix_length: u8) -> Result<Self, ConfigError> {
        if prefix_length > max_prefix(&address) {
            return Err(ConfigError::InvalidCidr(format!("{}/{}", address, prefix_length)));
        }
        Ok(Self {
            address,
            prefix_length,
        })
    }

    /// Address as written
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Check if this is an IPv4 block
    pub fn is_ipv4(&self) -> bool {
        matches!(self.address, IpAddr::V4(_))
    }

    /// First address of the block
    pub fn network(&self) -> IpAddr {
        from_bits(&self.address, self.network_bits())
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Cidr) -> bool {
        if self.is_ipv4() != other.is_ipv4() || other.prefix_length < self.prefix_length {
            return false;
        }
        let mask = mask(self.prefix_length, max_prefix(&self.address));
        to_bits(&other.address) & mask == self.network_bits()
    }

    /// Whether the two blocks share any address
    pub fn overlaps(&self, other: &Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The `index`-th sub-block of length `new_prefix`
    pub fn nth_subnet(&self, new_prefix: u8, index: u32) -> Result<Cidr, ConfigError> {
        let width = max_prefix(&self.address);
        if new_prefix < self.prefix_length || new_prefix > width {
            return Err(ConfigError::invalid(
                "prefix_length",
                format!("/{} cannot be carved out of {}", new_prefix, self),
            ));
        }

        let available_bits = u32::from(new_prefix - self.prefix_length);
        if available_bits < 32 && u64::from(index) >= 1u64 << available_bits {
            return Err(ConfigError::invalid(
                "subnet_index",
                format!("{} has no room for subnet #{} of size /{}", self, index, new_prefix),
            ));
        }

        let offset = u128::from(index)
            .checked_shl(u32::from(width - new_prefix))
            .unwrap_or(0);
        let bits = self.network_bits() | offset;
        Cidr::from_parts(from_bits(&self.address, bits), new_prefix)
    }

    fn network_bits(&self) -> u128 {
        to_bits(&self.address) & mask(self.prefix_length, max_prefix(&self.address))
    }
}

fn max_prefix(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn to_bits(address: &IpAddr) -> u128 {
    match address {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn from_bits(template: &IpAddr, bits: u128) -> IpAddr {
    match template {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from((bits & u128::from(u32::MAX)) as u32)),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(bits)),
    }
}

fn mask(prefix: u8, width: u8) -> u128 {
    if prefix == 0 {
        return 0;
    }
    let full = if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    (full << (width - prefix)) & full
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for Cidr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cidr {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

/// Public subnets route to the internet; private ones egress through NAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    Public,
    Private,
}

/// Subnet declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub cidr: Cidr,
    pub kind: SubnetKind,
    pub availability_zone: String,
}

/// Transport protocol of a reachability rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    All,
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    /// A single port
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    /// Every port
    pub fn all() -> Self {
        Self {
            from: 0,
            to: u16::MAX,
        }
    }

    /// Range with `from <= to`
    pub fn new(from: u16, to: u16) -> Result<Self, ConfigError> {
        if from > to {
            return Err(ConfigError::invalid(
                "port_range",
                format!("{} is greater than {}", from, to),
            ));
        }
        Ok(Self { from, to })
    }
}

/// Who a reachability rule admits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TrafficSource {
    /// Any address in a block
    Cidr(Cidr),
    /// Members of a security group
    SecurityGroup(String),
}

/// Ingress rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReachabilityRule {
    pub protocol: Protocol,
    pub ports: PortRange,
    pub source: TrafficSource,
    pub description: String,
}

impl ReachabilityRule {
    /// Allow TCP on one port from a CIDR block
    pub fn tcp_from(source: Cidr, port: u16, description: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Tcp,
            ports: PortRange::single(port),
            source: TrafficSource::Cidr(source),
            description: description.into(),
        }
    }
}

/// Virtual network declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFabric {
    pub name: String,
    pub address_space: Cidr,
    pub subnets: Vec<Subnet>,
    pub reachability: Vec<ReachabilityRule>,
}

impl NetworkFabric {
    /// One public and one private subnet per availability zone, evenly
    /// carved out of the address space (publics first)
    pub fn with_default_layout(
        name: impl Into<String>,
        address_space: Cidr,
        availability_zones: &[String],
    ) -> Result<Self, ConfigError> {
        if availability_zones.is_empty() {
            return Err(ConfigError::invalid(
                "availability_zones",
                "at least one availability zone is required",
            ));
        }

        let subnet_count = availability_zones.len() * 2;
        let extra_bits = usize::BITS - (subnet_count - 1).leading_zeros();
        let new_prefix = u32::from(address_space.prefix_length()) + extra_bits;
        let new_prefix = u8::try_from(new_prefix)
            .map_err(|_| ConfigError::invalid("address_space", "too many subnets"))?;

        let mut subnets = Vec::with_capacity(subnet_count);
        let layout = [SubnetKind::Public, SubnetKind::Private];
        let mut index = 0u32;
        for kind in layout {
            for zone in availability_zones {
                let label = match kind {
                    SubnetKind::Public => "public",
                    SubnetKind::Private => "private",
                };
                subnets.push(Subnet {
                    name: format!("{}-{}", label, zone),
                    cidr: address_space.nth_subnet(new_prefix, index)?,
                    kind,
                    availability_zone: zone.clone(),
                });
                index += 1;
            }
        }

        let fabric = Self {
            name: name.into(),
            address_space,
            subnets,
            reachability: Vec::new(),
        };
        fabric.validate()?;
        Ok(fabric)
    }

    /// Add a reachability rule
    pub fn allow(mut self, rule: ReachabilityRule) -> Self {
        self.reachability.push(rule);
        self
    }

    /// Subnets of one kind, in declaration order
    pub fn subnets_of(&self, kind: SubnetKind) -> impl Iterator<Item = &Subnet> {
        self.subnets.iter().filter(move |s| s.kind == kind)
    }

    /// Check fabric invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("fabric.name", "must not be empty"));
        }
        if self.subnets.is_empty() {
            return Err(ConfigError::invalid(
                "fabric.subnets",
                "a fabric needs at least one subnet",
            ));
        }

        for (i, subnet) in self.subnets.iter().enumerate() {
            if !self.address_space.contains(&subnet.cidr) {
                return Err(ConfigError::invalid(
                    "fabric.subnets",
                    format!(
                        "subnet {} ({}) is outside {}",
                        subnet.name, subnet.cidr, self.address_space
                    ),
                ));
            }
            if let Some(other) = self.subnets[i + 1..]
                .iter()
                .find(|other| other.cidr.overlaps(&subnet.cidr))
            {
                return Err(ConfigError::invalid(
                    "fabric.subnets",
                    format!("subnets {} and {} overlap", subnet.name, other.name),
                ));
            }
        }
        Ok(())
    }
}

/// Whether a unit owns its fabric or binds to an existing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FabricSource {
    /// Created and deleted with the unit
    Owned(NetworkFabric),
    /// Resolved by name; never mutated or deleted by the unit
    Lookup { name: String },
}

/// Security group declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub description: String,
    pub allow_all_outbound: bool,
    pub ingress: Vec<ReachabilityRule>,
}

impl SecurityGroupSpec {
    /// Group with no ingress and unrestricted egress
    pub fn egress_only(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            allow_all_outbound: true,
            ingress: Vec::new(),
        }
    }
}

/// Subnet as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetHandle {
    pub subnet_id: String,
    pub kind: SubnetKind,
    pub availability_zone: String,
    pub cidr: Cidr,
}

/// Resolved fabric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricHandle {
    pub fabric_id: String,
    pub name: String,
    pub address_space: Cidr,
    pub subnets: Vec<SubnetHandle>,
}

impl FabricHandle {
    /// Identifiers of the private subnets, in order
    pub fn subnet_ids(&self, kind: SubnetKind) -> Vec<String> {
        self.subnets
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.subnet_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_parse() {
        let cidr = Cidr::new("10.0.0.0/16").unwrap();
        assert!(cidr.is_ipv4());
        assert_eq!(cidr.prefix_length(), 16);
        assert_eq!(cidr.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(Cidr::new("10.0.0.0").is_err());
        assert!(Cidr::new("10.0.0.0/33").is_err());
        assert!(Cidr::new("2001:db8::/129").is_err());
        assert!(Cidr::new("999.0.0.0/8").is_err());
    }

    #[test]
    fn test_containment() {
        let vpc = Cidr::new("10.0.0.0/16").unwrap();
        assert!(vpc.contains(&Cidr::new("10.0.128.0/18").unwrap()));
        assert!(!vpc.contains(&Cidr::new("10.1.0.0/24").unwrap()));
        assert!(!vpc.contains(&Cidr::new("10.0.0.0/8").unwrap()));

        let v6 = Cidr::new("2001:db8::/32").unwrap();
        assert!(v6.contains(&Cidr::new("2001:db8:1::/48").unwrap()));
        assert!(!v6.contains(&vpc));
    }

    #[test]
    fn test_nth_subnet() {
        let vpc = Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(vpc.nth_subnet(18, 0).unwrap().to_string(), "10.0.0.0/18");
        assert_eq!(vpc.nth_subnet(18, 3).unwrap().to_string(), "10.0.192.0/18");
        assert!(vpc.nth_subnet(18, 4).is_err());
        assert!(vpc.nth_subnet(8, 0).is_err());
    }

    #[test]
    fn test_default_layout() {
        let zones = vec!["us-east-1a".to_string(), "us-east-1b".to_string()];
        let fabric =
            NetworkFabric::with_default_layout("msk-vpc", Cidr::new("10.0.0.0/16").unwrap(), &zones)
                .unwrap();

        assert_eq!(fabric.subnets.len(), 4);
        assert_eq!(fabric.subnets_of(SubnetKind::Public).count(), 2);
        assert_eq!(fabric.subnets_of(SubnetKind::Private).count(), 2);
        assert_eq!(fabric.subnets[2].name, "private-us-east-1a");
        assert_eq!(fabric.subnets[2].cidr.to_string(), "10.0.128.0/18");
    }

    #[test]
    fn test_fabric_rejects_foreign_subnet() {
        let mut fabric = NetworkFabric::with_default_layout(
            "msk-vpc",
            Cidr::new("10.0.0.0/16").unwrap(),
            &["a".to_string()],
        )
        .unwrap();
        fabric.subnets.push(Subnet {
            name: "rogue".to_string(),
            cidr: Cidr::new("192.168.0.0/24").unwrap(),
            kind: SubnetKind::Private,
            availability_zone: "a".to_string(),
        });

        assert!(fabric.validate().is_err());
    }

    #[test]
    fn test_fabric_rejects_overlap() {
        let mut fabric = NetworkFabric::with_default_layout(
            "msk-vpc",
            Cidr::new("10.0.0.0/16").unwrap(),
            &["a".to_string()],
        )
        .unwrap();
        let first = fabric.subnets[0].clone();
        fabric.subnets.push(Subnet {
            name: "dup".to_string(),
            ..first
        });

        assert!(fabric.validate().is_err());
    }

    #[test]
    fn test_port_range() {
        assert!(PortRange::new(9092, 9094).is_ok());
        assert!(PortRange::new(9094, 9092).is_err());
        assert_eq!(PortRange::single(9094).to, 9094);
    }

    #[test]
    fn test_cidr_serde_as_string() {
        let cidr = Cidr::new("10.0.0.0/16").unwrap();
        let json = serde_json::to_string(&cidr).unwrap();
        assert_eq!(json, "\"10.0.0.0/16\"");
        let back: Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cidr);
    }
}
