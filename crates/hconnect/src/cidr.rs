//! Address list algebra for firewall rules

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// Prefix used to represent a node's IPv6 network in rules
pub const IPV6_NODE_PREFIX: u8 = 64;

/// Whether any network in `set` contains `addr`
pub fn address_covered_by(set: &[IpNet], addr: IpAddr) -> bool {
    set.iter().any(|net| net.contains(&addr))
}

/// Remove the first entry equal to `network` in both address and prefix
/// length. Broader networks that merely contain it are left alone. The
/// remaining entries may be reordered.
pub fn remove_exact_network(mut set: Vec<IpNet>, network: &IpNet) -> Vec<IpNet> {
    if let Some(index) = set
        .iter()
        .position(|n| n.addr() == network.addr() && n.prefix_len() == network.prefix_len())
    {
        set.swap_remove(index);
    }
    set
}

/// The network a node address is written as: /32 for IPv4, /64 for IPv6
pub fn node_network(addr: IpAddr) -> IpNet {
    match addr {
        IpAddr::V4(v4) => IpNet::V4(Ipv4Net::from(v4)),
        IpAddr::V6(v6) => IpNet::V6(
            Ipv6Net::new(v6, IPV6_NODE_PREFIX).expect("64 is a valid IPv6 prefix length"),
        ),
    }
}
