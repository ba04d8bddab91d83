use crate::{error::CoreError, CoreResult};
use ipnet::Ipv4Net;
use std::{collections::HashSet, net::Ipv4Addr};

/// First unreserved host address in `subnet`, scanning upward from
/// `network + start_offset`. The network and broadcast addresses are never
/// handed out. Callers must pass a reservation set derived from a config
/// snapshot taken under the mutation lock, otherwise two concurrent adds can
/// compute the same answer.
pub fn next_free_address(
    subnet: Ipv4Net,
    reserved: &HashSet<Ipv4Addr>,
    start_offset: u32,
) -> CoreResult<Ipv4Addr> {
    let network = u32::from(subnet.network());
    let broadcast = u32::from(subnet.broadcast());
    let mut candidate = network.saturating_add(start_offset.max(1));

    while candidate < broadcast {
        let addr = Ipv4Addr::from(candidate);
        if !reserved.contains(&addr) {
            return Ok(addr);
        }
        candidate += 1;
    }

    Err(CoreError::PoolExhausted(subnet))
}
