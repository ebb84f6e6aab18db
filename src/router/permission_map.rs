//! Maps each opcode to the permission bit it requires (spec §4.3's
//! permission list — spawn, kill, alloc, free, read, write, submit, emit,
//! subscribe, reconfigure, security-admin, federation-join, federation-sync
//! — paired against spec §3's opcode list, which names the bits but not the
//! pairing explicitly; this mapping is this crate's resolution, recorded in
//! DESIGN.md).

use crate::capability::Permissions;
use crate::wire::frame::Opcode;

/// `None` means the opcode is in the default-deny-exempt set (spec §4.5)
/// and needs no capability at all.
pub fn required_permission(opcode: Opcode) -> Option<Permissions> {
    use Opcode::*;
    let bit = match opcode {
        Heartbeat | Handshake | Ping | Pong | ErrorGeneric | ErrorAuth | ErrorCapability
        | ErrorResource | ErrorNotFound | ErrorExists | ErrorInternal => return None,

        AgentSpawn => Permissions::SPAWN,
        AgentKill => Permissions::KILL,
        AgentPause | AgentResume => Permissions::SUBMIT,
        AgentStatus => Permissions::READ,
        AgentEvent => Permissions::EMIT,

        ResourceAlloc => Permissions::ALLOC,
        ResourceFree => Permissions::FREE,
        ResourceQuery => Permissions::READ,
        ResourceLimit => Permissions::RECONFIGURE,

        StorageGet | StorageList => Permissions::READ,
        StoragePut | StorageDelete => Permissions::WRITE,

        EventEmit | EventBroadcast => Permissions::EMIT,
        EventSubscribe | EventUnsubscribe => Permissions::SUBSCRIBE,

        AttestRequest | AttestResponse | CapabilityExchange | TokenMint | TokenRevoke => {
            Permissions::SECURITY_ADMIN
        }

        NodeJoin | NodeLeave | NodeDiscover => Permissions::FEDERATION_JOIN,
        SyncRequest | SyncResponse | Consensus => Permissions::FEDERATION_SYNC,

        Shutdown => Permissions::SECURITY_ADMIN,
    };
    Some(Permissions::from_bits(bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_deny_exempt_opcodes_need_no_permission() {
        assert_eq!(required_permission(Opcode::Heartbeat), None);
        assert_eq!(required_permission(Opcode::Handshake), None);
        assert_eq!(required_permission(Opcode::Ping), None);
    }

    #[test]
    fn privileged_opcodes_require_a_permission() {
        assert!(required_permission(Opcode::AgentSpawn).is_some());
        assert!(required_permission(Opcode::StoragePut).is_some());
        assert!(required_permission(Opcode::Consensus).is_some());
    }
}
