//! Flow-rule installation with a three-pattern fallback.
//!
//! Grounded in `ptp_flow.c`'s `ptp_flow_rules_install_all`: try to match
//! VLAN-tagged PTP traffic at any VID first, fall back to an explicit
//! outer-802.1Q pattern, then to untagged PTP, and give up (steering
//! nothing) only if all three fail.

use tracing::warn;

use crate::io::FlowApi;

/// Install a PTP steering rule on `port`/`queue`, trying each pattern in
/// turn. Returns `None` — logging a warning — if none of the three
/// patterns were accepted; the port still works, just unsteered.
pub fn install_port<F: FlowApi>(flow: &mut F, port: u16, queue: u16) -> Option<F::Handle> {
    if let Some(handle) = flow.install_vlan_any(port, queue) {
        return Some(handle);
    }
    if let Some(handle) = flow.install_vlan_explicit(port, queue) {
        return Some(handle);
    }
    if let Some(handle) = flow.install_untagged(port, queue) {
        return Some(handle);
    }
    warn!(port, "all flow patterns failed, continuing without steering");
    None
}

/// Destroy a previously installed rule, if any.
pub fn remove_port<F: FlowApi>(flow: &mut F, port: u16, handle: Option<F::Handle>) {
    if let Some(handle) = handle {
        flow.destroy(port, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Handle(u8);
    impl crate::io::FlowHandle for Handle {}

    struct FakeFlow {
        accept_pattern: Option<u8>,
        destroyed: Vec<(u16, Handle)>,
    }

    impl FlowApi for FakeFlow {
        type Handle = Handle;

        fn install_vlan_any(&mut self, _port: u16, _queue: u16) -> Option<Self::Handle> {
            (self.accept_pattern == Some(1)).then_some(Handle(1))
        }
        fn install_vlan_explicit(&mut self, _port: u16, _queue: u16) -> Option<Self::Handle> {
            (self.accept_pattern == Some(2)).then_some(Handle(2))
        }
        fn install_untagged(&mut self, _port: u16, _queue: u16) -> Option<Self::Handle> {
            (self.accept_pattern == Some(3)).then_some(Handle(3))
        }
        fn destroy(&mut self, port: u16, handle: Self::Handle) {
            self.destroyed.push((port, handle));
        }
    }

    #[test]
    fn falls_back_through_all_three_patterns() {
        let mut flow = FakeFlow {
            accept_pattern: Some(3),
            destroyed: vec![],
        };
        let handle = install_port(&mut flow, 0, 5);
        assert_eq!(handle, Some(Handle(3)));
    }

    #[test]
    fn returns_none_when_all_patterns_fail() {
        let mut flow = FakeFlow {
            accept_pattern: None,
            destroyed: vec![],
        };
        assert_eq!(install_port(&mut flow, 0, 5), None);
    }

    #[test]
    fn remove_port_is_a_no_op_without_a_handle() {
        let mut flow = FakeFlow {
            accept_pattern: None,
            destroyed: vec![],
        };
        remove_port(&mut flow, 0, None);
        assert!(flow.destroyed.is_empty());
    }
}
