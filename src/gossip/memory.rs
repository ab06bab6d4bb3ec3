//! Membership table maintained in memory
//!
//! Stands in for a gossip engine: members are inserted, updated and reaped
//! explicitly and every change is reported as a [`MemberEvent`].

use parking_lot::RwLock;

use super::{MemberEvent, MemberEventKind, MembershipView};
use crate::types::{Member, MemberStatus};

/// Ordered membership table
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: RwLock<Vec<Member>>,
}

impl StaticMembership {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: RwLock::new(members.into_iter().collect()),
        }
    }

    /// Insert or replace a member by name, keeping its position
    pub fn upsert(&self, member: Member) -> MemberEvent {
        let mut members = self.members.write();
        let kind = match members.iter().position(|m| m.name == member.name) {
            Some(pos) => {
                members[pos] = member.clone();
                event_kind(member.status, false)
            }
            None => {
                members.push(member.clone());
                event_kind(member.status, true)
            }
        };
        MemberEvent::new(kind, vec![member])
    }

    /// Mark a member as reaped and drop it from the table
    pub fn reap(&self, name: &str) -> Option<MemberEvent> {
        let mut members = self.members.write();
        let pos = members.iter().position(|m| m.name == name)?;
        let member = members.remove(pos).with_status(MemberStatus::Reaped);
        Some(MemberEvent::new(MemberEventKind::Reap, vec![member]))
    }
}

fn event_kind(status: MemberStatus, joined: bool) -> MemberEventKind {
    match status {
        MemberStatus::Alive if joined => MemberEventKind::Join,
        MemberStatus::Leaving | MemberStatus::Left => MemberEventKind::Leave,
        MemberStatus::Failed => MemberEventKind::Failed,
        MemberStatus::Reaped => MemberEventKind::Reap,
        MemberStatus::Alive | MemberStatus::None => MemberEventKind::Update,
    }
}

impl MembershipView for StaticMembership {
    fn members(&self) -> Vec<Member> {
        self.members.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, status: MemberStatus) -> Member {
        Member::new(name, "10.0.0.2:4648".parse().unwrap(), status)
    }

    #[test]
    fn test_upsert_keeps_order() {
        let table = StaticMembership::new([member("a", MemberStatus::Alive)]);
        let join = table.upsert(member("b", MemberStatus::Alive));
        assert_eq!(join.kind, MemberEventKind::Join);

        let leave = table.upsert(member("a", MemberStatus::Left));
        assert_eq!(leave.kind, MemberEventKind::Leave);

        let names: Vec<_> = table.members().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(table.members()[0].status, MemberStatus::Left);
    }

    #[test]
    fn test_reap_removes_member() {
        let table = StaticMembership::new([member("a", MemberStatus::Failed)]);
        let event = table.reap("a").unwrap();
        assert_eq!(event.kind, MemberEventKind::Reap);
        assert_eq!(event.members[0].status, MemberStatus::Reaped);
        assert!(table.members().is_empty());
        assert!(table.reap("a").is_none());
    }
}
