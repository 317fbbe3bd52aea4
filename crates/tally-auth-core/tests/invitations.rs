//! Team invitation lifecycle

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use tally_auth_core::AuthError;
use tally_types::MemberRole;

use common::{FailingMemberWrites, Harness};

#[tokio::test]
async fn test_invite_and_accept() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "Member@Example.com",
            MemberRole::Manager,
        )
        .await
        .unwrap();

    // Only the hash is persisted; the raw token goes to the sender
    assert_ne!(created.invitation.token_hash, created.token);
    assert_eq!(created.invitation.email, "member@example.com");
    let notices = h.sender.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].token, created.token);

    let membership = h
        .team
        .accept_invitation(&created.token, member.account_id())
        .await
        .unwrap();
    assert_eq!(membership.owner_id(), owner.account_id());
    assert_eq!(membership.member_id(), member.account_id());
    assert_eq!(membership.role().unwrap(), MemberRole::Manager);
    assert!(membership.accepted_at.is_some());

    let tenant = h
        .issuer
        .resolver()
        .resource_tenant_for(member.account_id())
        .await
        .unwrap();
    assert_eq!(tenant.tenant_id, owner.account_id());
    assert_eq!(tenant.role, MemberRole::Manager);
}

#[tokio::test]
async fn test_invitation_is_single_use() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();

    h.team
        .accept_invitation(&created.token, member.account_id())
        .await
        .unwrap();
    let second = h
        .team
        .accept_invitation(&created.token, member.account_id())
        .await;

    assert!(matches!(second, Err(AuthError::Conflict(_))));
    assert_eq!(h.stores.members.len(), 1);
}

#[tokio::test]
async fn test_cannot_invite_as_owner() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");

    let result = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Owner,
        )
        .await;

    assert!(matches!(result, Err(AuthError::Forbidden(_))));
    assert!(h.sender.notices().is_empty());
}

#[tokio::test]
async fn test_duplicate_pending_invitation_conflicts() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let invite = || {
        h.team.invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
    };

    invite().await.unwrap();
    assert!(matches!(invite().await, Err(AuthError::Conflict(_))));
}

#[tokio::test]
async fn test_email_mismatch_rejected() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let stranger = h.account("stranger@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();

    let result = h
        .team
        .accept_invitation(&created.token, stranger.account_id())
        .await;
    assert!(matches!(result, Err(AuthError::EmailMismatch)));

    // The invitation stays redeemable for the right account
    let stored = h.stores.invitations.get(created.invitation.invitation_id()).unwrap();
    assert!(stored.accepted_at.is_none());
}

#[tokio::test]
async fn test_expired_invitation_rejected() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();

    let mut row = created.invitation.clone();
    row.expires_at = Utc::now() - Duration::minutes(1);
    h.stores.invitations.insert(row);

    let result = h
        .team
        .accept_invitation(&created.token, member.account_id())
        .await;
    assert!(matches!(result, Err(AuthError::InvitationExpired)));

    let purged = h.team.purge_expired_invitations().await.unwrap();
    assert_eq!(purged.len(), 1);
    assert_eq!(purged[0].id, created.invitation.id);
    assert_eq!(purged[0].owner_id(), owner.account_id());
    assert!(h.team.purge_expired_invitations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_membership_write_reopens_invitation() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();

    let broken = h.team_with_members(Arc::new(FailingMemberWrites(h.stores.members.clone())));
    let result = broken
        .accept_invitation(&created.token, member.account_id())
        .await;
    assert!(matches!(result, Err(AuthError::Conflict(_))));

    let stored = h.stores.invitations.get(created.invitation.invitation_id()).unwrap();
    assert!(stored.accepted_at.is_none());
    assert!(h.stores.members.is_empty());

    // Once the store recovers the same token still works
    let membership = h
        .team
        .accept_invitation(&created.token, member.account_id())
        .await
        .unwrap();
    assert_eq!(membership.owner_id(), owner.account_id());
}

#[tokio::test]
async fn test_unknown_token_not_found() {
    let h = Harness::new();
    let member = h.account("member@example.com");

    let result = h
        .team
        .accept_invitation("deadbeef", member.account_id())
        .await;
    assert!(matches!(result, Err(AuthError::InvitationNotFound)));
}

#[tokio::test]
async fn test_member_of_another_organization_rejected() {
    let h = Harness::new();
    let first = h.account("first@example.com");
    let second = h.account("second@example.com");
    let member = h.account("member@example.com");
    h.stores
        .seed_membership(first.account_id(), member.account_id(), MemberRole::Viewer);

    let created = h
        .team
        .invite_member(
            second.account_id(),
            second.account_id(),
            "member@example.com",
            MemberRole::Admin,
        )
        .await
        .unwrap();

    let result = h
        .team
        .accept_invitation(&created.token, member.account_id())
        .await;
    assert!(matches!(result, Err(AuthError::Conflict(_))));
}

#[tokio::test]
async fn test_owner_cannot_be_invited() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");

    let result = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "owner@example.com",
            MemberRole::Admin,
        )
        .await;
    assert!(matches!(result, Err(AuthError::Validation(_))));
}

#[tokio::test]
async fn test_cancel_invitation_scoped_to_owner() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let other = h.account("other@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();
    let id = created.invitation.invitation_id();

    assert!(matches!(
        h.team.cancel_invitation(other.account_id(), id).await,
        Err(AuthError::InvitationNotFound)
    ));
    h.team.cancel_invitation(owner.account_id(), id).await.unwrap();
    assert!(h
        .team
        .list_pending_invitations(owner.account_id())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_accepted_invitation_cannot_be_cancelled() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");

    let created = h
        .team
        .invite_member(
            owner.account_id(),
            owner.account_id(),
            "member@example.com",
            MemberRole::Viewer,
        )
        .await
        .unwrap();
    h.team
        .accept_invitation(&created.token, member.account_id())
        .await
        .unwrap();

    let result = h
        .team
        .cancel_invitation(owner.account_id(), created.invitation.invitation_id())
        .await;
    assert!(matches!(result, Err(AuthError::Conflict(_))));
    assert!(h.stores.invitations.get(created.invitation.invitation_id()).is_some());
}

#[tokio::test]
async fn test_update_and_remove_member() {
    let h = Harness::new();
    let owner = h.account("owner@example.com");
    let member = h.account("member@example.com");
    let membership =
        h.stores
            .seed_membership(owner.account_id(), member.account_id(), MemberRole::Viewer);
    let id = membership.team_member_id();

    assert!(matches!(
        h.team
            .update_role(owner.account_id(), id, MemberRole::Owner)
            .await,
        Err(AuthError::Forbidden(_))
    ));

    let updated = h
        .team
        .update_role(owner.account_id(), id, MemberRole::Admin)
        .await
        .unwrap();
    assert_eq!(updated.role().unwrap(), MemberRole::Admin);

    let listed = h.team.list_members(owner.account_id()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].email, "member@example.com");

    // Another owner cannot touch this membership
    let stranger = h.account("stranger@example.com");
    assert!(matches!(
        h.team.remove_member(stranger.account_id(), id).await,
        Err(AuthError::MemberNotFound)
    ));

    h.team.remove_member(owner.account_id(), id).await.unwrap();
    assert!(h.stores.members.is_empty());

    let tenant = h
        .issuer
        .resolver()
        .resource_tenant_for(member.account_id())
        .await
        .unwrap();
    assert_eq!(tenant.tenant_id, member.account_id());
}
